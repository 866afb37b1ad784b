//! The alarm state machine, free of any I/O.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmState {
    #[default]
    Ok,
    Alarm,
}

impl Display for AlarmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmState::Ok => write!(f, "OK"),
            AlarmState::Alarm => write!(f, "ALARM"),
        }
    }
}

/// Turns a stream of depth samples into alarm transitions.
///
/// A sample breaches when `depth > threshold`. The state flips after `evaluation_periods`
/// consecutive samples disagreeing with it; one agreeing sample resets the streak.
#[derive(Debug, Clone)]
pub struct AlarmEvaluator {
    state: AlarmState,
    threshold: usize,
    evaluation_periods: u32,
    streak: u32,
}

impl AlarmEvaluator {
    pub fn new(threshold: usize, evaluation_periods: u32) -> Self {
        Self {
            state: AlarmState::Ok,
            threshold,
            evaluation_periods: evaluation_periods.max(1),
            streak: 0,
        }
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    /// Feeds one sample. Returns the new state if it changed.
    pub fn observe(&mut self, depth: usize) -> Option<AlarmState> {
        let observed = if depth > self.threshold {
            AlarmState::Alarm
        } else {
            AlarmState::Ok
        };
        if observed == self.state {
            self.streak = 0;
            return None;
        }
        self.streak += 1;
        if self.streak < self.evaluation_periods {
            return None;
        }
        self.streak = 0;
        self.state = observed;
        Some(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_period_flips_immediately() {
        let mut alarm = AlarmEvaluator::new(0, 1);
        assert_eq!(alarm.observe(0), None);
        assert_eq!(alarm.observe(1), Some(AlarmState::Alarm));
        assert_eq!(alarm.observe(3), None);
        assert_eq!(alarm.observe(0), Some(AlarmState::Ok));
    }

    #[test]
    fn test_streak_must_be_consecutive() {
        let mut alarm = AlarmEvaluator::new(0, 3);
        assert_eq!(alarm.observe(1), None);
        assert_eq!(alarm.observe(1), None);
        assert_eq!(alarm.observe(0), None);
        assert_eq!(alarm.observe(1), None);
        assert_eq!(alarm.observe(1), None);
        assert_eq!(alarm.observe(1), Some(AlarmState::Alarm));

        assert_eq!(alarm.observe(0), None);
        assert_eq!(alarm.observe(0), None);
        assert_eq!(alarm.state(), AlarmState::Alarm);
        assert_eq!(alarm.observe(0), Some(AlarmState::Ok));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut alarm = AlarmEvaluator::new(5, 1);
        assert_eq!(alarm.observe(5), None);
        assert_eq!(alarm.observe(6), Some(AlarmState::Alarm));
    }
}
