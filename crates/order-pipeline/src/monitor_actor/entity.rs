//! [`ActorBehavior`] implementation for [`MonitorState`].

use super::{AlarmEvaluator, AlarmState, MonitorRequest, MonitorStatus};
use crate::clients::{QueueClient, TopicClient};
use crate::config::MonitorConfig;
use crate::model::Notification;
use crate::queue_actor::QueueError;
use actor_runtime::ActorBehavior;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// What the monitor watches and where it raises its alarm.
#[derive(Clone, Debug)]
pub struct MonitorContext {
    pub dead_letter: QueueClient,
    pub alarm_topic: Option<TopicClient>,
}

pub struct MonitorState {
    config: MonitorConfig,
    evaluator: AlarmEvaluator,
    state_tx: watch::Sender<AlarmState>,
    last_depth: Option<usize>,
    samples: u64,
}

impl MonitorState {
    pub fn new(config: MonitorConfig, state_tx: watch::Sender<AlarmState>) -> Self {
        Self {
            evaluator: AlarmEvaluator::new(config.threshold, config.evaluation_periods),
            config,
            state_tx,
            last_depth: None,
            samples: 0,
        }
    }

    fn status(&self) -> MonitorStatus {
        MonitorStatus {
            alarm_name: self.config.alarm_name.clone(),
            state: self.evaluator.state(),
            last_depth: self.last_depth,
            samples: self.samples,
        }
    }

    async fn sample(&mut self, ctx: &MonitorContext) -> Result<MonitorStatus, QueueError> {
        // In-flight messages are still dead letters; a receive must not clear the alarm
        let depth = ctx.dead_letter.approximate_depth().await?;
        self.last_depth = Some(depth);
        self.samples += 1;

        if let Some(state) = self.evaluator.observe(depth) {
            self.state_tx.send_replace(state);
            match state {
                AlarmState::Alarm => warn!(
                    alarm = %self.config.alarm_name,
                    queue = %ctx.dead_letter.name(),
                    depth,
                    "Dead-letter queue not empty, alarm raised"
                ),
                AlarmState::Ok => info!(
                    alarm = %self.config.alarm_name,
                    queue = %ctx.dead_letter.name(),
                    "Dead-letter queue drained, alarm cleared"
                ),
            }
            if self.config.notify_topic {
                if let Some(topic) = &ctx.alarm_topic {
                    self.notify(topic, ctx.dead_letter.name(), state, depth)
                        .await;
                }
            }
        }
        Ok(self.status())
    }

    async fn notify(&self, topic: &TopicClient, queue: &str, state: AlarmState, depth: usize) {
        let body = json!({
            "alarmName": self.config.alarm_name,
            "newState": state,
            "reason": format!("{queue} holds {depth} message(s), threshold {}", self.config.threshold),
            "timestamp": Utc::now().to_rfc3339(),
        });
        let notification = Notification::new(
            topic.name(),
            format!("{state}: \"{}\"", self.config.alarm_name),
            serde_json::to_string_pretty(&body).unwrap_or_default(),
            BTreeMap::from([
                ("eventType".to_string(), "ALARM_STATE_CHANGE".to_string()),
                ("alarmName".to_string(), self.config.alarm_name.clone()),
                ("state".to_string(), state.to_string()),
            ]),
        );
        if let Err(e) = topic.publish(notification).await {
            warn!(alarm = %self.config.alarm_name, error = %e, "Alarm notification failed");
        }
    }
}

#[async_trait]
impl ActorBehavior for MonitorState {
    type Request = MonitorRequest;
    type Context = MonitorContext;

    fn name(&self) -> &str {
        &self.config.alarm_name
    }

    async fn handle(&mut self, request: MonitorRequest, ctx: &MonitorContext) {
        match request {
            MonitorRequest::Status { respond_to } => {
                let _ = respond_to.send(self.status());
            }
            MonitorRequest::SampleNow { respond_to } => {
                let _ = respond_to.send(self.sample(ctx).await);
            }
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.config.period)
    }

    async fn on_tick(&mut self, ctx: &MonitorContext) {
        if let Err(e) = self.sample(ctx).await {
            warn!(alarm = %self.config.alarm_name, error = %e, "Sampling failed, state unchanged");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MonitorConfig, QueueConfig};
    use crate::monitor_actor::{self, AlarmState, MonitorContext};
    use crate::queue_actor::{self, QueueContext};
    use std::time::Duration;

    /// An operator reading the dead-letter queue leases the message; it is still there.
    #[tokio::test(start_paused = true)]
    async fn test_leased_dead_letter_keeps_alarm_raised() {
        let (dlq_actor, dlq) = queue_actor::new(QueueConfig::new("OrderProcessingDLQ"));
        tokio::spawn(dlq_actor.run(QueueContext::default()));
        let (actor, monitor) = monitor_actor::new(MonitorConfig::default());
        tokio::spawn(actor.run(MonitorContext {
            dead_letter: dlq.clone(),
            alarm_topic: None,
        }));

        dlq.send("dead").await.unwrap();
        assert_eq!(monitor.sample_now().await.unwrap().state, AlarmState::Alarm);

        let leased = dlq.receive_batch(1, Duration::ZERO).await.unwrap();
        assert_eq!(leased.len(), 1);
        let status = monitor.sample_now().await.unwrap();
        assert_eq!(status.state, AlarmState::Alarm);
        assert_eq!(status.last_depth, Some(1));

        dlq.acknowledge(leased[0].receipt().unwrap()).await.unwrap();
        let status = monitor.sample_now().await.unwrap();
        assert_eq!(status.state, AlarmState::Ok);
        assert_eq!(status.last_depth, Some(0));
    }
}
