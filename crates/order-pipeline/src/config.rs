//! # Pipeline Configuration
//!
//! One explicit [`PipelineConfig`] is built up front and handed to every component
//! constructor. Defaults mirror the deployed order processor; each value can be overridden
//! from the environment (`OP_*` variables, optionally loaded from a `.env` file by the
//! binary). Malformed values are logged and replaced by the default.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `OP_REGION` | `us-east-1` |
//! | `OP_VISIBILITY_TIMEOUT_SECS` | 30 |
//! | `OP_RETENTION_SECS` | 345600 (4 days) |
//! | `OP_DLQ_RETENTION_SECS` | 1209600 (14 days) |
//! | `OP_AUDIT_RETENTION_SECS` | 345600 (4 days) |
//! | `OP_MAX_RECEIVE_COUNT` | 3 |
//! | `OP_SWEEP_INTERVAL_MS` | 1000 |
//! | `OP_BATCH_SIZE` | 10 |
//! | `OP_MAX_BATCHING_WINDOW_SECS` | 5 |
//! | `OP_MAX_CONCURRENCY` | 1 |
//! | `OP_REPORT_BATCH_ITEM_FAILURES` | true |
//! | `OP_RELEASE_FAILED_IMMEDIATELY` | false |
//! | `OP_ROUTER_MAX_ATTEMPTS` | 3 |
//! | `OP_ALARM_PERIOD_SECS` | 60 |
//! | `OP_ALARM_EVALUATION_PERIODS` | 1 |
//! | `OP_NOTIFICATION_EMAIL` | unset |

use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const INGESTION_QUEUE_NAME: &str = "OrderProcessingQueue";
pub const DEAD_LETTER_QUEUE_NAME: &str = "OrderProcessingDLQ";
pub const AUDIT_QUEUE_NAME: &str = "OrderAuditQueue";
pub const TOPIC_NAME: &str = "OrderEvents";
pub const EVENT_BUS_NAME: &str = "OrderEventBus";

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETENTION: Duration = Duration::from_secs(4 * 24 * 60 * 60);
const DEFAULT_DLQ_RETENTION: Duration = Duration::from_secs(14 * 24 * 60 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_MAX_RECEIVE_COUNT: u32 = 3;
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_BATCHING_WINDOW: Duration = Duration::from_secs(5);

/// Maps exhausted retries to a dead-letter queue.
#[derive(Clone, Debug, PartialEq)]
pub struct RedrivePolicy {
    /// Name of the dead-letter queue.
    pub dead_letter_target: String,
    /// Receives allowed before the next expiry dead-letters the message.
    pub max_receive_count: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueueConfig {
    pub name: String,
    /// How long a received message stays hidden from other receivers.
    pub visibility_timeout: Duration,
    /// Messages older than this (since arrival in the queue) are purged.
    pub retention_period: Duration,
    pub redrive_policy: Option<RedrivePolicy>,
    /// Cadence of the lease reaper.
    pub sweep_interval: Duration,
}

impl QueueConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            retention_period: DEFAULT_RETENTION,
            redrive_policy: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention_period = retention;
        self
    }

    pub fn with_redrive(mut self, dead_letter_target: &str, max_receive_count: u32) -> Self {
        self.redrive_policy = Some(RedrivePolicy {
            dead_letter_target: dead_letter_target.to_string(),
            max_receive_count,
        });
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// What the processor does with the messages of a batch that failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Leave the lease alone; the message reappears once its visibility timeout lapses.
    #[default]
    WaitForVisibilityTimeout,
    /// Set the visibility of failed messages to zero so they can be received right away.
    ReleaseImmediately,
}

/// Consumer trigger settings.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsumerConfig {
    /// Maximum messages pulled per batch (1..=10).
    pub batch_size: usize,
    /// Long-poll wait used when pulling a batch.
    pub max_batching_window: Duration,
    /// Maximum batches processed at the same time.
    pub max_concurrency: usize,
    /// When false, one failure fails the whole batch and nothing in it is acknowledged.
    pub report_batch_item_failures: bool,
    pub failure_mode: FailureMode,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_batching_window: DEFAULT_BATCHING_WINDOW,
            max_concurrency: 1,
            report_batch_item_failures: true,
            failure_mode: FailureMode::WaitForVisibilityTimeout,
        }
    }
}

/// Retry budget for router → target deliveries.
#[derive(Clone, Debug, PartialEq)]
pub struct RouterConfig {
    pub bus_name: String,
    pub max_delivery_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            bus_name: EVENT_BUS_NAME.to_string(),
            max_delivery_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Dead-letter depth alarm settings.
#[derive(Clone, Debug, PartialEq)]
pub struct MonitorConfig {
    pub alarm_name: String,
    /// Sampling period.
    pub period: Duration,
    /// Consecutive samples needed to change state.
    pub evaluation_periods: u32,
    /// Depth above which a sample is breaching.
    pub threshold: usize,
    /// Publish a notification to the topic on every state change.
    pub notify_topic: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            alarm_name: "OrderProcessingDLQ-NotEmpty".to_string(),
            period: Duration::from_secs(60),
            evaluation_periods: 1,
            threshold: 0,
            notify_topic: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub region: String,
    pub ingestion: QueueConfig,
    pub dead_letter: QueueConfig,
    pub audit: QueueConfig,
    pub topic_name: String,
    pub consumer: ConsumerConfig,
    pub router: RouterConfig,
    pub monitor: MonitorConfig,
    /// Optional email endpoint subscribed to the topic (pending until confirmed).
    pub notification_email: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            ingestion: QueueConfig::new(INGESTION_QUEUE_NAME)
                .with_redrive(DEAD_LETTER_QUEUE_NAME, DEFAULT_MAX_RECEIVE_COUNT),
            dead_letter: QueueConfig::new(DEAD_LETTER_QUEUE_NAME)
                .with_retention(DEFAULT_DLQ_RETENTION),
            audit: QueueConfig::new(AUDIT_QUEUE_NAME),
            topic_name: TOPIC_NAME.to_string(),
            consumer: ConsumerConfig::default(),
            router: RouterConfig::default(),
            monitor: MonitorConfig::default(),
            notification_email: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();
        if let Ok(region) = env::var("OP_REGION") {
            config.region = region;
        }

        let visibility = env_secs("OP_VISIBILITY_TIMEOUT_SECS", DEFAULT_VISIBILITY_TIMEOUT);
        let sweep = env_millis("OP_SWEEP_INTERVAL_MS", DEFAULT_SWEEP_INTERVAL);
        let max_receive_count = env_parse("OP_MAX_RECEIVE_COUNT", DEFAULT_MAX_RECEIVE_COUNT);
        config.ingestion = config
            .ingestion
            .with_visibility_timeout(visibility)
            .with_retention(env_secs("OP_RETENTION_SECS", DEFAULT_RETENTION))
            .with_redrive(DEAD_LETTER_QUEUE_NAME, max_receive_count)
            .with_sweep_interval(sweep);
        config.dead_letter = config
            .dead_letter
            .with_retention(env_secs("OP_DLQ_RETENTION_SECS", DEFAULT_DLQ_RETENTION))
            .with_sweep_interval(sweep);
        config.audit = config
            .audit
            .with_retention(env_secs("OP_AUDIT_RETENTION_SECS", DEFAULT_RETENTION))
            .with_sweep_interval(sweep);

        let consumer = &mut config.consumer;
        consumer.batch_size = env_parse("OP_BATCH_SIZE", DEFAULT_BATCH_SIZE);
        consumer.max_batching_window =
            env_secs("OP_MAX_BATCHING_WINDOW_SECS", DEFAULT_BATCHING_WINDOW);
        consumer.max_concurrency = env_parse("OP_MAX_CONCURRENCY", 1);
        consumer.report_batch_item_failures = env_flag("OP_REPORT_BATCH_ITEM_FAILURES", true);
        if env_flag("OP_RELEASE_FAILED_IMMEDIATELY", false) {
            consumer.failure_mode = FailureMode::ReleaseImmediately;
        }

        config.router.max_delivery_attempts = env_parse("OP_ROUTER_MAX_ATTEMPTS", 3);
        config.monitor.period = env_secs("OP_ALARM_PERIOD_SECS", config.monitor.period);
        config.monitor.evaluation_periods = env_parse("OP_ALARM_EVALUATION_PERIODS", 1);
        config.notification_email = env::var("OP_NOTIFICATION_EMAIL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        config
    }

    /// Rejects settings the components cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=crate::queue_actor::MAX_BATCH_SIZE).contains(&self.consumer.batch_size) {
            return Err(format!(
                "batch size must be between 1 and {}, got {}",
                crate::queue_actor::MAX_BATCH_SIZE,
                self.consumer.batch_size
            ));
        }
        if self.consumer.max_concurrency == 0 {
            return Err("max concurrency must be at least 1".to_string());
        }
        if self.monitor.evaluation_periods == 0 {
            return Err("alarm evaluation periods must be at least 1".to_string());
        }
        if self.router.max_delivery_attempts == 0 {
            return Err("router delivery attempts must be at least 1".to_string());
        }
        for queue in [&self.ingestion, &self.dead_letter, &self.audit] {
            if queue.sweep_interval.is_zero() {
                return Err(format!("queue {} has a zero sweep interval", queue.name));
            }
        }
        match &self.ingestion.redrive_policy {
            Some(policy) if policy.dead_letter_target != self.dead_letter.name => Err(format!(
                "redrive target {} does not name the dead-letter queue {}",
                policy.dead_letter_target, self.dead_letter.name
            )),
            Some(policy) if policy.max_receive_count == 0 => {
                Err("max receive count must be at least 1".to_string())
            }
            _ => Ok(()),
        }
    }
}

fn env_parse<T: FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("{s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(name, default.as_secs()))
}

fn env_millis(name: &str, default: Duration) -> Duration {
    Duration::from_millis(env_parse(name, default.as_millis() as u64))
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| {
            let s = s.to_lowercase();
            if default {
                s != "0" && s != "false"
            } else {
                s == "1" || s == "true"
            }
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = PipelineConfig::default();
        assert_eq!(config.ingestion.visibility_timeout, Duration::from_secs(30));
        assert_eq!(
            config.ingestion.redrive_policy,
            Some(RedrivePolicy {
                dead_letter_target: DEAD_LETTER_QUEUE_NAME.to_string(),
                max_receive_count: 3,
            })
        );
        assert!(config.dead_letter.redrive_policy.is_none());
        assert!(config.audit.redrive_policy.is_none());
        assert_eq!(config.consumer.batch_size, 10);
        assert_eq!(config.consumer.max_batching_window, Duration::from_secs(5));
        assert_eq!(config.consumer.max_concurrency, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = PipelineConfig::default();
        config.consumer.batch_size = 11;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.consumer.max_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.ingestion = config.ingestion.with_redrive("SomewhereElse", 3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_parsing_falls_back_on_garbage() {
        // Unique variable names keep this test independent of the others
        env::set_var("OP_TEST_PARSE_OK", "7");
        env::set_var("OP_TEST_PARSE_BAD", "seven");
        assert_eq!(env_parse("OP_TEST_PARSE_OK", 1u32), 7);
        assert_eq!(env_parse("OP_TEST_PARSE_BAD", 1u32), 1);
        assert_eq!(env_parse("OP_TEST_PARSE_UNSET", 5usize), 5);

        env::set_var("OP_TEST_FLAG_OFF", "false");
        env::set_var("OP_TEST_FLAG_ON", "1");
        assert!(!env_flag("OP_TEST_FLAG_OFF", true));
        assert!(env_flag("OP_TEST_FLAG_ON", false));
        assert!(env_flag("OP_TEST_FLAG_UNSET", true));
    }
}
