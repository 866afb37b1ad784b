//! Poll-until-ready with bounded retries.

use super::PipelineError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Calls `probe` until it reports ready, doubling the pause between attempts.
pub async fn poll_until_ready<F, Fut>(
    component: &str,
    policy: ReadinessPolicy,
    mut probe: F,
) -> Result<(), PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let mut backoff = policy.initial_backoff;
    for attempt in 1..=policy.max_attempts {
        if probe().await {
            debug!(component, attempt, "Ready");
            return Ok(());
        }
        if attempt < policy.max_attempts {
            warn!(component, attempt, ?backoff, "Not ready yet");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(policy.max_backoff);
        }
    }
    Err(PipelineError::NotReady {
        component: component.to_string(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_backoff() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let start = Instant::now();
        poll_until_ready("queue", ReadinessPolicy::default(), move || async move {
            calls.fetch_add(1, Ordering::SeqCst) >= 2
        })
        .await
        .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        // 50ms + 100ms of backoff
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(150) && waited < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let policy = ReadinessPolicy {
            max_attempts: 3,
            ..ReadinessPolicy::default()
        };
        let err = poll_until_ready("topic", policy, || async { false })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::NotReady {
                component: "topic".into(),
                attempts: 3
            }
        );
    }
}
