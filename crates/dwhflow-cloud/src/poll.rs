//! Fixed-interval status polling

use crate::error::{CloudError, Result};
use dwhflow_config::{ConfigStore, section};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long to wait between status checks and when to give up
///
/// `max_wait = None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
        }
    }
}

impl PollPolicy {
    pub fn bounded(max_wait: Duration) -> Self {
        Self {
            max_wait: Some(max_wait),
            ..Self::default()
        }
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Default policy, bounded by `cluster.poll_timeout_secs` when that key is set
    pub fn from_store(store: &ConfigStore) -> Result<Self> {
        let max_wait = if store.has(section::CLUSTER, "poll_timeout_secs") {
            let secs: u64 = store.get_parsed(section::CLUSTER, "poll_timeout_secs")?;
            Some(Duration::from_secs(secs))
        } else {
            None
        };
        Ok(Self::default().with_max_wait(max_wait))
    }

    /// Call `probe` until it yields a value, sleeping `interval` between calls
    ///
    /// `probe` receives the 1-based attempt number. Errors from `probe` end
    /// the wait immediately.
    pub async fn wait_until<T, F, Fut>(&self, what: &str, mut probe: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if self.max_wait.is_none() {
            tracing::warn!("Waiting for {} without a time limit", what);
        }

        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if let Some(done) = probe(attempt).await? {
                tracing::debug!("{} after {} checks", what, attempt);
                return Ok(done);
            }

            if let Some(max_wait) = self.max_wait {
                let waited = started.elapsed();
                if waited + self.interval > max_wait {
                    return Err(CloudError::Timeout {
                        what: what.to_string(),
                        waited,
                    });
                }
            }
            sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwhflow_config::Template;

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_counts_attempts() {
        let policy = PollPolicy::default();
        let result = policy
            .wait_until("third attempt", |attempt| async move {
                Ok::<_, CloudError>((attempt == 3).then_some(attempt))
            })
            .await
            .unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_times_out() {
        let policy = PollPolicy::bounded(Duration::from_secs(12));
        let mut attempts = 0;
        let result: Result<()> = policy
            .wait_until("never", |_| {
                attempts += 1;
                async { Ok(None) }
            })
            .await;

        assert!(matches!(result, Err(CloudError::Timeout { .. })));
        // checks at 0s, 5s and 10s; a fourth would land past 12s
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_propagates_errors() {
        let policy = PollPolicy::default();
        let result: Result<()> = policy
            .wait_until("failing", |_| async {
                Err(CloudError::api("describe", "throttled"))
            })
            .await;
        assert!(matches!(result, Err(CloudError::Api { .. })));
    }

    #[test]
    fn test_from_store() {
        let mut store = ConfigStore::from_template(&Template::standard("admin"));
        assert_eq!(PollPolicy::from_store(&store).unwrap(), PollPolicy::default());

        store.set(section::CLUSTER, "poll_timeout_secs", "1800");
        let policy = PollPolicy::from_store(&store).unwrap();
        assert_eq!(policy.max_wait, Some(Duration::from_secs(1800)));
        assert_eq!(policy.interval, DEFAULT_POLL_INTERVAL);
    }
}
