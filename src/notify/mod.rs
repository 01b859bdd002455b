//! Outbound notifications.
//!
//! A [`Notifier`] delivers one rendered HTML message. Delivery is
//! fire-and-forget: failures are logged and reported as `false`, never
//! retried. The only repetition is the deliberate threshold-alert burst.

pub mod format;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Delivery channel for rendered messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Send once; `true` if the channel acknowledged the message.
pub async fn notify(notifier: &dyn Notifier, message: &str) -> bool {
    match notifier.send(message).await {
        Ok(()) => {
            debug!("Notification delivered");
            true
        }
        Err(e) => {
            warn!(error = %e, "Failed to send notification");
            false
        }
    }
}

/// How loudly a threshold alert is repeated within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPolicy {
    pub repeats: u32,
    pub spacing: Duration,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            repeats: 3,
            spacing: Duration::from_secs(1),
        }
    }
}

/// Send `message` `policy.repeats` times, sleeping `policy.spacing` after
/// each send. Returns how many were delivered.
pub async fn send_alert_burst(notifier: &dyn Notifier, message: &str, policy: AlertPolicy) -> u32 {
    let mut delivered = 0;
    for _ in 0..policy.repeats {
        if notify(notifier, message).await {
            delivered += 1;
        }
        tokio::time::sleep(policy.spacing).await;
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[tokio::test]
    async fn test_notify_reports_failure() {
        let mut n = MockNotifier::new();
        n.expect_send().returning(|_| Err(anyhow::anyhow!("HTTP 502")));
        assert!(!notify(&n, "hello").await);
    }

    #[tokio::test]
    async fn test_notify_reports_success() {
        let mut n = MockNotifier::new();
        n.expect_send().with(eq("hello")).times(1).returning(|_| Ok(()));
        assert!(notify(&n, "hello").await);
    }

    #[tokio::test]
    async fn test_burst_sends_every_repeat_even_after_failure() {
        let mut n = MockNotifier::new();
        let mut seq = Sequence::new();
        n.expect_send().times(1).in_sequence(&mut seq).returning(|_| Ok(()));
        n.expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow::anyhow!("flood wait")));
        n.expect_send().times(1).in_sequence(&mut seq).returning(|_| Ok(()));

        let policy = AlertPolicy { repeats: 3, spacing: Duration::ZERO };
        assert_eq!(send_alert_burst(&n, "alert", policy).await, 2);
    }

    #[test]
    fn test_default_policy() {
        let p = AlertPolicy::default();
        assert_eq!(p.repeats, 3);
        assert_eq!(p.spacing, Duration::from_secs(1));
    }
}
