//! Bounded exponential-backoff policy for opening outbound sockets.
//!
//! Binding an ephemeral UDP socket rarely fails, but transient conditions
//! (fd exhaustion, sandbox policy races) do occur in production.  Rather
//! than silently leaving a sender dead after one failed bind, the open path
//! retries a configurable number of times with doubling delays, then gives
//! up and leaves the sender inert; a later manual transmit re-runs the
//! policy.

use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{info, warn};

/// A bounded exponential backoff schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total bind attempts before giving up.  0 is treated as 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt.
    pub initial_backoff: Duration,
    /// Cap applied to the doubling delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// The delay to sleep after failed attempt number `attempt` (0-based):
    /// `initial * 2^attempt`, saturating at `max_backoff`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Binds a UDP socket to an ephemeral local port, retrying per `policy`.
///
/// Returns `None` when every attempt failed; the caller stays inert and may
/// invoke this again later.
pub async fn bind_ephemeral_with_retry(policy: &RetryPolicy) -> Option<UdpSocket> {
    let attempts = policy.max_attempts.max(1);
    for attempt in 0..attempts {
        match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => {
                if let Err(e) = socket.set_broadcast(true) {
                    warn!("could not enable broadcast on outbound socket: {e}");
                }
                if attempt > 0 {
                    info!("outbound socket bound after {} retries", attempt);
                }
                return Some(socket);
            }
            Err(e) => {
                warn!(
                    "outbound socket bind failed (attempt {}/{attempts}): {e}",
                    attempt + 1
                );
                if attempt + 1 < attempts {
                    tokio::time::sleep(policy.delay(attempt)).await;
                }
            }
        }
    }
    warn!("giving up on outbound socket after {attempts} attempts; sender stays inert");
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        };
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_saturates_at_max_backoff() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(2),
        };
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(9), Duration::from_secs(2));
        // Shift counts large enough to overflow must still hit the cap.
        assert_eq!(policy.delay(40), Duration::from_secs(2));
    }

    #[test]
    fn test_default_policy_is_bounded() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.delay(100) <= policy.max_backoff);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_succeeds_first_attempt() {
        let socket = bind_ephemeral_with_retry(&RetryPolicy::default()).await;
        let socket = socket.expect("ephemeral bind must succeed");
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }
}
