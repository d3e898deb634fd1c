// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded retry for failed sends.
//
// A failed send puts the job back at the head of its queue. It is tried
// again once the printer is seen online, up to `max_attempts` times in
// total, and then marked failed. There is no backoff timer: the wait for
// the next successful health probe is the backoff.

use tracing::{debug, warn};

use labelwerk_core::config::FleetConfig;
use labelwerk_core::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total send attempts per job, including the first.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl From<&FleetConfig> for RetryConfig {
    fn from(config: &FleetConfig) -> Self {
        Self {
            max_attempts: config.max_send_attempts.max(1),
        }
    }
}

/// What to do with a job after a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back to the head of the queue.
    Requeue,
    /// Attempts used up; mark failed.
    Exhausted,
}

/// Decide after `attempts` failed sends (counting the one that just failed).
///
/// Every transport failure is transient from the queue's point of view;
/// only the attempt count ends a job.
pub fn should_retry(err: &TransportError, attempts: u32, config: &RetryConfig) -> RetryDecision {
    if attempts >= config.max_attempts {
        warn!(attempts, max = config.max_attempts, error = %err, "send attempts exhausted");
        RetryDecision::Exhausted
    } else {
        debug!(attempts, max = config.max_attempts, error = %err, "requeueing job");
        RetryDecision::Requeue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_respects_max() {
        let config = RetryConfig { max_attempts: 3 };
        let err = TransportError::ConnectFailed("connection refused".into());
        assert_eq!(should_retry(&err, 1, &config), RetryDecision::Requeue);
        assert_eq!(should_retry(&err, 2, &config), RetryDecision::Requeue);
        assert_eq!(should_retry(&err, 3, &config), RetryDecision::Exhausted);
    }

    #[test]
    fn single_attempt_never_requeues() {
        let config = RetryConfig { max_attempts: 1 };
        let err = TransportError::Timeout("write".into());
        assert_eq!(should_retry(&err, 1, &config), RetryDecision::Exhausted);
    }

    #[test]
    fn zero_attempts_in_config_still_allows_one() {
        let fleet = FleetConfig {
            max_send_attempts: 0,
            ..FleetConfig::default()
        };
        assert_eq!(RetryConfig::from(&fleet).max_attempts, 1);
    }
}
