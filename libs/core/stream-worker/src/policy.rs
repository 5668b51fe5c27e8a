//! What happens to a message whose job failed.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ErrorCategory;

/// Outcome chosen for a failed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Re-publish with `retry_count + 1` after waiting `delay`.
    Retry { delay: Duration },
    /// Acknowledge and copy to the dead letter stream.
    Reject,
}

/// Failure handling strategy for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Every failure is rejected after a single attempt.
    SingleAttempt,
    /// Retryable failures are re-published until `max_retries` is reached;
    /// permanent failures are rejected immediately.
    Retry { max_retries: u32 },
}

impl FailurePolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    pub fn decide(&self, category: ErrorCategory, retry_count: u32) -> Disposition {
        match self {
            FailurePolicy::SingleAttempt => Disposition::Reject,
            FailurePolicy::Retry { max_retries } => {
                if category.is_retryable() && retry_count < *max_retries {
                    Disposition::Retry {
                        delay: category.backoff_delay(retry_count),
                    }
                } else {
                    Disposition::Reject
                }
            }
        }
    }
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Retry {
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::SingleAttempt => write!(f, "single_attempt"),
            FailurePolicy::Retry { max_retries } => write!(f, "retry(max={})", max_retries),
        }
    }
}

/// Parses `retry` (default retry budget) or `single_attempt`.
impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" => Ok(FailurePolicy::default()),
            "single_attempt" | "single-attempt" => Ok(FailurePolicy::SingleAttempt),
            other => Err(format!(
                "unknown failure policy '{}', expected 'retry' or 'single_attempt'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_is_rejected_immediately() {
        let policy = FailurePolicy::default();
        assert_eq!(policy.decide(ErrorCategory::Permanent, 0), Disposition::Reject);
    }

    #[test]
    fn test_transient_retries_until_budget_spent() {
        let policy = FailurePolicy::Retry { max_retries: 2 };

        assert_eq!(
            policy.decide(ErrorCategory::Transient, 0),
            Disposition::Retry { delay: Duration::from_secs(1) }
        );
        assert_eq!(
            policy.decide(ErrorCategory::Transient, 1),
            Disposition::Retry { delay: Duration::from_secs(2) }
        );
        assert_eq!(policy.decide(ErrorCategory::Transient, 2), Disposition::Reject);
    }

    #[test]
    fn test_rate_limited_uses_longer_backoff() {
        let policy = FailurePolicy::default();
        assert_eq!(
            policy.decide(ErrorCategory::RateLimited, 1),
            Disposition::Retry { delay: Duration::from_secs(10) }
        );
    }

    #[test]
    fn test_single_attempt_rejects_everything() {
        let policy = FailurePolicy::SingleAttempt;
        assert_eq!(policy.decide(ErrorCategory::Transient, 0), Disposition::Reject);
        assert_eq!(policy.decide(ErrorCategory::RateLimited, 0), Disposition::Reject);
    }

    #[test]
    fn test_parse() {
        assert_eq!("retry".parse::<FailurePolicy>().unwrap(), FailurePolicy::default());
        assert_eq!(
            "Single_Attempt".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::SingleAttempt
        );
        assert!("drop".parse::<FailurePolicy>().is_err());
    }
}
