/// Per-URL fetch attempt tracking
///
/// Retries are an explicit state machine rather than error propagation:
/// `Pending -> Attempting -> {Succeeded | RetryScheduled | Failed}`, with
/// `RetryScheduled -> Attempting` looping until the retry budget is spent.
use std::time::Duration;

/// Where a single URL's fetch currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttempt {
    /// Not yet started
    Pending,

    /// Attempt number `attempt` (1-based) is in flight
    Attempting { attempt: u32 },

    /// Attempt `attempt` failed transiently; the next one starts after `delay`
    RetryScheduled {
        attempt: u32,
        delay: Duration,
        reason: String,
    },

    /// Fetched on attempt `attempts`
    Succeeded { attempts: u32 },

    /// Gave up after `attempts` attempts
    Failed { attempts: u32, reason: String },
}

impl FetchAttempt {
    /// Starts the next attempt
    ///
    /// Terminal states and an in-flight attempt are returned unchanged.
    pub fn begin(self) -> Self {
        match self {
            Self::Pending => Self::Attempting { attempt: 1 },
            Self::RetryScheduled { attempt, .. } => Self::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    /// Records a successful response for the in-flight attempt
    pub fn succeed(self) -> Self {
        match self {
            Self::Attempting { attempt } => Self::Succeeded { attempts: attempt },
            other => other,
        }
    }

    /// Records a failed response for the in-flight attempt
    ///
    /// # Arguments
    ///
    /// * `reason` - Human-readable error description
    /// * `retryable` - Whether this class of error may be retried at all
    /// * `retries` - Retries allowed after the first attempt
    /// * `delay` - Backoff before the next attempt, if one is scheduled
    pub fn fail(self, reason: String, retryable: bool, retries: u32, delay: Duration) -> Self {
        match self {
            Self::Attempting { attempt } if retryable && attempt <= retries => {
                Self::RetryScheduled {
                    attempt,
                    delay,
                    reason,
                }
            }
            Self::Attempting { attempt } => Self::Failed {
                attempts: attempt,
                reason,
            },
            other => other,
        }
    }

    /// Abandons the fetch, e.g. on cancellation during a backoff
    pub fn abandon(self, reason: String) -> Self {
        match self {
            Self::Pending => Self::Failed {
                attempts: 0,
                reason,
            },
            Self::Attempting { attempt } | Self::RetryScheduled { attempt, .. } => Self::Failed {
                attempts: attempt,
                reason,
            },
            other => other,
        }
    }

    /// Number of attempts started so far
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Pending => 0,
            Self::Attempting { attempt } | Self::RetryScheduled { attempt, .. } => *attempt,
            Self::Succeeded { attempts } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}
