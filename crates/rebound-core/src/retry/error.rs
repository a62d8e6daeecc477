//! Error types for the retry execution engine
//!
//! `RetryError` covers the runtime outcomes of an invocation that did not
//! produce a value. `ConfigurationError` covers programmer mistakes that are
//! caught while building policies and recovery tables, before any operation
//! runs.

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Why an invocation was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller's cancellation token fired
    Token,
    /// The overall deadline configured on the executor passed
    Deadline,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Token => write!(f, "cancellation requested"),
            CancelReason::Deadline => write!(f, "deadline exceeded"),
        }
    }
}

/// Errors that can occur during retry execution
///
/// The error type is generic over `E`, the underlying error type from the
/// operation being retried. Whenever no recovery handler matched, the
/// original error is carried unchanged and can be recovered with
/// [`RetryError::into_source`].
#[derive(Debug)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted and no recovery entry matched
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Total duration spent across all attempts
        total_duration: Duration,
    },

    /// The error kind is not eligible for retry and no recovery entry matched
    NonRetryable {
        /// The attempt that produced the error
        attempt: u32,
        /// The original error
        source: E,
    },

    /// The invocation was cancelled during backoff or before an attempt
    Cancelled {
        /// Number of attempts made before cancellation
        attempts: u32,
        /// The last error that occurred, if any
        last_error: Option<E>,
        /// What triggered the cancellation
        reason: CancelReason,
    },

    /// A recovery handler was selected but returned an error itself
    RecoveryFailed {
        /// Number of attempts made before recovery was invoked
        attempts: u32,
        /// The error returned by the handler
        source: E,
    },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => {
                write!(
                    f,
                    "retry exhausted after {} attempts over {:.2}s: {}",
                    attempts,
                    total_duration.as_secs_f64(),
                    source
                )
            }
            RetryError::NonRetryable { attempt, source } => {
                write!(f, "non-retryable error on attempt {}: {}", attempt, source)
            }
            RetryError::Cancelled {
                attempts,
                last_error,
                reason,
            } => {
                if let Some(err) = last_error {
                    write!(
                        f,
                        "retry cancelled after {} attempts ({}): {}",
                        attempts, reason, err
                    )
                } else {
                    write!(f, "retry cancelled after {} attempts ({})", attempts, reason)
                }
            }
            RetryError::RecoveryFailed { attempts, source } => {
                write!(
                    f,
                    "recovery failed after {} attempts: {}",
                    attempts, source
                )
            }
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::NonRetryable { source, .. } => Some(source),
            RetryError::Cancelled {
                last_error: Some(err),
                ..
            } => Some(err),
            RetryError::Cancelled { .. } => None,
            RetryError::RecoveryFailed { source, .. } => Some(source),
        }
    }
}

impl<E> RetryError<E> {
    /// Create a new exhausted error
    pub fn exhausted(attempts: u32, source: E, total_duration: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        }
    }

    /// Create a new non-retryable error
    pub fn non_retryable(attempt: u32, source: E) -> Self {
        RetryError::NonRetryable { attempt, source }
    }

    /// Create a new cancelled error
    pub fn cancelled(attempts: u32, last_error: Option<E>, reason: CancelReason) -> Self {
        RetryError::Cancelled {
            attempts,
            last_error,
            reason,
        }
    }

    /// Create a new recovery failure
    pub fn recovery_failed(attempts: u32, source: E) -> Self {
        RetryError::RecoveryFailed { attempts, source }
    }

    /// Get the number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::NonRetryable { attempt, .. } => *attempt,
            RetryError::Cancelled { attempts, .. } => *attempts,
            RetryError::RecoveryFailed { attempts, .. } => *attempts,
        }
    }

    /// Check if this error indicates all retries were exhausted
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Check if this error is non-retryable
    pub fn is_non_retryable(&self) -> bool {
        matches!(self, RetryError::NonRetryable { .. })
    }

    /// Check if this error indicates cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// Check if a recovery handler failed
    pub fn is_recovery_failed(&self) -> bool {
        matches!(self, RetryError::RecoveryFailed { .. })
    }

    /// Cancellation reason, if this is a cancellation
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            RetryError::Cancelled { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// Get the underlying error, consuming this error
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::NonRetryable { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error,
            RetryError::RecoveryFailed { source, .. } => Some(source),
        }
    }

    /// Get a reference to the underlying error
    pub fn source_ref(&self) -> Option<&E> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::NonRetryable { source, .. } => Some(source),
            RetryError::Cancelled { last_error, .. } => last_error.as_ref(),
            RetryError::RecoveryFailed { source, .. } => Some(source),
        }
    }

    /// Map the error type using a closure
    pub fn map_err<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => RetryError::Exhausted {
                attempts,
                source: f(source),
                total_duration,
            },
            RetryError::NonRetryable { attempt, source } => RetryError::NonRetryable {
                attempt,
                source: f(source),
            },
            RetryError::Cancelled {
                attempts,
                last_error,
                reason,
            } => RetryError::Cancelled {
                attempts,
                last_error: last_error.map(f),
                reason,
            },
            RetryError::RecoveryFailed { attempts, source } => RetryError::RecoveryFailed {
                attempts,
                source: f(source),
            },
        }
    }
}

/// Invalid retry configuration
///
/// Raised while constructing policies, backoff settings, or recovery tables.
/// None of these can occur once an operation has started.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// Two recovery entries map the same error kind
    #[error("duplicate recovery handler for error kind {kind}")]
    DuplicateRecovery { kind: String },

    /// A second catch-all recovery handler was registered
    #[error("a fallback recovery handler is already registered")]
    DuplicateFallback,

    /// A policy must allow at least one attempt
    #[error("max attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    /// Backoff multiplier below 1 or not a finite number
    #[error("backoff multiplier must be a finite number >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    /// Maximum delay lower than the initial delay
    #[error("max delay {max_delay_ms}ms is lower than initial delay {initial_delay_ms}ms")]
    MaxDelayBelowInitial {
        initial_delay_ms: u128,
        max_delay_ms: u128,
    },

    /// A configured kind name did not parse
    #[error("unknown error kind: {0}")]
    UnknownErrorKind(String),
}

impl ConfigurationError {
    /// Create a duplicate recovery error for a kind
    pub fn duplicate_recovery(kind: &impl fmt::Debug) -> Self {
        Self::DuplicateRecovery {
            kind: format!("{:?}", kind),
        }
    }

    /// Create an unknown error kind error
    pub fn unknown_kind(name: impl Into<String>) -> Self {
        Self::UnknownErrorKind(name.into())
    }
}
