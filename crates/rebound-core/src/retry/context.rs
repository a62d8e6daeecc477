//! Per-invocation retry state

use std::time::Duration;

use tokio::time::Instant;

use super::classify::{Classify, ErrorInfo};

/// Mutable state for a single executor invocation
///
/// Created fresh by the executor for every call and dropped when the call
/// completes. Only the executor mutates it; operations see a `RetrySnapshot`.
#[derive(Debug)]
pub struct RetryContext<E: Classify> {
    attempt_count: u32,
    last_error: Option<ErrorInfo<E>>,
    started_at: Instant,
}

impl<E: Classify> RetryContext<E> {
    /// Create a context with no attempts recorded
    pub fn new() -> Self {
        Self {
            attempt_count: 0,
            last_error: None,
            started_at: Instant::now(),
        }
    }

    /// Record one more failed attempt and return the new count
    pub fn increment(&mut self) -> u32 {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.attempt_count
    }

    /// Store the error from the most recent attempt
    pub fn record_error(&mut self, error: ErrorInfo<E>) {
        self.last_error = Some(error);
    }

    /// Number of failed attempts so far
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Error from the most recent failed attempt
    pub fn last_error(&self) -> Option<&ErrorInfo<E>> {
        self.last_error.as_ref()
    }

    /// Remove and return the most recent error
    pub fn take_last_error(&mut self) -> Option<ErrorInfo<E>> {
        self.last_error.take()
    }

    /// When the invocation started
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time since the invocation started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Read-only view handed to the operation and the backoff policy
    pub fn snapshot(&self) -> RetrySnapshot {
        RetrySnapshot {
            retry_count: self.attempt_count,
            started_at: self.started_at,
            last_error: self.last_error.as_ref().map(|e| e.message().to_string()),
        }
    }
}

impl<E: Classify> Default for RetryContext<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of a `RetryContext`
///
/// Passed to the operation on every attempt so it can log or branch on which
/// attempt it is running. It is a copy; nothing done to it affects the
/// executor.
#[derive(Debug, Clone)]
pub struct RetrySnapshot {
    retry_count: u32,
    started_at: Instant,
    last_error: Option<String>,
}

impl RetrySnapshot {
    /// Number of failed attempts before this one
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// 1-based number of the attempt about to run
    pub fn attempt(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    /// Whether this is the first attempt
    pub fn is_first_attempt(&self) -> bool {
        self.retry_count == 0
    }

    /// Time since the invocation started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Message of the previous failure, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
