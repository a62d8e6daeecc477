//! Retry policies
//!
//! A policy answers one question after every failed attempt: may the
//! executor try again? The answer depends on the error kind and on how many
//! attempts have already failed.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::types::RetryProfile;

use super::classify::{Classify, ErrorInfo};
use super::context::RetryContext;
use super::error::ConfigurationError;

/// Decides whether another attempt is permitted
///
/// `should_retry` is consulted after the context has recorded the failure, so
/// `context.attempt_count()` already includes the attempt that just failed.
pub trait RetryPolicy<E: Classify>: Send + Sync {
    /// Whether the executor may run another attempt
    fn should_retry(&self, context: &RetryContext<E>, error: &ErrorInfo<E>) -> bool;

    /// Whether the error's kind is eligible for retry at all
    ///
    /// Used to tell a kind-based refusal apart from running out of attempts.
    fn is_retryable(&self, error: &ErrorInfo<E>) -> bool {
        let _ = error;
        true
    }

    /// Upper bound on attempts, if the policy has one
    fn max_attempts(&self) -> Option<u32> {
        None
    }
}

/// Attempt-count policy with per-kind allow and deny lists
///
/// - A kind in the deny list stops retrying immediately, whatever the count.
/// - A non-empty allow list restricts retries to the kinds it contains.
/// - Otherwise another attempt is allowed while fewer than `max_attempts`
///   attempts have failed.
///
/// # Example
///
/// ```rust
/// use rebound_core::retry::SimpleRetryPolicy;
/// use std::io::ErrorKind;
///
/// let policy = SimpleRetryPolicy::new(4)
///     .unwrap()
///     .retry_on(ErrorKind::TimedOut)
///     .no_retry_on(ErrorKind::InvalidInput);
///
/// assert!(policy.is_kind_retryable(&ErrorKind::TimedOut));
/// assert!(!policy.is_kind_retryable(&ErrorKind::InvalidInput));
/// assert!(!policy.is_kind_retryable(&ErrorKind::NotFound));
/// ```
#[derive(Debug, Clone)]
pub struct SimpleRetryPolicy<K> {
    max_attempts: u32,
    retryable: HashSet<K>,
    non_retryable: HashSet<K>,
}

impl<K: Eq + Hash> SimpleRetryPolicy<K> {
    /// Create a policy that retries every kind up to `max_attempts` attempts
    ///
    /// `max_attempts` counts the first attempt, so `1` means no retries.
    pub fn new(max_attempts: u32) -> Result<Self, ConfigurationError> {
        if max_attempts == 0 {
            return Err(ConfigurationError::InvalidMaxAttempts(max_attempts));
        }

        Ok(Self {
            max_attempts,
            retryable: HashSet::new(),
            non_retryable: HashSet::new(),
        })
    }

    /// Only retry the listed kinds (cumulative)
    pub fn retry_on(mut self, kind: K) -> Self {
        self.retryable.insert(kind);
        self
    }

    /// Never retry this kind
    ///
    /// Takes precedence over `retry_on` for the same kind.
    pub fn no_retry_on(mut self, kind: K) -> Self {
        self.non_retryable.insert(kind);
        self
    }

    /// Kinds that retries are restricted to (empty means all)
    pub fn retryable_kinds(&self) -> &HashSet<K> {
        &self.retryable
    }

    /// Kinds that are never retried
    pub fn non_retryable_kinds(&self) -> &HashSet<K> {
        &self.non_retryable
    }

    /// Maximum attempts including the first
    pub fn attempt_limit(&self) -> u32 {
        self.max_attempts
    }

    /// Check the kind lists without considering the attempt count
    pub fn is_kind_retryable(&self, kind: &K) -> bool {
        if self.non_retryable.contains(kind) {
            return false;
        }

        self.retryable.is_empty() || self.retryable.contains(kind)
    }

    /// Build a policy from a configuration profile
    ///
    /// Kind names are parsed with `FromStr`; an unknown name is a
    /// configuration error.
    pub fn from_profile(profile: &RetryProfile) -> Result<Self, ConfigurationError>
    where
        K: FromStr,
    {
        let mut policy = Self::new(profile.max_attempts)?;

        for name in &profile.retry_on {
            policy = policy.retry_on(parse_kind(name)?);
        }
        for name in &profile.no_retry_on {
            policy = policy.no_retry_on(parse_kind(name)?);
        }

        Ok(policy)
    }
}

fn parse_kind<K: FromStr>(name: &str) -> Result<K, ConfigurationError> {
    name.trim()
        .parse()
        .map_err(|_| ConfigurationError::unknown_kind(name))
}

impl<E, K> RetryPolicy<E> for SimpleRetryPolicy<K>
where
    E: Classify<Kind = K>,
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
{
    fn should_retry(&self, context: &RetryContext<E>, error: &ErrorInfo<E>) -> bool {
        self.is_kind_retryable(error.kind()) && context.attempt_count() < self.max_attempts
    }

    fn is_retryable(&self, error: &ErrorInfo<E>) -> bool {
        self.is_kind_retryable(error.kind())
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(self.max_attempts)
    }
}

/// Unconditional policy: retry every failure until success or cancellation
///
/// Pair it with a cancellation token or `with_max_elapsed` on the executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: Classify> RetryPolicy<E> for AlwaysRetry {
    fn should_retry(&self, _context: &RetryContext<E>, _error: &ErrorInfo<E>) -> bool {
        true
    }
}

/// Policy that never retries: one attempt, then recovery
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl<E: Classify> RetryPolicy<E> for NeverRetry {
    fn should_retry(&self, _context: &RetryContext<E>, _error: &ErrorInfo<E>) -> bool {
        false
    }

    fn max_attempts(&self) -> Option<u32> {
        Some(1)
    }
}
