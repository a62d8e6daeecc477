//! Retry execution engine
//!
//! Drives one invocation through its states:
//!
//! ```text
//! ATTEMPTING --success--------------------------> DONE
//! ATTEMPTING --failure, policy allows----------> BACKOFF --> ATTEMPTING
//! ATTEMPTING --failure, policy refuses---------> RECOVERING --> DONE
//! RECOVERING --no matching handler-------------> FAILED (original error)
//! BACKOFF / before ATTEMPTING --cancel/deadline-> CANCELLED
//! ```
//!
//! Each call owns a fresh `RetryContext`; the executor itself only holds
//! immutable configuration and can be shared across concurrent calls.

use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::backoff::BackoffPolicy;
use super::classify::{Classify, ErrorInfo};
use crate::types::RetryProfile;

use super::context::{RetryContext, RetrySnapshot};
use super::error::{CancelReason, ConfigurationError, RetryError};
use super::observer::{NoOpObserver, RetryObserver};
use super::policy::{RetryPolicy, SimpleRetryPolicy};
use super::recovery::{RecoveryOutcome, RecoveryTable};

/// Execute an async operation with retry logic and no recovery
///
/// This is a convenience function for simple retry scenarios. For recovery
/// handlers, observers, or cancellation, use `RetryExecutorBuilder`.
///
/// # Example
///
/// ```rust,no_run
/// use rebound_core::retry::{retry, BackoffPolicy, SimpleRetryPolicy};
/// use std::time::Duration;
///
/// async fn example() {
///     let policy = SimpleRetryPolicy::new(3).unwrap();
///     let backoff = BackoffPolicy::fixed(Duration::from_millis(100));
///
///     let result = retry(policy, backoff, |ctx| async move {
///         println!("attempt {}", ctx.attempt());
///         Ok::<_, std::io::Error>("success")
///     })
///     .await;
/// }
/// ```
pub async fn retry<P, F, Fut, T, E>(
    policy: P,
    backoff: BackoffPolicy,
    op: F,
) -> Result<T, RetryError<E>>
where
    P: RetryPolicy<E>,
    F: FnMut(RetrySnapshot) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Classify + Display,
{
    RetryExecutorBuilder::new(policy, backoff)
        .build()
        .run(op)
        .await
}

/// Builder for configuring a `RetryExecutor`
///
/// Policy and backoff are required; there are no implicit defaults.
///
/// # Example
///
/// ```rust
/// use rebound_core::retry::{BackoffPolicy, RetryExecutorBuilder, SimpleRetryPolicy, TracingObserver};
/// use std::io::ErrorKind;
/// use std::time::Duration;
///
/// let executor = RetryExecutorBuilder::new(
///     SimpleRetryPolicy::new(4).unwrap().retry_on(ErrorKind::TimedOut),
///     BackoffPolicy::exponential(Duration::from_secs(1), 2.0, Duration::from_secs(7)).unwrap(),
/// )
/// .with_observer(TracingObserver::new("download"))
/// .with_max_elapsed(Duration::from_secs(30))
/// .build();
/// ```
pub struct RetryExecutorBuilder<P, O = NoOpObserver> {
    policy: P,
    backoff: BackoffPolicy,
    observer: O,
    max_elapsed: Option<Duration>,
}

impl<P> RetryExecutorBuilder<P, NoOpObserver> {
    /// Create a new builder from a retry policy and a backoff policy
    pub fn new(policy: P, backoff: BackoffPolicy) -> Self {
        Self {
            policy,
            backoff,
            observer: NoOpObserver,
            max_elapsed: None,
        }
    }
}

impl<K> RetryExecutorBuilder<SimpleRetryPolicy<K>, NoOpObserver>
where
    K: Eq + Hash + FromStr,
{
    /// Create a builder from a configuration profile
    ///
    /// Kind names, backoff values, and the optional deadline all come from
    /// the profile.
    pub fn from_profile(profile: &RetryProfile) -> Result<Self, ConfigurationError> {
        let mut builder = Self::new(
            SimpleRetryPolicy::from_profile(profile)?,
            BackoffPolicy::from_config(&profile.backoff)?,
        );

        if let Some(ms) = profile.max_elapsed_ms {
            builder = builder.with_max_elapsed(Duration::from_millis(ms));
        }

        Ok(builder)
    }
}

impl<P, O> RetryExecutorBuilder<P, O> {
    /// Replace the retry policy
    pub fn with_policy<P2>(self, policy: P2) -> RetryExecutorBuilder<P2, O> {
        RetryExecutorBuilder {
            policy,
            backoff: self.backoff,
            observer: self.observer,
            max_elapsed: self.max_elapsed,
        }
    }

    /// Replace the backoff policy
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the observer
    ///
    /// The observer receives callbacks during retry execution.
    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<P, O2> {
        RetryExecutorBuilder {
            policy: self.policy,
            backoff: self.backoff,
            observer,
            max_elapsed: self.max_elapsed,
        }
    }

    /// Bound the total wall time of each invocation
    ///
    /// Checked before every attempt and during backoff. An attempt already
    /// running is not interrupted.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = Some(max_elapsed);
        self
    }

    /// Build the executor
    pub fn build(self) -> RetryExecutor<P, O> {
        RetryExecutor {
            policy: self.policy,
            backoff: self.backoff,
            observer: self.observer,
            max_elapsed: self.max_elapsed,
        }
    }
}

/// A retry executor with configurable policy, backoff, and observer
///
/// Use `RetryExecutorBuilder` to create an instance.
#[derive(Debug, Clone)]
pub struct RetryExecutor<P, O = NoOpObserver> {
    policy: P,
    backoff: BackoffPolicy,
    observer: O,
    max_elapsed: Option<Duration>,
}

impl<P, O> RetryExecutor<P, O> {
    /// The retry policy
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The backoff policy
    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// The overall deadline, if any
    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed
    }
}

impl<P, O> RetryExecutor<P, O>
where
    O: RetryObserver,
{
    /// Execute an operation without arguments or recovery handlers
    ///
    /// When the policy refuses another attempt the original error is
    /// returned inside `RetryError::Exhausted` or `RetryError::NonRetryable`.
    pub async fn run<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetrySnapshot) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        P: RetryPolicy<E>,
    {
        let recovery = RecoveryTable::new();
        self.execute_inner(&(), &recovery, None, |ctx, _: &()| op(ctx))
            .await
    }

    /// Like `run`, but stops when `cancel` fires
    pub async fn run_cancellable<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(RetrySnapshot) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        P: RetryPolicy<E>,
    {
        let recovery = RecoveryTable::new();
        self.execute_inner(&(), &recovery, Some(cancel), |ctx, _: &()| op(ctx))
            .await
    }

    /// Execute an operation with retry and recovery
    ///
    /// # Arguments
    ///
    /// * `args` - The original call arguments, handed to every attempt and to
    ///   the recovery handler
    /// * `recovery` - Fallback handlers keyed by error kind
    /// * `op` - Produces one attempt from a context snapshot and the arguments
    ///
    /// # Returns
    ///
    /// The operation's value, the recovery handler's value, or a `RetryError`
    /// carrying the original error when no handler matched.
    pub async fn execute<'a, A, F, Fut, T, E>(
        &self,
        args: &'a A,
        recovery: &RecoveryTable<E, A, T>,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        A: ?Sized,
        F: FnMut(RetrySnapshot, &'a A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        P: RetryPolicy<E>,
    {
        self.execute_inner(args, recovery, None, op).await
    }

    /// Like `execute`, but stops when `cancel` fires
    ///
    /// Cancellation interrupts a backoff wait immediately and prevents the
    /// next attempt from starting. The result is `RetryError::Cancelled`,
    /// never the operation's own error.
    pub async fn execute_cancellable<'a, A, F, Fut, T, E>(
        &self,
        args: &'a A,
        recovery: &RecoveryTable<E, A, T>,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T, RetryError<E>>
    where
        A: ?Sized,
        F: FnMut(RetrySnapshot, &'a A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        P: RetryPolicy<E>,
    {
        self.execute_inner(args, recovery, Some(cancel), op).await
    }

    async fn execute_inner<'a, A, F, Fut, T, E>(
        &self,
        args: &'a A,
        recovery: &RecoveryTable<E, A, T>,
        cancel: Option<&CancellationToken>,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        A: ?Sized,
        F: FnMut(RetrySnapshot, &'a A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Classify + Display,
        P: RetryPolicy<E>,
    {
        let mut context: RetryContext<E> = RetryContext::new();
        let deadline = self.max_elapsed.map(|d| Instant::now() + d);
        let max_attempts = self.policy.max_attempts();

        loop {
            if let Some(reason) = interrupted(cancel, deadline) {
                return Err(self.cancelled(&mut context, reason));
            }

            let snapshot = context.snapshot();
            let attempt = snapshot.attempt();
            self.observer.on_attempt_start(attempt, max_attempts);

            let error = match op(snapshot, args).await {
                Ok(value) => {
                    self.observer.on_success(attempt, context.elapsed());
                    return Ok(value);
                }
                Err(err) => ErrorInfo::new(err),
            };

            let attempts = context.increment();

            if self.policy.should_retry(&context, &error) {
                let delay = self.backoff.next_delay(&context.snapshot());
                self.observer.on_attempt_failed(attempts, &error, delay);
                context.record_error(error);

                if let Some(reason) = suspend(delay, cancel, deadline).await {
                    return Err(self.cancelled(&mut context, reason));
                }
                continue;
            }

            let retryable = self.policy.is_retryable(&error);
            if retryable {
                self.observer.on_exhausted(attempts, &error);
            } else {
                self.observer.on_non_retryable(attempts, &error);
            }

            return match recovery.dispatch(error, args) {
                RecoveryOutcome::Recovered(value) => {
                    self.observer.on_recovered(attempts);
                    Ok(value)
                }
                RecoveryOutcome::HandlerFailed(err) => {
                    Err(RetryError::recovery_failed(attempts, err))
                }
                RecoveryOutcome::Unhandled(info) if retryable => Err(RetryError::exhausted(
                    attempts,
                    info.into_error(),
                    context.elapsed(),
                )),
                RecoveryOutcome::Unhandled(info) => {
                    Err(RetryError::non_retryable(attempts, info.into_error()))
                }
            };
        }
    }

    fn cancelled<E: Classify>(
        &self,
        context: &mut RetryContext<E>,
        reason: CancelReason,
    ) -> RetryError<E> {
        let attempts = context.attempt_count();
        self.observer.on_cancelled(attempts, reason);
        RetryError::cancelled(
            attempts,
            context.take_last_error().map(ErrorInfo::into_error),
            reason,
        )
    }
}

/// Check for cancellation before starting an attempt
fn interrupted(cancel: Option<&CancellationToken>, deadline: Option<Instant>) -> Option<CancelReason> {
    if cancel.is_some_and(CancellationToken::is_cancelled) {
        return Some(CancelReason::Token);
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Some(CancelReason::Deadline);
    }
    None
}

/// Wait out a backoff delay without blocking the runtime
///
/// Returns the reason if the wait was cut short.
async fn suspend(
    delay: Duration,
    cancel: Option<&CancellationToken>,
    deadline: Option<Instant>,
) -> Option<CancelReason> {
    let wake_at = Instant::now() + delay;
    let (until, hits_deadline) = match deadline {
        Some(deadline) if deadline <= wake_at => (deadline, true),
        _ => (wake_at, false),
    };

    if delay.is_zero() && !hits_deadline {
        return None;
    }

    match cancel {
        Some(token) => {
            tokio::select! {
                () = tokio::time::sleep_until(until) => {}
                () = token.cancelled() => return Some(CancelReason::Token),
            }
        }
        None => tokio::time::sleep_until(until).await,
    }

    hits_deadline.then_some(CancelReason::Deadline)
}
