//! Backoff policies
//!
//! Computes how long the executor waits between a failed attempt and the next
//! one. Delays are capped by `max_delay` and never negative. Without jitter
//! the result is a pure function of the failure count.

use rand::Rng;
use std::time::Duration;

use crate::types::{BackoffConfig, BackoffStrategy};

use super::context::RetrySnapshot;
use super::error::ConfigurationError;

/// Lower bound of the jitter window; delays are scaled by a factor in `[0.5, 1.0]`
const JITTER_FLOOR: f64 = 0.5;

/// Delay strategy between attempts
///
/// # Example
///
/// ```rust
/// use rebound_core::retry::BackoffPolicy;
/// use std::time::Duration;
///
/// let backoff = BackoffPolicy::exponential(
///     Duration::from_secs(1),
///     2.0,
///     Duration::from_secs(7),
/// )
/// .unwrap();
///
/// assert_eq!(backoff.delay_for(1), Duration::from_secs(1));
/// assert_eq!(backoff.delay_for(2), Duration::from_secs(2));
/// assert_eq!(backoff.delay_for(3), Duration::from_secs(4));
/// assert_eq!(backoff.delay_for(4), Duration::from_secs(7));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    strategy: BackoffStrategy,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    jitter: bool,
}

impl BackoffPolicy {
    /// Retry immediately
    pub fn none() -> Self {
        Self {
            strategy: BackoffStrategy::None,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Wait the same delay before every retry
    pub fn fixed(delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Fixed,
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            jitter: false,
        }
    }

    /// `initial_delay * multiplier^(failures - 1)`, capped at `max_delay`
    pub fn exponential(
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Result<Self, ConfigurationError> {
        validate_multiplier(multiplier)?;
        validate_cap(initial_delay, max_delay)?;

        Ok(Self {
            strategy: BackoffStrategy::Exponential,
            initial_delay,
            multiplier,
            max_delay,
            jitter: false,
        })
    }

    /// `initial_delay * failures`, capped at `max_delay`
    pub fn linear(initial_delay: Duration, max_delay: Duration) -> Result<Self, ConfigurationError> {
        validate_cap(initial_delay, max_delay)?;

        Ok(Self {
            strategy: BackoffStrategy::Linear,
            initial_delay,
            multiplier: 1.0,
            max_delay,
            jitter: false,
        })
    }

    /// Enable or disable jitter
    ///
    /// With jitter each delay is multiplied by a uniform random factor in
    /// `[0.5, 1.0]`, so it stays within the cap.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build and validate a backoff policy from configuration
    pub fn from_config(config: &BackoffConfig) -> Result<Self, ConfigurationError> {
        let initial = Duration::from_millis(config.initial_delay_ms);
        let max = Duration::from_millis(config.max_delay_ms);

        let policy = match config.strategy {
            BackoffStrategy::None => Self::none(),
            BackoffStrategy::Fixed => {
                validate_cap(initial, max)?;
                Self::fixed(initial)
            }
            BackoffStrategy::Exponential => Self::exponential(initial, config.multiplier, max)?,
            BackoffStrategy::Linear => Self::linear(initial, max)?,
        };

        Ok(policy.with_jitter(config.jitter))
    }

    /// The configured strategy
    pub fn strategy(&self) -> BackoffStrategy {
        self.strategy
    }

    /// Delay before the first retry
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Growth factor for exponential backoff
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Upper bound on any single delay
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Whether jitter is applied
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Delay to wait after the failure recorded in `context`
    pub fn next_delay(&self, context: &RetrySnapshot) -> Duration {
        calculate_delay(self, context.retry_count())
    }

    /// Delay after `failures` failed attempts, ignoring jitter
    ///
    /// `failures` is 1 after the first failed attempt.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let index = failures.saturating_sub(1);

        let base = match self.strategy {
            BackoffStrategy::None => Duration::ZERO,

            BackoffStrategy::Fixed => self.initial_delay,

            BackoffStrategy::Exponential => {
                if self.initial_delay.is_zero() {
                    Duration::ZERO
                } else {
                    let factor = self.multiplier.powf(index as f64);
                    let secs = (self.initial_delay.as_secs_f64() * factor)
                        .min(self.max_delay.as_secs_f64());
                    Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
                }
            }

            BackoffStrategy::Linear => self.initial_delay.saturating_mul(index.saturating_add(1)),
        };

        base.min(self.max_delay)
    }
}

/// Calculate the delay before the next retry attempt
///
/// Applies jitter when the policy enables it. `failures` is the number of
/// failed attempts so far (1-indexed).
pub fn calculate_delay(policy: &BackoffPolicy, failures: u32) -> Duration {
    let base = policy.delay_for(failures);

    if policy.jitter && !base.is_zero() {
        let factor = rand::rng().random_range(JITTER_FLOOR..=1.0);
        base.mul_f64(factor)
    } else {
        base
    }
}

fn validate_multiplier(multiplier: f64) -> Result<(), ConfigurationError> {
    if !multiplier.is_finite() || multiplier < 1.0 {
        return Err(ConfigurationError::InvalidMultiplier(multiplier));
    }
    Ok(())
}

fn validate_cap(initial_delay: Duration, max_delay: Duration) -> Result<(), ConfigurationError> {
    if max_delay < initial_delay {
        return Err(ConfigurationError::MaxDelayBelowInitial {
            initial_delay_ms: initial_delay.as_millis(),
            max_delay_ms: max_delay.as_millis(),
        });
    }
    Ok(())
}
