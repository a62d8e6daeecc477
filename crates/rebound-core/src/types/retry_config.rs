//! Retry configuration types
//!
//! These types describe retry policies and backoff settings as they appear in
//! YAML configuration files. They are plain data; the executor consumes the
//! validated `SimpleRetryPolicy` and `BackoffPolicy` built from them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete retry configuration: a default profile plus named profiles
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RetrySettings {
    /// Profile used when no named profile is requested
    #[serde(default)]
    pub default: RetryProfile,

    /// Named profiles, one per call site
    #[serde(default)]
    pub profiles: HashMap<String, RetryProfile>,
}

impl RetrySettings {
    /// Look up a named profile, falling back to the default profile
    pub fn profile(&self, name: &str) -> &RetryProfile {
        self.profiles.get(name).unwrap_or(&self.default)
    }
}

/// Retry policy for one call site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RetryProfile {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Kinds that may be retried (empty = all)
    #[serde(default)]
    pub retry_on: Vec<String>,

    /// Kinds that are never retried
    #[serde(default)]
    pub no_retry_on: Vec<String>,

    /// Overall deadline for one invocation, in milliseconds
    #[serde(default)]
    pub max_elapsed_ms: Option<u64>,

    /// Delay between attempts
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for RetryProfile {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_on: Vec::new(),
            no_retry_on: Vec::new(),
            max_elapsed_ms: None,
            backoff: BackoffConfig::default(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

/// Backoff settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct BackoffConfig {
    /// Backoff strategy
    #[serde(default)]
    pub strategy: BackoffStrategy,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Growth factor for exponential backoff
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Upper bound on any single delay, in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Scale each delay by a random factor in [0.5, 1.0]
    #[serde(default)]
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            initial_delay_ms: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay(),
            jitter: false,
        }
    }
}

fn default_initial_delay() -> u64 {
    1000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_max_delay() -> u64 {
    30000
}

/// Backoff strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackoffStrategy {
    /// No delay between attempts
    None,

    /// Constant delay between attempts
    Fixed,

    /// Exponential backoff (default)
    #[default]
    Exponential,

    /// Delay grows by `initial_delay` per attempt
    Linear,
}
