//! # rebound-core
//!
//! Core library for Rebound providing:
//! - Retry execution engine with kind-based retry policies
//! - Fixed, exponential, and linear backoff with optional jitter
//! - Recovery dispatch keyed by error kind
//! - Layered YAML configuration for retry profiles

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::RetryConfigLoader;
pub use error::{Error, Result};
