//! Retry execution engine with kind-based recovery
//!
//! Wraps a fallible async operation so that it is retried according to a
//! `RetryPolicy`, spaced by a `BackoffPolicy`, and, once retries stop, routed
//! to a recovery handler chosen by error kind.
//!
//! # Features
//!
//! - Kind-based retry decisions via the `Classify` trait
//! - Fixed, exponential, and linear backoff with an optional jitter window
//! - Per-call-site `RecoveryTable` with duplicate detection at build time
//! - Cooperative cancellation and an optional overall deadline
//! - Observable retry attempts via the `RetryObserver` trait
//!
//! # Example
//!
//! ```rust,no_run
//! use rebound_core::retry::{BackoffPolicy, RecoveryTable, RetryError, RetryExecutorBuilder, SimpleRetryPolicy};
//! use std::io;
//! use std::time::Duration;
//!
//! async fn example() -> Result<String, RetryError<io::Error>> {
//!     let executor = RetryExecutorBuilder::new(
//!         SimpleRetryPolicy::new(3).unwrap(),
//!         BackoffPolicy::fixed(Duration::from_secs(1)),
//!     )
//!     .build();
//!
//!     let recovery: RecoveryTable<io::Error, u32, String> = RecoveryTable::new()
//!         .on(io::ErrorKind::TimedOut, |_err, id: &u32| Ok(format!("cached value for {}", id)))
//!         .unwrap();
//!
//!     executor
//!         .execute(&7, &recovery, |_ctx, id| async move {
//!             // Your fallible operation here
//!             Ok(format!("fresh value for {}", id))
//!         })
//!         .await
//! }
//! ```

mod backoff;
mod classify;
mod context;
mod error;
mod executor;
mod observer;
mod policy;
mod recovery;

pub use backoff::{calculate_delay, BackoffPolicy};
pub use classify::{Classify, ErrorInfo};
pub use context::{RetryContext, RetrySnapshot};
pub use error::{CancelReason, ConfigurationError, RetryError};
pub use executor::{retry, RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, StatsObserver, TracingObserver};
pub use policy::{AlwaysRetry, NeverRetry, RetryPolicy, SimpleRetryPolicy};
pub use recovery::{RecoveryOutcome, RecoveryTable};

pub use tokio_util::sync::CancellationToken;
