//! Configuration loading and management

mod loader;

pub use loader::{RetryConfigLoader, CONFIG_FILE_NAME};
