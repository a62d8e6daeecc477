//! Configuration type definitions

pub mod retry_config;

pub use retry_config::*;
