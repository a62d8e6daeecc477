//! Error types for rebound-core

use thiserror::Error;

use crate::retry::ConfigurationError;

/// Result type alias using rebound-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Rebound
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown retry profile
    #[error("Unknown retry profile: {profile}")]
    InvalidProfile { profile: String },

    /// Retry policy, backoff, or recovery table rejected at construction
    #[error("Invalid retry configuration: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an unknown profile error
    pub fn invalid_profile(profile: impl Into<String>) -> Self {
        Self::InvalidProfile {
            profile: profile.into(),
        }
    }
}
