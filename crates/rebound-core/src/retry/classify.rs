//! Error classification for retry and recovery routing
//!
//! Every error that flows through the executor is reduced to an `ErrorKind`
//! discriminator. Retry policies and recovery tables are keyed by that kind
//! only, never by message text or type inspection.

use std::fmt;
use std::hash::Hash;

/// Maps an operation error to the kind used for retry and recovery decisions
///
/// # Example
///
/// ```rust
/// use rebound_core::retry::Classify;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Kind {
///     Timeout,
///     BadInput,
/// }
///
/// #[derive(Debug)]
/// enum ApiError {
///     Timeout,
///     BadInput(String),
/// }
///
/// impl Classify for ApiError {
///     type Kind = Kind;
///
///     fn kind(&self) -> Kind {
///         match self {
///             ApiError::Timeout => Kind::Timeout,
///             ApiError::BadInput(_) => Kind::BadInput,
///         }
///     }
/// }
/// ```
pub trait Classify {
    /// The discriminator type
    type Kind: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    /// Return the kind of this error
    fn kind(&self) -> Self::Kind;
}

impl Classify for std::io::Error {
    type Kind = std::io::ErrorKind;

    fn kind(&self) -> std::io::ErrorKind {
        std::io::Error::kind(self)
    }
}

/// A classified failure from one attempt
///
/// Captures the kind and rendered message at construction time and keeps the
/// original error alongside them. Immutable once built.
#[derive(Debug)]
pub struct ErrorInfo<E: Classify> {
    kind: E::Kind,
    message: String,
    error: E,
}

impl<E> ErrorInfo<E>
where
    E: Classify + fmt::Display,
{
    /// Classify an error
    pub fn new(error: E) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            error,
        }
    }
}

impl<E: Classify> ErrorInfo<E> {
    /// The error kind
    pub fn kind(&self) -> &E::Kind {
        &self.kind
    }

    /// The rendered error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original error
    pub fn error(&self) -> &E {
        &self.error
    }

    /// Consume the info and return the original error unchanged
    pub fn into_error(self) -> E {
        self.error
    }
}

impl<E: Classify> fmt::Display for ErrorInfo<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_info_captures_kind_and_message() {
        let info = ErrorInfo::new(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));

        assert_eq!(*info.kind(), io::ErrorKind::TimedOut);
        assert_eq!(info.message(), "read timed out");
        assert_eq!(info.error().kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_into_error_returns_original() {
        let info = ErrorInfo::new(io::Error::new(io::ErrorKind::NotFound, "missing"));
        let err = info.into_error();

        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(err.to_string(), "missing");
    }

    #[test]
    fn test_display_includes_kind() {
        let info = ErrorInfo::new(io::Error::new(io::ErrorKind::InvalidInput, "bad id"));
        assert_eq!(info.to_string(), "[InvalidInput] bad id");
    }
}
