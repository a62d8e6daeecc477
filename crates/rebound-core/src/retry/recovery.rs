//! Recovery dispatch
//!
//! A `RecoveryTable` maps error kinds to fallback handlers for one call site.
//! When the retry policy refuses another attempt, the executor hands the last
//! error and the original call arguments to the table, which picks the single
//! handler registered for that kind.

use std::collections::HashMap;
use std::fmt;

use super::classify::{Classify, ErrorInfo};
use super::error::ConfigurationError;

type Handler<E, A, T> = Box<dyn Fn(ErrorInfo<E>, &A) -> Result<T, E> + Send + Sync>;

struct RecoveryEntry<E: Classify, A: ?Sized, T> {
    name: String,
    handler: Handler<E, A, T>,
}

/// Result of dispatching an error to a `RecoveryTable`
#[derive(Debug)]
pub enum RecoveryOutcome<T, E: Classify> {
    /// A handler produced a fallback value
    Recovered(T),
    /// A handler was selected but returned an error
    HandlerFailed(E),
    /// No handler matched; the error is handed back untouched
    Unhandled(ErrorInfo<E>),
}

/// Fallback handlers keyed by error kind
///
/// Every handler receives the classified error and a reference to the
/// original call arguments, and must produce the same result type as the
/// operation. At most one handler may be registered per kind; a duplicate is
/// rejected when the table is built, before any operation runs.
///
/// # Example
///
/// ```rust
/// use rebound_core::retry::{RecoveryOutcome, RecoveryTable};
/// use rebound_core::retry::ErrorInfo;
/// use std::io;
///
/// let table: RecoveryTable<io::Error, (u32, String), String> = RecoveryTable::new()
///     .on(io::ErrorKind::TimedOut, |_err, (id, arg): &(u32, String)| {
///         Ok(format!("fallback for {} / {}", id, arg))
///     })
///     .unwrap();
///
/// let err = ErrorInfo::new(io::Error::new(io::ErrorKind::TimedOut, "slow"));
/// match table.dispatch(err, &(7, "x".to_string())) {
///     RecoveryOutcome::Recovered(value) => assert_eq!(value, "fallback for 7 / x"),
///     _ => unreachable!(),
/// }
///
/// // Registering the same kind twice fails at construction time
/// let duplicate = RecoveryTable::<io::Error, (), ()>::new()
///     .on(io::ErrorKind::TimedOut, |_, _| Ok(()))
///     .and_then(|t| t.on(io::ErrorKind::TimedOut, |_, _| Ok(())));
/// assert!(duplicate.is_err());
/// ```
pub struct RecoveryTable<E: Classify, A: ?Sized, T> {
    entries: HashMap<E::Kind, RecoveryEntry<E, A, T>>,
    fallback: Option<RecoveryEntry<E, A, T>>,
}

impl<E: Classify, A: ?Sized, T> RecoveryTable<E, A, T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: None,
        }
    }

    /// Register a handler for one error kind
    pub fn on<H>(self, kind: E::Kind, handler: H) -> Result<Self, ConfigurationError>
    where
        H: Fn(ErrorInfo<E>, &A) -> Result<T, E> + Send + Sync + 'static,
    {
        let name = format!("{:?}", kind);
        self.on_named(kind, name, handler)
    }

    /// Register a handler for one error kind under an explicit name
    ///
    /// The name only appears in logs.
    pub fn on_named<H>(
        mut self,
        kind: E::Kind,
        name: impl Into<String>,
        handler: H,
    ) -> Result<Self, ConfigurationError>
    where
        H: Fn(ErrorInfo<E>, &A) -> Result<T, E> + Send + Sync + 'static,
    {
        if self.entries.contains_key(&kind) {
            return Err(ConfigurationError::duplicate_recovery(&kind));
        }

        self.entries.insert(
            kind,
            RecoveryEntry {
                name: name.into(),
                handler: Box::new(handler),
            },
        );
        Ok(self)
    }

    /// Register a catch-all handler used when no kind-specific entry matches
    pub fn fallback<H>(mut self, handler: H) -> Result<Self, ConfigurationError>
    where
        H: Fn(ErrorInfo<E>, &A) -> Result<T, E> + Send + Sync + 'static,
    {
        if self.fallback.is_some() {
            return Err(ConfigurationError::DuplicateFallback);
        }

        self.fallback = Some(RecoveryEntry {
            name: "fallback".to_string(),
            handler: Box::new(handler),
        });
        Ok(self)
    }

    /// Whether an error of this kind would be recovered
    pub fn handles(&self, kind: &E::Kind) -> bool {
        self.entries.contains_key(kind) || self.fallback.is_some()
    }

    /// Number of kind-specific entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has neither entries nor a fallback
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.fallback.is_none()
    }

    /// Route an error to its handler
    ///
    /// The kind-specific entry wins over the fallback. The handler's result
    /// is final; it is never retried.
    pub fn dispatch(&self, error: ErrorInfo<E>, args: &A) -> RecoveryOutcome<T, E> {
        let entry = match self.entries.get(error.kind()).or(self.fallback.as_ref()) {
            Some(entry) => entry,
            None => {
                tracing::debug!(kind = ?error.kind(), "no recovery handler registered");
                return RecoveryOutcome::Unhandled(error);
            }
        };

        tracing::debug!(
            kind = ?error.kind(),
            handler = %entry.name,
            "dispatching to recovery handler"
        );

        match (entry.handler)(error, args) {
            Ok(value) => RecoveryOutcome::Recovered(value),
            Err(err) => RecoveryOutcome::HandlerFailed(err),
        }
    }
}

impl<E: Classify, A: ?Sized, T> Default for RecoveryTable<E, A, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Classify, A: ?Sized, T> fmt::Debug for RecoveryTable<E, A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: Vec<&str> = self.entries.values().map(|e| e.name.as_str()).collect();
        f.debug_struct("RecoveryTable")
            .field("handlers", &handlers)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    type Args = (u32, String);

    fn timeout() -> ErrorInfo<io::Error> {
        ErrorInfo::new(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
    }

    #[test]
    fn test_dispatch_passes_error_and_args() {
        let table: RecoveryTable<io::Error, Args, String> = RecoveryTable::new()
            .on(io::ErrorKind::TimedOut, |err, (id, arg)| {
                Ok(format!("{}:{}:{}", err.message(), id, arg))
            })
            .unwrap();

        let outcome = table.dispatch(timeout(), &(42, "payload".to_string()));
        assert!(matches!(
            outcome,
            RecoveryOutcome::Recovered(ref v) if v == "timed out:42:payload"
        ));
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let result: Result<RecoveryTable<io::Error, Args, String>, _> = RecoveryTable::new()
            .on(io::ErrorKind::TimedOut, |_, _| Ok("a".to_string()))
            .and_then(|t| t.on(io::ErrorKind::TimedOut, |_, _| Ok("b".to_string())));

        assert_eq!(
            result.unwrap_err(),
            ConfigurationError::DuplicateRecovery {
                kind: "TimedOut".to_string()
            }
        );
    }

    #[test]
    fn test_duplicate_fallback_rejected() {
        let result: Result<RecoveryTable<io::Error, (), ()>, _> = RecoveryTable::new()
            .fallback(|_, _| Ok(()))
            .and_then(|t| t.fallback(|_, _| Ok(())));

        assert_eq!(result.unwrap_err(), ConfigurationError::DuplicateFallback);
    }

    #[test]
    fn test_unhandled_returns_original_error() {
        let table: RecoveryTable<io::Error, (), u8> = RecoveryTable::new()
            .on(io::ErrorKind::NotFound, |_, _| Ok(1))
            .unwrap();

        match table.dispatch(timeout(), &()) {
            RecoveryOutcome::Unhandled(info) => {
                let err = info.into_error();
                assert_eq!(err.kind(), io::ErrorKind::TimedOut);
                assert_eq!(err.to_string(), "timed out");
            }
            other => panic!("expected Unhandled, got {:?}", other),
        }
    }

    #[test]
    fn test_specific_entry_beats_fallback() {
        let table: RecoveryTable<io::Error, (), &'static str> = RecoveryTable::new()
            .fallback(|_, _| Ok("fallback"))
            .and_then(|t| t.on(io::ErrorKind::TimedOut, |_, _| Ok("specific")))
            .unwrap();

        assert!(matches!(
            table.dispatch(timeout(), &()),
            RecoveryOutcome::Recovered("specific")
        ));

        let other = ErrorInfo::new(io::Error::other("boom"));
        assert!(matches!(
            table.dispatch(other, &()),
            RecoveryOutcome::Recovered("fallback")
        ));
    }

    #[test]
    fn test_handler_error_surfaces() {
        let table: RecoveryTable<io::Error, (), ()> = RecoveryTable::new()
            .on(io::ErrorKind::TimedOut, |_, _| {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "fallback broke"))
            })
            .unwrap();

        match table.dispatch(timeout(), &()) {
            RecoveryOutcome::HandlerFailed(err) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("expected HandlerFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_only_matching_handler_runs() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let table: RecoveryTable<io::Error, (), ()> = RecoveryTable::new()
            .on(io::ErrorKind::TimedOut, move |_, _| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .and_then(|t| t.on(io::ErrorKind::NotFound, |_, _| panic!("wrong handler")))
            .unwrap();

        let _ = table.dispatch(timeout(), &());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(table.handles(&io::ErrorKind::TimedOut));
        assert!(!table.handles(&io::ErrorKind::Other));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_unsized_args() {
        let table: RecoveryTable<io::Error, str, usize> = RecoveryTable::new()
            .on(io::ErrorKind::TimedOut, |_, arg: &str| Ok(arg.len()))
            .unwrap();

        assert!(matches!(
            table.dispatch(timeout(), "four"),
            RecoveryOutcome::Recovered(4)
        ));
    }
}
