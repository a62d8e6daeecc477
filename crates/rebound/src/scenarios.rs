//! Simulated services exercised by the CLI scenarios
//!
//! Each scenario pairs a failing operation with the recovery handlers that
//! apply to it. Retry limits and delays are not defined here; they come from
//! the retry profile of the same name.

use std::fmt;
use std::str::FromStr;

use rebound_core::retry::{Classify, ConfigurationError, RecoveryTable, RetrySnapshot};
use serde::Serialize;

/// Error kinds raised by the simulated services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemoErrorKind {
    Runtime,
    Arithmetic,
    IllegalArgument,
}

impl DemoErrorKind {
    /// Name used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoErrorKind::Runtime => "runtime",
            DemoErrorKind::Arithmetic => "arithmetic",
            DemoErrorKind::IllegalArgument => "illegal-argument",
        }
    }
}

impl fmt::Display for DemoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DemoErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "runtime" => Ok(DemoErrorKind::Runtime),
            "arithmetic" => Ok(DemoErrorKind::Arithmetic),
            "illegal-argument" | "illegal_argument" => Ok(DemoErrorKind::IllegalArgument),
            _ => Err(format!("Unknown error kind: {}", s)),
        }
    }
}

/// Failure raised by a simulated service
#[derive(Debug, Clone, PartialEq)]
pub struct DemoError {
    kind: DemoErrorKind,
    message: String,
}

impl DemoError {
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(DemoErrorKind::Runtime, message)
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::new(DemoErrorKind::Arithmetic, message)
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new(DemoErrorKind::IllegalArgument, message)
    }

    fn new(kind: DemoErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DemoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DemoError {}

impl Classify for DemoError {
    type Kind = DemoErrorKind;

    fn kind(&self) -> DemoErrorKind {
        self.kind
    }
}

/// Original call arguments, shared by every attempt and the recovery handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallArgs {
    pub id: u32,
    pub argument: String,
}

impl CallArgs {
    pub fn new(id: u32, argument: String) -> Self {
        Self { id, argument }
    }
}

impl Default for CallArgs {
    fn default() -> Self {
        Self::new(123, "ABC".to_string())
    }
}

/// Value produced by a scenario
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The operation itself succeeded
    Completed(String),
    /// A recovery handler supplied the value
    Recovered(String),
}

impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Completed(text) | Reply::Recovered(text) => text,
        }
    }
}

pub type ScenarioTable = RecoveryTable<DemoError, CallArgs, Reply>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Basic,
    Recover,
    RecoverArgs,
    Targeted,
    NonRecoverable,
    Immediate,
    Imperative,
    RestTemplate,
    Flaky,
}

impl Scenario {
    /// Scenario name, also the name of its retry profile
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Basic => "basic",
            Scenario::Recover => "recover",
            Scenario::RecoverArgs => "recover-args",
            Scenario::Targeted => "targeted",
            Scenario::NonRecoverable => "non-recoverable",
            Scenario::Immediate => "immediate",
            Scenario::Imperative => "imperative",
            Scenario::RestTemplate => "rest-template",
            Scenario::Flaky => "flaky",
        }
    }

    /// Run one attempt of the simulated service
    pub fn attempt(&self, ctx: &RetrySnapshot, args: &CallArgs) -> Result<Reply, DemoError> {
        tracing::info!("[{}] Attempt {}", self.name(), ctx.attempt());

        match self {
            Scenario::Basic | Scenario::RestTemplate => {
                Err(DemoError::runtime("API call failed!"))
            }
            Scenario::Recover => Err(DemoError::arithmetic("Divide by zero!")),
            Scenario::RecoverArgs => Err(DemoError::arithmetic("Parametrized failure!")),
            Scenario::Targeted => Err(DemoError::arithmetic("Directed failure!")),
            Scenario::NonRecoverable => Err(DemoError::arithmetic("Unrecoverable error!")),
            Scenario::Immediate => Err(DemoError::arithmetic("Immediate recovery trigger!")),
            Scenario::Imperative => {
                if args.id == 1 {
                    Err(DemoError::illegal_argument("Invalid ID!"))
                } else {
                    Ok(Reply::Completed(format!(
                        "Processed id={} argument={}",
                        args.id, args.argument
                    )))
                }
            }
            Scenario::Flaky => {
                if ctx.retry_count() < 2 {
                    Err(DemoError::runtime("Failing"))
                } else {
                    Ok(Reply::Completed("Success".to_string()))
                }
            }
        }
    }

    /// Recovery handlers registered for this scenario
    pub fn recovery_table(&self) -> Result<ScenarioTable, ConfigurationError> {
        let table = ScenarioTable::new();

        match self {
            Scenario::Basic | Scenario::NonRecoverable | Scenario::Flaky => Ok(table),

            Scenario::Recover => table.on(DemoErrorKind::Arithmetic, |err, _| {
                tracing::warn!("Recovering from: {}", err.error().message());
                Ok(Reply::Recovered(format!(
                    "Recovered from: {}",
                    err.error().message()
                )))
            }),

            Scenario::RecoverArgs => table.on(DemoErrorKind::Arithmetic, |err, args| {
                Ok(Reply::Recovered(format!(
                    "Recovered for id={} argument={} after: {}",
                    args.id,
                    args.argument,
                    err.error().message()
                )))
            }),

            Scenario::Targeted => table
                .on_named(DemoErrorKind::Runtime, "runtime-recover", |err, _| {
                    Ok(Reply::Recovered(format!(
                        "Runtime recovery: {}",
                        err.error().message()
                    )))
                })?
                .on_named(DemoErrorKind::Arithmetic, "directed-recover", |err, args| {
                    Ok(Reply::Recovered(format!(
                        "Directed recovery for id={}: {}",
                        args.id,
                        err.error().message()
                    )))
                }),

            Scenario::Immediate => table.on(DemoErrorKind::Arithmetic, |err, args| {
                Ok(Reply::Recovered(format!(
                    "Immediate recovery for id={} argument={}: {}",
                    args.id,
                    args.argument,
                    err.error().message()
                )))
            }),

            Scenario::Imperative => table.fallback(|err, args| {
                Ok(Reply::Recovered(format!(
                    "Fallback response for id={} after: {}",
                    args.id,
                    err.error().message()
                )))
            }),

            Scenario::RestTemplate => table.fallback(|_, _| {
                tracing::warn!("All retries failed, using fallback response");
                Ok(Reply::Recovered("Imperative Fallback response".to_string()))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebound_core::retry::{
        BackoffPolicy, ErrorInfo, RecoveryOutcome, RetryContext, RetryExecutorBuilder,
        SimpleRetryPolicy,
    };
    use rebound_core::RetryConfigLoader;
    use std::time::Duration;

    fn first_attempt() -> RetrySnapshot {
        RetryContext::<DemoError>::new().snapshot()
    }

    #[test]
    fn test_kind_names_round_trip() {
        for kind in [
            DemoErrorKind::Runtime,
            DemoErrorKind::Arithmetic,
            DemoErrorKind::IllegalArgument,
        ] {
            assert_eq!(kind.as_str().parse::<DemoErrorKind>(), Ok(kind));
        }
        assert!("overflow".parse::<DemoErrorKind>().is_err());
    }

    #[test]
    fn test_classify_uses_kind() {
        let err = DemoError::illegal_argument("Invalid ID!");
        assert_eq!(Classify::kind(&err), DemoErrorKind::IllegalArgument);
        assert_eq!(err.to_string(), "illegal-argument: Invalid ID!");
    }

    #[test]
    fn test_imperative_fails_only_for_id_one() {
        let ctx = first_attempt();
        assert!(Scenario::Imperative
            .attempt(&ctx, &CallArgs::new(1, "ABC".to_string()))
            .is_err());
        assert_eq!(
            Scenario::Imperative
                .attempt(&ctx, &CallArgs::new(2, "ABC".to_string()))
                .unwrap(),
            Reply::Completed("Processed id=2 argument=ABC".to_string())
        );
    }

    #[test]
    fn test_recovery_tables_build() {
        for scenario in [
            Scenario::Basic,
            Scenario::Recover,
            Scenario::RecoverArgs,
            Scenario::Targeted,
            Scenario::NonRecoverable,
            Scenario::Immediate,
            Scenario::Imperative,
            Scenario::RestTemplate,
            Scenario::Flaky,
        ] {
            let table = scenario.recovery_table().unwrap();
            let recoverable = !matches!(
                scenario,
                Scenario::Basic | Scenario::NonRecoverable | Scenario::Flaky
            );
            assert_eq!(!table.is_empty(), recoverable, "{}", scenario.name());
        }
    }

    #[test]
    fn test_every_scenario_has_an_embedded_profile() {
        let settings = RetryConfigLoader::load_embedded().unwrap();
        for scenario in [
            Scenario::Basic,
            Scenario::Recover,
            Scenario::RecoverArgs,
            Scenario::Targeted,
            Scenario::NonRecoverable,
            Scenario::Immediate,
            Scenario::Imperative,
            Scenario::RestTemplate,
            Scenario::Flaky,
        ] {
            let profile = settings
                .profiles
                .get(scenario.name())
                .unwrap_or_else(|| panic!("missing profile {}", scenario.name()));
            assert!(SimpleRetryPolicy::<DemoErrorKind>::from_profile(profile).is_ok());
            assert!(BackoffPolicy::from_config(&profile.backoff).is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_args_passes_original_arguments() {
        let table = Scenario::RecoverArgs.recovery_table().unwrap();
        let executor = RetryExecutorBuilder::new(
            SimpleRetryPolicy::new(4).unwrap(),
            BackoffPolicy::fixed(Duration::from_secs(1)),
        )
        .build();

        let args = CallArgs::new(42, "payload".to_string());
        let reply = executor
            .execute(&args, &table, |ctx, args| {
                let outcome = Scenario::RecoverArgs.attempt(&ctx, args);
                async move { outcome }
            })
            .await
            .unwrap();

        assert_eq!(
            reply,
            Reply::Recovered(
                "Recovered for id=42 argument=payload after: Parametrized failure!".to_string()
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_flaky_succeeds_on_third_attempt() {
        let table = Scenario::Flaky.recovery_table().unwrap();
        let executor = RetryExecutorBuilder::new(
            SimpleRetryPolicy::new(3).unwrap(),
            BackoffPolicy::exponential(Duration::from_secs(5), 3.0, Duration::from_secs(45))
                .unwrap()
                .with_jitter(true),
        )
        .build();

        let reply = executor
            .execute(&CallArgs::default(), &table, |ctx, args| {
                let outcome = Scenario::Flaky.attempt(&ctx, args);
                async move { outcome }
            })
            .await
            .unwrap();

        assert_eq!(reply, Reply::Completed("Success".to_string()));
    }

    #[tokio::test]
    async fn test_targeted_picks_arithmetic_handler() {
        let table = Scenario::Targeted.recovery_table().unwrap();
        let executor = RetryExecutorBuilder::new(
            SimpleRetryPolicy::new(2).unwrap(),
            BackoffPolicy::none(),
        )
        .build();

        let reply = executor
            .execute(&CallArgs::default(), &table, |ctx, args| {
                let outcome = Scenario::Targeted.attempt(&ctx, args);
                async move { outcome }
            })
            .await
            .unwrap();

        assert_eq!(
            reply.text(),
            "Directed recovery for id=123: Directed failure!"
        );
    }

    #[test]
    fn test_imperative_fallback_names_original_message() {
        let table = Scenario::Imperative.recovery_table().unwrap();
        let args = CallArgs::new(1, "ABC".to_string());
        let err = Scenario::Imperative
            .attempt(&first_attempt(), &args)
            .unwrap_err();

        match table.dispatch(ErrorInfo::new(err), &args) {
            RecoveryOutcome::Recovered(reply) => assert_eq!(
                reply.text(),
                "Fallback response for id=1 after: Invalid ID!"
            ),
            other => panic!("expected recovery, got {:?}", other),
        }
    }

    #[test]
    fn test_rest_template_uses_catch_all_fallback() {
        let table = Scenario::RestTemplate.recovery_table().unwrap();
        let args = CallArgs::default();
        let err = Scenario::RestTemplate
            .attempt(&first_attempt(), &args)
            .unwrap_err();
        assert_eq!(err.message(), "API call failed!");
        assert_eq!(Classify::kind(&err), DemoErrorKind::Runtime);

        match table.dispatch(ErrorInfo::new(err), &args) {
            RecoveryOutcome::Recovered(reply) => assert_eq!(
                reply,
                Reply::Recovered("Imperative Fallback response".to_string())
            ),
            other => panic!("expected recovery, got {:?}", other),
        }
    }
}
