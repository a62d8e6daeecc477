//! Scenario command: run one simulated service through the retry executor

use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{bail, Result};
use camino::{Utf8Path, Utf8PathBuf};
use rebound_core::retry::{
    CancellationToken, Classify, RetryError, RetryExecutorBuilder, SimpleRetryPolicy,
    TracingObserver,
};
use rebound_core::types::{RetryProfile, RetrySettings};
use rebound_core::{Error, RetryConfigLoader};
use serde::Serialize;

use crate::output;
use crate::scenarios::{CallArgs, DemoError, DemoErrorKind, Reply, Scenario};

/// Options shared by every scenario subcommand
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config: Option<Utf8PathBuf>,
    pub profile: Option<String>,
    pub json: bool,
}

/// How an invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    Completed,
    Recovered,
    Exhausted,
    NonRetryable,
    RecoveryFailed,
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed | Outcome::Recovered)
    }
}

/// Result of one scenario run, printed as text or JSON
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ScenarioReport {
    pub scenario: String,
    pub profile: String,
    pub outcome: Outcome,
    pub attempts: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<DemoErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl ScenarioReport {
    fn new(
        scenario: Scenario,
        profile: &str,
        attempts_seen: u32,
        result: std::result::Result<Reply, RetryError<DemoError>>,
    ) -> Self {
        let (outcome, attempts, message, error_kind, cancel_reason) = match result {
            Ok(reply) => {
                let outcome = match reply {
                    Reply::Completed(_) => Outcome::Completed,
                    Reply::Recovered(_) => Outcome::Recovered,
                };
                (outcome, attempts_seen, reply.text().to_string(), None, None)
            }
            Err(err) => {
                let outcome = match &err {
                    RetryError::Exhausted { .. } => Outcome::Exhausted,
                    RetryError::NonRetryable { .. } => Outcome::NonRetryable,
                    RetryError::RecoveryFailed { .. } => Outcome::RecoveryFailed,
                    RetryError::Cancelled { .. } => Outcome::Cancelled,
                };
                let cancel_reason = err.cancel_reason().map(|r| r.to_string());
                let error_kind = err.source_ref().map(Classify::kind);
                (outcome, err.attempts(), err.to_string(), error_kind, cancel_reason)
            }
        };

        Self {
            scenario: scenario.name().to_string(),
            profile: profile.to_string(),
            outcome,
            attempts,
            message,
            error_kind,
            cancel_reason,
        }
    }

    fn print(&self) {
        output::header(&format!("Scenario: {}", self.scenario));
        output::kv("Profile", &self.profile);
        output::kv("Attempts", &self.attempts.to_string());
        if let Some(kind) = self.error_kind {
            output::kv("Error kind", kind.as_str());
        }

        match self.outcome {
            Outcome::Completed => output::success(&self.message),
            Outcome::Recovered => output::info(&self.message),
            Outcome::Cancelled => output::warning(&self.message),
            Outcome::Exhausted | Outcome::NonRetryable | Outcome::RecoveryFailed => {
                output::error(&self.message)
            }
        }
    }
}

pub async fn run(scenario: Scenario, args: CallArgs, opts: &RunOptions) -> Result<()> {
    let settings = load_settings(opts.config.as_deref())?;
    let (profile_name, profile) = select_profile(&settings, opts.profile.as_deref(), scenario)?;

    tracing::debug!(
        "Running {} with profile {} (max attempts {})",
        scenario.name(),
        profile_name,
        profile.max_attempts
    );

    // Ctrl-C interrupts a pending backoff
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, cancelling retries");
                cancel.cancel();
            }
        })
    };

    let outcome = execute(scenario, &args, profile, &cancel).await;
    interrupt.abort();
    let (attempts, result) = outcome?;

    let report = ScenarioReport::new(scenario, &profile_name, attempts, result);

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }

    if !report.outcome.is_success() {
        if cancel.is_cancelled() {
            bail!("Scenario {} interrupted", scenario.name());
        }
        bail!("Scenario {} failed", scenario.name());
    }

    Ok(())
}

/// Run the scenario through an executor built from `profile`
///
/// Returns the number of the last attempt that started along with the result.
async fn execute(
    scenario: Scenario,
    args: &CallArgs,
    profile: &RetryProfile,
    cancel: &CancellationToken,
) -> Result<(u32, std::result::Result<Reply, RetryError<DemoError>>)> {
    let executor =
        RetryExecutorBuilder::<SimpleRetryPolicy<DemoErrorKind>, _>::from_profile(profile)?
            .with_observer(TracingObserver::new(scenario.name()))
            .build();
    let recovery = scenario.recovery_table()?;

    let attempts = AtomicU32::new(0);
    let result = executor
        .execute_cancellable(args, &recovery, cancel, |ctx, args| {
            attempts.store(ctx.attempt(), Ordering::Relaxed);
            let outcome = scenario.attempt(&ctx, args);
            async move { outcome }
        })
        .await;

    Ok((attempts.load(Ordering::Relaxed), result))
}

fn load_settings(config: Option<&Utf8Path>) -> Result<RetrySettings> {
    let loader = RetryConfigLoader::new()?;
    let settings = match config {
        Some(path) => loader.load_file(path)?,
        None => loader.load()?,
    };
    Ok(settings)
}

/// Pick the requested profile, or the scenario's own
///
/// `default` names the default profile. An unknown explicit name is an error.
fn select_profile<'a>(
    settings: &'a RetrySettings,
    requested: Option<&str>,
    scenario: Scenario,
) -> Result<(String, &'a RetryProfile)> {
    match requested {
        Some("default") => Ok(("default".to_string(), &settings.default)),
        Some(name) => settings
            .profiles
            .get(name)
            .map(|profile| (name.to_string(), profile))
            .ok_or_else(|| Error::invalid_profile(name).into()),
        None => {
            let name = scenario.name();
            if settings.profiles.contains_key(name) {
                Ok((name.to_string(), settings.profile(name)))
            } else {
                Ok(("default".to_string(), &settings.default))
            }
        }
    }
}
