//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

use crate::commands::scenario::RunOptions;
use crate::scenarios::{CallArgs, Scenario};

/// Rebound - retry, backoff, and recovery scenarios
#[derive(Parser, Debug)]
#[command(name = "rebound")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a retry configuration file (defaults to ./rebound.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Retry profile to use instead of the scenario's own
    #[arg(short, long, global = true, env = "REBOUND_PROFILE")]
    pub profile: Option<String>,

    /// Output the result as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Options shared by every scenario
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            config: self.config.clone(),
            profile: self.profile.clone(),
            json: self.json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Always fails with a runtime error; no recovery
    Basic,

    /// Arithmetic error recovered after retries
    Recover,

    /// Recovery handler receives the original arguments
    RecoverArgs(CallArgsOpts),

    /// Recovery routed to an explicitly registered handler
    Targeted,

    /// Retries until exhausted, then surfaces the original error
    NonRecoverable,

    /// Error kind is never retried; recovers after one attempt
    Immediate,

    /// Fails with an illegal argument when id is 1; catch-all fallback
    Imperative(ImperativeOpts),

    /// Always fails with a runtime error; catch-all fallback after 3 attempts
    RestTemplate,

    /// Fails twice, then succeeds
    Flaky,
}

impl Commands {
    /// Map the subcommand to a scenario and its call arguments
    pub fn scenario(&self) -> (Scenario, CallArgs) {
        match self {
            Commands::Basic => (Scenario::Basic, CallArgs::default()),
            Commands::Recover => (Scenario::Recover, CallArgs::default()),
            Commands::RecoverArgs(opts) => (Scenario::RecoverArgs, opts.into()),
            Commands::Targeted => (Scenario::Targeted, CallArgs::default()),
            Commands::NonRecoverable => (Scenario::NonRecoverable, CallArgs::default()),
            Commands::Immediate => (Scenario::Immediate, CallArgs::default()),
            Commands::Imperative(opts) => (
                Scenario::Imperative,
                CallArgs::new(opts.id, opts.argument.clone()),
            ),
            Commands::RestTemplate => (Scenario::RestTemplate, CallArgs::default()),
            Commands::Flaky => (Scenario::Flaky, CallArgs::default()),
        }
    }
}

#[derive(Args, Debug)]
pub struct CallArgsOpts {
    /// Transaction id passed to the operation
    #[arg(long, default_value_t = 123)]
    pub id: u32,

    /// Business argument passed to the operation
    #[arg(long, default_value = "ABC")]
    pub argument: String,
}

impl From<&CallArgsOpts> for CallArgs {
    fn from(opts: &CallArgsOpts) -> Self {
        CallArgs::new(opts.id, opts.argument.clone())
    }
}

#[derive(Args, Debug)]
pub struct ImperativeOpts {
    /// Transaction id; 1 triggers the failure
    #[arg(long, default_value_t = 1)]
    pub id: u32,

    /// Business argument passed to the operation
    #[arg(long, default_value = "ABC")]
    pub argument: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recover_args() {
        let cli = Cli::try_parse_from([
            "rebound",
            "recover-args",
            "--id",
            "7",
            "--argument",
            "xyz",
        ])
        .unwrap();

        let (scenario, args) = cli.command.scenario();
        assert_eq!(scenario, Scenario::RecoverArgs);
        assert_eq!(args, CallArgs::new(7, "xyz".to_string()));
    }

    #[test]
    fn test_imperative_defaults_to_failing_id() {
        let cli = Cli::try_parse_from(["rebound", "imperative"]).unwrap();
        let (scenario, args) = cli.command.scenario();
        assert_eq!(scenario, Scenario::Imperative);
        assert_eq!(args.id, 1);
        assert_eq!(args.argument, "ABC");
    }

    #[test]
    fn test_parse_rest_template() {
        let cli = Cli::try_parse_from(["rebound", "rest-template"]).unwrap();
        let (scenario, args) = cli.command.scenario();
        assert_eq!(scenario, Scenario::RestTemplate);
        assert_eq!(args, CallArgs::default());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "rebound",
            "flaky",
            "-vv",
            "--json",
            "--profile",
            "fast",
            "--config",
            "retry.yaml",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let opts = cli.run_options();
        assert!(opts.json);
        assert_eq!(opts.profile.as_deref(), Some("fast"));
        assert_eq!(opts.config, Some(Utf8PathBuf::from("retry.yaml")));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["rebound", "explode"]).is_err());
    }
}
