//! CloudFormation provisioning step for CI pipelines.
//!
//! Reads the target stack and credentials from the environment, validates the template,
//! then creates or updates the stack and re-applies its organizational tags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use cfn_provision::core::types::Settlement;
use cfn_provision::exit_codes;
use cfn_provision::io::aws::AwsCloudFormation;
use cfn_provision::io::clock::SystemClock;
use cfn_provision::io::config::{DEFAULT_SETTINGS_PATH, ProvisionConfig, StackEnv, load_settings};
use cfn_provision::io::template::{Template, load_template};
use cfn_provision::logging;
use cfn_provision::probe::{StackPresence, probe_stack};
use cfn_provision::progress::{ProvisionEvent, render};
use cfn_provision::provision::provision;
use cfn_provision::session::Session;
use cfn_provision::tags::TagOutcome;
use cfn_provision::validate::validate_template;
use cfn_provision::wait::WaitTimeout;
use clap::{Parser, Subcommand};

const BANNER: &str = "[ CloudFormation Provisioning ]";

#[derive(Parser)]
#[command(
    name = "cfn-provision",
    version,
    about = "Create or update a CloudFormation stack and tag it"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Settings file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Template path, overriding `template_path` from the settings file.
    #[arg(long, global = true)]
    template: Option<PathBuf>,

    /// Show polling diagnostics and debug logs.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Validate the template, then create or update the stack and set its tags (default).
    Provision,
    /// Validate the template remotely without touching the stack.
    Validate,
    /// Print the current stack status.
    Status {
        /// Print the stack description as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    // Environment first: a misconfigured job must fail before any network call.
    let env = StackEnv::from_env()?;
    let settings = load_settings(&cli.config)?;
    let config = ProvisionConfig::new(env, settings);
    let print = |event: &ProvisionEvent| {
        if cli.verbose || !event.is_diagnostic() {
            println!("{}", render(event));
        }
    };

    match cli.command.as_ref().unwrap_or(&Command::Provision) {
        Command::Provision => {
            let template = template_for(cli, &config)?;
            let cfn = connect(&config)?;
            let clock = SystemClock;
            let session = Session::new(&cfn, &clock).with_events(&print);
            println!("{BANNER}");
            let outcome = provision(&session, &config, &template)?;
            if outcome.is_healthy() {
                Ok(exit_codes::OK)
            } else {
                let status = outcome
                    .final_status
                    .as_ref()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string);
                let cause = match (&outcome.settlement, &outcome.tags) {
                    (Some(Settlement::RolledBack), _) => "rollback",
                    (Some(Settlement::Failed), _) => "failure",
                    (_, TagOutcome::NotApplied { .. }) => "tag update",
                    _ => "failure",
                };
                eprintln!(
                    "stack {} is unhealthy after {cause}: {status}",
                    outcome.stack_name
                );
                Ok(exit_codes::UNHEALTHY)
            }
        }
        Command::Validate => {
            let template = template_for(cli, &config)?;
            let cfn = connect(&config)?;
            let clock = SystemClock;
            let session = Session::new(&cfn, &clock).with_events(&print);
            validate_template(&session, &template)?;
            Ok(exit_codes::OK)
        }
        Command::Status { json } => {
            let cfn = connect(&config)?;
            let clock = SystemClock;
            let session = Session::new(&cfn, &clock);
            let stack_name = &config.target.stack_name;
            match probe_stack(&session, stack_name)? {
                StackPresence::Present(stack) if *json => {
                    let payload =
                        serde_json::to_string_pretty(&stack).context("serialize stack")?;
                    println!("{payload}");
                }
                StackPresence::Present(stack) => println!("{stack_name}: {}", stack.status),
                StackPresence::Absent if *json => println!("null"),
                StackPresence::Absent => println!("{stack_name}: does not exist"),
            }
            Ok(exit_codes::OK)
        }
    }
}

fn template_for(cli: &Cli, config: &ProvisionConfig) -> Result<Template> {
    let path = cli
        .template
        .as_deref()
        .unwrap_or(&config.settings.template_path);
    load_template(path)
}

fn connect(config: &ProvisionConfig) -> Result<AwsCloudFormation> {
    AwsCloudFormation::connect(&config.target, &config.credentials)
        .context("connect to CloudFormation")
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<WaitTimeout>().is_some() {
        exit_codes::TIMED_OUT
    } else {
        exit_codes::FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use cfn_provision::core::types::StackStatus;
    use std::time::Duration;

    #[test]
    fn parse_defaults_to_provision() {
        let cli = Cli::parse_from(["cfn-provision"]);
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_SETTINGS_PATH));
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "cfn-provision",
            "validate",
            "--template",
            "stack.yaml",
            "-v",
        ]);
        assert_eq!(cli.command, Some(Command::Validate));
        assert_eq!(cli.template, Some(PathBuf::from("stack.yaml")));
        assert!(cli.verbose);
    }

    #[test]
    fn parse_status_json() {
        let cli = Cli::parse_from(["cfn-provision", "status", "--json"]);
        assert_eq!(cli.command, Some(Command::Status { json: true }));
    }

    #[test]
    fn timeout_maps_to_distinct_exit_code() {
        let timeout = anyhow::Error::from(WaitTimeout {
            stack_name: "demo-app".to_string(),
            last_status: StackStatus::UpdateInProgress,
            waited: Duration::from_secs(3600),
            max_wait: Duration::from_secs(3600),
        })
        .context("update stack demo-app");
        assert_eq!(exit_code_for(&timeout), exit_codes::TIMED_OUT);
        assert_eq!(exit_code_for(&anyhow!("boom")), exit_codes::FAILED);
    }
}
