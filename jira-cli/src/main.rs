// ABOUTME: Main entry point for the Jira CLI application
// ABOUTME: Loads config, expands aliases, parses arguments and dispatches to command handlers

use anyhow::{Context, Result};
use clap::Parser;
use jira_cli::aliases::AliasResolver;
use jira_cli::bulk::CancellationFlag;
use jira_cli::cli::{Cli, builtin_commands};
use jira_cli::cli_output::CliOutput;
use jira_cli::commands::{self, CommandContext, Outcome, Remote};
use jira_cli::config::Config;
use jira_cli::error::{CliError, ConfigurationError};
use jira_cli::output::TableFormatter;
use jira_sdk::{JiraError, RetryConfig};
use std::env;
use std::io::IsTerminal;

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}

fn help_text(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(err) = err.downcast_ref::<CliError>() {
        return err.help_text();
    }
    if let Some(err) = err.downcast_ref::<JiraError>() {
        return err.help_text();
    }
    err.downcast_ref::<ConfigurationError>()
        .and_then(|err| CliError::from(err.clone()).help_text())
}

/// Interrupts stop new batches from starting; a second one exits immediately
fn install_interrupt_handler(cancel: CancellationFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, finishing batches already in flight");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

async fn run(argv: Vec<String>) -> Result<Outcome> {
    let config = Config::load().context("Failed to load configuration")?;

    let builtins = builtin_commands();
    let builtin_names: Vec<&str> = builtins.iter().map(String::as_str).collect();
    let aliases = AliasResolver::new(&config.aliases_with_defaults(), &builtin_names)?;
    let argv = aliases.expand_argv(argv)?;

    let cli = match Cli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };

    // Determine if color should be used
    let use_color = !cli.no_color
        && env::var("NO_COLOR").is_err()
        && env::var("TERM").unwrap_or_default() != "dumb"
        && std::io::stdout().is_terminal();

    let retry = RetryConfig::default();
    let remote = config
        .credentials()
        .map_err(CliError::from)
        .and_then(|credentials| Remote::connect(credentials, retry.clone()));

    let cancel = CancellationFlag::new();
    install_interrupt_handler(cancel.clone());

    let ctx = CommandContext {
        config,
        aliases,
        remote,
        retry,
        output: CliOutput::with_color(use_color && std::io::stderr().is_terminal()),
        formatter: TableFormatter::new(use_color),
        cancel,
    };

    commands::run(&ctx, cli.command).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let argv: Vec<String> = env::args().collect();
    init_logging(argv.iter().any(|arg| arg == "-v" || arg == "--verbose"));

    match run(argv).await {
        Ok(Outcome::Success) => Ok(()),
        Ok(Outcome::PartialFailure) => std::process::exit(2),
        Err(err) => {
            let output = CliOutput::new();
            output.error(&format!("{:#}", err));
            if let Some(help) = help_text(&err) {
                output.hint(help);
            }
            std::process::exit(1);
        }
    }
}
