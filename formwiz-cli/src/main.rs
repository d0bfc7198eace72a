//! # formwiz
//!
//! Fills in multi-step forms from the terminal.
//!
//! The schema is fetched from `dataReqUrl` (an `http(s)` URL or a local
//! file), every step is prompted on stdin and posted to `submitUrlOrigin`.
//! The exit code reports whether every step was submitted.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use formwiz::{Wizard, WizardEvent, WizardOutcome, data::FieldSchema};
use schemars::JsonSchema;

use crate::{
    config::{AppConfig, Overrides},
    http::HttpTransport,
    term::TermRenderer,
};

mod config;
mod http;
mod term;

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

#[derive(Parser)]
#[command(name = "formwiz", version, about = "Fill in multi-step forms from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file, `.formwiz.toml` by default
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Schema source URL or file, overrides `dataReqUrl`
    #[arg(long, global = true)]
    data_url: Option<String>,

    /// Submission endpoint, overrides `submitUrlOrigin`
    #[arg(long, global = true)]
    submit_url: Option<String>,

    /// Request timeout in milliseconds, overrides `timeoutMs`
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run the form wizard (default)
    Run,
    /// Print the JSON Schema of the form schema source
    Schema,
    /// Print the JSON Schema of the configuration file
    ConfigSchema,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(cli).await,
        Command::Schema => print_schema::<Vec<FieldSchema>>(),
        Command::ConfigSchema => print_schema::<AppConfig>(),
    }
}

fn print_schema<T: JsonSchema>() -> Result<()> {
    let schema = schemars::schema_for!(T);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref()).await?;
    config.apply(Overrides {
        data_url: cli.data_url,
        submit_url: cli.submit_url,
        timeout_ms: cli.timeout_ms,
    });
    config.wizard.validate()?;

    let transport = HttpTransport::new(&config.headers)?;
    let mut wizard = Wizard::new(config.wizard, transport, TermRenderer::stdin());
    wizard.context_mut().subscribe(|event| match event {
        WizardEvent::PhaseChanged(phase) => debug!("Phase changed: {phase:?}"),
        WizardEvent::StepSubmitted { step, result } => {
            debug!("Step {step} submission settled: {}", result.message)
        }
    });

    match wizard.run().await {
        WizardOutcome::Finished { reports } => {
            println!();
            println!("{}", "Finished!".green().bold());
            for report in &reports {
                let status = report
                    .result
                    .status
                    .map_or_else(|| "-".to_string(), |s| s.to_string());
                println!(
                    "  step {}: {} field(s), status {status}",
                    report.step,
                    report.record.len()
                );
                if let Some(data) = &report.result.data {
                    println!("    {data}");
                }
            }
            Ok(())
        }
        WizardOutcome::Failed { step, error } => {
            println!();
            println!("{}", "Failed!".red().bold());
            match step {
                Some(step) => bail!("form wizard failed in step {step}: {error}"),
                None => bail!("form wizard failed to start: {error}"),
            }
        }
    }
}
