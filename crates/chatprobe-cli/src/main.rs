//! # chatprobe
//!
//! Runs scripted conversations against a chat-bot and verifies every reply.
//!
//! ## Usage
//!
//! ```bash
//! # Run the only test case in a file
//! chatprobe run greeting.json
//!
//! # Run one case out of an exported folder, clearing bot context first
//! chatprobe run folder.json "Order pizza" --reset --json report.json
//!
//! # Record a live conversation into a new test case
//! chatprobe record new-test.json --name "Opening hours"
//! ```

mod record;
mod report;
mod run;

use std::io::{IsTerminal, stdout};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chatprobe_core::{ChatprobeConfig, ContextResetClient, load_test_cases, validate, warnings};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::prelude::*;

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ColorMode {
    /// Color when stdout is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn should_use_colors(self) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => stdout().is_terminal(),
        }
    }
}

/// Scripted conversation testing for chat-bot backends
#[derive(Parser, Debug)]
#[command(name = "chatprobe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults to ./chatprobe.yml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Websocket URL of the messaging gateway
    #[arg(long, global = true)]
    url: Option<String>,

    /// Address of the bot conversation under test
    #[arg(long, global = true)]
    identity: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Color output mode (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a test case and verify every bot response
    Run(run::RunArgs),

    /// Check test case files without connecting
    Validate(ValidateArgs),

    /// Record a live conversation into a new test case
    Record(record::RecordArgs),

    /// Clear the bot's server-side context for this conversation
    Reset,
}

/// Arguments for the validate subcommand.
#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Test case file (a single case or an array of cases)
    file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);
    colored::control::set_override(cli.color.should_use_colors());

    match cli.command {
        Commands::Run(ref args) => {
            let config = load_config(&cli)?;
            run::execute(&config, args).await
        }
        Commands::Validate(ref args) => validate_file(args),
        Commands::Record(ref args) => {
            let config = load_config(&cli)?;
            record::execute(&config, args).await
        }
        Commands::Reset => {
            let config = load_config(&cli)?;
            reset_context(&config).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "chatprobe=debug"
    } else {
        "chatprobe=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config file, then environment, then flags.
fn load_config(cli: &Cli) -> Result<ChatprobeConfig> {
    let mut config = ChatprobeConfig::discover(cli.config.as_deref())?;
    config.apply_env()?;
    if let Some(url) = &cli.url {
        config.channel.url.clone_from(url);
    }
    if let Some(identity) = &cli.identity {
        config.channel.identity.clone_from(identity);
    }
    config.validate()?;
    Ok(config)
}

fn validate_file(args: &ValidateArgs) -> Result<()> {
    let cases = load_test_cases(&args.file)?;
    if cases.is_empty() {
        bail!("{} holds no test cases", args.file.display());
    }

    let mut invalid = 0;
    for case in &cases {
        match validate(case.script()) {
            Ok(()) => println!(
                "{} {} {}",
                "✓".green(),
                case.name,
                format!("({} interactions)", case.script().len()).dimmed()
            ),
            Err(issues) => {
                invalid += 1;
                println!("{} {}", "✗".red(), case.name);
                for issue in issues {
                    println!("    {issue}");
                }
            }
        }
        for warning in warnings(case.script()) {
            println!("    {} {warning}", "warning:".yellow());
        }
    }

    if invalid > 0 {
        eprintln!(
            "\n{} {invalid} of {} test cases are invalid",
            "Error:".red().bold(),
            cases.len()
        );
        std::process::exit(1);
    }
    Ok(())
}

async fn reset_context(config: &ChatprobeConfig) -> Result<()> {
    let client = ContextResetClient::from_config(config)?;
    client
        .reset(&config.channel.identity)
        .await
        .with_context(|| format!("context reset at {} failed", client.endpoint()))?;
    println!(
        "{} Context cleared for {}",
        "✓".green(),
        config.channel.identity
    );
    Ok(())
}
