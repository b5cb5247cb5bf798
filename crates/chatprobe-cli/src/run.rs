//! `chatprobe run`: execute one test case against the live bot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chatprobe_adapters::{ChannelSettings, connect};
use chatprobe_core::{
    ChatprobeConfig, ContextResetClient, EngineSnapshot, RunDriver, ScriptError,
    load_test_cases, select_test_case, validate, warnings,
};
use clap::Parser;
use colored::Colorize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::report;

/// Arguments for the run subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Test case file (a single case or an array of cases)
    pub file: PathBuf,

    /// Id or name of the case to run when the file holds several
    pub test: Option<String>,

    /// Clear the bot's server-side context before the first message
    #[arg(long)]
    pub reset: bool,

    /// Also write the result log as JSON to this path
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,
}

pub async fn execute(config: &ChatprobeConfig, args: &RunArgs) -> Result<()> {
    let cases = load_test_cases(&args.file)?;
    let case = select_test_case(cases, args.test.as_deref())?;
    validate(case.script()).map_err(ScriptError::Invalid)?;
    for issue in warnings(case.script()) {
        warn!(%issue, "Script will send an empty message");
    }

    println!(
        "\n{} {}",
        format!("▶ {}", case.name).bold(),
        format!("({} interactions, id {})", case.script().len(), case.id).dimmed()
    );
    println!("{}", "━".repeat(40).dimmed());

    let settings = ChannelSettings::from(&config.channel);
    let (sender, mut events) = connect(&settings).await?;
    let mut driver = RunDriver::new(
        Arc::new(sender.clone()),
        config.channel.identity.clone(),
        config.run_settings(),
    );

    if args.reset {
        let client = ContextResetClient::from_config(config)?;
        driver
            .reset_context(&client)
            .await
            .context("context reset before run failed")?;
    }

    let progress = tokio::spawn(print_progress(driver.subscribe()));
    let script = Arc::new(case.script().clone());
    let outcome = driver.drive(script, &mut events).await;

    // Dropping the driver closes the snapshot stream so the printer drains and exits.
    drop(driver);
    let _ = progress.await;
    sender.close();

    let run_report = outcome?;
    println!("{}", "━".repeat(40).dimmed());
    println!("{}", report::render_summary(&run_report));

    if let Some(path) = &args.json {
        report::write_json_report(path, &case, &run_report)?;
        info!(path = %path.display(), "Report written");
    }

    if !run_report.outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Prints each result as soon as the engine appends it.
async fn print_progress(mut snapshots: watch::Receiver<EngineSnapshot>) {
    let mut printed = 0;
    loop {
        {
            let snapshot = snapshots.borrow_and_update();
            // A restart clears the log.
            if snapshot.results.len() < printed {
                printed = 0;
            }
            for result in &snapshot.results[printed..] {
                println!("{}", report::render_result(result));
            }
            printed = snapshot.results.len();
        }
        if snapshots.changed().await.is_err() {
            break;
        }
    }
}
