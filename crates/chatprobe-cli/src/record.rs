//! `chatprobe record`: turn a live conversation into a test case.
//!
//! Each stdin line is sent to the bot as a user message. Bot replies are
//! captured as expected responses of the latest message. `/stop` or EOF ends
//! the session and writes the test case.

use std::path::PathBuf;

use anyhow::{Result, bail};
use chatprobe_adapters::{ChannelSettings, connect};
use chatprobe_core::{ChannelEvent, ChatprobeConfig, MessageSender, ScriptRecorder, save_test_cases};
use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

const STOP_COMMAND: &str = "/stop";

/// Arguments for the record subcommand.
#[derive(Parser, Debug)]
pub struct RecordArgs {
    /// Where to write the recorded test case
    pub output: PathBuf,

    /// Name for the recorded test case
    #[arg(long)]
    pub name: Option<String>,
}

pub async fn execute(config: &ChatprobeConfig, args: &RecordArgs) -> Result<()> {
    let (sender, mut events) = connect(&ChannelSettings::from(&config.channel)).await?;
    let identity = config.channel.identity.as_str();

    let mut recorder = ScriptRecorder::new();
    if let Some(name) = &args.name {
        recorder.rename(name.clone());
    }

    println!(
        "{} {}",
        format!("● Recording conversation with {identity}").bold(),
        format!("(type messages, {STOP_COMMAND} to finish)").dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let text = line.trim();
                if text == STOP_COMMAND {
                    break;
                }
                if text.is_empty() {
                    continue;
                }
                // Record before sending so a fast reply has an interaction to land in.
                recorder.record_user_message(text);
                sender.send(identity, text).await?;
            }
            event = events.recv() => match event {
                Some(ChannelEvent::Message(message)) => {
                    if recorder.record_bot_message(&message) {
                        println!("{} {}", "bot ›".cyan(), message.content);
                    }
                }
                Some(ChannelEvent::Connected) => {}
                Some(ChannelEvent::Disconnected { reason }) => {
                    warn!(reason = reason.as_deref().unwrap_or("unknown"), "Channel dropped while recording");
                    break;
                }
                None => break,
            },
        }
    }
    sender.close();

    let case = recorder.finish();
    if case.script().is_empty() {
        bail!("nothing recorded; send at least one message before {STOP_COMMAND}");
    }
    save_test_cases(&args.output, std::slice::from_ref(&case))?;
    println!(
        "{} Saved '{}' ({} interactions) to {}",
        "✓".green(),
        case.name,
        case.script().len(),
        args.output.display()
    );
    Ok(())
}
