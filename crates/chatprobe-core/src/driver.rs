//! Async driver that runs the verification engine against a live channel.
//!
//! The driver is a single cooperative task. It never blocks on the bot: it
//! waits in one `select!` on three sources and reacts to whichever fires.
//!
//! - an inbound channel event
//! - the deadline of a deferred user message (the settle delay between turns)
//! - the optional response deadline

use std::sync::Arc;
use std::time::Duration;

use chatprobe_proto::{Script, TestResult};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, ChannelEvent, MessageSender};
use crate::config::DEFAULT_SETTLE_DELAY;
use crate::engine::{EngineSnapshot, Outbound, RunRefused, Step, VerificationEngine};
use crate::reset::{ContextResetClient, ResetError};

/// Errors that stop the driver before a run can finish.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("run refused: {0}")]
    Refused(#[from] RunRefused),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("cannot reset context while a run is in progress")]
    Busy,

    #[error(transparent)]
    Reset(#[from] ResetError),
}

/// Pacing for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Wait between the last matched response of a turn and the next user message.
    pub settle_delay: Duration,
    /// Longest silence tolerated while waiting for a response. `None` waits forever.
    pub response_timeout: Option<Duration>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            response_timeout: None,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Failed,
    TimedOut,
    Disconnected,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Passed)
    }
}

/// Summary of one finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub results: Vec<TestResult>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// A user message waiting out the settle delay.
struct PendingSend {
    at: Instant,
    text: String,
}

/// Binds a [`VerificationEngine`] to a channel for one conversation.
pub struct RunDriver {
    engine: VerificationEngine,
    sender: Arc<dyn MessageSender>,
    identity: String,
    settings: RunSettings,
}

impl RunDriver {
    pub fn new(
        sender: Arc<dyn MessageSender>,
        identity: impl Into<String>,
        settings: RunSettings,
    ) -> Self {
        Self {
            engine: VerificationEngine::new(settings.settle_delay),
            sender,
            identity: identity.into(),
            settings,
        }
    }

    pub fn engine(&self) -> &VerificationEngine {
        &self.engine
    }

    /// Subscribes to engine state changes for rendering.
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.engine.subscribe()
    }

    /// Clears server-side context for this conversation. Refused mid-run.
    pub async fn reset_context(&self, client: &ContextResetClient) -> Result<(), DriverError> {
        if self.engine.is_busy() {
            return Err(DriverError::Busy);
        }
        client.reset(&self.identity).await?;
        Ok(())
    }

    /// Runs `script` until it completes, fails, times out, or the channel drops.
    pub async fn drive(
        &mut self,
        script: Arc<Script>,
        events: &mut mpsc::Receiver<ChannelEvent>,
    ) -> Result<RunReport, DriverError> {
        let started = Instant::now();
        let first = self.engine.start_run(script, self.sender.is_connected())?;

        let mut pending = None;
        if let Some(outbound) = first {
            self.dispatch(outbound, &mut pending).await?;
        }
        let mut deadline = self.next_deadline(pending.as_ref());

        let outcome = loop {
            // Disabled branches still evaluate their future, so give them a valid instant.
            let send_at = pending.as_ref().map_or_else(Instant::now, |p: &PendingSend| p.at);
            let timeout_at = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                () = sleep_until(send_at), if pending.is_some() => {
                    if let Some(due) = pending.take() {
                        self.send(&due.text).await?;
                    }
                    deadline = self.next_deadline(None);
                }
                () = sleep_until(timeout_at), if deadline.is_some() => {
                    self.engine.time_out();
                    break RunOutcome::TimedOut;
                }
                event = events.recv() => match event {
                    Some(ChannelEvent::Message(message)) => match self.engine.observe(&message) {
                        Step::Ignored => {}
                        Step::Advanced => deadline = self.next_deadline(None),
                        Step::NextTurn(outbound) => {
                            self.dispatch(outbound, &mut pending).await?;
                            deadline = self.next_deadline(pending.as_ref());
                        }
                        Step::Completed => break RunOutcome::Passed,
                        Step::Failed => break RunOutcome::Failed,
                    },
                    Some(ChannelEvent::Connected) => debug!("Channel connected"),
                    Some(ChannelEvent::Disconnected { reason }) => {
                        warn!(reason = reason.as_deref().unwrap_or("unknown"), "Channel dropped mid-run");
                        self.engine.abort();
                        break RunOutcome::Disconnected;
                    }
                    None => {
                        warn!("Channel closed mid-run");
                        self.engine.abort();
                        break RunOutcome::Disconnected;
                    }
                },
            }
        };

        if let Some(dropped) = pending {
            debug!(text = %dropped.text, "Cancelled deferred send");
        }

        let report = RunReport {
            outcome,
            results: self.engine.results().to_vec(),
            elapsed: started.elapsed(),
        };
        info!(
            outcome = ?report.outcome,
            passed = report.passed_count(),
            failed = report.failed_count(),
            "Run finished"
        );
        Ok(report)
    }

    async fn dispatch(
        &mut self,
        outbound: Outbound,
        pending: &mut Option<PendingSend>,
    ) -> Result<(), DriverError> {
        if outbound.delay.is_zero() {
            self.send(&outbound.text).await
        } else {
            debug!(delay_ms = outbound.delay.as_millis() as u64, "Deferring next user message");
            *pending = Some(PendingSend {
                at: Instant::now() + outbound.delay,
                text: outbound.text,
            });
            Ok(())
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), DriverError> {
        debug!(identity = %self.identity, text, "Sending user message");
        if let Err(err) = self.sender.send(&self.identity, text).await {
            self.engine.abort();
            return Err(err.into());
        }
        Ok(())
    }

    /// The response deadline only runs while nothing is waiting to be sent.
    fn next_deadline(&self, pending: Option<&PendingSend>) -> Option<Instant> {
        if pending.is_some() {
            return None;
        }
        self.settings
            .response_timeout
            .map(|timeout| Instant::now() + timeout)
    }
}
