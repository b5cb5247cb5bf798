//! Verification engine: the state machine that walks a script.
//!
//! The engine is sans-IO. Its transitions return what should be sent and when,
//! and a [`crate::RunDriver`] carries that out against a real channel.
//!
//! ```text
//!            start_run
//!   Idle ───────────────▶ Running(0, 0)
//!    ▲                        │ observe
//!    │   mismatch / done      ▼
//!    └──────────────── Running(i, r) ──▶ Running(i, r+1)
//!                             │
//!                             └────────▶ Running(i+1, 0) + send after settle delay
//! ```
//!
//! State changes are published on a `watch` channel so observers (a terminal
//! renderer, a UI) can follow the cursor and result log without owning them.

use std::sync::Arc;
use std::time::Duration;

use chatprobe_proto::{MessageId, ObservedMessage, Script, TestResult};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::compare::compare_response;
use crate::scripts::{ScriptIssue, validate};

/// Error text recorded when a run times out waiting for the bot.
pub const TIMEOUT_ERROR: &str = "Timed out waiting for response";

/// Position of the engine within the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cursor {
    #[default]
    Idle,
    Running {
        interaction: usize,
        response: usize,
    },
}

impl Cursor {
    pub fn is_idle(&self) -> bool {
        matches!(self, Cursor::Idle)
    }
}

/// Reasons a run request is turned down. Nothing changes when this happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunRefused {
    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error("the channel is not connected")]
    Disconnected,

    #[error("the script has no interactions")]
    EmptyScript,

    #[error("the script is invalid: {0:?}")]
    InvalidScript(Vec<ScriptIssue>),
}

/// A user message the driver must send, after `delay` has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub text: String,
    pub delay: Duration,
}

/// What an inbound message did to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Not running, or the message was already consumed.
    Ignored,
    /// Matched; waiting for the next response of the same interaction.
    Advanced,
    /// Matched the last response of an interaction; the next turn begins.
    NextTurn(Outbound),
    /// Matched the final response of the script.
    Completed,
    /// Did not match. The run is over.
    Failed,
}

/// Read-only view of engine state published after every transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub cursor: Cursor,
    pub results: Vec<TestResult>,
}

impl EngineSnapshot {
    pub fn is_busy(&self) -> bool {
        !self.cursor.is_idle()
    }
}

/// Drives one script at a time against a stream of observed messages.
pub struct VerificationEngine {
    script: Option<Arc<Script>>,
    cursor: Cursor,
    results: Vec<TestResult>,
    last_consumed: Option<MessageId>,
    settle_delay: Duration,
    state: watch::Sender<EngineSnapshot>,
}

impl VerificationEngine {
    /// Creates an idle engine that waits `settle_delay` between turns.
    pub fn new(settle_delay: Duration) -> Self {
        let (state, _) = watch::channel(EngineSnapshot::default());
        Self {
            script: None,
            cursor: Cursor::Idle,
            results: Vec::new(),
            last_consumed: None,
            settle_delay,
            state,
        }
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.state.subscribe()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// True from a successful `start_run` until the run completes or fails.
    pub fn is_busy(&self) -> bool {
        !self.cursor.is_idle()
    }

    /// The result log of the current (or most recent) run.
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Starts a run over `script`.
    ///
    /// Clears the result log and positions the cursor at the first expected
    /// response. Returns the first user message to send immediately.
    pub fn start_run(
        &mut self,
        script: Arc<Script>,
        channel_connected: bool,
    ) -> Result<Option<Outbound>, RunRefused> {
        if self.is_busy() {
            return Err(RunRefused::AlreadyRunning);
        }
        if !channel_connected {
            return Err(RunRefused::Disconnected);
        }
        if script.is_empty() {
            return Err(RunRefused::EmptyScript);
        }
        validate(&script).map_err(RunRefused::InvalidScript)?;

        // Ids restart at 1 on every connect, so the guard is per run.
        self.results.clear();
        self.last_consumed = None;
        self.cursor = Cursor::Running {
            interaction: 0,
            response: 0,
        };

        let first = &script.interactions()[0];
        let outbound = (!first.expected_responses.is_empty()).then(|| Outbound {
            text: first.user_message.clone(),
            delay: Duration::ZERO,
        });
        info!(
            interactions = script.len(),
            responses = script.expected_response_count(),
            "Run started"
        );

        self.script = Some(script);
        self.publish();
        Ok(outbound)
    }

    /// Feeds one inbound bot message to the engine.
    pub fn observe(&mut self, message: &ObservedMessage) -> Step {
        let Cursor::Running {
            interaction,
            response,
        } = self.cursor
        else {
            debug!(id = %message.id, "Ignoring message while idle");
            return Step::Ignored;
        };

        if self.last_consumed.is_some_and(|last| message.id <= last) {
            debug!(id = %message.id, "Ignoring already consumed message");
            return Step::Ignored;
        }
        self.last_consumed = Some(message.id);

        let script = Arc::clone(self.script.as_ref().expect("running engine holds a script"));
        let current = &script.interactions()[interaction];
        let expected = &current.expected_responses[response];

        let outcome = compare_response(expected, message);
        let success = outcome.success;
        if !success {
            warn!(
                interaction = interaction + 1,
                response = response + 1,
                error = outcome.error.as_deref().unwrap_or_default(),
                "Response mismatch"
            );
        }
        self.results.push(outcome.into_result(interaction, response));

        let step = if !success {
            self.cursor = Cursor::Idle;
            Step::Failed
        } else if response + 1 < current.expected_responses.len() {
            self.cursor = Cursor::Running {
                interaction,
                response: response + 1,
            };
            Step::Advanced
        } else if interaction + 1 < script.len() {
            let next = &script.interactions()[interaction + 1];
            self.cursor = Cursor::Running {
                interaction: interaction + 1,
                response: 0,
            };
            Step::NextTurn(Outbound {
                text: next.user_message.clone(),
                delay: self.settle_delay,
            })
        } else {
            info!(results = self.results.len(), "Run completed");
            self.cursor = Cursor::Idle;
            Step::Completed
        };

        self.publish();
        step
    }

    /// Ends the run with a timeout failure at the current cursor.
    ///
    /// Returns `false` when no run is active.
    pub fn time_out(&mut self) -> bool {
        let Cursor::Running {
            interaction,
            response,
        } = self.cursor
        else {
            return false;
        };

        warn!(
            interaction = interaction + 1,
            response = response + 1,
            "Timed out waiting for response"
        );
        self.results
            .push(TestResult::failed(interaction, response, TIMEOUT_ERROR, None));
        self.cursor = Cursor::Idle;
        self.publish();
        true
    }

    /// Abandons the run without recording a result.
    pub fn abort(&mut self) {
        if self.is_busy() {
            warn!(cursor = ?self.cursor, "Run aborted");
            self.cursor = Cursor::Idle;
            self.publish();
        }
    }

    fn publish(&self) {
        self.state.send_replace(EngineSnapshot {
            cursor: self.cursor,
            results: self.results.clone(),
        });
    }
}

impl Default for VerificationEngine {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SETTLE_DELAY)
    }
}
