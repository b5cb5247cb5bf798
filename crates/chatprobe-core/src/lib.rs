//! # chatprobe-core
//!
//! Test execution and response verification for scripted chat-bot conversations.
//!
//! This crate provides:
//! - The response comparator: per-kind structural equality with field-level diagnostics
//! - The verification engine: a sans-IO state machine that walks a script
//! - The run driver: binds the engine to a live channel, paces turns, handles timeouts
//! - Script validation and JSON import/export
//! - A recorder that turns a live conversation into a test case
//! - Configuration loading and the context reset client
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  start/observe  ┌──────────────────┐  compare  ┌────────────┐
//! │  RunDriver  │────────────────▶│VerificationEngine│──────────▶│ Comparator │
//! └─────────────┘                 └──────────────────┘           └────────────┘
//!     │     ▲                              │
//!     ▼     │ ChannelEvent                 ▼ watch
//! ┌─────────────┐                  ┌──────────────┐
//! │MessageSender│                  │EngineSnapshot│
//! └─────────────┘                  └──────────────┘
//! ```

pub mod channel;
pub mod compare;
pub mod config;
mod driver;
mod engine;
pub mod recorder;
pub mod reset;
pub mod scripts;
pub mod testing;

pub use channel::{ChannelError, ChannelEvent, MessageSender};
pub use compare::{ComparisonOutcome, OptionItem, compare_option_sets, compare_response};
pub use config::{
    ChannelConfig, ChatprobeConfig, ConfigError, ContextResetConfig, DEFAULT_CONFIG_FILE,
    DEFAULT_SETTLE_DELAY, RunConfig,
};
pub use driver::{DriverError, RunDriver, RunOutcome, RunReport, RunSettings};
pub use engine::{
    Cursor, EngineSnapshot, Outbound, RunRefused, Step, TIMEOUT_ERROR, VerificationEngine,
};
pub use recorder::ScriptRecorder;
pub use reset::{ContextResetClient, ResetError};
pub use scripts::{
    ScriptError, ScriptIssue, load_test_cases, parse_test_cases, save_test_cases,
    select_test_case, validate, warnings,
};
