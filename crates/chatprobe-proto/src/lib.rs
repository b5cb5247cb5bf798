//! # chatprobe-proto
//!
//! Shared types for the chatprobe conversation tester.
//!
//! This crate provides the data model every other chatprobe crate speaks:
//! - Message kinds and their per-kind option shapes
//! - Expected responses (what a script asks for) and observed messages
//!   (what the bot actually sent)
//! - Scripts, interactions, and the test case import/export document
//! - Per-comparison test results with field-level mismatch details
//!
//! Expected responses and inbound bot events share one JSON wire shape,
//! [`MessageEnvelope`]. The envelope carries an untyped `type` and `options`.
//! Scripts convert it strictly into a [`Payload`]; inbound bot messages are
//! converted leniently so a malformed reply still reaches the comparator.

mod envelope;
mod message;
mod result;
mod script;

pub use envelope::{EnvelopeError, MessageBody, MessageEnvelope};
pub use message::{
    ButtonOption, ExpectedResponse, InteractiveOption, ListRow, MessageId, MessageKind,
    ObservedMessage, Payload,
};
pub use result::{FieldMismatch, TestResult};
pub use script::{Interaction, Script, TestCase};
