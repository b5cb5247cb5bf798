//! Contracts between the engine and a realtime chat channel.
//!
//! A channel adapter hands the driver two things: a [`MessageSender`] for the
//! outbound direction and a `tokio::sync::mpsc::Receiver<ChannelEvent>` for
//! inbound traffic. Events are delivered in the order the backend emitted them
//! and never include echoes of messages this client sent.

use async_trait::async_trait;
use chatprobe_proto::ObservedMessage;
use thiserror::Error;

/// Errors reported by channel adapters.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Could not establish the connection.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The connection is gone; nothing can be sent.
    #[error("channel is disconnected")]
    Disconnected,

    /// A frame could not be encoded or decoded.
    #[error("malformed channel frame: {0}")]
    Frame(#[from] serde_json::Error),
}

/// Inbound notification from a channel adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Connected,
    /// A bot message, already stamped with its arrival id.
    Message(ObservedMessage),
    Disconnected { reason: Option<String> },
}

/// Outbound half of a channel.
///
/// `send` is fire-and-forget: it returns once the message is queued for the
/// transport, without waiting for the backend to acknowledge delivery.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Sends `text` on behalf of the conversation identified by `identity`.
    async fn send(&self, identity: &str, text: &str) -> Result<(), ChannelError>;

    /// Whether the underlying transport is currently connected.
    fn is_connected(&self) -> bool;
}
