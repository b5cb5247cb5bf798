//! Test doubles for exercising the engine and driver without a live channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chatprobe_proto::{MessageId, ObservedMessage, Payload};
use tokio::time::Instant;

use crate::channel::{ChannelError, MessageSender};

/// Record of one outbound send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub identity: String,
    pub text: String,
    pub at: Instant,
}

/// A [`MessageSender`] that records what it was asked to send.
#[derive(Debug, Clone)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    connected: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

impl RecordingSender {
    pub fn connected() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn disconnected() -> Self {
        let sender = Self::connected();
        sender.set_connected(false);
        sender
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes every later send fail with [`ChannelError::Disconnected`].
    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.text).collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, identity: &str, text: &str) -> Result<(), ChannelError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Disconnected);
        }
        self.sent.lock().unwrap().push(SentMessage {
            identity: identity.to_string(),
            text: text.to_string(),
            at: Instant::now(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// An observed message with the given arrival id.
pub fn observed(id: u64, content: &str, payload: Payload) -> ObservedMessage {
    ObservedMessage::new(MessageId(id), content, payload)
}

/// An observed plain text message with the given arrival id.
pub fn observed_text(id: u64, content: &str) -> ObservedMessage {
    observed(id, content, Payload::Text)
}
