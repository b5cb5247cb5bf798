//! Websocket connection to the messaging gateway.
//!
//! The socket is split into a writer task fed by an unbounded queue and a
//! reader task that decodes frames into [`ChannelEvent`]s. The reader stamps
//! each bot message with a monotonically increasing [`MessageId`] so the
//! engine can recognise redeliveries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chatprobe_core::{ChannelConfig, ChannelError, ChannelEvent, MessageSender};
use chatprobe_proto::{MessageId, ObservedMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::frame::Frame;

const EVENT_BUFFER: usize = 256;

/// Connection parameters for [`connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSettings {
    pub url: String,
    /// Our own address; inbound frames from it are echoes of what we sent.
    pub self_address: Option<String>,
}

impl ChannelSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            self_address: None,
        }
    }

    #[must_use]
    pub fn with_self_address(mut self, address: impl Into<String>) -> Self {
        self.self_address = Some(address.into());
        self
    }
}

impl From<&ChannelConfig> for ChannelSettings {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            url: config.url.clone(),
            self_address: config.self_address.clone(),
        }
    }
}

/// Outbound half of a websocket channel.
#[derive(Debug, Clone)]
pub struct WebSocketSender {
    outgoing: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
}

impl WebSocketSender {
    /// Sends a keepalive frame. The gateway answers with `pong`.
    pub fn ping(&self) -> Result<(), ChannelError> {
        self.push(&Frame::Ping)
    }

    /// Starts the closing handshake.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.outgoing.send(Message::Close(None));
    }

    fn push(&self, frame: &Frame) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }
        let text = frame.encode()?;
        self.outgoing
            .send(Message::Text(text.into()))
            .map_err(|_| ChannelError::Disconnected)
    }
}

#[async_trait]
impl MessageSender for WebSocketSender {
    async fn send(&self, identity: &str, text: &str) -> Result<(), ChannelError> {
        debug!(to = identity, "Sending user message");
        self.push(&Frame::send_message(identity, text))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.outgoing.is_closed()
    }
}

/// Opens the gateway websocket.
///
/// The returned receiver yields [`ChannelEvent::Connected`] first, then bot
/// messages in arrival order, and a final [`ChannelEvent::Disconnected`] when
/// the socket closes.
pub async fn connect(
    settings: &ChannelSettings,
) -> Result<(WebSocketSender, mpsc::Receiver<ChannelEvent>), ChannelError> {
    let (stream, _response) = tokio_tungstenite::connect_async(settings.url.as_str())
        .await
        .map_err(|e| ChannelError::Connect {
            url: settings.url.clone(),
            reason: e.to_string(),
        })?;
    info!(url = %settings.url, "Connected to channel gateway");

    let (mut sink, mut source) = stream.split();
    let (outgoing, mut queue) = mpsc::unbounded_channel::<Message>();
    let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
    let connected = Arc::new(AtomicBool::new(true));

    // Cannot fail: the receiver is held right here and the buffer is empty.
    let _ = events_tx.send(ChannelEvent::Connected).await;

    let writer_connected = Arc::clone(&connected);
    tokio::spawn(async move {
        while let Some(message) = queue.recv().await {
            let closing = matches!(message, Message::Close(_));
            if let Err(e) = sink.send(message).await {
                warn!(error = %e, "Websocket write failed");
                writer_connected.store(false, Ordering::SeqCst);
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut reader = Reader {
        self_address: settings.self_address.clone(),
        pong: outgoing.downgrade(),
        events: events_tx,
        next_id: 0,
    };
    let reader_connected = Arc::clone(&connected);
    tokio::spawn(async move {
        let reason = reader.run(&mut source).await;
        reader_connected.store(false, Ordering::SeqCst);
        match &reason {
            Some(reason) => info!(reason = %reason, "Channel gateway disconnected"),
            None => info!("Channel gateway disconnected"),
        }
        let _ = reader
            .events
            .send(ChannelEvent::Disconnected { reason })
            .await;
    });

    Ok((WebSocketSender { outgoing, connected }, events))
}

struct Reader {
    self_address: Option<String>,
    pong: mpsc::WeakUnboundedSender<Message>,
    events: mpsc::Sender<ChannelEvent>,
    next_id: u64,
}

impl Reader {
    /// Pumps frames until the socket ends. Returns the disconnect reason.
    async fn run<S>(&mut self, source: &mut S) -> Option<String>
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if !self.handle_text(&text).await {
                        return Some("event receiver dropped".to_string());
                    }
                }
                Ok(Message::Close(frame)) => {
                    return frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                }
                Ok(_) => {}
                Err(e) => return Some(e.to_string()),
            }
        }
        None
    }

    /// Returns false once nobody is listening for events.
    async fn handle_text(&mut self, text: &str) -> bool {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable frame");
                return true;
            }
        };

        match frame {
            Frame::NewMessage(envelope) => {
                if envelope.from.is_some() && envelope.from == self.self_address {
                    debug!("Dropping echo of our own message");
                    return true;
                }
                self.next_id += 1;
                let message = ObservedMessage::from_envelope(MessageId(self.next_id), envelope);
                if message.unsupported_kind.is_some() {
                    warn!(id = %message.id, kind = message.kind_name(), "Received bot message of unsupported type");
                } else {
                    debug!(id = %message.id, kind = message.kind_name(), "Received bot message");
                }
                self.events.send(ChannelEvent::Message(message)).await.is_ok()
            }
            Frame::Ping => {
                if let Some(outgoing) = self.pong.upgrade()
                    && let Ok(pong) = Frame::Pong.encode()
                {
                    let _ = outgoing.send(Message::Text(pong.into()));
                }
                true
            }
            Frame::Pong => {
                debug!("Gateway pong");
                true
            }
            Frame::SendMessage(_) => {
                debug!("Ignoring sendMessage frame from gateway");
                true
            }
        }
    }
}
