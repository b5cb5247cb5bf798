//! Event frames exchanged with the messaging gateway.

use chatprobe_proto::MessageEnvelope;
use serde::{Deserialize, Serialize};

/// A message the client asks the gateway to deliver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub message: String,
}

/// One websocket text frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Frame {
    SendMessage(OutgoingMessage),
    NewMessage(MessageEnvelope),
    Ping,
    Pong,
}

impl Frame {
    pub fn send_message(to: impl Into<String>, message: impl Into<String>) -> Self {
        Frame::SendMessage(OutgoingMessage {
            to: to.into(),
            message: message.into(),
        })
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn send_message_frame_shape() {
        let encoded = Frame::send_message("551126509993@c.us", "Hello").encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            value,
            json!({ "event": "sendMessage", "data": { "to": "551126509993@c.us", "message": "Hello" } })
        );
    }

    #[test]
    fn new_message_frame_decodes_envelope() {
        let frame = Frame::decode(
            r#"{"event":"newMessage","data":{"from":"bot","timestamp":5,"type":"button",
                "body":{"text":"Choose","buttonText":null,"options":[{"id":"1","text":"A"}]}}}"#,
        )
        .unwrap();

        let Frame::NewMessage(envelope) = frame else {
            panic!("expected newMessage frame");
        };
        assert_eq!(envelope.kind, "button");
        assert_eq!(envelope.body.text, "Choose");
        assert_eq!(envelope.from.as_deref(), Some("bot"));
    }

    #[test]
    fn unmodelled_message_types_still_decode() {
        let frame = Frame::decode(
            r#"{"event":"newMessage","data":{"from":"bot","type":"sticker","body":{"text":""}}}"#,
        )
        .unwrap();

        let Frame::NewMessage(envelope) = frame else {
            panic!("expected newMessage frame");
        };
        assert_eq!(envelope.kind, "sticker");
    }

    #[test]
    fn keepalive_frames_have_no_data() {
        assert_eq!(Frame::Ping.encode().unwrap(), r#"{"event":"ping"}"#);
        assert_eq!(Frame::decode(r#"{"event":"pong"}"#).unwrap(), Frame::Pong);
    }

    #[test]
    fn unknown_events_are_errors() {
        assert!(Frame::decode(r#"{"event":"typing","data":{}}"#).is_err());
    }
}
