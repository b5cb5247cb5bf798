//! Message kinds, option shapes, and the two message roles.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::envelope::{
    EnvelopeError, MessageEnvelope, OptionsRef, WireBodyRef, WireEnvelopeRef, null_as_empty,
};

/// Discriminant of the four message shapes a bot can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Button,
    List,
    Interactive,
}

impl MessageKind {
    /// Returns the lowercase wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Button => "button",
            MessageKind::List => "list",
            MessageKind::Interactive => "interactive",
        }
    }

    /// Looks up a kind by its wire name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "text" => Some(MessageKind::Text),
            "button" => Some(MessageKind::Button),
            "list" => Some(MessageKind::List),
            "interactive" => Some(MessageKind::Interactive),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reply button attached to a `button` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonOption {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub text: String,
}

impl ButtonOption {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A selectable row of a `list` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRow {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_text: Option<String>,
}

impl ListRow {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            row_id: None,
            button_text: None,
        }
    }

    pub fn with_button_text(mut self, button_text: impl Into<String>) -> Self {
        self.button_text = Some(button_text.into());
        self
    }
}

/// A call-to-action link of an `interactive` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub display_text: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
}

impl InteractiveOption {
    pub fn new(display_text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: None,
            display_text: display_text.into(),
            url: url.into(),
        }
    }
}

/// Kind-specific part of a message.
///
/// `None` options mean the sender attached no option list at all, which is
/// distinct from an empty list: an expected response without options skips
/// the option comparison entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text,
    Button {
        options: Option<Vec<ButtonOption>>,
    },
    List {
        button_text: Option<String>,
        rows: Option<Vec<ListRow>>,
    },
    Interactive {
        options: Option<Vec<InteractiveOption>>,
    },
}

impl Payload {
    pub fn kind(&self) -> MessageKind {
        match self {
            Payload::Text => MessageKind::Text,
            Payload::Button { .. } => MessageKind::Button,
            Payload::List { .. } => MessageKind::List,
            Payload::Interactive { .. } => MessageKind::Interactive,
        }
    }

    /// The list-level button label, if this is a list carrying one.
    pub fn button_text(&self) -> Option<&str> {
        match self {
            Payload::List { button_text, .. } => button_text.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn options_ref(&self) -> OptionsRef<'_> {
        match self {
            Payload::Text => OptionsRef::Absent,
            Payload::Button { options } => options
                .as_deref()
                .map_or(OptionsRef::Absent, OptionsRef::Buttons),
            Payload::List { rows, .. } => {
                rows.as_deref().map_or(OptionsRef::Absent, OptionsRef::Rows)
            }
            Payload::Interactive { options } => options
                .as_deref()
                .map_or(OptionsRef::Absent, OptionsRef::Links),
        }
    }
}

/// What a script expects the bot to send back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "MessageEnvelope")]
pub struct ExpectedResponse {
    /// Message body that must match the observed content exactly.
    pub text: String,
    pub payload: Payload,
    /// Sender address, kept when the response was recorded from a live chat.
    pub from: Option<String>,
    pub timestamp: Option<i64>,
}

impl ExpectedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self::with_payload(text, Payload::Text)
    }

    pub fn buttons(text: impl Into<String>, options: Vec<ButtonOption>) -> Self {
        Self::with_payload(
            text,
            Payload::Button {
                options: Some(options),
            },
        )
    }

    pub fn list(
        text: impl Into<String>,
        button_text: Option<String>,
        rows: Vec<ListRow>,
    ) -> Self {
        Self::with_payload(
            text,
            Payload::List {
                button_text,
                rows: Some(rows),
            },
        )
    }

    pub fn interactive(text: impl Into<String>, options: Vec<InteractiveOption>) -> Self {
        Self::with_payload(
            text,
            Payload::Interactive {
                options: Some(options),
            },
        )
    }

    pub fn with_payload(text: impl Into<String>, payload: Payload) -> Self {
        Self {
            text: text.into(),
            payload,
            from: None,
            timestamp: None,
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }
}

impl TryFrom<MessageEnvelope> for ExpectedResponse {
    type Error = EnvelopeError;

    fn try_from(envelope: MessageEnvelope) -> Result<Self, Self::Error> {
        let from = envelope.from.clone();
        let timestamp = envelope.timestamp;
        let (text, payload) = envelope.into_parts()?;
        Ok(Self {
            text,
            payload,
            from,
            timestamp,
        })
    }
}

impl Serialize for ExpectedResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireEnvelopeRef {
            kind: self.kind(),
            body: WireBodyRef {
                text: &self.text,
                button_text: self.payload.button_text(),
                options: self.payload.options_ref(),
            },
            from: self.from.as_deref(),
            timestamp: self.timestamp,
        }
        .serialize(serializer)
    }
}

/// Arrival-order identity of an inbound message.
///
/// Assigned by the channel adapter from a monotonic counter, so a larger id
/// always means a later arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A bot message actually received during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedMessage {
    pub id: MessageId,
    pub content: String,
    pub payload: Payload,
    /// Wire type name when the bot sent a kind chatprobe does not model.
    /// The payload is then `Text` and never matches an expectation.
    pub unsupported_kind: Option<String>,
    pub from: Option<String>,
    /// Sender-side timestamp in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ObservedMessage {
    pub fn new(id: MessageId, content: impl Into<String>, payload: Payload) -> Self {
        Self {
            id,
            content: content.into(),
            payload,
            unsupported_kind: None,
            from: None,
            timestamp: 0,
        }
    }

    /// Marks this message as carrying a wire type outside the four known kinds.
    pub fn with_unsupported_kind(mut self, kind: impl Into<String>) -> Self {
        self.unsupported_kind = Some(kind.into());
        self
    }

    /// Builds an observed message from an inbound wire envelope.
    ///
    /// Never fails: whatever the bot sent has to reach the comparator so a
    /// malformed reply shows up as a failed result rather than silence.
    pub fn from_envelope(id: MessageId, envelope: MessageEnvelope) -> Self {
        let from = envelope.from.clone();
        let timestamp = envelope.timestamp.unwrap_or_default();
        let kind = envelope.kind.clone();
        let (content, payload) = envelope.into_lenient_parts();

        let mut message = match payload {
            Some(payload) => Self::new(id, content, payload),
            None => Self::new(id, content, Payload::Text).with_unsupported_kind(kind),
        };
        message.from = from;
        message.timestamp = timestamp;
        message
    }

    pub fn kind(&self) -> MessageKind {
        self.payload.kind()
    }

    /// Wire name of the type the bot actually sent.
    pub fn kind_name(&self) -> &str {
        self.unsupported_kind
            .as_deref()
            .unwrap_or_else(|| self.kind().as_str())
    }

    pub fn button_text(&self) -> Option<&str> {
        self.payload.button_text()
    }

    /// Turns this observation into an expectation, as the recorder does.
    ///
    /// Returns `None` for unsupported kinds, which no script can express.
    pub fn to_expected(&self) -> Option<ExpectedResponse> {
        if self.unsupported_kind.is_some() {
            return None;
        }
        Some(ExpectedResponse {
            text: self.content.clone(),
            payload: self.payload.clone(),
            from: self.from.clone(),
            timestamp: Some(self.timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expected_list_serializes_to_platform_shape() {
        let expected = ExpectedResponse::list(
            "Pick one",
            Some("Go".to_string()),
            vec![ListRow::new("A", "d1")],
        );

        let value = serde_json::to_value(&expected).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "list",
                "body": {
                    "text": "Pick one",
                    "buttonText": "Go",
                    "options": [{ "title": "A", "description": "d1" }]
                }
            })
        );
    }

    #[test]
    fn text_response_drops_stray_options() {
        let expected: ExpectedResponse = serde_json::from_value(json!({
            "type": "text",
            "body": { "text": "Hi there!", "buttonText": "ignored", "options": [{ "text": "x" }] }
        }))
        .unwrap();

        assert_eq!(expected.payload, Payload::Text);
        assert_eq!(expected.text, "Hi there!");
    }

    #[test]
    fn null_options_stay_absent() {
        let expected: ExpectedResponse = serde_json::from_value(json!({
            "type": "button",
            "body": { "text": "Choose", "buttonText": null, "options": null }
        }))
        .unwrap();

        assert_eq!(expected.payload, Payload::Button { options: None });
    }

    #[test]
    fn recorded_observation_keeps_sender_metadata() {
        let envelope: MessageEnvelope = serde_json::from_value(json!({
            "from": "bot@c.us",
            "timestamp": 1_700_000_000_000_i64,
            "type": "interactive",
            "body": {
                "text": "Open the site",
                "buttonText": null,
                "options": [{ "name": "cta_url", "displayText": "Visit", "url": "https://example.com" }]
            }
        }))
        .unwrap();

        let observed = ObservedMessage::from_envelope(MessageId(7), envelope);
        let expected = observed.to_expected().unwrap();

        assert_eq!(expected.from.as_deref(), Some("bot@c.us"));
        assert_eq!(expected.timestamp, Some(1_700_000_000_000));
        assert_eq!(expected.kind(), MessageKind::Interactive);
    }

    #[test]
    fn list_row_without_description_is_still_observed() {
        let envelope: MessageEnvelope = serde_json::from_value(json!({
            "type": "list",
            "body": { "text": "Menu", "buttonText": "Open", "options": [{ "title": "A" }] }
        }))
        .unwrap();

        let observed = ObservedMessage::from_envelope(MessageId(1), envelope);
        assert_eq!(
            observed.payload,
            Payload::List {
                button_text: Some("Open".into()),
                rows: Some(vec![ListRow::new("A", "")])
            }
        );
    }

    #[test]
    fn unknown_kind_is_observed_by_name() {
        let envelope: MessageEnvelope = serde_json::from_value(json!({
            "from": "bot@c.us",
            "type": "sticker",
            "body": { "text": "" }
        }))
        .unwrap();

        let observed = ObservedMessage::from_envelope(MessageId(2), envelope);
        assert_eq!(observed.kind_name(), "sticker");
        assert_eq!(observed.from.as_deref(), Some("bot@c.us"));
        assert_eq!(observed.to_expected(), None);
    }

    #[test]
    fn message_ids_order_by_arrival() {
        assert!(MessageId(3) > MessageId(2));
        assert_eq!(MessageId(4).to_string(), "#4");
    }
}
