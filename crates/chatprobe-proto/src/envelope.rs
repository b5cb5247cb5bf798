//! JSON wire shape shared by scripted expectations and inbound bot events.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::{ButtonOption, InteractiveOption, ListRow, MessageKind, Payload};

/// Errors raised while converting an envelope into a typed payload.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("unknown message type '{0}'")]
    UnknownKind(String),

    /// The `options` array does not have the shape required by the message kind.
    #[error("malformed {kind} options: {source}")]
    Options {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

/// A message as it travels over the wire or sits in a script file.
///
/// `type` stays a plain string here so that a bot message of a kind chatprobe
/// does not model still reaches the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub body: MessageBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Body of a [`MessageEnvelope`]. Options stay untyped until the kind is known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBody {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub options: Option<Value>,
}

impl MessageEnvelope {
    /// Splits the envelope into body text and a payload typed by `kind`.
    ///
    /// Options and button text attached to a `text` message are discarded.
    /// Unknown kinds and options of the wrong shape are errors.
    pub fn into_parts(self) -> Result<(String, Payload), EnvelopeError> {
        let kind =
            MessageKind::parse(&self.kind).ok_or_else(|| EnvelopeError::UnknownKind(self.kind))?;
        let MessageBody {
            text,
            button_text,
            options,
        } = self.body;

        let payload = match kind {
            MessageKind::Text => Payload::Text,
            MessageKind::Button => Payload::Button {
                options: parse_options(options, kind)?,
            },
            MessageKind::List => Payload::List {
                button_text,
                rows: parse_options(options, kind)?,
            },
            MessageKind::Interactive => Payload::Interactive {
                options: parse_options(options, kind)?,
            },
        };

        Ok((text, payload))
    }

    /// Like [`into_parts`](Self::into_parts), but never fails.
    ///
    /// Option entries that do not parse become default entries, so the
    /// comparator reports them field by field. A non-array `options` value
    /// counts as an empty list. The payload is `None` for unknown kinds.
    pub fn into_lenient_parts(self) -> (String, Option<Payload>) {
        let MessageBody {
            text,
            button_text,
            options,
        } = self.body;

        let payload = MessageKind::parse(&self.kind).map(|kind| match kind {
            MessageKind::Text => Payload::Text,
            MessageKind::Button => Payload::Button {
                options: lenient_options(options),
            },
            MessageKind::List => Payload::List {
                button_text,
                rows: lenient_options(options),
            },
            MessageKind::Interactive => Payload::Interactive {
                options: lenient_options(options),
            },
        });

        (text, payload)
    }
}

fn lenient_options<T: DeserializeOwned + Default>(options: Option<Value>) -> Option<Vec<T>> {
    match options {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .map(|item| serde_json::from_value(item).unwrap_or_default())
                .collect(),
        ),
        Some(_) => Some(Vec::new()),
    }
}

/// Reads a string field that may be missing or `null` as `""`.
pub(crate) fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn parse_options<T: DeserializeOwned>(
    options: Option<Value>,
    kind: MessageKind,
) -> Result<Option<Vec<T>>, EnvelopeError> {
    match options {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| EnvelopeError::Options { kind, source }),
    }
}

/// Borrowed serialization mirror of [`MessageEnvelope`].
#[derive(Serialize)]
pub(crate) struct WireEnvelopeRef<'a> {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub body: WireBodyRef<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireBodyRef<'a> {
    pub text: &'a str,
    pub button_text: Option<&'a str>,
    pub options: OptionsRef<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub(crate) enum OptionsRef<'a> {
    Absent,
    Buttons(&'a [ButtonOption]),
    Rows(&'a [ListRow]),
    Links(&'a [InteractiveOption]),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Value) -> MessageEnvelope {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn button_options_parse_without_ids() {
        let (text, payload) = envelope(json!({
            "type": "button",
            "body": { "text": "Choose", "options": [{ "text": "A" }, { "id": "b", "text": "B" }] }
        }))
        .into_parts()
        .unwrap();

        assert_eq!(text, "Choose");
        assert_eq!(
            payload,
            Payload::Button {
                options: Some(vec![ButtonOption::new("", "A"), ButtonOption::new("b", "B")])
            }
        );
    }

    #[test]
    fn list_keeps_row_level_button_text() {
        let (_, payload) = envelope(json!({
            "type": "list",
            "body": {
                "text": "Menu",
                "buttonText": "Open",
                "options": [{ "title": "T", "description": "D", "rowId": "r1", "buttonText": "Pick" }]
            }
        }))
        .into_parts()
        .unwrap();

        let Payload::List { button_text, rows } = payload else {
            panic!("expected list payload");
        };
        assert_eq!(button_text.as_deref(), Some("Open"));
        let rows = rows.unwrap();
        assert_eq!(rows[0].row_id.as_deref(), Some("r1"));
        assert_eq!(rows[0].button_text.as_deref(), Some("Pick"));
    }

    #[test]
    fn options_of_the_wrong_shape_are_rejected() {
        let err = envelope(json!({
            "type": "interactive",
            "body": { "text": "Go", "options": [{ "displayText": 5, "url": "https://a.example" }] }
        }))
        .into_parts()
        .unwrap_err();

        assert!(err.to_string().starts_with("malformed interactive options"));
    }

    #[test]
    fn unknown_kind_is_rejected_in_scripts() {
        let err = envelope(json!({ "type": "sticker", "body": { "text": "" } }))
            .into_parts()
            .unwrap_err();

        assert_eq!(err.to_string(), "unknown message type 'sticker'");
    }

    #[test]
    fn missing_and_null_option_fields_read_as_empty() {
        let (_, payload) = envelope(json!({
            "type": "list",
            "body": {
                "text": "Menu",
                "options": [{ "title": "A" }, { "title": "B", "description": null }]
            }
        }))
        .into_parts()
        .unwrap();

        assert_eq!(
            payload,
            Payload::List {
                button_text: None,
                rows: Some(vec![ListRow::new("A", ""), ListRow::new("B", "")])
            }
        );
    }

    #[test]
    fn lenient_parts_keep_unparseable_entries_as_defaults() {
        let (text, payload) = envelope(json!({
            "type": "interactive",
            "body": {
                "text": "Go",
                "options": [{ "displayText": 5 }, { "displayText": "Visit", "url": "https://a.example" }]
            }
        }))
        .into_lenient_parts();

        assert_eq!(text, "Go");
        assert_eq!(
            payload,
            Some(Payload::Interactive {
                options: Some(vec![
                    InteractiveOption::default(),
                    InteractiveOption::new("Visit", "https://a.example"),
                ])
            })
        );
    }

    #[test]
    fn lenient_parts_treat_scalar_options_as_empty() {
        let (_, payload) = envelope(json!({
            "type": "button",
            "body": { "text": "Choose", "options": "oops" }
        }))
        .into_lenient_parts();

        assert_eq!(payload, Some(Payload::Button { options: Some(vec![]) }));
    }

    #[test]
    fn lenient_parts_have_no_payload_for_unknown_kinds() {
        let (text, payload) =
            envelope(json!({ "type": "sticker", "body": { "text": "🎉" } })).into_lenient_parts();

        assert_eq!(text, "🎉");
        assert_eq!(payload, None);
    }

    #[test]
    fn missing_body_fields_default() {
        let (text, payload) = envelope(json!({ "type": "list" }))
            .into_parts()
            .unwrap();

        assert_eq!(text, "");
        assert_eq!(
            payload,
            Payload::List {
                button_text: None,
                rows: None
            }
        );
    }
}
