//! Structural comparison of expected responses against observed bot messages.
//!
//! Comparison is pure and never fails: a mismatch is an ordinary outcome that
//! carries field-level details for the result log.
//!
//! `compare_response` runs its checks from most to least fundamental and stops
//! at the first failing one:
//!
//! ```text
//! kind ─▶ body text ─▶ list button text ─▶ option set (non-text kinds)
//! ```
//!
//! so a wrong message kind is reported once instead of also flagging every
//! option that differs as a consequence.

use chatprobe_proto::{
    ButtonOption, ExpectedResponse, FieldMismatch, InteractiveOption, ListRow, MessageKind,
    ObservedMessage, Payload, TestResult,
};

/// Rendering used for a missing button label in diagnostics.
const ABSENT: &str = "null";

/// Empty labels render like missing ones so a detail never reads `""`.
fn or_absent(label: Option<&str>) -> &str {
    label.filter(|text| !text.is_empty()).unwrap_or(ABSENT)
}

/// Result of comparing one expected response with one observed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonOutcome {
    pub success: bool,
    pub error: Option<String>,
    /// Field-level differences. `None` on success and on length mismatches.
    pub details: Option<Vec<FieldMismatch>>,
}

impl ComparisonOutcome {
    pub fn matched() -> Self {
        Self {
            success: true,
            error: None,
            details: None,
        }
    }

    fn mismatch(error: impl Into<String>, details: Option<Vec<FieldMismatch>>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            details,
        }
    }

    fn single(error: &str, field: &str, expected: &str, received: &str) -> Self {
        Self::mismatch(
            error,
            Some(vec![FieldMismatch::new(field, expected, received)]),
        )
    }

    /// Attaches the cursor position the comparison was made at.
    pub fn into_result(self, interaction_index: usize, response_index: usize) -> TestResult {
        TestResult {
            interaction_index,
            response_index,
            success: self.success,
            error: self.error,
            details: self.details,
        }
    }
}

/// An element of a per-kind option list.
pub trait OptionItem {
    /// Message kind this option shape belongs to.
    const KIND: MessageKind;

    /// Pushes one detail per differing field. `position` is 1-based.
    fn diff(&self, observed: &Self, position: usize, details: &mut Vec<FieldMismatch>);
}

impl OptionItem for ButtonOption {
    const KIND: MessageKind = MessageKind::Button;

    fn diff(&self, observed: &Self, position: usize, details: &mut Vec<FieldMismatch>) {
        if self.text != observed.text {
            details.push(FieldMismatch::new(
                format!("Button {position} text"),
                &self.text,
                &observed.text,
            ));
        }
    }
}

impl OptionItem for ListRow {
    const KIND: MessageKind = MessageKind::List;

    fn diff(&self, observed: &Self, position: usize, details: &mut Vec<FieldMismatch>) {
        if self.title != observed.title {
            details.push(FieldMismatch::new(
                format!("List item {position} title"),
                &self.title,
                &observed.title,
            ));
        }
        if self.description != observed.description {
            details.push(FieldMismatch::new(
                format!("List item {position} description"),
                &self.description,
                &observed.description,
            ));
        }
        if self.button_text != observed.button_text {
            details.push(FieldMismatch::new(
                format!("List item {position} button text"),
                or_absent(self.button_text.as_deref()),
                or_absent(observed.button_text.as_deref()),
            ));
        }
    }
}

impl OptionItem for InteractiveOption {
    const KIND: MessageKind = MessageKind::Interactive;

    fn diff(&self, observed: &Self, position: usize, details: &mut Vec<FieldMismatch>) {
        if self.display_text != observed.display_text {
            details.push(FieldMismatch::new(
                format!("Interactive option {position} display text"),
                &self.display_text,
                &observed.display_text,
            ));
        }
        if self.url != observed.url {
            details.push(FieldMismatch::new(
                format!("Interactive option {position} URL"),
                &self.url,
                &observed.url,
            ));
        }
    }
}

/// Compares two option lists position by position.
///
/// A length difference fails immediately without details. Otherwise every
/// differing field of every position is collected, in index order.
pub fn compare_option_sets<T: OptionItem>(expected: &[T], observed: &[T]) -> ComparisonOutcome {
    if expected.len() != observed.len() {
        return ComparisonOutcome::mismatch(
            format!(
                "Expected {} {}s but received {}",
                expected.len(),
                T::KIND,
                observed.len()
            ),
            None,
        );
    }

    let mut details = Vec::new();
    for (index, (want, got)) in expected.iter().zip(observed).enumerate() {
        want.diff(got, index + 1, &mut details);
    }

    if details.is_empty() {
        ComparisonOutcome::matched()
    } else {
        ComparisonOutcome::mismatch(format!("{} content mismatch", T::KIND), Some(details))
    }
}

/// Decides whether `observed` satisfies `expected`.
pub fn compare_response(expected: &ExpectedResponse, observed: &ObservedMessage) -> ComparisonOutcome {
    let expected_kind = expected.kind().as_str();
    if expected_kind != observed.kind_name() {
        return ComparisonOutcome::single(
            "Message type mismatch",
            "Message type",
            expected_kind,
            observed.kind_name(),
        );
    }

    if expected.text != observed.content {
        return ComparisonOutcome::single(
            "Message content mismatch",
            "Message text",
            &expected.text,
            &observed.content,
        );
    }

    if let Payload::List { button_text, .. } = &expected.payload
        && button_text.as_deref() != observed.button_text()
    {
        return ComparisonOutcome::single(
            "Button text mismatch",
            "Button text",
            or_absent(button_text.as_deref()),
            or_absent(observed.button_text()),
        );
    }

    let options = match (&expected.payload, &observed.payload) {
        (Payload::Button { options: Some(want) }, Payload::Button { options: got }) => {
            compare_option_sets(want, got.as_deref().unwrap_or_default())
        }
        (Payload::List { rows: Some(want), .. }, Payload::List { rows: got, .. }) => {
            compare_option_sets(want, got.as_deref().unwrap_or_default())
        }
        (
            Payload::Interactive { options: Some(want) },
            Payload::Interactive { options: got },
        ) => compare_option_sets(want, got.as_deref().unwrap_or_default()),
        // Text responses and responses without an option list stop here.
        _ => ComparisonOutcome::matched(),
    };

    if options.success {
        ComparisonOutcome::matched()
    } else {
        options
    }
}
