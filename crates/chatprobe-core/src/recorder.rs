//! Records a live conversation into a replayable test case.
//!
//! Every user message opens a new interaction. Bot messages become the
//! expected responses of the interaction they follow.

use chatprobe_proto::{Interaction, MessageId, ObservedMessage, TestCase};
use chrono::Utc;
use tracing::{debug, warn};

/// Name given to freshly recorded test cases.
pub const RECORDING_NAME: &str = "New Test (Recording)";

/// Builds a [`TestCase`] from the traffic of a conversation.
#[derive(Debug)]
pub struct ScriptRecorder {
    case: TestCase,
    last_seen: Option<MessageId>,
}

impl ScriptRecorder {
    /// Starts an empty recording, identified by the current time in milliseconds.
    pub fn new() -> Self {
        Self::with_case(TestCase::new(
            Utc::now().timestamp_millis().to_string(),
            RECORDING_NAME,
        ))
    }

    /// Starts recording into an existing (usually empty) test case.
    pub fn with_case(case: TestCase) -> Self {
        Self {
            case,
            last_seen: None,
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.case.name = name.into();
    }

    /// Records a message the tester sent.
    pub fn record_user_message(&mut self, text: impl Into<String>) {
        let text = text.into();
        debug!(text = %text, "Recorded user message");
        self.case.interactions.push(Interaction::new(text, Vec::new()));
    }

    /// Records a bot message. Returns `false` when it was not recorded.
    ///
    /// Messages that arrive before the first user message have no interaction
    /// to belong to, and re-delivered messages were recorded already.
    pub fn record_bot_message(&mut self, message: &ObservedMessage) -> bool {
        if self.last_seen.is_some_and(|last| message.id <= last) {
            return false;
        }
        self.last_seen = Some(message.id);

        let Some(expected) = message.to_expected() else {
            warn!(id = %message.id, kind = message.kind_name(), "Skipped bot message of unsupported type");
            return false;
        };
        let recorded = self.case.push_response(expected);
        if !recorded {
            debug!(id = %message.id, "Dropped bot message received before any user message");
        }
        recorded
    }

    pub fn interaction_count(&self) -> usize {
        self.case.script().len()
    }

    pub fn case(&self) -> &TestCase {
        &self.case
    }

    /// Ends the recording and returns the test case.
    pub fn finish(self) -> TestCase {
        self.case
    }
}

impl Default for ScriptRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::compare_response;
    use crate::scripts::validate;
    use crate::testing::{observed, observed_text};
    use chatprobe_proto::{ButtonOption, MessageKind, Payload};

    #[test]
    fn conversation_becomes_interactions() {
        let mut recorder = ScriptRecorder::new();
        recorder.record_user_message("Hello");
        assert!(recorder.record_bot_message(&observed_text(1, "Hi there!")));
        let menu = observed(
            2,
            "Need help?",
            Payload::Button {
                options: Some(vec![ButtonOption::new("y", "Yes")]),
            },
        );
        assert!(recorder.record_bot_message(&menu));
        recorder.record_user_message("Yes");
        assert!(recorder.record_bot_message(&observed_text(3, "Great")));

        let case = recorder.finish();
        assert_eq!(case.name, RECORDING_NAME);
        assert_eq!(case.script().len(), 2);
        assert_eq!(case.script().expected_response_count(), 3);
        assert_eq!(validate(case.script()), Ok(()));

        let recorded = &case.script().interaction(0).unwrap().expected_responses[1];
        assert_eq!(recorded.kind(), MessageKind::Button);
        assert!(compare_response(recorded, &menu).success);
    }

    #[test]
    fn greeting_before_first_user_message_is_dropped() {
        let mut recorder = ScriptRecorder::new();
        assert!(!recorder.record_bot_message(&observed_text(1, "Welcome!")));
        assert_eq!(recorder.interaction_count(), 0);
    }

    #[test]
    fn unsupported_kinds_are_not_recorded() {
        let mut recorder = ScriptRecorder::new();
        recorder.record_user_message("Hello");
        let sticker = observed_text(1, "").with_unsupported_kind("sticker");

        assert!(!recorder.record_bot_message(&sticker));
        assert!(recorder.record_bot_message(&observed_text(2, "Hi")));
        assert_eq!(recorder.case().script().expected_response_count(), 1);
    }

    #[test]
    fn duplicates_are_recorded_once() {
        let mut recorder = ScriptRecorder::new();
        recorder.record_user_message("Hello");
        let reply = observed_text(4, "Hi");
        assert!(recorder.record_bot_message(&reply));
        assert!(!recorder.record_bot_message(&reply));
        assert_eq!(recorder.case().script().expected_response_count(), 1);
    }

    #[test]
    fn rename_changes_case_name() {
        let mut recorder = ScriptRecorder::with_case(TestCase::new("7", "draft"));
        recorder.rename("Checkout flow");
        assert_eq!(recorder.finish().name, "Checkout flow");
    }
}
