//! Scripts and the test case document they are shipped in.

use serde::{Deserialize, Serialize};

use crate::message::ExpectedResponse;

/// One script step: a user message and the bot responses it should trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub user_message: String,
    #[serde(default)]
    pub expected_responses: Vec<ExpectedResponse>,
}

impl Interaction {
    pub fn new(user_message: impl Into<String>, expected_responses: Vec<ExpectedResponse>) -> Self {
        Self {
            user_message: user_message.into(),
            expected_responses,
        }
    }
}

/// Ordered interactions driven by the verification engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Script {
    interactions: Vec<Interaction>,
}

impl Script {
    pub fn new(interactions: Vec<Interaction>) -> Self {
        Self { interactions }
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn interaction(&self, index: usize) -> Option<&Interaction> {
        self.interactions.get(index)
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Total number of comparisons a fully passing run performs.
    pub fn expected_response_count(&self) -> usize {
        self.interactions
            .iter()
            .map(|i| i.expected_responses.len())
            .sum()
    }

    pub fn push(&mut self, interaction: Interaction) {
        self.interactions.push(interaction);
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Interaction> {
        self.interactions.last_mut()
    }
}

impl From<Vec<Interaction>> for Script {
    fn from(interactions: Vec<Interaction>) -> Self {
        Self::new(interactions)
    }
}

/// Import/export document wrapping a script with its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub interactions: Script,
}

impl TestCase {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            folder_id: None,
            interactions: Script::default(),
        }
    }

    pub fn script(&self) -> &Script {
        &self.interactions
    }

    /// Appends an expected response to the most recent interaction.
    ///
    /// Returns `false` when there is no interaction to attach it to.
    pub fn push_response(&mut self, response: ExpectedResponse) -> bool {
        match self.interactions.last_mut() {
            Some(interaction) => {
                interaction.expected_responses.push(response);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_reads_exported_document() {
        let case: TestCase = serde_json::from_value(json!({
            "id": "1712",
            "name": "Greeting",
            "folderId": "f1",
            "interactions": [
                {
                    "userMessage": "Hello",
                    "expectedResponses": [
                        { "from": "bot", "timestamp": 1, "type": "text",
                          "body": { "text": "Hi there!", "buttonText": null, "options": null } }
                    ]
                },
                { "userMessage": "Bye", "expectedResponses": [] }
            ]
        }))
        .unwrap();

        assert_eq!(case.folder_id.as_deref(), Some("f1"));
        assert_eq!(case.script().len(), 2);
        assert_eq!(case.script().expected_response_count(), 1);
        assert_eq!(
            case.script().interaction(0).unwrap().expected_responses[0].text,
            "Hi there!"
        );
    }

    #[test]
    fn push_response_needs_an_interaction() {
        let mut case = TestCase::new("1", "empty");
        assert!(!case.push_response(ExpectedResponse::text("orphan")));

        case.interactions.push(Interaction::new("Hi", vec![]));
        assert!(case.push_response(ExpectedResponse::text("Hello!")));
        assert_eq!(case.script().expected_response_count(), 1);
    }
}
