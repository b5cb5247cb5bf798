use serde::{Deserialize, Serialize};

/// One field that differed between the expected and the observed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMismatch {
    /// Human-readable, 1-based label such as `"List item 2 title"`.
    pub field: String,
    pub expected: String,
    pub received: String,
}

impl FieldMismatch {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            received: received.into(),
        }
    }
}

/// Outcome of a single comparison performed during a run.
///
/// Entries are appended to the result log in the order comparisons happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub interaction_index: usize,
    pub response_index: usize,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldMismatch>>,
}

impl TestResult {
    pub fn passed(interaction_index: usize, response_index: usize) -> Self {
        Self {
            interaction_index,
            response_index,
            success: true,
            error: None,
            details: None,
        }
    }

    pub fn failed(
        interaction_index: usize,
        response_index: usize,
        error: impl Into<String>,
        details: Option<Vec<FieldMismatch>>,
    ) -> Self {
        Self {
            interaction_index,
            response_index,
            success: false,
            error: Some(error.into()),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passed_result_omits_error_fields() {
        let value = serde_json::to_value(TestResult::passed(0, 1)).unwrap();
        assert_eq!(
            value,
            json!({ "interactionIndex": 0, "responseIndex": 1, "success": true })
        );
    }

    #[test]
    fn failed_result_carries_details() {
        let result = TestResult::failed(
            1,
            0,
            "Message content mismatch",
            Some(vec![FieldMismatch::new("Message text", "Hi there!", "Hey!")]),
        );

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["error"], "Message content mismatch");
        assert_eq!(value["details"][0]["field"], "Message text");
        assert_eq!(value["details"][0]["received"], "Hey!");
    }
}
