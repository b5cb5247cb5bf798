//! Loading, saving, and validating test case documents.
//!
//! Test cases are exchanged as JSON. A file holds either a single test case
//! or an array of them; both forms load into a `Vec<TestCase>`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chatprobe_proto::{Script, TestCase};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors raised while reading or writing test case files.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize test cases: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("no test case matching '{0}'")]
    NotFound(String),

    #[error("invalid script: {}", format_issues(.0))]
    Invalid(Vec<ScriptIssue>),
}

/// Something wrong with a script.
///
/// `EmptyUserMessage` is only a warning: the empty string is still sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptIssue {
    /// The script has no interactions at all.
    Empty,
    /// Interaction at this index has a blank user message.
    EmptyUserMessage { interaction: usize },
    /// Interaction at this index expects no bot response.
    NoExpectedResponses { interaction: usize },
}

impl fmt::Display for ScriptIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptIssue::Empty => write!(f, "script has no interactions"),
            ScriptIssue::EmptyUserMessage { interaction } => {
                write!(f, "interaction {} has an empty user message", interaction + 1)
            }
            ScriptIssue::NoExpectedResponses { interaction } => {
                write!(f, "interaction {} expects no responses", interaction + 1)
            }
        }
    }
}

fn format_issues(issues: &[ScriptIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks that a script can be driven to completion.
///
/// Reports every problem found rather than stopping at the first one.
pub fn validate(script: &Script) -> Result<(), Vec<ScriptIssue>> {
    let mut issues = Vec::new();

    if script.is_empty() {
        issues.push(ScriptIssue::Empty);
    }

    for (index, interaction) in script.interactions().iter().enumerate() {
        if interaction.expected_responses.is_empty() {
            issues.push(ScriptIssue::NoExpectedResponses { interaction: index });
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TestCaseDocument {
    Many(Vec<TestCase>),
    One(Box<TestCase>),
}

/// Problems that do not stop a run but are probably authoring mistakes.
pub fn warnings(script: &Script) -> Vec<ScriptIssue> {
    script
        .interactions()
        .iter()
        .enumerate()
        .filter(|(_, interaction)| interaction.user_message.trim().is_empty())
        .map(|(index, _)| ScriptIssue::EmptyUserMessage { interaction: index })
        .collect()
}

/// Parses test cases from a JSON string.
pub fn parse_test_cases(json: &str, origin: &Path) -> Result<Vec<TestCase>, ScriptError> {
    let document: TestCaseDocument =
        serde_json::from_str(json).map_err(|source| ScriptError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;

    Ok(match document {
        TestCaseDocument::Many(cases) => cases,
        TestCaseDocument::One(case) => vec![*case],
    })
}

/// Reads every test case stored in `path`.
pub fn load_test_cases(path: &Path) -> Result<Vec<TestCase>, ScriptError> {
    let json = fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cases = parse_test_cases(&json, path)?;
    debug!(path = %path.display(), count = cases.len(), "Loaded test cases");
    Ok(cases)
}

/// Writes test cases as pretty-printed JSON, one case unwrapped.
pub fn save_test_cases(path: &Path, cases: &[TestCase]) -> Result<(), ScriptError> {
    let json = match cases {
        [single] => serde_json::to_string_pretty(single),
        many => serde_json::to_string_pretty(many),
    }
    .map_err(ScriptError::Serialize)?;

    fs::write(path, json + "\n").map_err(|source| ScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), count = cases.len(), "Saved test cases");
    Ok(())
}

/// Picks a test case by id, then by case-insensitive name.
///
/// With no selector, a document holding exactly one case yields that case.
pub fn select_test_case(
    cases: Vec<TestCase>,
    selector: Option<&str>,
) -> Result<TestCase, ScriptError> {
    let Some(selector) = selector else {
        let mut cases = cases;
        return match cases.len() {
            1 => Ok(cases.remove(0)),
            n => Err(ScriptError::NotFound(format!(
                "<unspecified> ({n} cases in file, pass a test id or name)"
            ))),
        };
    };

    let wanted = selector.to_lowercase();
    let mut by_name = None;
    for case in cases {
        if case.id == selector {
            return Ok(case);
        }
        if by_name.is_none() && case.name.to_lowercase() == wanted {
            by_name = Some(case);
        }
    }
    by_name.ok_or_else(|| ScriptError::NotFound(selector.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatprobe_proto::{ButtonOption, ExpectedResponse, Interaction, ListRow};
    use tempfile::TempDir;

    fn greeting_case() -> TestCase {
        let mut case = TestCase::new("1712", "Greeting");
        case.interactions.push(Interaction::new(
            "Hello",
            vec![
                ExpectedResponse::text("Hi there!"),
                ExpectedResponse::buttons(
                    "Need anything?",
                    vec![ButtonOption::new("y", "Yes"), ButtonOption::new("n", "No")],
                ),
            ],
        ));
        case.interactions.push(Interaction::new(
            "Yes",
            vec![ExpectedResponse::list(
                "Pick one",
                None,
                vec![ListRow::new("A", "first").with_button_text("Choose")],
            )],
        ));
        case
    }

    #[test]
    fn valid_script_passes() {
        assert_eq!(validate(greeting_case().script()), Ok(()));
    }

    #[test]
    fn validation_reports_every_issue() {
        let script = Script::new(vec![
            Interaction::new("  ", vec![]),
            Interaction::new("ok", vec![ExpectedResponse::text("fine")]),
            Interaction::new("again", vec![]),
        ]);

        assert_eq!(
            validate(&script),
            Err(vec![
                ScriptIssue::NoExpectedResponses { interaction: 0 },
                ScriptIssue::NoExpectedResponses { interaction: 2 },
            ])
        );
    }

    #[test]
    fn blank_user_message_is_only_a_warning() {
        let script = Script::new(vec![
            Interaction::new("", vec![ExpectedResponse::text("Welcome!")]),
            Interaction::new("menu", vec![ExpectedResponse::text("Here it is")]),
        ]);

        assert_eq!(validate(&script), Ok(()));
        assert_eq!(
            warnings(&script),
            vec![ScriptIssue::EmptyUserMessage { interaction: 0 }]
        );
    }

    #[test]
    fn empty_script_is_invalid() {
        let err = validate(&Script::default()).unwrap_err();
        assert_eq!(err, vec![ScriptIssue::Empty]);
        assert_eq!(
            ScriptError::Invalid(err).to_string(),
            "invalid script: script has no interactions"
        );
    }

    #[test]
    fn saved_case_loads_back_identically() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("greeting.json");
        let case = greeting_case();

        save_test_cases(&path, std::slice::from_ref(&case)).unwrap();
        let loaded = load_test_cases(&path).unwrap();

        assert_eq!(loaded, vec![case]);
    }

    #[test]
    fn arrays_of_cases_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("suite.json");
        let mut second = greeting_case();
        second.id = "1713".into();
        second.name = "Second".into();

        save_test_cases(&path, &[greeting_case(), second]).unwrap();
        let loaded = load_test_cases(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].name, "Second");
    }

    #[test]
    fn malformed_file_reports_path() {
        let err = parse_test_cases("{ not json", Path::new("broken.json")).unwrap_err();
        assert!(matches!(err, ScriptError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_test_cases(Path::new("/nonexistent/chatprobe/case.json")).unwrap_err();
        assert!(matches!(err, ScriptError::Io { .. }));
    }

    #[test]
    fn select_by_id_or_name() {
        let mut other = greeting_case();
        other.id = "2".into();
        other.name = "Checkout".into();
        let cases = vec![greeting_case(), other];

        assert_eq!(select_test_case(cases.clone(), Some("2")).unwrap().name, "Checkout");
        assert_eq!(select_test_case(cases.clone(), Some("greeting")).unwrap().id, "1712");
        assert!(matches!(
            select_test_case(cases.clone(), Some("missing")),
            Err(ScriptError::NotFound(_))
        ));
        assert!(select_test_case(cases, None).is_err());
    }

    #[test]
    fn single_case_needs_no_selector() {
        let case = select_test_case(vec![greeting_case()], None).unwrap();
        assert_eq!(case.id, "1712");
    }
}
