// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Structured test events
//!
//! The toolchain writes one JSON object per line (`go test -json`):
//!
//! ```text
//! {"Action":"run","Package":"example.com/pkg/a","Test":"TestOne"}
//! {"Action":"output","Package":"example.com/pkg/a","Test":"TestOne","Output":"--- FAIL: TestOne\n"}
//! {"Action":"fail","Package":"example.com/pkg/a","Test":"TestOne","Elapsed":0.02}
//! ```
//!
//! Each line becomes a [`TestEvent`], a tagged enum whose variants carry only
//! the fields their action needs.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

// ============================================================================
// Event Types
// ============================================================================

/// The `(group, case)` pair an event refers to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestRef {
    /// Group (package) path, may itself contain `/`
    pub group: String,
    /// Case (test function) name, may contain `/` for sub-cases
    pub case: String,
}

impl TestRef {
    /// Create a new reference
    #[must_use]
    pub fn new(group: impl Into<String>, case: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            case: case.into(),
        }
    }
}

/// A single decoded test event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TestEvent {
    /// A test started running
    Run {
        /// Test the event belongs to
        test: TestRef,
    },
    /// A test passed
    Pass {
        /// Test the event belongs to
        test: TestRef,
        /// Elapsed time in seconds
        elapsed: Option<f64>,
    },
    /// A test failed
    Fail {
        /// Test the event belongs to
        test: TestRef,
        /// Elapsed time in seconds
        elapsed: Option<f64>,
    },
    /// A test was skipped
    Skip {
        /// Test the event belongs to
        test: TestRef,
        /// Elapsed time in seconds
        elapsed: Option<f64>,
    },
    /// A chunk of output text
    Output {
        /// Test the output belongs to; `None` for process-level output
        test: Option<TestRef>,
        /// The output text, usually one line including its newline
        text: String,
    },
    /// A well-formed toolchain record that changes no test state
    ///
    /// Package start and end markers, `pause`/`cont` of parallel tests,
    /// `build-fail` and similar.
    Ignored {
        /// The record's action as written by the toolchain
        kind: String,
        /// Package the record names, if any
        group: Option<String>,
    },
}

impl TestEvent {
    /// The test this event refers to, if any
    #[must_use]
    pub fn test(&self) -> Option<&TestRef> {
        match self {
            Self::Run { test }
            | Self::Pass { test, .. }
            | Self::Fail { test, .. }
            | Self::Skip { test, .. } => Some(test),
            Self::Output { test, .. } => test.as_ref(),
            Self::Ignored { .. } => None,
        }
    }

    /// Short lowercase name of the action
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Pass { .. } => "pass",
            Self::Fail { .. } => "fail",
            Self::Skip { .. } => "skip",
            Self::Output { .. } => "output",
            Self::Ignored { .. } => "ignored",
        }
    }
}

// ============================================================================
// Wire Record
// ============================================================================

/// A raw record as written by the toolchain
///
/// Field names follow `go test -json`; the lower-case aliases allow the same
/// decoder to read streams written by other emitters. Build records name
/// their package in `ImportPath` instead of `Package`.
#[derive(Debug, Clone, Deserialize)]
struct RawRecord {
    #[serde(rename = "Action", alias = "action")]
    action: String,
    #[serde(rename = "Package", alias = "group", default)]
    package: Option<String>,
    #[serde(rename = "ImportPath", default)]
    import_path: Option<String>,
    #[serde(rename = "Test", alias = "case", default)]
    test: Option<String>,
    #[serde(rename = "Output", alias = "text", default)]
    output: Option<String>,
    #[serde(rename = "Elapsed", alias = "elapsed", default)]
    elapsed: Option<f64>,
}

impl RawRecord {
    fn test_ref(&self, action: &'static str) -> Result<TestRef, DecodeError> {
        let group = non_empty(&self.package).ok_or(DecodeError::MissingField {
            action,
            field: "Package",
        })?;
        let case = non_empty(&self.test).ok_or(DecodeError::MissingField {
            action,
            field: "Test",
        })?;
        Ok(TestRef::new(group, case))
    }

    fn ignored(&self) -> TestEvent {
        TestEvent::Ignored {
            kind: self.action.clone(),
            group: non_empty(&self.package)
                .or(non_empty(&self.import_path))
                .map(str::to_string),
        }
    }

    /// `pass`/`fail`/`skip` without a test closes the package itself
    fn is_package_level(&self) -> bool {
        non_empty(&self.package).is_some() && non_empty(&self.test).is_none()
    }
}

/// Actions the toolchain writes that carry no per-test state
const IGNORED_ACTIONS: &[&str] = &["start", "pause", "cont", "bench", "build-fail"];

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl TryFrom<RawRecord> for TestEvent {
    type Error = DecodeError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        match raw.action.as_str() {
            "pass" | "fail" | "skip" if raw.is_package_level() => Ok(raw.ignored()),
            action if IGNORED_ACTIONS.contains(&action) => Ok(raw.ignored()),
            "build-output" => {
                // Compiler diagnostics; the package did not build.
                let text = raw.output.ok_or(DecodeError::MissingField {
                    action: "build-output",
                    field: "Output",
                })?;
                Ok(Self::Output { test: None, text })
            }
            "run" => Ok(Self::Run {
                test: raw.test_ref("run")?,
            }),
            "pass" => Ok(Self::Pass {
                test: raw.test_ref("pass")?,
                elapsed: raw.elapsed,
            }),
            "fail" => Ok(Self::Fail {
                test: raw.test_ref("fail")?,
                elapsed: raw.elapsed,
            }),
            "skip" => Ok(Self::Skip {
                test: raw.test_ref("skip")?,
                elapsed: raw.elapsed,
            }),
            "output" => {
                // A package without a test is process-level chatter.
                let test = match (non_empty(&raw.package), non_empty(&raw.test)) {
                    (Some(group), Some(case)) => Some(TestRef::new(group, case)),
                    _ => None,
                };
                let text = raw.output.ok_or(DecodeError::MissingField {
                    action: "output",
                    field: "Output",
                })?;
                Ok(Self::Output { test, text })
            }
            other => Err(DecodeError::UnsupportedAction {
                action: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Parsing Functions
// ============================================================================

/// Decode a single line of the event stream
///
/// # Errors
///
/// Returns `DecodeError::JsonParse` if the line is not a JSON record,
/// `DecodeError::UnsupportedAction` for actions the toolchain is not known to
/// write and `DecodeError::MissingField` if a required field is absent.
pub fn decode_line(line: &str) -> Result<TestEvent, DecodeError> {
    let raw: RawRecord =
        serde_json::from_str(line.trim()).map_err(|e| DecodeError::json(line, e))?;
    TestEvent::try_from(raw)
}

/// Decode a complete saved stream
///
/// Bad lines do not stop decoding; they are returned alongside the events.
#[must_use]
pub fn decode_all(output: &str) -> (Vec<TestEvent>, Vec<DecodeError>) {
    let mut events = Vec::new();
    let mut errors = Vec::new();

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match decode_line(line) {
            Ok(event) => events.push(event),
            Err(e) => errors.push(e),
        }
    }

    (events, errors)
}
