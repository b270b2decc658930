// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for testlens-core

use thiserror::Error;

/// Errors produced while decoding a single line of the test event stream
///
/// A decode error only ever describes one line. The stream keeps going.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The line is not valid JSON or has the wrong field types
    #[error("JSON parse error: {source} (line: {line})")]
    JsonParse {
        /// The offending line, shortened for diagnostics
        line: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// The record carries an action this decoder does not model
    #[error("Unsupported action: {action}")]
    UnsupportedAction {
        /// The action string found in the record
        action: String,
    },

    /// A record is missing a field required by its action
    #[error("Record with action '{action}' is missing field '{field}'")]
    MissingField {
        /// The action of the record
        action: &'static str,
        /// The missing field
        field: &'static str,
    },
}

impl DecodeError {
    pub(crate) fn json(line: &str, source: serde_json::Error) -> Self {
        const MAX: usize = 120;
        let line = match line.char_indices().nth(MAX) {
            Some((idx, _)) => format!("{}...", &line[..idx]),
            None => line.to_string(),
        };
        Self::JsonParse { line, source }
    }
}

/// Errors raised by the aggregation core
#[derive(Debug, Error)]
pub enum CoreError {
    /// Writing to the persistent log sink failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A flattened test id could not be split into group and case
    #[error("Invalid test id: {id}")]
    InvalidTestId {
        /// The id that was rejected
        id: String,
    },
}
