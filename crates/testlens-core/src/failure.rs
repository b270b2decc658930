// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Failure output retention and failure locations
//!
//! Output is only kept in memory for tests that look like they are failing.
//! The check is a plain pattern match and is approximate: a test that fails
//! without printing any recognised marker keeps no output here, though the
//! persistent log still has all of it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use lsp_types::{Position, Range};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum number of lines retained per failing test
pub const MAX_FAILURE_LINES: usize = 500;

/// Notice prefixed to a failure message whose head was evicted
pub const TRUNCATED_NOTICE: &str = "[truncated] earlier output was dropped";

/// Literal markers that suggest output belongs to a failure
const FAILURE_MARKERS: &[&str] = &[
    "FAIL",
    "panic:",
    "fatal error:",
    "Error:",
    "Error Trace:",
    "error:",
    "expected",
    "got:",
    "want:",
];

/// `file.go:12` style frames, optionally with a column
static STACK_FRAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\S+\.go:\d+").expect("valid stack frame pattern")
});

/// Goroutine dump headers such as `goroutine 7 [running]:`
static GOROUTINE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^goroutine \d+ \[[^\]]+\]").expect("valid goroutine pattern")
});

/// `<path>.<source ext>:<line>` anywhere in a line
static SOURCE_LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"((?:[A-Za-z]:[\\/])?[A-Za-z0-9_\-./\\]*?[A-Za-z0-9_\-]+\.(?:go|s|c|h|cc|cpp|rs)):(\d+)")
        .expect("valid source location pattern")
});

/// Whether a chunk of output looks like it belongs to a failing test
#[must_use]
pub fn looks_like_failure(text: &str) -> bool {
    if FAILURE_MARKERS.iter().any(|marker| text.contains(marker)) {
        return true;
    }
    text.lines().any(|line| {
        let line = line.trim_start();
        GOROUTINE_HEADER.is_match(line) || STACK_FRAME.is_match(line)
    })
}

/// Bounded, tail-preserving store of a failing test's output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    lines: VecDeque<String>,
    truncated: bool,
}

impl FailureRecord {
    /// Create an empty record
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append output text, one entry per line; oldest lines are evicted
    pub fn push(&mut self, text: &str) {
        for line in text.lines() {
            if self.lines.len() == MAX_FAILURE_LINES {
                self.lines.pop_front();
                self.truncated = true;
            }
            self.lines.push_back(line.to_string());
        }
    }

    /// Retained lines, oldest first
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Number of retained lines
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing was retained
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Whether lines were evicted
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Render the retained output as a failure message
    #[must_use]
    pub fn message(&self) -> String {
        let mut message = String::new();
        if self.truncated {
            message.push_str(TRUNCATED_NOTICE);
            message.push('\n');
        }
        for line in &self.lines {
            message.push_str(line);
            message.push('\n');
        }
        message
    }
}

/// A clickable location inside a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureLocation {
    /// Absolute (or workspace-resolved) path
    pub file: PathBuf,
    /// Zero-indexed range covering the start of the reported line
    pub range: Range,
}

impl FailureLocation {
    /// One-indexed line number, as printed by the toolchain
    #[must_use]
    pub fn line(&self) -> u32 {
        self.range.start.line + 1
    }
}

/// Find the first `<file>:<line>` reference in failure text
///
/// Relative paths are resolved against `workspace_root`. Toolchain line
/// numbers are 1-indexed; the returned position is 0-indexed.
#[must_use]
pub fn extract_location(text: &str, workspace_root: &Path) -> Option<FailureLocation> {
    text.lines().find_map(|line| {
        SOURCE_LOCATION.captures_iter(line).find_map(|caps| {
            let path = caps.get(1)?.as_str();
            let line_no: u32 = caps.get(2)?.as_str().parse().ok()?;
            let line_no = line_no.checked_sub(1)?;

            let path = Path::new(path);
            let file = if path.is_absolute() {
                path.to_path_buf()
            } else {
                workspace_root.join(path)
            };
            let position = Position::new(line_no, 0);
            Some(FailureLocation {
                file,
                range: Range::new(position, position),
            })
        })
    })
}
