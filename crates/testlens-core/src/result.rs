// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Test result types

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::identity::TestId;

/// Terminal status of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Test passed
    Pass,
    /// Test failed
    Fail,
    /// Test was skipped
    Skip,
}

impl TestStatus {
    /// Label used in summaries
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pass => "Passed",
            Self::Fail => "Failed",
            Self::Skip => "Skipped",
        }
    }

    /// Marker printed in front of a test line
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            Self::Pass => "✓",
            Self::Fail => "✗",
            Self::Skip => "○",
        }
    }
}

/// Lifecycle position of a test within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Seen but not yet running
    Pending,
    /// A `run` record arrived
    Running,
    /// A terminal record arrived
    Finished,
}

/// Per-test state for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Logical id
    pub id: TestId,
    /// Name shown to the user
    pub display_name: String,
    /// Current status; provisional `Pass` until told otherwise
    pub status: TestStatus,
    /// Lifecycle position
    pub lifecycle: Lifecycle,
    /// Elapsed time reported by the toolchain
    pub elapsed: Option<Duration>,
    /// Output lines forwarded to the live sink so far
    pub ui_lines_emitted: usize,
}

impl TestResult {
    /// Create a pending result for an id
    #[must_use]
    pub fn new(id: TestId) -> Self {
        let display_name = id.case().to_string();
        Self {
            id,
            display_name,
            status: TestStatus::Pass,
            lifecycle: Lifecycle::Pending,
            elapsed: None,
            ui_lines_emitted: 0,
        }
    }

    /// Whether a terminal record has been applied
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.lifecycle == Lifecycle::Finished
    }

    /// Finished and passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.is_finished() && self.status == TestStatus::Pass
    }

    /// Finished and failed
    #[must_use]
    pub fn failed(&self) -> bool {
        self.is_finished() && self.status == TestStatus::Fail
    }

    /// Elapsed time in whole milliseconds
    #[must_use]
    pub fn elapsed_ms(&self) -> Option<u64> {
        self.elapsed.map(|d| d.as_millis() as u64)
    }

    /// Human-friendly duration (`5ms`, `2.50s`), empty if unknown
    #[must_use]
    pub fn duration_display(&self) -> String {
        match self.elapsed {
            None => String::new(),
            Some(d) if d.as_millis() < 1000 => format!("{}ms", d.as_millis()),
            Some(d) => format!("{:.2}s", d.as_secs_f64()),
        }
    }
}

/// Convert toolchain seconds to a duration, ignoring nonsense values
#[must_use]
pub fn elapsed_from_secs(secs: Option<f64>) -> Option<Duration> {
    secs.and_then(|s| Duration::try_from_secs_f64(s).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_result_is_provisional_pass() {
        let result = TestResult::new(TestId::new("pkg/a", "TestOne"));
        assert_eq!(result.status, TestStatus::Pass);
        assert_eq!(result.lifecycle, Lifecycle::Pending);
        assert_eq!(result.display_name, "TestOne");
        assert!(!result.passed(), "pending tests are not counted as passed");
    }

    #[test]
    fn test_duration_display() {
        let mut result = TestResult::new(TestId::new("g", "TestFast"));
        assert_eq!(result.duration_display(), "");
        result.elapsed = Some(Duration::from_millis(5));
        assert_eq!(result.duration_display(), "5ms");
        result.elapsed = Some(Duration::from_millis(2500));
        assert_eq!(result.duration_display(), "2.50s");
        result.elapsed = Some(Duration::from_millis(1000));
        assert_eq!(result.duration_display(), "1.00s");
    }

    #[test]
    fn test_elapsed_from_secs() {
        assert_eq!(elapsed_from_secs(Some(0.02)).map(|d| d.as_millis()), Some(20));
        assert_eq!(elapsed_from_secs(Some(-1.0)), None);
        assert_eq!(elapsed_from_secs(Some(f64::NAN)), None);
        assert_eq!(elapsed_from_secs(None), None);
    }
}
