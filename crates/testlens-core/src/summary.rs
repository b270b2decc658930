// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! End-of-run summary
//!
//! Built from the run store once the run has ended. Failed tests come first,
//! then passed, then skipped; groups are sorted and tests keep discovery
//! order.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::identity::TestCatalog;
use crate::result::{TestResult, TestStatus};
use crate::store::{GroupRollup, RunStore};

const BANNER: &str = "==================== Test Summary ====================";

/// Which tests the summary lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFilter {
    /// Every terminal test
    #[default]
    All,
    /// Only failed tests
    Failed,
    /// Only passed tests
    Passed,
    /// Only skipped tests
    Skipped,
}

impl OutputFilter {
    /// Whether a status is shown under this filter
    #[must_use]
    pub fn shows(self, status: TestStatus) -> bool {
        matches!(
            (self, status),
            (Self::All, _)
                | (Self::Failed, TestStatus::Fail)
                | (Self::Passed, TestStatus::Pass)
                | (Self::Skipped, TestStatus::Skip)
        )
    }
}

impl FromStr for OutputFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "failed" | "fail" => Ok(Self::Failed),
            "passed" | "pass" => Ok(Self::Passed),
            "skipped" | "skip" => Ok(Self::Skipped),
            other => Err(format!(
                "unknown filter '{other}' (expected all, failed, passed or skipped)"
            )),
        }
    }
}

/// Supplies the summary filter chosen by the user
pub trait OutputFilterPolicy {
    /// The filter to apply now
    fn output_filter(&self) -> OutputFilter;
}

impl OutputFilterPolicy for OutputFilter {
    fn output_filter(&self) -> OutputFilter {
        *self
    }
}

/// One test line in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestLine {
    /// Case name
    pub name: String,
    /// Terminal status
    pub status: TestStatus,
    /// Elapsed milliseconds
    pub elapsed_ms: Option<u64>,
    /// Human-friendly duration
    pub duration: String,
    /// Retained failure output (failed tests only)
    pub output: Vec<String>,
    /// Whether `output` lost its head
    pub truncated: bool,
}

/// Tests of one group within a status section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSection {
    /// Group name
    pub group: String,
    /// Rollup across all statuses for this group
    pub rollup: GroupRollup,
    /// Tests in discovery order
    pub tests: Vec<TestLine>,
}

/// All groups for one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSection {
    /// Status of every test in the section
    pub status: TestStatus,
    /// Groups sorted by name
    pub groups: Vec<GroupSection>,
}

impl StatusSection {
    /// Number of tests in the section
    #[must_use]
    pub fn count(&self) -> usize {
        self.groups.iter().map(|g| g.tests.len()).sum()
    }
}

/// Aggregated, deduplicated results of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Tests that reached a terminal state
    pub total: usize,
    /// Passed tests
    pub passed: usize,
    /// Failed tests
    pub failed: usize,
    /// Skipped tests
    pub skipped: usize,
    /// Filter applied to the sections
    pub filter: OutputFilter,
    /// Sections in display order
    pub sections: Vec<StatusSection>,
}

impl Summary {
    /// Build a summary from the run store
    #[must_use]
    pub fn build(store: &RunStore, catalog: &TestCatalog, filter: OutputFilter) -> Self {
        let finished: Vec<&TestResult> = store.results().filter(|r| r.is_finished()).collect();
        let count = |status| finished.iter().filter(|r| r.status == status).count();

        let mut summary = Self {
            total: finished.len(),
            passed: count(TestStatus::Pass),
            failed: count(TestStatus::Fail),
            skipped: count(TestStatus::Skip),
            filter,
            sections: Vec::new(),
        };

        for status in [TestStatus::Fail, TestStatus::Pass, TestStatus::Skip] {
            if !filter.shows(status) {
                continue;
            }

            let mut matching: Vec<&TestResult> = finished
                .iter()
                .copied()
                .filter(|r| r.status == status)
                .collect();
            if matching.is_empty() {
                continue;
            }

            matching.sort_by(|a, b| {
                a.id.group().cmp(b.id.group()).then_with(|| {
                    let ia = catalog.discovery_index(&a.id).unwrap_or(usize::MAX);
                    let ib = catalog.discovery_index(&b.id).unwrap_or(usize::MAX);
                    ia.cmp(&ib).then_with(|| a.id.case().cmp(b.id.case()))
                })
            });

            let mut groups: Vec<GroupSection> = Vec::new();
            for result in matching {
                let group = result.id.group();
                if groups.last().is_none_or(|g| g.group != group) {
                    groups.push(GroupSection {
                        group: group.to_string(),
                        rollup: store.groups().rollup(group),
                        tests: Vec::new(),
                    });
                }
                if let Some(section) = groups.last_mut() {
                    section.tests.push(test_line(store, result));
                }
            }

            summary.sections.push(StatusSection { status, groups });
        }

        summary
    }

    /// Whether no test failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Aggregate counts line
    #[must_use]
    pub fn counts_line(&self) -> String {
        format!(
            "Total: {} | Passed: {} | Failed: {} | Skipped: {}",
            self.total, self.passed, self.failed, self.skipped
        )
    }

    /// Render the human-readable report
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{BANNER}");
        let _ = writeln!(out, "{}", self.counts_line());

        for section in &self.sections {
            let _ = writeln!(out);
            let _ = writeln!(out, "--- {} ({}) ---", section.status.label(), section.count());
            for group in &section.groups {
                let n = group.tests.len();
                let _ = writeln!(
                    out,
                    "{} ({} {}, {})",
                    group.group,
                    n,
                    if n == 1 { "test" } else { "tests" },
                    group.rollup.badge()
                );
                for test in &group.tests {
                    if test.duration.is_empty() {
                        let _ = writeln!(out, "  {} {}", test.status.marker(), test.name);
                    } else {
                        let _ = writeln!(
                            out,
                            "  {} {} ({})",
                            test.status.marker(),
                            test.name,
                            test.duration
                        );
                    }
                    if test.truncated {
                        let _ = writeln!(out, "      {}", crate::failure::TRUNCATED_NOTICE);
                    }
                    for line in &test.output {
                        let _ = writeln!(out, "      {line}");
                    }
                }
            }
        }

        out
    }
}

fn test_line(store: &RunStore, result: &TestResult) -> TestLine {
    let (output, truncated) = match (result.status, store.failure(&result.id)) {
        (TestStatus::Fail, Some(record)) => (
            record.lines().map(str::to_string).collect(),
            record.truncated(),
        ),
        _ => (Vec::new(), false),
    };

    TestLine {
        name: result.display_name.clone(),
        status: result.status,
        elapsed_ms: result.elapsed_ms(),
        duration: result.duration_display(),
        output,
        truncated,
    }
}
