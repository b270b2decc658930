// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Per-run result stores
//!
//! Everything here lives for exactly one run. Starting a new run or clearing
//! results drops the whole store; nothing leaks between runs.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::failure::FailureRecord;
use crate::identity::TestId;
use crate::result::{TestResult, TestStatus};

/// Terminal counts for one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRollup {
    /// Cases with a terminal status
    pub total: usize,
    /// Passed cases
    pub passed: usize,
    /// Failed cases
    pub failed: usize,
    /// Skipped cases
    pub skipped: usize,
}

impl GroupRollup {
    /// Badge text such as `12/12 passed`
    #[must_use]
    pub fn badge(&self) -> String {
        format!("{}/{} passed", self.passed, self.total)
    }
}

/// `group → (case → terminal status)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStatusMap {
    groups: BTreeMap<String, BTreeMap<String, TestStatus>>,
}

impl GroupStatusMap {
    /// Record the terminal status of a test
    pub fn record(&mut self, id: &TestId, status: TestStatus) {
        let (group, case) = id.split();
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(case.to_string(), status);
    }

    /// Status of a single case
    #[must_use]
    pub fn status(&self, id: &TestId) -> Option<TestStatus> {
        let (group, case) = id.split();
        self.groups.get(group)?.get(case).copied()
    }

    /// Rollup for one group
    #[must_use]
    pub fn rollup(&self, group: &str) -> GroupRollup {
        let mut rollup = GroupRollup::default();
        if let Some(cases) = self.groups.get(group) {
            for status in cases.values() {
                rollup.total += 1;
                match status {
                    TestStatus::Pass => rollup.passed += 1,
                    TestStatus::Fail => rollup.failed += 1,
                    TestStatus::Skip => rollup.skipped += 1,
                }
            }
        }
        rollup
    }

    /// Groups with at least one terminal case, sorted
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }
}

/// Results, failure output and group rollups of the current run
#[derive(Debug, Default)]
pub struct RunStore {
    results: HashMap<TestId, TestResult>,
    failures: HashMap<TestId, FailureRecord>,
    groups: GroupStatusMap,
}

impl RunStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Result for an id, created on first use
    pub fn result_mut(&mut self, id: &TestId) -> &mut TestResult {
        self.results
            .entry(id.clone())
            .or_insert_with(|| TestResult::new(id.clone()))
    }

    /// Result for an id
    #[must_use]
    pub fn result(&self, id: &TestId) -> Option<&TestResult> {
        self.results.get(id)
    }

    /// All results, in no particular order
    pub fn results(&self) -> impl Iterator<Item = &TestResult> {
        self.results.values()
    }

    /// Number of results
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether no test has been seen
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Failure record for an id, created on first use
    pub fn failure_mut(&mut self, id: &TestId) -> &mut FailureRecord {
        self.failures.entry(id.clone()).or_default()
    }

    /// Failure record for an id
    #[must_use]
    pub fn failure(&self, id: &TestId) -> Option<&FailureRecord> {
        self.failures.get(id)
    }

    /// Drop the failure record of a test confirmed not to fail
    pub fn discard_failure(&mut self, id: &TestId) {
        self.failures.remove(id);
    }

    /// Number of failure records held
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Group rollups
    #[must_use]
    pub fn groups(&self) -> &GroupStatusMap {
        &self.groups
    }

    /// Mutable group rollups
    pub fn groups_mut(&mut self) -> &mut GroupStatusMap {
        &mut self.groups
    }

    /// Ids of every result held
    #[must_use]
    pub fn ids(&self) -> Vec<TestId> {
        self.results.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_rollup() {
        let mut map = GroupStatusMap::default();
        map.record(&TestId::new("a/b", "TestOne"), TestStatus::Pass);
        map.record(&TestId::new("a/b", "TestTwo"), TestStatus::Fail);
        map.record(&TestId::new("a/b", "TestThree"), TestStatus::Skip);
        map.record(&TestId::new("a/b", "TestTwo"), TestStatus::Pass);

        let rollup = map.rollup("a/b");
        assert_eq!(rollup.total, 3);
        assert_eq!(rollup.passed, 2);
        assert_eq!(rollup.skipped, 1);
        assert_eq!(rollup.badge(), "2/3 passed");
        assert_eq!(map.rollup("missing"), GroupRollup::default());
        assert_eq!(
            map.status(&TestId::new("a/b", "TestTwo")),
            Some(TestStatus::Pass)
        );
    }

    #[test]
    fn test_result_created_lazily_once() {
        let mut store = RunStore::new();
        let id = TestId::new("g", "TestA");
        store.result_mut(&id).ui_lines_emitted = 3;
        store.result_mut(&id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.result(&id).map(|r| r.ui_lines_emitted), Some(3));
    }

    #[test]
    fn test_failure_records_are_lazy() {
        let mut store = RunStore::new();
        let id = TestId::new("g", "TestA");
        assert!(store.failure(&id).is_none());
        store.failure_mut(&id).push("FAIL\n");
        assert_eq!(store.failure_count(), 1);
        store.discard_failure(&id);
        assert_eq!(store.failure_count(), 0);
    }
}
