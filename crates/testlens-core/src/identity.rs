// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Test identities and the discovery catalog
//!
//! A test is identified by `group + "/" + case`. Groups are package paths and
//! routinely contain `/` themselves, so a flattened id is always split on its
//! **last** separator.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::event::TestRef;

/// Separator between group and case in a flattened id
pub const SEPARATOR: char = '/';

/// Stable logical key of a test
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    /// Compose an id from a group and a case
    #[must_use]
    pub fn new(group: &str, case: &str) -> Self {
        Self(format!("{group}{SEPARATOR}{case}"))
    }

    /// Parse a flattened id, requiring a non-empty group and case
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidTestId` when there is no separator or either
    /// side of the last separator is empty.
    pub fn parse(id: &str) -> Result<Self, CoreError> {
        match id.rsplit_once(SEPARATOR) {
            Some((group, case)) if !group.is_empty() && !case.is_empty() => {
                Ok(Self(id.to_string()))
            }
            _ => Err(CoreError::InvalidTestId { id: id.to_string() }),
        }
    }

    /// Split back into `(group, case)` on the last separator
    #[must_use]
    pub fn split(&self) -> (&str, &str) {
        self.0.rsplit_once(SEPARATOR).unwrap_or(("", &self.0))
    }

    /// The group part
    #[must_use]
    pub fn group(&self) -> &str {
        self.split().0
    }

    /// The case part
    #[must_use]
    pub fn case(&self) -> &str {
        self.split().1
    }

    /// The id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&TestRef> for TestId {
    fn from(test: &TestRef) -> Self {
        Self::new(&test.group, &test.case)
    }
}

/// Where a case is declared, as reported by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Source file
    pub file: PathBuf,
    /// First line of the declaration (1-indexed)
    pub start_line: u32,
    /// Last line of the declaration (1-indexed)
    pub end_line: u32,
}

/// One discovered case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseEntry {
    /// Case name
    pub name: String,
    /// Declaration site, when known
    pub span: Option<SourceSpan>,
}

impl CaseEntry {
    /// A case without a known location
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: None,
        }
    }
}

/// Result of resolving an event's `(group, case)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The id is in the catalog
    Exact(TestId),
    /// The event is a sub-case of this catalog entry
    Parent(TestId),
    /// No catalog entry matches
    Unknown,
}

impl Resolution {
    /// The resolved id, if any
    #[must_use]
    pub fn id(&self) -> Option<&TestId> {
        match self {
            Self::Exact(id) | Self::Parent(id) => Some(id),
            Self::Unknown => None,
        }
    }
}

/// The `group → ordered cases` mapping produced by discovery
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestCatalog {
    groups: Vec<(String, Vec<CaseEntry>)>,
    #[serde(skip)]
    index: HashMap<TestId, (usize, usize)>,
}

impl TestCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a case to a group, keeping discovery order
    ///
    /// Adding the same id twice keeps the first entry.
    pub fn insert(&mut self, group: &str, case: CaseEntry) {
        let id = TestId::new(group, &case.name);
        if self.index.contains_key(&id) {
            return;
        }

        let group_idx = match self.groups.iter().position(|(g, _)| g == group) {
            Some(idx) => idx,
            None => {
                self.groups.push((group.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };
        let cases = &mut self.groups[group_idx].1;
        self.index.insert(id, (group_idx, cases.len()));
        cases.push(case);
    }

    /// Build a catalog from `(group, case names)` pairs
    #[must_use]
    pub fn from_groups<'a, I, C>(groups: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, C)>,
        C: IntoIterator<Item = &'a str>,
    {
        let mut catalog = Self::new();
        for (group, cases) in groups {
            for case in cases {
                catalog.insert(group, CaseEntry::named(case));
            }
        }
        catalog
    }

    /// Number of cases
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no tests were discovered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether the id is known
    #[must_use]
    pub fn contains(&self, id: &TestId) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a case entry
    #[must_use]
    pub fn get(&self, id: &TestId) -> Option<&CaseEntry> {
        self.index.get(id).map(|&(g, c)| &self.groups[g].1[c])
    }

    /// Groups in discovery order
    pub fn groups(&self) -> impl Iterator<Item = (&str, &[CaseEntry])> {
        self.groups.iter().map(|(g, cases)| (g.as_str(), cases.as_slice()))
    }

    /// All ids in discovery order
    pub fn ids(&self) -> impl Iterator<Item = TestId> + '_ {
        self.groups
            .iter()
            .flat_map(|(g, cases)| cases.iter().map(move |c| TestId::new(g, &c.name)))
    }

    /// Position of an id in discovery order within its group
    #[must_use]
    pub fn discovery_index(&self, id: &TestId) -> Option<usize> {
        self.index.get(id).map(|&(_, c)| c)
    }

    /// Resolve an event's `(group, case)` to a catalog entry
    ///
    /// Exact ids win. Otherwise the longest catalog id that prefixes the
    /// composed id at a separator boundary is taken as the parent.
    #[must_use]
    pub fn resolve(&self, group: &str, case: &str) -> Resolution {
        let composed = TestId::new(group, case);
        if self.index.contains_key(&composed) {
            return Resolution::Exact(composed);
        }

        // Walk the composed id's separator positions from the right; the
        // group part must stay intact so we never cut inside it.
        let full = composed.as_str();
        let min = group.len() + 1;
        let mut end = full.len();
        while let Some(pos) = full[..end].rfind(SEPARATOR) {
            if pos < min {
                break;
            }
            let candidate = TestId(full[..pos].to_string());
            if self.index.contains_key(&candidate) {
                return Resolution::Parent(candidate);
            }
            end = pos;
        }

        Resolution::Unknown
    }

    /// Rebuild the lookup index after deserialization
    pub fn reindex(&mut self) {
        self.index.clear();
        for (g, (group, cases)) in self.groups.iter().enumerate() {
            for (c, case) in cases.iter().enumerate() {
                self.index.insert(TestId::new(group, &case.name), (g, c));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn catalog() -> TestCatalog {
        TestCatalog::from_groups([
            ("pkg/a", vec!["TestOne", "TestTwo"]),
            ("a/b/c", vec!["TestX", "TestX/nested"]),
        ])
    }

    #[test]
    fn test_id_split_on_last_separator() {
        let id = TestId::new("a/b/c", "TestX");
        assert_eq!(id.as_str(), "a/b/c/TestX");
        assert_eq!(id.split(), ("a/b/c", "TestX"));
        assert_eq!(id.group(), "a/b/c");
        assert_eq!(id.case(), "TestX");
    }

    #[test]
    fn test_id_parse() {
        assert!(TestId::parse("example.com/m/pkg/TestA").is_ok());
        assert!(TestId::parse("TestA").is_err());
        assert!(TestId::parse("pkg/").is_err());
        assert!(TestId::parse("/TestA").is_err());
    }

    #[test]
    fn test_resolve_exact() {
        let resolution = catalog().resolve("a/b/c", "TestX");
        assert_eq!(resolution, Resolution::Exact(TestId::new("a/b/c", "TestX")));
    }

    #[test]
    fn test_resolve_sub_case_to_parent() {
        let resolution = catalog().resolve("pkg/a", "TestOne/with_input");
        assert_eq!(resolution, Resolution::Parent(TestId::new("pkg/a", "TestOne")));
    }

    #[test]
    fn test_resolve_prefers_longest_parent() {
        let resolution = catalog().resolve("a/b/c", "TestX/nested/deeper");
        assert_eq!(
            resolution,
            Resolution::Parent(TestId::new("a/b/c", "TestX/nested"))
        );
    }

    #[test]
    fn test_resolve_does_not_match_name_prefix() {
        // TestOneMore is not a sub-case of TestOne.
        assert_eq!(catalog().resolve("pkg/a", "TestOneMore"), Resolution::Unknown);
    }

    #[test]
    fn test_resolve_unknown_group() {
        assert_eq!(catalog().resolve("pkg/z", "TestOne"), Resolution::Unknown);
        assert!(catalog().resolve("pkg/z", "TestOne").id().is_none());
    }

    #[test]
    fn test_catalog_keeps_discovery_order_and_dedups() {
        let mut catalog = TestCatalog::new();
        catalog.insert("g", CaseEntry::named("TestB"));
        catalog.insert("g", CaseEntry::named("TestA"));
        catalog.insert("g", CaseEntry::named("TestB"));
        assert_eq!(catalog.len(), 2);
        let ids: Vec<_> = catalog.ids().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["g/TestB", "g/TestA"]);
        assert_eq!(catalog.discovery_index(&TestId::new("g", "TestA")), Some(1));
    }

    #[test]
    fn test_reindex_after_deserialize() {
        let json = serde_json::to_string(&catalog()).expect("serialize");
        let mut restored: TestCatalog = serde_json::from_str(&json).expect("deserialize");
        assert!(restored.is_empty());
        restored.reindex();
        assert_eq!(restored.len(), 4);
        assert!(restored.contains(&TestId::new("pkg/a", "TestTwo")));
    }
}
