// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Workspace discovery
//!
//! Walks the workspace, scans test files concurrently and builds the
//! catalog the aggregator resolves events against.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use testlens_core::identity::{CaseEntry, TestCatalog};

use crate::error::DiscoveryError;
use crate::module::{MANIFEST, import_path, parse_module_path};
use crate::scanner::{is_test_file, scan_source};

/// Default number of files read at once
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Configuration for a discovery pass
#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Maximum number of files read concurrently
    pub max_concurrency: usize,
    /// Directory names never descended into
    pub skip_dirs: Vec<String>,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            skip_dirs: vec!["vendor".to_string(), "testdata".to_string()],
        }
    }
}

impl DiscoverOptions {
    /// Set the concurrency limit (at least one)
    #[must_use]
    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }
}

/// Result of a discovery pass
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    /// Module path used as the group prefix
    pub module: String,
    /// Discovered cases grouped by import path
    pub catalog: TestCatalog,
    /// Test files scanned
    pub files_scanned: usize,
    /// Problems that cost tests but did not stop discovery
    pub warnings: Vec<String>,
}

/// Discover every case under `root`
///
/// Files that cannot be read are reported in [`Discovery::warnings`] and
/// contribute no tests.
///
/// # Errors
///
/// Returns `DiscoveryError::RootNotFound` if `root` is not a directory and
/// `DiscoveryError::Task` if a scan task panics.
pub async fn discover(root: &Path, options: &DiscoverOptions) -> Result<Discovery, DiscoveryError> {
    let is_dir = tokio::fs::metadata(root)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(DiscoveryError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let mut warnings = Vec::new();
    let module = read_module(root, &mut warnings).await;

    let walk_root = root.to_path_buf();
    let skip_dirs = options.skip_dirs.clone();
    let (files, walk_warnings) =
        tokio::task::spawn_blocking(move || collect_test_files(&walk_root, &skip_dirs)).await?;
    warnings.extend(walk_warnings);
    debug!(count = files.len(), "Found test files");

    let scanned = scan_files(&files, options.max_concurrency).await?;

    let mut catalog = TestCatalog::new();
    for (path, outcome) in files.iter().zip(scanned) {
        match outcome {
            Ok(cases) => {
                let rel_dir = path
                    .parent()
                    .and_then(|dir| dir.strip_prefix(root).ok())
                    .unwrap_or_else(|| Path::new(""));
                let group = import_path(&module, rel_dir);
                for case in cases {
                    catalog.insert(&group, case);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable test file");
                warnings.push(e.to_string());
            }
        }
    }

    info!(
        module = %module,
        files = files.len(),
        tests = catalog.len(),
        "Discovery complete"
    );

    Ok(Discovery {
        module,
        catalog,
        files_scanned: files.len(),
        warnings,
    })
}

/// Module path from the root manifest, or the root directory name
async fn read_module(root: &Path, warnings: &mut Vec<String>) -> String {
    let fallback = root
        .file_name()
        .map_or_else(|| "main".to_string(), |n| n.to_string_lossy().into_owned());

    match tokio::fs::read_to_string(root.join(MANIFEST)).await {
        Ok(text) => parse_module_path(&text).unwrap_or_else(|| {
            let msg = format!("{MANIFEST} has no module line; using '{fallback}'");
            warn!("{msg}");
            warnings.push(msg);
            fallback
        }),
        Err(e) => {
            let msg = format!("Cannot read {MANIFEST} ({e}); using '{fallback}'");
            warn!("{msg}");
            warnings.push(msg);
            fallback
        }
    }
}

/// Sorted test files below `root`, plus walk warnings
fn collect_test_files(root: &Path, skip_dirs: &[String]) -> (Vec<PathBuf>, Vec<String>) {
    let mut files = Vec::new();
    let mut warnings = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry, skip_dirs));

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() && is_test_file(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => {
                let e = DiscoveryError::from(e);
                warn!(error = %e, "Skipping unreadable directory entry");
                warnings.push(e.to_string());
            }
        }
    }

    files.sort();
    (files, warnings)
}

/// Hidden, ignored, excluded, or the root of a nested module
fn is_skipped_dir(entry: &DirEntry, skip_dirs: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.')
        || name.starts_with('_')
        || skip_dirs.iter().any(|d| d.as_str() == name.as_ref())
        || entry.path().join(MANIFEST).is_file()
}

/// Read and scan files with at most `limit` reads in flight
///
/// Results come back in the same order as `files`.
async fn scan_files(
    files: &[PathBuf],
    limit: usize,
) -> Result<Vec<Result<Vec<CaseEntry>, DiscoveryError>>, DiscoveryError> {
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();

    for (idx, path) in files.iter().cloned().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let outcome = tokio::fs::read(&path)
                .await
                .map(|bytes| scan_source(&String::from_utf8_lossy(&bytes), &path))
                .map_err(|source| DiscoveryError::Io {
                    path: path.clone(),
                    source,
                });
            (idx, outcome)
        });
    }

    let mut results: Vec<Option<Result<Vec<CaseEntry>, DiscoveryError>>> =
        files.iter().map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (idx, outcome) = joined?;
        results[idx] = Some(outcome);
    }

    Ok(results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| Ok(Vec::new())))
        .collect())
}
