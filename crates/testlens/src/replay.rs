// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Replay of a saved event stream
//!
//! There is no discovery step for a saved stream, so the catalog is built
//! from the top-level cases the stream itself mentions. Sub-cases then
//! resolve to their parents exactly as in a live run.

use std::path::{Path, PathBuf};

use testlens_core::aggregator::{Aggregator, RunStats};
use testlens_core::decoder::StreamDecoder;
use testlens_core::event::{TestEvent, decode_all};
use testlens_core::identity::{CaseEntry, TestCatalog};
use testlens_core::sink::{LogSink, TestReporter};
use testlens_core::summary::{OutputFilter, Summary};
use thiserror::Error;
use tracing::info;

/// Bytes fed to the decoder at a time
const REPLAY_CHUNK: usize = 64 * 1024;

/// Replay errors
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The stream file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Stream file path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Catalog of the top-level cases named by `events`, in first-seen order
#[must_use]
pub fn catalog_from_events(events: &[TestEvent]) -> TestCatalog {
    let mut catalog = TestCatalog::new();
    for test in events.iter().filter_map(TestEvent::test) {
        let top = test.case.split('/').next().unwrap_or(&test.case);
        catalog.insert(&test.group, CaseEntry::named(top));
    }
    catalog
}

/// How a replay aggregates and reports
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    /// Which tests the summary lists
    pub filter: OutputFilter,
    /// Surface undecodable records and unknown tests
    pub verbose: bool,
}

/// Aggregate a whole stream held in memory
pub fn replay_bytes<R, S>(
    bytes: &[u8],
    workspace_root: &Path,
    reporter: R,
    sink: S,
    options: ReplayOptions,
) -> (Summary, RunStats, Aggregator<R, S>)
where
    R: TestReporter,
    S: LogSink,
{
    let (events, _) = decode_all(&String::from_utf8_lossy(bytes));
    let catalog = catalog_from_events(&events);

    let mut aggregator = Aggregator::new(catalog, workspace_root.to_path_buf(), reporter, sink)
        .verbose(options.verbose)
        .with_filter_policy(options.filter);
    aggregator.begin_run();

    let mut decoder = StreamDecoder::new();
    for chunk in bytes.chunks(REPLAY_CHUNK) {
        aggregator.handle_batch(decoder.feed(chunk));
    }
    if let Some(last) = decoder.finish() {
        aggregator.handle_decoded(last);
    }

    let summary = aggregator.finish_run();
    let stats = aggregator.stats();
    (summary, stats, aggregator)
}

/// Aggregate a saved stream file
///
/// # Errors
///
/// Returns `ReplayError::Read` if the file cannot be read.
pub async fn replay_file<R, S>(
    path: &Path,
    workspace_root: &Path,
    reporter: R,
    sink: S,
    options: ReplayOptions,
) -> Result<(Summary, RunStats), ReplayError>
where
    R: TestReporter,
    S: LogSink,
{
    let bytes = tokio::fs::read(path).await.map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "Replaying saved stream");

    let (summary, stats, _) = replay_bytes(&bytes, workspace_root, reporter, sink, options);
    Ok((summary, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use testlens_core::identity::TestId;
    use testlens_core::sink::{MemoryLogSink, RecordingReporter};

    const STREAM: &str = concat!(
        r#"{"Action":"start","Package":"example.com/calc"}"#,
        "\n",
        r#"{"Action":"run","Package":"example.com/calc","Test":"TestDiv"}"#,
        "\n",
        r#"{"Action":"run","Package":"example.com/calc","Test":"TestDiv/by_zero"}"#,
        "\n",
        r#"{"Action":"output","Package":"example.com/calc","Test":"TestDiv/by_zero","Output":"    div_test.go:12: expected error\n"}"#,
        "\n",
        r#"{"Action":"fail","Package":"example.com/calc","Test":"TestDiv/by_zero","Elapsed":0}"#,
        "\n",
        r#"{"Action":"fail","Package":"example.com/calc","Test":"TestDiv","Elapsed":0.01}"#,
        "\n",
        r#"{"Action":"run","Package":"example.com/calc","Test":"TestAdd"}"#,
        "\n",
        r#"{"Action":"pass","Package":"example.com/calc","Test":"TestAdd","Elapsed":0}"#,
        "\n",
        r#"{"Action":"fail","Package":"example.com/calc","Elapsed":0.02}"#,
    );

    #[test]
    fn test_catalog_has_top_level_cases_only() {
        let (events, _) = decode_all(STREAM);
        let catalog = catalog_from_events(&events);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains(&TestId::new("example.com/calc", "TestDiv")));
        assert!(!catalog.contains(&TestId::new("example.com/calc", "TestDiv/by_zero")));
    }

    #[test]
    fn test_replay_stream() {
        let (summary, stats, aggregator) = replay_bytes(
            STREAM.as_bytes(),
            Path::new("/ws"),
            RecordingReporter::new(),
            MemoryLogSink::new(),
            ReplayOptions::default(),
        );
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(stats.decode_errors, 0);
        assert_eq!(stats.ignored, 2);

        let failure = aggregator
            .store()
            .failure(&TestId::new("example.com/calc", "TestDiv"))
            .expect("failure retained");
        assert!(failure.message().contains("expected error"));
        assert!(aggregator.log().sink().contents().contains("div_test.go:12"));
    }

    #[tokio::test]
    async fn test_replay_missing_file() {
        let err = replay_file(
            Path::new("/nonexistent/testlens/run.jsonl"),
            Path::new("/ws"),
            RecordingReporter::new(),
            MemoryLogSink::new(),
            ReplayOptions::default(),
        )
        .await
        .expect_err("missing file");
        assert!(matches!(err, ReplayError::Read { .. }));
    }
}
