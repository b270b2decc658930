// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Result aggregation
//!
//! [`Aggregator`] applies decoded events to per-test state machines
//! (`pending → running → pass | fail | skip`) and routes output to the
//! persistent log, the live reporter and the bounded failure store.
//!
//! Events for different tests may interleave arbitrarily; events for one test
//! are applied in the order they arrive.
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use testlens_core::aggregator::Aggregator;
//! use testlens_core::decoder::StreamDecoder;
//! use testlens_core::identity::TestCatalog;
//! use testlens_core::sink::{MemoryLogSink, RecordingReporter};
//!
//! let catalog = TestCatalog::from_groups([("pkg/a", vec!["TestOne"])]);
//! let mut aggregator = Aggregator::new(
//!     catalog,
//!     PathBuf::from("/ws"),
//!     RecordingReporter::new(),
//!     MemoryLogSink::new(),
//! );
//!
//! aggregator.begin_run();
//! let mut decoder = StreamDecoder::new();
//! for event in decoder.feed(b"{\"Action\":\"pass\",\"Package\":\"pkg/a\",\"Test\":\"TestOne\"}\n") {
//!     aggregator.handle_decoded(event);
//! }
//! let summary = aggregator.finish_run();
//! assert_eq!(summary.passed, 1);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::event::{TestEvent, TestRef};
use crate::failure::{extract_location, looks_like_failure};
use crate::identity::{Resolution, TestCatalog, TestId};
use crate::result::{Lifecycle, TestStatus, elapsed_from_secs};
use crate::sink::{LIVE_LINE_CAP, LIVE_TRUNCATION_NOTICE, LogSink, OutputBuffer, TestReporter};
use crate::store::RunStore;
use crate::summary::{OutputFilter, OutputFilterPolicy, Summary};

/// Fallback failure message when no output was retained
pub const GENERIC_FAILURE_MESSAGE: &str = "Test failed";

/// Counters describing how a run's stream was consumed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Events applied
    pub events: usize,
    /// Lines that failed to decode
    pub decode_errors: usize,
    /// Well-formed records that change no test state (package markers)
    pub ignored: usize,
    /// Events that matched no known test
    pub unattributed: usize,
}

/// Per-run state machine and output router
pub struct Aggregator<R, S> {
    catalog: TestCatalog,
    workspace_root: PathBuf,
    store: RunStore,
    reporter: R,
    log: OutputBuffer<S>,
    filter: Box<dyn OutputFilterPolicy + Send>,
    running: HashSet<TestId>,
    stats: RunStats,
    verbose: bool,
    in_run: bool,
}

impl<R: TestReporter, S: LogSink> Aggregator<R, S> {
    /// Create an aggregator over a discovered catalog
    #[must_use]
    pub fn new(catalog: TestCatalog, workspace_root: PathBuf, reporter: R, sink: S) -> Self {
        Self::with_buffer(catalog, workspace_root, reporter, OutputBuffer::new(sink))
    }

    /// Create an aggregator with a preconfigured log buffer
    #[must_use]
    pub fn with_buffer(
        catalog: TestCatalog,
        workspace_root: PathBuf,
        reporter: R,
        log: OutputBuffer<S>,
    ) -> Self {
        Self {
            catalog,
            workspace_root,
            store: RunStore::new(),
            reporter,
            log,
            filter: Box::new(OutputFilter::All),
            running: HashSet::new(),
            stats: RunStats::default(),
            verbose: false,
            in_run: false,
        }
    }

    /// Surface attribution misses and decode errors more loudly
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Use a filter policy for the end-of-run summary
    #[must_use]
    pub fn with_filter_policy(mut self, policy: impl OutputFilterPolicy + Send + 'static) -> Self {
        self.filter = Box::new(policy);
        self
    }

    // ------------------------------------------------------------------------
    // Run lifecycle
    // ------------------------------------------------------------------------

    /// Start a run: drop all previous state and notify the reporter
    pub fn begin_run(&mut self) {
        self.clear();
        self.in_run = true;
        self.reporter.begin_run();
    }

    /// Drop all results, invalidating them in the UI in a single batch
    pub fn clear(&mut self) {
        let ids = self.store.ids();
        if !ids.is_empty() {
            self.reporter.invalidate_results(&ids);
        }
        self.store = RunStore::new();
        self.running.clear();
        self.stats = RunStats::default();
    }

    /// Finish the run: write the summary, flush the log, notify the reporter
    ///
    /// Runs at most once per [`Aggregator::begin_run`]; later calls only
    /// rebuild the summary.
    pub fn finish_run(&mut self) -> Summary {
        let summary = self.summary();
        if !self.in_run {
            return summary;
        }
        self.in_run = false;

        self.log.push_line("");
        self.log.push_text(&summary.render());
        self.log.flush();
        self.reporter.end_run();
        summary
    }

    /// Whether a run is in progress
    #[must_use]
    pub fn in_run(&self) -> bool {
        self.in_run
    }

    // ------------------------------------------------------------------------
    // Event handling
    // ------------------------------------------------------------------------

    /// Apply one decoder result; decode errors are recorded and skipped
    pub fn handle_decoded(&mut self, decoded: Result<TestEvent, DecodeError>) {
        match decoded {
            Ok(event) => self.handle(event),
            Err(e) => self.record_decode_error(&e),
        }
    }

    /// Apply a batch of decoder results in order
    pub fn handle_batch(&mut self, batch: impl IntoIterator<Item = Result<TestEvent, DecodeError>>) {
        for decoded in batch {
            self.handle_decoded(decoded);
        }
    }

    /// Apply a single event
    pub fn handle(&mut self, event: TestEvent) {
        if let TestEvent::Ignored { kind, group } = &event {
            self.stats.ignored += 1;
            debug!(action = %kind, group = group.as_deref().unwrap_or(""), "Package-level record");
            return;
        }
        self.stats.events += 1;

        match event {
            TestEvent::Output { test, text } => {
                self.log.push_text(&text);
                if let Some(test) = test
                    && let Some(id) = self.attribute(&test, "output")
                {
                    self.apply_output(&id, &text);
                }
            }
            TestEvent::Run { test } => match self.catalog.resolve(&test.group, &test.case) {
                Resolution::Exact(id) => self.apply_run(&id),
                Resolution::Parent(id) => {
                    debug!(parent = %id, case = %test.case, "Sub-case started");
                }
                Resolution::Unknown => self.unattributed(&test, "run"),
            },
            TestEvent::Pass { test, elapsed } => {
                self.apply_terminal_event(&test, TestStatus::Pass, elapsed);
            }
            TestEvent::Fail { test, elapsed } => {
                self.apply_terminal_event(&test, TestStatus::Fail, elapsed);
            }
            TestEvent::Skip { test, elapsed } => {
                self.apply_terminal_event(&test, TestStatus::Skip, elapsed);
            }
            TestEvent::Ignored { .. } => {}
        }
    }

    /// Route one line of the process's stderr
    ///
    /// Stderr always reaches the log. It is echoed to a test's live output
    /// only when exactly one test is running, and never retained as failure
    /// output.
    pub fn handle_stderr(&mut self, line: &str) {
        self.log.push_line(line);
        if self.running.len() == 1
            && let Some(id) = self.running.iter().next().cloned()
        {
            let mut text = line.to_string();
            text.push('\n');
            self.forward_live(&id, &text);
        }
    }

    /// Write an informational line to the persistent log
    pub fn log_line(&mut self, line: &str) {
        self.log.push_line(line);
    }

    fn apply_terminal_event(&mut self, test: &TestRef, status: TestStatus, elapsed: Option<f64>) {
        match self.catalog.resolve(&test.group, &test.case) {
            Resolution::Exact(id) => self.apply_terminal(&id, status, elapsed),
            Resolution::Parent(id) if status == TestStatus::Fail => {
                // A failing sub-case fails its parent; keep its output from now on.
                debug!(parent = %id, case = %test.case, "Sub-case failed");
                self.store.result_mut(&id).status = TestStatus::Fail;
            }
            Resolution::Parent(id) => {
                debug!(parent = %id, case = %test.case, ?status, "Sub-case finished");
            }
            Resolution::Unknown => self.unattributed(test, "terminal"),
        }
    }

    fn apply_run(&mut self, id: &TestId) {
        let result = self.store.result_mut(id);
        if result.lifecycle == Lifecycle::Running {
            return;
        }
        if result.lifecycle == Lifecycle::Finished {
            // Repeated runs (`-count=N`) start the state machine again.
            result.status = TestStatus::Pass;
            result.elapsed = None;
            result.ui_lines_emitted = 0;
            self.store.discard_failure(id);
        }
        let result = self.store.result_mut(id);
        result.lifecycle = Lifecycle::Running;
        self.running.insert(id.clone());
        self.reporter.test_started(id);
    }

    fn apply_terminal(&mut self, id: &TestId, status: TestStatus, elapsed: Option<f64>) {
        let result = self.store.result_mut(id);
        result.status = status;
        result.lifecycle = Lifecycle::Finished;
        result.elapsed = elapsed_from_secs(elapsed);
        let elapsed_ms = result.elapsed_ms();

        self.running.remove(id);
        self.store.groups_mut().record(id, status);

        match status {
            TestStatus::Pass => {
                self.store.discard_failure(id);
                self.reporter.test_passed(id, elapsed_ms);
            }
            TestStatus::Skip => {
                self.store.discard_failure(id);
                self.reporter.test_skipped(id);
            }
            TestStatus::Fail => {
                let message = self
                    .store
                    .failure(id)
                    .filter(|record| !record.is_empty())
                    .map_or_else(|| GENERIC_FAILURE_MESSAGE.to_string(), |r| r.message());
                let location = extract_location(&message, &self.location_base(id));
                self.reporter
                    .test_failed(id, &message, location.as_ref(), elapsed_ms);
            }
        }
    }

    /// Directory that relative failure paths resolve against
    ///
    /// The toolchain prints paths relative to the package directory, which
    /// is where discovery found the case. Without a span, the workspace root.
    fn location_base(&self, id: &TestId) -> PathBuf {
        self.catalog
            .get(id)
            .and_then(|entry| entry.span.as_ref())
            .and_then(|span| span.file.parent())
            .map_or_else(
                || self.workspace_root.clone(),
                |dir| self.workspace_root.join(dir),
            )
    }

    fn apply_output(&mut self, id: &TestId, text: &str) {
        let failing = self.store.result_mut(id).status == TestStatus::Fail;
        if failing || looks_like_failure(text) {
            self.store.failure_mut(id).push(text);
        }
        self.forward_live(id, text);
    }

    fn forward_live(&mut self, id: &TestId, text: &str) {
        let result = self.store.result_mut(id);
        let emitted = result.ui_lines_emitted;
        if emitted > LIVE_LINE_CAP {
            return;
        }
        result.ui_lines_emitted += 1;

        if emitted < LIVE_LINE_CAP {
            self.reporter.append_output(id, text);
        } else {
            self.reporter.append_output(id, LIVE_TRUNCATION_NOTICE);
        }
    }

    fn attribute(&mut self, test: &TestRef, action: &'static str) -> Option<TestId> {
        match self.catalog.resolve(&test.group, &test.case) {
            Resolution::Exact(id) | Resolution::Parent(id) => Some(id),
            Resolution::Unknown => {
                self.unattributed(test, action);
                None
            }
        }
    }

    fn unattributed(&mut self, test: &TestRef, action: &'static str) {
        self.stats.unattributed += 1;
        if self.verbose {
            warn!(group = %test.group, case = %test.case, action, "Event for unknown test ignored");
        } else {
            debug!(group = %test.group, case = %test.case, action, "Event for unknown test ignored");
        }
    }

    fn record_decode_error(&mut self, error: &DecodeError) {
        self.stats.decode_errors += 1;
        if self.verbose {
            warn!(error = %error, "Skipping undecodable record");
            self.log.push_line(&format!("[testlens] skipped record: {error}"));
        } else {
            debug!(error = %error, "Skipping undecodable record");
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Build the summary for the current store
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary::build(&self.store, &self.catalog, self.filter.output_filter())
    }

    /// The run store
    #[must_use]
    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// The catalog
    #[must_use]
    pub fn catalog(&self) -> &TestCatalog {
        &self.catalog
    }

    /// The persistent log buffer
    #[must_use]
    pub fn log(&self) -> &OutputBuffer<S> {
        &self.log
    }

    /// The live reporter
    #[must_use]
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Mutable access to the live reporter
    pub fn reporter_mut(&mut self) -> &mut R {
        &mut self.reporter
    }

    /// Stream consumption counters
    #[must_use]
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Workspace root used to resolve failure locations
    #[must_use]
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Tests currently in the running state
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}
