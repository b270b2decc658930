// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Output sinks
//!
//! Every output event goes to up to three places, each with its own policy:
//!
//! - the persistent log ([`LogSink`] behind an [`OutputBuffer`]): unlimited,
//!   batched, flushed on size/count thresholds and on every run exit path;
//! - the live UI ([`TestReporter`]): capped per test;
//! - the in-memory failure record (see [`crate::failure`]).

use std::io;

use tracing::{debug, warn};

use crate::failure::FailureLocation;
use crate::identity::TestId;

/// Flush the log buffer once this many bytes are pending
pub const FLUSH_BYTES: usize = 64 * 1024;

/// Flush the log buffer once this many lines are pending
pub const FLUSH_LINES: usize = 500;

/// Live output lines forwarded per test before the cap kicks in
pub const LIVE_LINE_CAP: usize = 100;

/// Single notice sent to the live sink when a test hits the cap
pub const LIVE_TRUNCATION_NOTICE: &str =
    "... output truncated (live view limited to 100 lines; see the log for full output)\n";

// ============================================================================
// Sink Traits
// ============================================================================

/// The narrow interface through which test state reaches the UI
///
/// Calls arrive in rapid succession; implementations should not do
/// expensive work per call.
pub trait TestReporter {
    /// A run is starting
    fn begin_run(&mut self);

    /// A test entered the running state
    fn test_started(&mut self, id: &TestId);

    /// A test passed
    fn test_passed(&mut self, id: &TestId, elapsed_ms: Option<u64>);

    /// A test failed
    fn test_failed(
        &mut self,
        id: &TestId,
        message: &str,
        location: Option<&FailureLocation>,
        elapsed_ms: Option<u64>,
    );

    /// A test was skipped
    fn test_skipped(&mut self, id: &TestId);

    /// Live output for a running test
    fn append_output(&mut self, id: &TestId, text: &str);

    /// The run finished (normally, by cancellation, or with an error)
    fn end_run(&mut self);

    /// Forget previous results for a batch of tests
    fn invalidate_results(&mut self, ids: &[TestId]);
}

impl<T: TestReporter + ?Sized> TestReporter for Box<T> {
    fn begin_run(&mut self) {
        (**self).begin_run();
    }

    fn test_started(&mut self, id: &TestId) {
        (**self).test_started(id);
    }

    fn test_passed(&mut self, id: &TestId, elapsed_ms: Option<u64>) {
        (**self).test_passed(id, elapsed_ms);
    }

    fn test_failed(
        &mut self,
        id: &TestId,
        message: &str,
        location: Option<&FailureLocation>,
        elapsed_ms: Option<u64>,
    ) {
        (**self).test_failed(id, message, location, elapsed_ms);
    }

    fn test_skipped(&mut self, id: &TestId) {
        (**self).test_skipped(id);
    }

    fn append_output(&mut self, id: &TestId, text: &str) {
        (**self).append_output(id, text);
    }

    fn end_run(&mut self) {
        (**self).end_run();
    }

    fn invalidate_results(&mut self, ids: &[TestId]) {
        (**self).invalidate_results(ids);
    }
}

/// A slow, external, human-readable log
pub trait LogSink {
    /// Write one batch of text
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if the batch could not be written.
    fn write_batch(&mut self, text: &str) -> io::Result<()>;
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn write_batch(&mut self, text: &str) -> io::Result<()> {
        (**self).write_batch(text)
    }
}

// ============================================================================
// Output Buffer
// ============================================================================

/// Batches log text in order and flushes it to a [`LogSink`]
#[derive(Debug)]
pub struct OutputBuffer<S> {
    sink: S,
    pending: Vec<String>,
    pending_bytes: usize,
    max_bytes: usize,
    max_lines: usize,
    flushes: usize,
}

impl<S: LogSink> OutputBuffer<S> {
    /// Create a buffer with the default thresholds
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self::with_thresholds(sink, FLUSH_BYTES, FLUSH_LINES)
    }

    /// Create a buffer with custom thresholds
    #[must_use]
    pub fn with_thresholds(sink: S, max_bytes: usize, max_lines: usize) -> Self {
        Self {
            sink,
            pending: Vec::new(),
            pending_bytes: 0,
            max_bytes,
            max_lines,
            flushes: 0,
        }
    }

    /// Queue raw output text exactly as received
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.pending_bytes += text.len();
        self.pending.push(text.to_string());
        if self.pending_bytes >= self.max_bytes || self.pending.len() >= self.max_lines {
            self.flush();
        }
    }

    /// Queue a line, adding the newline
    pub fn push_line(&mut self, line: &str) {
        let mut text = String::with_capacity(line.len() + 1);
        text.push_str(line);
        text.push('\n');
        self.push_text(&text);
    }

    /// Flush pending text, logging (not propagating) sink failures
    pub fn flush(&mut self) {
        if let Err(e) = self.try_flush() {
            warn!(error = %e, "Failed to write to log sink, batch dropped");
        }
    }

    /// Flush pending text
    ///
    /// The pending buffer is emptied even when the write fails.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Io` if the sink rejects the batch.
    pub fn try_flush(&mut self) -> Result<(), crate::CoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let batch = self.pending.concat();
        let lines = self.pending.len();
        self.pending.clear();
        self.pending_bytes = 0;
        self.flushes += 1;

        debug!(lines, bytes = batch.len(), "Flushing log batch");
        self.sink.write_batch(&batch)?;
        Ok(())
    }

    /// Number of queued chunks
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is waiting to be flushed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of batches handed to the sink so far
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Access the underlying sink
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

// ============================================================================
// In-memory Sinks
// ============================================================================

/// A log sink that keeps every batch in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    batches: Vec<String>,
}

impl MemoryLogSink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches written so far
    #[must_use]
    pub fn batches(&self) -> &[String] {
        &self.batches
    }

    /// Everything written, concatenated
    #[must_use]
    pub fn contents(&self) -> String {
        self.batches.concat()
    }
}

impl LogSink for MemoryLogSink {
    fn write_batch(&mut self, text: &str) -> io::Result<()> {
        self.batches.push(text.to_string());
        Ok(())
    }
}

/// One recorded [`TestReporter`] call
#[derive(Debug, Clone, PartialEq)]
pub enum ReporterCall {
    /// `begin_run`
    BeginRun,
    /// `test_started`
    Started(TestId),
    /// `test_passed`
    Passed(TestId, Option<u64>),
    /// `test_failed`
    Failed {
        /// Test id
        id: TestId,
        /// Failure message
        message: String,
        /// Extracted location
        location: Option<FailureLocation>,
        /// Elapsed milliseconds
        elapsed_ms: Option<u64>,
    },
    /// `test_skipped`
    Skipped(TestId),
    /// `append_output`
    Output(TestId, String),
    /// `end_run`
    EndRun,
    /// `invalidate_results`
    Invalidated(Vec<TestId>),
}

/// A reporter that records every call, for tests and headless runs
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    calls: Vec<ReporterCall>,
}

impl RecordingReporter {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All calls in order
    #[must_use]
    pub fn calls(&self) -> &[ReporterCall] {
        &self.calls
    }

    /// Count calls matching a predicate
    pub fn count(&self, predicate: impl Fn(&ReporterCall) -> bool) -> usize {
        self.calls.iter().filter(|c| predicate(c)).count()
    }

    /// Live output forwarded for a test
    #[must_use]
    pub fn output_for(&self, id: &TestId) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ReporterCall::Output(call_id, text) if call_id == id => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl TestReporter for RecordingReporter {
    fn begin_run(&mut self) {
        self.calls.push(ReporterCall::BeginRun);
    }

    fn test_started(&mut self, id: &TestId) {
        self.calls.push(ReporterCall::Started(id.clone()));
    }

    fn test_passed(&mut self, id: &TestId, elapsed_ms: Option<u64>) {
        self.calls.push(ReporterCall::Passed(id.clone(), elapsed_ms));
    }

    fn test_failed(
        &mut self,
        id: &TestId,
        message: &str,
        location: Option<&FailureLocation>,
        elapsed_ms: Option<u64>,
    ) {
        self.calls.push(ReporterCall::Failed {
            id: id.clone(),
            message: message.to_string(),
            location: location.cloned(),
            elapsed_ms,
        });
    }

    fn test_skipped(&mut self, id: &TestId) {
        self.calls.push(ReporterCall::Skipped(id.clone()));
    }

    fn append_output(&mut self, id: &TestId, text: &str) {
        self.calls.push(ReporterCall::Output(id.clone(), text.to_string()));
    }

    fn end_run(&mut self) {
        self.calls.push(ReporterCall::EndRun);
    }

    fn invalidate_results(&mut self, ids: &[TestId]) {
        self.calls.push(ReporterCall::Invalidated(ids.to_vec()));
    }
}
