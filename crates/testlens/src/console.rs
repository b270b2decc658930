// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Console reporter
//!
//! Prints one compact line per finished test as results arrive. Write errors
//! are logged and otherwise ignored; a broken console must not stop a run.

use std::io::Write;

use testlens_core::failure::FailureLocation;
use testlens_core::identity::TestId;
use testlens_core::result::TestStatus;
use testlens_core::sink::TestReporter;
use tracing::debug;

/// [`TestReporter`] that writes progress lines to a writer (usually stderr)
#[derive(Debug)]
pub struct ConsoleReporter<W: Write> {
    out: W,
    show_output: bool,
    finished: usize,
}

impl<W: Write> ConsoleReporter<W> {
    /// Create a reporter writing to `out`
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_output: false,
            finished: 0,
        }
    }

    /// Also echo each test's live output
    #[must_use]
    pub fn show_output(mut self, show: bool) -> Self {
        self.show_output = show;
        self
    }

    /// Tests reported as finished in the current run
    #[must_use]
    pub fn finished(&self) -> usize {
        self.finished
    }

    /// The underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            debug!(error = %e, "Console write failed");
        }
    }

    fn finished_line(&mut self, status: TestStatus, id: &TestId, elapsed_ms: Option<u64>) {
        self.finished += 1;
        let line = match elapsed_ms {
            Some(ms) => format!("{} {id} ({ms}ms)", status.marker()),
            None => format!("{} {id}", status.marker()),
        };
        self.line(&line);
    }
}

impl<W: Write> TestReporter for ConsoleReporter<W> {
    fn begin_run(&mut self) {
        self.finished = 0;
    }

    fn test_started(&mut self, _id: &TestId) {}

    fn test_passed(&mut self, id: &TestId, elapsed_ms: Option<u64>) {
        self.finished_line(TestStatus::Pass, id, elapsed_ms);
    }

    fn test_failed(
        &mut self,
        id: &TestId,
        message: &str,
        location: Option<&FailureLocation>,
        elapsed_ms: Option<u64>,
    ) {
        self.finished_line(TestStatus::Fail, id, elapsed_ms);
        if let Some(location) = location {
            let at = format!("    at {}:{}", location.file.display(), location.line());
            self.line(&at);
        }
        if !self.show_output {
            for text in message.lines().take(5) {
                let indented = format!("    {text}");
                self.line(&indented);
            }
        }
    }

    fn test_skipped(&mut self, id: &TestId) {
        self.finished_line(TestStatus::Skip, id, None);
    }

    fn append_output(&mut self, id: &TestId, text: &str) {
        if !self.show_output {
            return;
        }
        for text in text.lines() {
            let line = format!("  [{}] {text}", id.case());
            self.line(&line);
        }
    }

    fn end_run(&mut self) {
        if let Err(e) = self.out.flush() {
            debug!(error = %e, "Console flush failed");
        }
    }

    fn invalidate_results(&mut self, _ids: &[TestId]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use std::path::PathBuf;
    use testlens_core::failure::extract_location;

    fn output(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).expect("utf8")
    }

    #[test]
    fn test_compact_lines() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.begin_run();
        reporter.test_passed(&TestId::new("calc", "TestAdd"), Some(12));
        reporter.test_skipped(&TestId::new("calc", "TestLegacy"));
        reporter.end_run();
        assert_eq!(reporter.finished(), 2);
        assert_eq!(output(reporter), "✓ calc/TestAdd (12ms)\n○ calc/TestLegacy\n");
    }

    #[test]
    fn test_failure_with_location() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        let root = PathBuf::from("/ws");
        let location = extract_location("calc_test.go:9: boom", &root);
        reporter.test_failed(
            &TestId::new("calc", "TestDiv"),
            "calc_test.go:9: boom\n",
            location.as_ref(),
            None,
        );
        let text = output(reporter);
        assert!(text.starts_with("✗ calc/TestDiv\n"));
        assert!(text.contains("at /ws/calc_test.go:9"));
        assert!(text.contains("    calc_test.go:9: boom"));
    }

    #[test]
    fn test_live_output_only_when_enabled() {
        let id = TestId::new("calc", "TestAdd");
        let mut quiet = ConsoleReporter::new(Vec::new());
        quiet.append_output(&id, "hello\n");
        assert_eq!(output(quiet), "");

        let mut loud = ConsoleReporter::new(Vec::new()).show_output(true);
        loud.append_output(&id, "hello\n");
        assert_eq!(output(loud), "  [TestAdd] hello\n");
    }
}
