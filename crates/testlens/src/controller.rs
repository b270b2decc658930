// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Execution controller
//!
//! Builds the toolchain command for a [`RunScope`], spawns it through a
//! [`ProcessSupervisor`] and feeds stdout and stderr into the aggregator
//! until the process exits or the run is cancelled. Every exit path
//! finalises the run exactly once: the log is flushed, the summary written
//! and the reporter told the run has ended.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use testlens_core::aggregator::{Aggregator, RunStats};
use testlens_core::decoder::StreamDecoder;
use testlens_core::sink::{LogSink, TestReporter};
use testlens_core::summary::Summary;

use crate::profile::{ActiveProfileProvider, Profile};
use crate::supervisor::{CommandSpec, ProcessSupervisor, SpawnedProcess};

/// Size of each stdout read
const READ_CHUNK: usize = 16 * 1024;

/// How long to wait for a killed process to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that end a run early
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The toolchain could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Command Construction
// ============================================================================

/// What a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScope {
    /// Every package in the workspace
    All,
    /// One package
    Group(String),
    /// One case of one package
    Case {
        /// Package import path
        group: String,
        /// Case name
        case: String,
    },
}

impl RunScope {
    /// Scope from optional CLI selections
    #[must_use]
    pub fn from_selection(group: Option<String>, case: Option<String>) -> Self {
        match (group, case) {
            (Some(group), Some(case)) => Self::Case { group, case },
            (Some(group), None) => Self::Group(group),
            (None, _) => Self::All,
        }
    }
}

impl fmt::Display for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all tests"),
            Self::Group(group) => write!(f, "{group}"),
            Self::Case { group, case } => write!(f, "{group}/{case}"),
        }
    }
}

/// The test toolchain invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Program, e.g. `go`
    pub program: String,
    /// Test verb, e.g. `test`
    pub verb: String,
    /// Structured output flag, e.g. `-json`
    pub json_flag: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::with_program("go")
    }
}

impl Toolchain {
    /// The `go test -json` toolchain under another program name
    #[must_use]
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            verb: "test".to_string(),
            json_flag: "-json".to_string(),
        }
    }

    /// `<program> <verb> <json-flag> [-run ^case$] <profile flags...> <target>`
    #[must_use]
    pub fn command(&self, scope: &RunScope, profile: &Profile, cwd: &Path) -> CommandSpec {
        let mut args = vec![self.verb.clone(), self.json_flag.clone()];
        if let RunScope::Case { case, .. } = scope {
            args.push("-run".to_string());
            args.push(format!("^{}$", escape_case(case)));
        }
        args.extend(profile.flags.iter().cloned());
        args.push(match scope {
            RunScope::All => "./...".to_string(),
            RunScope::Group(group) | RunScope::Case { group, .. } => group.clone(),
        });

        CommandSpec {
            program: self.program.clone(),
            args,
            env: profile.env.clone(),
            cwd: cwd.to_path_buf(),
        }
    }
}

/// Escape regex metacharacters in each `/`-separated level of a case name
///
/// The toolchain splits `-run` patterns on unbracketed `/` and matches
/// each level separately, so separators stay literal.
#[must_use]
pub fn escape_case(case: &str) -> String {
    let mut out = String::with_capacity(case.len());
    for c in case.chars() {
        if matches!(
            c,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// Run Outcome
// ============================================================================

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The process exited by itself; a non-zero code usually means failures
    Completed {
        /// Exit code, `None` if killed by a signal
        exit_code: Option<i32>,
    },
    /// The run was cancelled and the process tree terminated
    Cancelled,
    /// There was nothing to run, so nothing was spawned
    NothingToRun,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed {
                exit_code: Some(code),
            } => write!(f, "exit code {code}"),
            Self::Completed { exit_code: None } => write!(f, "terminated by signal"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::NothingToRun => write!(f, "nothing to run"),
        }
    }
}

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique id of the run
    pub run_id: Uuid,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration
    pub duration_ms: u64,
    /// How the run ended
    pub outcome: RunOutcome,
    /// Stream consumption counters
    pub stats: RunStats,
    /// End-of-run summary
    pub summary: Summary,
}

impl RunReport {
    /// Whether the run finished without failures
    #[must_use]
    pub fn succeeded(&self) -> bool {
        match self.outcome {
            RunOutcome::Completed { exit_code } => {
                self.summary.all_passed() && exit_code == Some(0)
            }
            RunOutcome::NothingToRun => true,
            RunOutcome::Cancelled => false,
        }
    }
}

// ============================================================================
// Controller
// ============================================================================

/// Runs the toolchain and drives one aggregator, one run at a time
pub struct Controller<R, S, P, V> {
    aggregator: Aggregator<R, S>,
    profiles: P,
    supervisor: V,
    toolchain: Toolchain,
    workspace_root: PathBuf,
}

impl<R, S, P, V> Controller<R, S, P, V>
where
    R: TestReporter,
    S: LogSink,
    P: ActiveProfileProvider,
    V: ProcessSupervisor,
{
    /// Create a controller; the workspace root is taken from the aggregator
    #[must_use]
    pub fn new(aggregator: Aggregator<R, S>, profiles: P, supervisor: V, toolchain: Toolchain) -> Self {
        let workspace_root = aggregator.workspace_root().to_path_buf();
        Self {
            aggregator,
            profiles,
            supervisor,
            toolchain,
            workspace_root,
        }
    }

    /// The aggregator, for inspecting results after a run
    #[must_use]
    pub fn aggregator(&self) -> &Aggregator<R, S> {
        &self.aggregator
    }

    /// Run `scope` until the process exits or `cancel` fires
    ///
    /// Prior results are cleared first. A non-zero exit is reported in the
    /// outcome, not as an error.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Spawn` if the toolchain cannot be started;
    /// the run is still finalised before returning.
    pub async fn run(
        &mut self,
        scope: RunScope,
        cancel: CancellationToken,
    ) -> Result<RunReport, ControllerError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();

        self.aggregator.begin_run();

        if self.aggregator.catalog().is_empty() {
            info!(%run_id, "No tests discovered; nothing to run");
            self.aggregator
                .log_line("[testlens] No tests discovered; nothing to run");
            return Ok(self.finish(run_id, started_at, clock, RunOutcome::NothingToRun));
        }

        let profile = self.profiles.active_profile();
        let spec = self
            .toolchain
            .command(&scope, &profile, &self.workspace_root);
        info!(%run_id, %scope, profile = %profile.name, "Starting test run");
        self.aggregator.log_line(&format!(
            "[testlens] Run {run_id} started {} (profile: {})",
            started_at.to_rfc3339(),
            profile.name
        ));
        self.aggregator.log_line(&format!("[testlens] $ {spec}"));

        let process = match self.supervisor.spawn(&spec).await {
            Ok(process) => process,
            Err(source) => {
                warn!(%run_id, program = %spec.program, error = %source, "Failed to start test process");
                self.aggregator.log_line(&format!(
                    "[testlens] Failed to start {}: {source}",
                    spec.program
                ));
                self.aggregator.finish_run();
                return Err(ControllerError::Spawn {
                    program: spec.program,
                    source,
                });
            }
        };

        let outcome = self.consume(process, &cancel).await;
        Ok(self.finish(run_id, started_at, clock, outcome))
    }

    /// Feed the process's output into the aggregator until it ends
    async fn consume(&mut self, process: SpawnedProcess, cancel: &CancellationToken) -> RunOutcome {
        let SpawnedProcess {
            pid,
            mut stdout,
            stderr,
            exit,
        } = process;

        let mut decoder = StreamDecoder::new();
        let mut stderr_lines = BufReader::new(stderr).lines();
        let mut buf = vec![0u8; READ_CHUNK];
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut cancelled = false;

        while stdout_open || stderr_open {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                read = stdout.read(&mut buf), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => self.aggregator.handle_batch(decoder.feed(&buf[..n])),
                    Err(e) => {
                        warn!(error = %e, "Failed to read test output");
                        stdout_open = false;
                    }
                },
                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => self.aggregator.handle_stderr(&line),
                    Ok(None) => stderr_open = false,
                    Err(e) => {
                        warn!(error = %e, "Failed to read test stderr");
                        stderr_open = false;
                    }
                },
            }
        }

        if cancelled {
            info!(?pid, "Run cancelled; terminating process tree");
            if let Some(pid) = pid {
                self.supervisor.terminate_tree(pid).await;
            }
            if tokio::time::timeout(REAP_TIMEOUT, exit).await.is_err() {
                debug!(?pid, "Process not reaped after termination");
            }
            self.aggregator
                .log_line("[testlens] Run cancelled; process tree terminated");
            return RunOutcome::Cancelled;
        }

        if let Some(last) = decoder.finish() {
            self.aggregator.handle_decoded(last);
        }

        match exit.await {
            Ok(exit_code) => RunOutcome::Completed { exit_code },
            Err(e) => {
                warn!(error = %e, "Failed to wait for test process");
                RunOutcome::Completed { exit_code: None }
            }
        }
    }

    fn finish(
        &mut self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        clock: Instant,
        outcome: RunOutcome,
    ) -> RunReport {
        let duration = clock.elapsed();
        self.aggregator.log_line(&format!(
            "[testlens] Run {run_id} finished in {:.2}s ({outcome})",
            duration.as_secs_f64()
        ));
        let summary = self.aggregator.finish_run();
        let stats = self.aggregator.stats();
        info!(
            %run_id,
            %outcome,
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            "Test run finished"
        );

        RunReport {
            run_id,
            started_at,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            outcome,
            stats,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    fn profile() -> Profile {
        Profile::named("ci")
            .with_flags(["-race", "-count=1"])
            .with_env([("CGO_ENABLED", "1")])
    }

    #[test]
    fn test_command_for_all() {
        let spec = Toolchain::default().command(&RunScope::All, &profile(), Path::new("/ws"));
        assert_eq!(spec.program, "go");
        assert_eq!(spec.args, vec!["test", "-json", "-race", "-count=1", "./..."]);
        assert_eq!(spec.env.get("CGO_ENABLED").map(String::as_str), Some("1"));
        assert_eq!(spec.cwd, PathBuf::from("/ws"));
    }

    #[test]
    fn test_command_for_group() {
        let spec = Toolchain::default().command(
            &RunScope::Group("example.com/calc".to_string()),
            &Profile::builtin(),
            Path::new("/ws"),
        );
        assert_eq!(spec.args, vec!["test", "-json", "example.com/calc"]);
    }

    #[test]
    fn test_command_for_case() {
        let scope = RunScope::from_selection(
            Some("example.com/calc".to_string()),
            Some("TestAdd".to_string()),
        );
        let spec = Toolchain::with_program("go1.22").command(&scope, &profile(), Path::new("/ws"));
        assert_eq!(spec.program, "go1.22");
        assert_eq!(
            spec.args,
            vec!["test", "-json", "-run", "^TestAdd$", "-race", "-count=1", "example.com/calc"]
        );
    }

    #[test]
    fn test_escape_case() {
        assert_eq!(escape_case("TestAdd"), "TestAdd");
        assert_eq!(escape_case("Test.Add(x)"), r"Test\.Add\(x\)");
        assert_eq!(escape_case("TestTable/a+b"), r"TestTable/a\+b");
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            RunOutcome::Completed { exit_code: Some(1) }.to_string(),
            "exit code 1"
        );
        assert_eq!(RunOutcome::Cancelled.to_string(), "cancelled");
    }
}
