// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Process spawning and process-tree termination
//!
//! The toolchain forks its own children (compiled test binaries), so
//! cancelling a run has to take down more than the tracked pid.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tracing::{debug, info};

/// Everything needed to start the toolchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to run
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
    /// Variables overlaid on the inherited environment
    pub env: BTreeMap<String, String>,
    /// Working directory
    pub cwd: PathBuf,
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.env {
            write!(f, "{key}={value} ")?;
        }
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Byte stream of a child's stdout or stderr
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Resolves to the exit code once the child has been reaped
pub type ExitFuture = Pin<Box<dyn Future<Output = io::Result<Option<i32>>> + Send>>;

/// A started process and its output streams
pub struct SpawnedProcess {
    /// OS process id, if the process is still known to the OS
    pub pid: Option<u32>,
    /// Standard output
    pub stdout: OutputStream,
    /// Standard error
    pub stderr: OutputStream,
    /// Exit status
    pub exit: ExitFuture,
}

impl fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnedProcess")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Starts processes and tears down process trees
#[async_trait]
pub trait ProcessSupervisor: Send + Sync {
    /// Start a process with piped stdout and stderr
    async fn spawn(&self, spec: &CommandSpec) -> io::Result<SpawnedProcess>;

    /// Kill `pid` and its children; failures are logged, never returned
    async fn terminate_tree(&self, pid: u32);
}

/// [`ProcessSupervisor`] backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSupervisor;

#[async_trait]
impl ProcessSupervisor for SystemSupervisor {
    async fn spawn(&self, spec: &CommandSpec) -> io::Result<SpawnedProcess> {
        let mut child = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let pid = child.id();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not captured"))?;
        debug!(?pid, program = %spec.program, "Spawned process");

        Ok(SpawnedProcess {
            pid,
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            exit: Box::pin(async move { child.wait().await.map(|status| status.code()) }),
        })
    }

    async fn terminate_tree(&self, pid: u32) {
        terminate_tree(pid).await;
    }
}

#[cfg(unix)]
async fn terminate_tree(pid: u32) {
    let children = match tokio::process::Command::new("pgrep")
        .arg("-P")
        .arg(pid.to_string())
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) => parse_pids(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            info!(pid, error = %e, "Could not list child processes");
            Vec::new()
        }
    };

    for child in children {
        kill(child);
    }
    kill(pid);
}

#[cfg(unix)]
fn kill(pid: u32) {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill has no memory-safety preconditions.
    let rc = unsafe { libc::kill(raw, libc::SIGKILL) };
    if rc == 0 {
        debug!(pid, "Sent SIGKILL");
        return;
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        info!(pid, "Process already exited");
    } else {
        info!(pid, error = %err, "Failed to kill process");
    }
}

#[cfg(windows)]
async fn terminate_tree(pid: u32) {
    let result = tokio::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if status.success() => debug!(pid, "Terminated process tree"),
        Ok(status) => info!(pid, ?status, "taskkill did not succeed; process may have exited"),
        Err(e) => info!(pid, error = %e, "Could not run taskkill"),
    }
}

/// Parse whitespace-separated pids, ignoring anything else
#[must_use]
pub fn parse_pids(text: &str) -> Vec<u32> {
    text.split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_parse_pids() {
        assert_eq!(parse_pids("123\n456\n"), vec![123, 456]);
        assert_eq!(parse_pids(""), Vec::<u32>::new());
        assert_eq!(parse_pids("12 x 13"), vec![12, 13]);
    }

    #[test]
    fn test_command_display() {
        let spec = CommandSpec {
            program: "go".to_string(),
            args: vec!["test".to_string(), "-json".to_string(), "./...".to_string()],
            env: BTreeMap::from([("CGO_ENABLED".to_string(), "0".to_string())]),
            cwd: PathBuf::from("/ws"),
        };
        assert_eq!(spec.to_string(), "CGO_ENABLED=0 go test -json ./...");
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let spec = CommandSpec {
            program: "testlens-definitely-not-a-program".to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: std::env::temp_dir(),
        };
        assert!(SystemSupervisor.spawn(&spec).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spawn_and_read_output() {
        let spec = CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "echo out; echo err >&2; exit 3".to_string()],
            env: BTreeMap::new(),
            cwd: std::env::temp_dir(),
        };
        let mut process = SystemSupervisor.spawn(&spec).await.expect("spawn sh");
        let mut out = String::new();
        process
            .stdout
            .read_to_string(&mut out)
            .await
            .expect("read stdout");
        let mut err = String::new();
        process
            .stderr
            .read_to_string(&mut err)
            .await
            .expect("read stderr");
        assert_eq!(out, "out\n");
        assert_eq!(err, "err\n");
        assert_eq!(process.exit.await.expect("exit"), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_tree_kills_children() {
        let spec = CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30 & sleep 30; wait".to_string()],
            env: BTreeMap::new(),
            cwd: std::env::temp_dir(),
        };
        let process = SystemSupervisor.spawn(&spec).await.expect("spawn sh");
        let pid = process.pid.expect("pid");

        SystemSupervisor.terminate_tree(pid).await;
        let exit = tokio::time::timeout(std::time::Duration::from_secs(10), process.exit)
            .await
            .expect("process exits after kill")
            .expect("wait succeeds");
        assert_eq!(exit, None, "killed by signal");

        // Already gone: swallowed.
        SystemSupervisor.terminate_tree(pid).await;
    }
}
