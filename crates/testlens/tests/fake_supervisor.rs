// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Scripted process supervisor for controller tests
//!
//! Stands in for the toolchain: hands back canned stdout/stderr, a process
//! that never exits until it is terminated, or a spawn failure. Every spawn
//! and termination is recorded for assertions.

#![allow(dead_code)]

use std::io::{self, Cursor};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use testlens::supervisor::{CommandSpec, ProcessSupervisor, SpawnedProcess};
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;

/// Fake pid handed out for every spawn
pub const FAKE_PID: u32 = 4242;

/// What the next spawn does
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit the given output, then exit with `exit_code`
    Exits {
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        exit_code: i32,
    },
    /// Emit `stdout`, then hang until terminated
    Hangs { stdout: Vec<u8> },
    /// Fail to start
    SpawnFails,
}

impl Script {
    /// Exit with `code` after printing `stdout`
    pub fn exits(stdout: &str, exit_code: i32) -> Self {
        Self::Exits {
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
            exit_code,
        }
    }

    /// Hang after printing `stdout`
    pub fn hangs(stdout: &str) -> Self {
        Self::Hangs {
            stdout: stdout.as_bytes().to_vec(),
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    spawned: Vec<CommandSpec>,
    terminated: Vec<u32>,
}

/// [`ProcessSupervisor`] driven by a [`Script`]
#[derive(Debug, Clone)]
pub struct FakeSupervisor {
    script: Script,
    recorded: Arc<Mutex<Recorded>>,
    killed: Arc<Notify>,
}

impl FakeSupervisor {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            recorded: Arc::new(Mutex::new(Recorded::default())),
            killed: Arc::new(Notify::new()),
        }
    }

    /// Commands passed to `spawn`, in order
    pub fn spawned(&self) -> Vec<CommandSpec> {
        self.recorded.lock().expect("lock").spawned.clone()
    }

    /// Pids passed to `terminate_tree`, in order
    pub fn terminated(&self) -> Vec<u32> {
        self.recorded.lock().expect("lock").terminated.clone()
    }
}

#[async_trait]
impl ProcessSupervisor for FakeSupervisor {
    async fn spawn(&self, spec: &CommandSpec) -> io::Result<SpawnedProcess> {
        self.recorded
            .lock()
            .expect("lock")
            .spawned
            .push(spec.clone());

        match &self.script {
            Script::Exits {
                stdout,
                stderr,
                exit_code,
            } => {
                let code = *exit_code;
                Ok(SpawnedProcess {
                    pid: Some(FAKE_PID),
                    stdout: Box::new(Cursor::new(stdout.clone())),
                    stderr: Box::new(Cursor::new(stderr.clone())),
                    exit: Box::pin(async move { Ok(Some(code)) }),
                })
            }
            Script::Hangs { stdout } => {
                let (mut writer, reader) = tokio::io::duplex(1 << 20);
                writer.write_all(stdout).await?;
                let killed = Arc::clone(&self.killed);
                Ok(SpawnedProcess {
                    pid: Some(FAKE_PID),
                    stdout: Box::new(reader),
                    stderr: Box::new(tokio::io::empty()),
                    exit: Box::pin(async move {
                        // Holding the writer keeps stdout open until the kill.
                        let _writer = writer;
                        killed.notified().await;
                        Ok(None)
                    }),
                })
            }
            Script::SpawnFails => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "program not found",
            )),
        }
    }

    async fn terminate_tree(&self, pid: u32) {
        self.recorded.lock().expect("lock").terminated.push(pid);
        self.killed.notify_one();
    }
}
