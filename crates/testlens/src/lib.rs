// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testlens library
//!
//! The pieces of the `testlens` binary: configuration, run profiles,
//! process supervision, the execution controller and the console and log
//! destinations. Exported for integration tests and embedding.

pub mod config;
pub mod console;
pub mod controller;
pub mod logfile;
pub mod profile;
pub mod replay;
pub mod supervisor;

pub use controller::{Controller, ControllerError, RunOutcome, RunReport, RunScope, Toolchain};
pub use profile::{ActiveProfileProvider, Profile, ProfileOverlay, ProfileStore, StaticProfile};
pub use supervisor::{CommandSpec, ProcessSupervisor, SpawnedProcess, SystemSupervisor};
