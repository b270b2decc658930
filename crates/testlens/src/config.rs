// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Configuration for the testlens CLI
//!
//! Command-line arguments, environment overrides and the defaults derived
//! from them: workspace root, profile file, log destination and logging
//! level.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use testlens_core::summary::OutputFilter;

/// testlens - run Go tests and follow their results live
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "testlens")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Subcommand to run (defaults to `run` over the whole workspace)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Workspace root containing `go.mod`
    ///
    /// Defaults to the current working directory.
    #[arg(short, long, global = true, env = "TESTLENS_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Name of the profile to use
    ///
    /// Overrides the `active` entry of the profile file.
    #[arg(short, long, global = true, env = "TESTLENS_PROFILE")]
    pub profile: Option<String>,

    /// Path to the profile file
    ///
    /// Defaults to `testlens/profiles.json` under the platform config
    /// directory. A missing file means only the built-in `default` profile.
    #[arg(long, global = true, env = "TESTLENS_PROFILES")]
    pub profiles: Option<PathBuf>,

    /// Append the persistent log to this file instead of the console
    #[arg(short, long, global = true, env = "TESTLENS_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Test toolchain program
    #[arg(long, global = true, env = "TESTLENS_PROGRAM")]
    pub program: Option<String>,

    /// Enable verbose logging (debug level)
    ///
    /// Also surfaces undecodable records and events for unknown tests.
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Quiet mode - suppress info-level logs
    ///
    /// Only errors and warnings will be logged.
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Discover and run tests
    ///
    /// Example:
    ///   testlens run --group example.com/calc --case TestAdd --flag -race
    Run(RunArgs),

    /// List discovered tests without running anything
    List {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Aggregate a saved `go test -json` stream
    ///
    /// Example:
    ///   go test -json ./... > run.jsonl; testlens replay run.jsonl
    Replay(ReplayArgs),
}

/// Arguments of the `run` subcommand
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Run only this group (package import path)
    #[arg(long)]
    pub group: Option<String>,

    /// Run only this case of `--group`
    #[arg(long, requires = "group")]
    pub case: Option<String>,

    /// Extra toolchain flag appended to the active profile (repeatable)
    #[arg(long = "flag", value_name = "FLAG", allow_hyphen_values = true)]
    pub flags: Vec<String>,

    /// Extra environment variable for the run, as KEY=VALUE (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Which tests the summary lists: all, failed, passed or skipped
    #[arg(long, default_value = "all")]
    pub filter: OutputFilter,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Echo each test's live output to the console
    #[arg(long)]
    pub show_output: bool,
}

/// Arguments of the `replay` subcommand
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Saved stream file
    pub file: PathBuf,

    /// Which tests the summary lists: all, failed, passed or skipped
    #[arg(long, default_value = "all")]
    pub filter: OutputFilter,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// How the end-of-run summary is printed
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    /// Machine-readable JSON
    Json,
}

/// Parse a `KEY=VALUE` pair
///
/// # Errors
///
/// Returns a message if there is no `=` or the key is empty.
pub fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

impl Config {
    /// The subcommand, defaulting to a full run
    #[must_use]
    pub fn effective_command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunArgs::default()))
    }

    /// Get the workspace path, using current directory as default
    ///
    /// Returns `None` if no workspace is specified and the current
    /// directory cannot be determined.
    #[must_use]
    pub fn workspace_path(&self) -> Option<PathBuf> {
        self.workspace
            .clone()
            .or_else(|| std::env::current_dir().ok())
    }

    /// Get the profile file path, using a default if not specified
    ///
    /// Default location is platform-specific:
    /// - macOS: ~/Library/Application Support/testlens/profiles.json
    /// - Linux: ~/.config/testlens/profiles.json
    /// - Windows: %APPDATA%\testlens\profiles.json
    #[must_use]
    pub fn profiles_path(&self) -> PathBuf {
        self.profiles.clone().unwrap_or_else(|| {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("testlens")
                .join("profiles.json")
        })
    }

    /// Toolchain program, `go` unless overridden
    #[must_use]
    pub fn program(&self) -> &str {
        self.program.as_deref().unwrap_or("go")
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The workspace path is specified but doesn't exist
    /// - The log file's parent directory cannot be created
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref workspace) = self.workspace {
            if !workspace.exists() {
                return Err(ConfigError::WorkspaceNotFound(workspace.clone()));
            }
            if !workspace.is_dir() {
                return Err(ConfigError::WorkspaceNotDirectory(workspace.clone()));
            }
        }

        if let Some(parent) = self.log_file.as_ref().and_then(|p| p.parent())
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::LogDirectoryCreateFailed(parent.to_path_buf(), e))?;
        }

        if self.program().trim().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }

        Ok(())
    }

    /// Get the log level based on verbose/quiet flags
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else if self.quiet {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Workspace path not found
    #[error("Workspace path not found: {0}")]
    WorkspaceNotFound(PathBuf),

    /// Workspace path is not a directory
    #[error("Workspace path is not a directory: {0}")]
    WorkspaceNotDirectory(PathBuf),

    /// Failed to create the log file's directory
    #[error("Failed to create log directory {0}: {1}")]
    LogDirectoryCreateFailed(PathBuf, std::io::Error),

    /// The toolchain program is blank
    #[error("Toolchain program must not be empty")]
    EmptyProgram,
}
