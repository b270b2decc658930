// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Error types for testlens-discovery

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during test discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The workspace root does not exist or is not a directory
    #[error("Workspace root not found: {path}")]
    RootNotFound {
        /// The path that was given as root
        path: PathBuf,
    },

    /// Reading a file failed
    #[error("Failed to read {path}: {source}")]
    Io {
        /// The file being read
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Walking the directory tree failed
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A scan task panicked or was cancelled
    #[error("Scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
