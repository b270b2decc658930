// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testlens-discovery: Go test discovery for testlens
//!
//! This library crate finds the test cases of a Go workspace by scanning
//! `*_test.go` files as text, and groups them by package import path.

#![warn(missing_docs)]

//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use testlens_discovery::{DiscoverOptions, discover};
//!
//! # async fn run() -> Result<(), testlens_discovery::DiscoveryError> {
//! let discovery = discover(Path::new("."), &DiscoverOptions::default()).await?;
//! for (group, cases) in discovery.catalog.groups() {
//!     println!("{group}: {} tests", cases.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod discover;
pub mod error;
pub mod module;
pub mod scanner;

pub use discover::{DEFAULT_MAX_CONCURRENCY, DiscoverOptions, Discovery, discover};
pub use error::DiscoveryError;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::discover::{DiscoverOptions, Discovery, discover};
    pub use crate::error::DiscoveryError;
}
