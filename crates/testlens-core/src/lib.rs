// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! testlens-core: Test event processing for testlens
//!
//! This library crate turns the line-delimited JSON event stream of
//! `go test -json` into per-test results, bounded failure output, a
//! persistent log and an end-of-run summary.
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use testlens_core::prelude::*;
//!
//! let catalog = TestCatalog::from_groups([("example.com/calc", vec!["TestAdd"])]);
//! let mut aggregator = Aggregator::new(
//!     catalog,
//!     PathBuf::from("/ws"),
//!     RecordingReporter::new(),
//!     MemoryLogSink::new(),
//! );
//!
//! let stream = concat!(
//!     r#"{"Action":"run","Package":"example.com/calc","Test":"TestAdd"}"#,
//!     "\n",
//!     r#"{"Action":"pass","Package":"example.com/calc","Test":"TestAdd","Elapsed":0.01}"#,
//!     "\n",
//! );
//!
//! aggregator.begin_run();
//! let mut decoder = StreamDecoder::new();
//! aggregator.handle_batch(decoder.feed(stream.as_bytes()));
//! let summary = aggregator.finish_run();
//! assert!(summary.all_passed());
//! ```

pub mod aggregator;
pub mod decoder;
pub mod error;
pub mod event;
pub mod failure;
pub mod identity;
pub mod result;
pub mod sink;
pub mod store;
pub mod summary;

pub use aggregator::{Aggregator, RunStats};
pub use decoder::StreamDecoder;
pub use error::{CoreError, DecodeError};
pub use event::{TestEvent, TestRef, decode_all, decode_line};
pub use failure::{FailureLocation, FailureRecord, extract_location, looks_like_failure};
pub use identity::{CaseEntry, Resolution, SourceSpan, TestCatalog, TestId};
pub use result::{Lifecycle, TestResult, TestStatus};
pub use sink::{LogSink, MemoryLogSink, OutputBuffer, RecordingReporter, TestReporter};
pub use store::{GroupRollup, RunStore};
pub use summary::{OutputFilter, OutputFilterPolicy, Summary};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::aggregator::Aggregator;
    pub use crate::decoder::StreamDecoder;
    pub use crate::error::{CoreError, DecodeError};
    pub use crate::event::TestEvent;
    pub use crate::identity::{TestCatalog, TestId};
    pub use crate::result::TestStatus;
    pub use crate::sink::{LogSink, MemoryLogSink, RecordingReporter, TestReporter};
    pub use crate::summary::{OutputFilter, Summary};
}
