// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for the stream decoder and aggregator
//!
//! Arbitrary bytes are split at a data-dependent point and fed in two chunks,
//! then every decoded event is applied to an aggregator.

#![no_main]

use std::path::PathBuf;

use libfuzzer_sys::fuzz_target;

use testlens_core::prelude::*;

fuzz_target!(|data: &[u8]| {
    let split = data.first().map_or(0, |&b| usize::from(b)).min(data.len());
    let catalog = TestCatalog::from_groups([("pkg/a", vec!["TestOne", "TestTwo"])]);
    let mut aggregator = Aggregator::new(
        catalog,
        PathBuf::from("/fuzz"),
        RecordingReporter::new(),
        MemoryLogSink::new(),
    );
    aggregator.begin_run();

    let mut decoder = StreamDecoder::new();
    aggregator.handle_batch(decoder.feed(&data[..split]));
    aggregator.handle_batch(decoder.feed(&data[split..]));
    if let Some(last) = decoder.finish() {
        aggregator.handle_decoded(last);
    }

    let _ = aggregator.finish_run().render();
});
