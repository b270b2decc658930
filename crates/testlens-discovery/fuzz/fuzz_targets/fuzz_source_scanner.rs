// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for the Go test source scanner

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;

use testlens_discovery::scanner::scan_source;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    for case in scan_source(&text, Path::new("fuzz_test.go")) {
        if let Some(span) = case.span {
            assert!(span.start_line <= span.end_line);
        }
    }
});
