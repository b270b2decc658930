// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Fuzz target for user-supplied run input
//!
//! Profile files, `KEY=VALUE` pairs and case names all come from the user;
//! none of them may panic command construction.

#![no_main]

use std::path::Path;

use libfuzzer_sys::fuzz_target;

use testlens::config::parse_env_pair;
use testlens::profile::{ActiveProfileProvider, ProfileFile, ProfileStore};
use testlens::{RunScope, Toolchain};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_env_pair(s);

    let profile = match serde_json::from_str::<ProfileFile>(s) {
        Ok(file) => ProfileStore::from_file(file).active_profile(),
        Err(_) => Default::default(),
    };

    let (group, case) = s.split_once('\n').unwrap_or((s, s));
    let scope = RunScope::Case {
        group: group.to_string(),
        case: case.to_string(),
    };
    let spec = Toolchain::default().command(&scope, &profile, Path::new("/fuzz"));
    assert_eq!(spec.args.last().map(String::as_str), Some(group));
    let _ = spec.to_string();
});
