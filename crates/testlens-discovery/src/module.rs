// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Module manifest handling
//!
//! Group names are import paths: the `module` line of the root `go.mod`
//! joined with the package directory relative to the root.

use std::path::{Component, Path};

/// Name of the module manifest
pub const MANIFEST: &str = "go.mod";

/// Extract the module path from manifest text
#[must_use]
pub fn parse_module_path(manifest: &str) -> Option<String> {
    manifest.lines().find_map(|line| {
        let line = line.split("//").next().unwrap_or_default().trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let path = rest.trim().trim_matches(|c| c == '"' || c == '`');
        (!path.is_empty()).then(|| path.to_string())
    })
}

/// Import path of the package in `rel_dir` (relative to the module root)
#[must_use]
pub fn import_path(module: &str, rel_dir: &Path) -> String {
    let mut path = module.to_string();
    for component in rel_dir.components() {
        if let Component::Normal(part) = component {
            path.push('/');
            path.push_str(&part.to_string_lossy());
        }
    }
    path
}
