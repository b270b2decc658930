// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Source scanning for test declarations
//!
//! Test files are read as plain text; nothing is compiled or type-checked.
//! A case is any top-level `func TestXxx(`, `func FuzzXxx(` or
//! `func ExampleXxx(` declaration whose name the toolchain would run.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use testlens_core::identity::{CaseEntry, SourceSpan};

/// Top-level function declarations with a runnable prefix
static CASE_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^func\s+((?:Test|Fuzz|Example)[\p{L}\p{N}_]*)\s*(?:\[[^\]]*\])?\s*\(")
        .expect("valid case declaration pattern")
});

/// Prefixes the toolchain treats as runnable cases
const PREFIXES: &[&str] = &["Test", "Fuzz", "Example"];

/// Whether a file name follows the test file convention
#[must_use]
pub fn is_test_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| name.ends_with("_test.go") && !name.starts_with(['.', '_']))
}

/// Whether a function name is run by the toolchain
///
/// The character after the prefix must not be a lower-case letter
/// (`Testify` is not a test). `TestMain` is the package's entry hook.
#[must_use]
pub fn is_case_name(name: &str) -> bool {
    if name == "TestMain" {
        return false;
    }
    PREFIXES.iter().any(|prefix| {
        name.strip_prefix(prefix)
            .is_some_and(|rest| rest.chars().next().is_none_or(|c| !c.is_lowercase()))
    })
}

/// Scan one file's text for cases, in declaration order
///
/// Each case's span ends at the first following line that starts with `}`.
/// A body opened and closed on the declaration line, or a missing closing
/// line, gives a span of just the declaration line.
#[must_use]
pub fn scan_source(text: &str, file: &Path) -> Vec<CaseEntry> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cases = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(caps) = CASE_DECL.captures(line) else {
            continue;
        };
        let Some(name) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if !is_case_name(name) {
            continue;
        }

        let end_idx = if closes_on_same_line(line) {
            idx
        } else {
            lines[idx + 1..]
                .iter()
                .position(|l| l.starts_with('}'))
                .map_or(idx, |offset| idx + 1 + offset)
        };

        cases.push(CaseEntry {
            name: name.to_string(),
            span: Some(SourceSpan {
                file: file.to_path_buf(),
                start_line: line_number(idx),
                end_line: line_number(end_idx),
            }),
        });
    }

    cases
}

/// Whether a declaration line opens its body and closes it again
fn closes_on_same_line(line: &str) -> bool {
    let opens = line.matches('{').count();
    opens > 0 && opens == line.matches('}').count()
}

fn line_number(idx: usize) -> u32 {
    u32::try_from(idx + 1).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    const SOURCE: &str = r#"package calc

import "testing"

func TestMain(m *testing.M) {
	m.Run()
}

func TestAdd(t *testing.T) {
	if Add(1, 2) != 3 {
		t.Fatal("bad")
	}
}

func Testify(t *testing.T) {}

func helper(t *testing.T) {
}

func (s *suite) TestMethod(t *testing.T) {
}

func FuzzParse(f *testing.F) {
	f.Fuzz(func(t *testing.T, s string) {})
}

func Example() {
	// Output:
}

func Test_underscore(t *testing.T) { t.Log("x") }
"#;

    #[test]
    fn test_scan_finds_runnable_cases_in_order() {
        let cases = scan_source(SOURCE, Path::new("calc_test.go"));
        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["TestAdd", "FuzzParse", "Example", "Test_underscore"]);
    }

    #[test]
    fn test_scan_spans() {
        let cases = scan_source(SOURCE, Path::new("calc_test.go"));
        let add = cases[0].span.as_ref().expect("span");
        assert_eq!(add.file, std::path::PathBuf::from("calc_test.go"));
        assert_eq!((add.start_line, add.end_line), (9, 13));

        // No closing brace follows, so the span is the declaration line.
        let last = cases[3].span.as_ref().expect("span");
        assert_eq!(last.start_line, last.end_line);
    }

    #[test]
    fn test_one_line_body_ends_on_declaration() {
        let source = "func TestA(t *testing.T) { t.Log(\"x\") }\n\nfunc TestB(t *testing.T) {\n\tt.Log(\"y\")\n}\n";
        let cases = scan_source(source, Path::new("a_test.go"));
        let spans: Vec<_> = cases
            .iter()
            .filter_map(|c| c.span.as_ref().map(|s| (s.start_line, s.end_line)))
            .collect();
        assert_eq!(spans, vec![(1, 1), (3, 5)]);
    }

    #[test]
    fn test_is_case_name() {
        assert!(is_case_name("TestAdd"));
        assert!(is_case_name("Test"));
        assert!(is_case_name("Test_x"));
        assert!(is_case_name("ExampleCalc_Add"));
        assert!(!is_case_name("Testify"));
        assert!(!is_case_name("TestMain"));
        assert!(!is_case_name("BenchmarkAdd"));
    }

    #[test]
    fn test_is_test_file() {
        assert!(is_test_file(Path::new("pkg/calc_test.go")));
        assert!(!is_test_file(Path::new("pkg/calc.go")));
        assert!(!is_test_file(Path::new("pkg/_skip_test.go")));
        assert!(!is_test_file(Path::new("pkg/.hidden_test.go")));
    }

    #[test]
    fn test_generic_fuzz_declaration() {
        let cases = scan_source("func FuzzX[T any](f *testing.F) {\n}\n", Path::new("x_test.go"));
        assert_eq!(cases.len(), 1);
    }
}
