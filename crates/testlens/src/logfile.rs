// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Persistent log destinations

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use testlens_core::sink::LogSink;

/// Appends log batches to a file, creating it and its directory as needed
#[derive(Debug)]
pub struct FileLogSink {
    path: PathBuf,
    file: File,
}

impl FileLogSink {
    /// Open `path` for appending
    ///
    /// # Errors
    ///
    /// Returns the IO error if the directory or file cannot be created.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn write_batch(&mut self, text: &str) -> io::Result<()> {
        self.file.write_all(text.as_bytes())?;
        self.file.flush()
    }
}

/// Writes log batches to standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutLogSink;

impl LogSink for StdoutLogSink {
    fn write_batch(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }
}

/// Writes log batches to standard error
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrLogSink;

impl LogSink for StderrLogSink {
    fn write_batch(&mut self, text: &str) -> io::Result<()> {
        let mut err = io::stderr().lock();
        err.write_all(text.as_bytes())?;
        err.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use similar_asserts::assert_eq;

    #[test]
    fn test_file_sink_appends() {
        let dir = std::env::temp_dir().join(format!("testlens-logfile-{}", std::process::id()));
        let path = dir.join("nested").join("run.log");
        let _ = std::fs::remove_dir_all(&dir);

        {
            let mut sink = FileLogSink::open(&path).expect("open log");
            assert_eq!(sink.path(), path.as_path());
            sink.write_batch("first\n").expect("write");
        }
        {
            let mut sink = FileLogSink::open(&path).expect("reopen log");
            sink.write_batch("second\n").expect("write");
        }

        let text = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(text, "first\nsecond\n");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
