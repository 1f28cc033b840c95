#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Append-only activity log backed by a timestamped JSON-lines file.
//!
//! A fresh file named `<YYYY-mm-dd_HH-MM-SS>_activity.jsonl` is created for
//! every log instance. Each record becomes one JSON object holding the local
//! wall-clock time, the category and the message. Records are written as they
//! arrive; a failed write is reported through `tracing` and the record is
//! dropped.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::Local;
use mob_limiter_core::{ActivityRecord, ActivitySink};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

const FILE_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const RECORD_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised while setting up the log file.
#[derive(Debug, Error)]
pub enum ActivityLogError {
    /// The directory or the file could not be created.
    #[error("failed to create activity log at {path}")]
    Create {
        /// Location that could not be created.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

#[derive(Serialize)]
struct LogLine<'a> {
    timestamp: String,
    category: &'a str,
    message: &'a str,
}

/// Activity sink writing to a JSON-lines file.
#[derive(Debug)]
pub struct ActivityLog {
    path: PathBuf,
    file: File,
    enabled: bool,
}

impl ActivityLog {
    /// Creates `dir` if needed and opens a new timestamped log file inside it.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory or the file cannot be created.
    pub fn create(dir: impl AsRef<Path>, enabled: bool) -> Result<Self, ActivityLogError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| ActivityLogError::Create {
            path: dir.to_path_buf(),
            source,
        })?;

        let stamp = Local::now().format(FILE_STAMP_FORMAT);
        let path = dir.join(format!("{stamp}_activity.jsonl"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ActivityLogError::Create {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), enabled, "opened activity log");

        Ok(Self {
            path,
            file,
            enabled,
        })
    }

    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reports whether records are currently written.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Starts or stops writing records, typically after a configuration
    /// reload.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn append(&mut self, record: &ActivityRecord) -> io::Result<()> {
        let line = LogLine {
            timestamp: Local::now().format(RECORD_STAMP_FORMAT).to_string(),
            category: record.category.as_str(),
            message: &record.message,
        };
        let encoded = serde_json::to_string(&line)?;
        writeln!(self.file, "{encoded}")
    }
}

impl ActivitySink for ActivityLog {
    fn record(&mut self, record: ActivityRecord) {
        if !self.enabled {
            return;
        }
        if let Err(err) = self.append(&record) {
            error!(
                path = %self.path.display(),
                category = %record.category,
                error = %err,
                "failed to write activity record"
            );
        }
    }
}
