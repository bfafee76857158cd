//! Append-only record of per-label failures.
//!
//! One JSON object per line:
//!
//! ```text
//! {"label":"cs101","stage":"acquisition","kind":"network","message":"...","timestamp":"2024-03-01T10:15:00+00:00"}
//! ```
//!
//! Records are only ever appended, so the log accumulates across runs.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SlidegrabError;

/// Pipeline stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Slideshow,
    Acquisition,
    Recording,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Slideshow => "slideshow",
            Stage::Acquisition => "acquisition",
            Stage::Recording => "recording",
        };
        f.write_str(name)
    }
}

/// One failed stage of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub label: String,
    pub stage: Stage,
    /// Error family, see [`SlidegrabError::kind`].
    pub kind: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(label: &str, stage: Stage, error: &SlidegrabError) -> Self {
        Self {
            label: label.to_string(),
            stage,
            kind: error.kind().to_string(),
            message: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Handle on the JSON-lines failure log.
#[derive(Debug, Clone)]
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file and its directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::IoError`] or [`SlidegrabError::Json`] if
    /// the record cannot be written.
    pub fn append(&self, record: &FailureRecord) -> Result<(), SlidegrabError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Every record in the log, oldest first. A missing log is empty.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::IoError`] if the file cannot be read and
    /// [`SlidegrabError::Json`] for a malformed line.
    pub fn read_all(&self) -> Result<Vec<FailureRecord>, SlidegrabError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}
