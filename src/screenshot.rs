//! Persisting capture events as numbered screenshots.
//!
//! Each run owns its output directory: [`ScreenshotWriter::create`] removes
//! whatever a previous run left there and truncates the time index, so the
//! directory always reflects the latest run only.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SlidegrabError;
use crate::motion::CaptureEvent;

/// Writes `{ordinal:03}_{seconds}.{ext}` images and a parallel time index.
#[derive(Debug)]
pub struct ScreenshotWriter {
    directory: PathBuf,
    extension: String,
    index: BufWriter<File>,
    written: Vec<PathBuf>,
}

impl ScreenshotWriter {
    /// Recreate `directory` empty and truncate `time_index`.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::IoError`] if the directory cannot be
    /// removed or created, or the index file cannot be opened.
    pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(
        directory: P,
        time_index: Q,
        extension: &str,
    ) -> Result<Self, SlidegrabError> {
        let directory = directory.as_ref().to_path_buf();
        if directory.exists() {
            log::debug!("Clearing previous screenshots in {}", directory.display());
            fs::remove_dir_all(&directory)?;
        }
        fs::create_dir_all(&directory)?;

        let index = BufWriter::new(File::create(time_index.as_ref())?);

        Ok(Self {
            directory,
            extension: extension.to_string(),
            index,
            written: Vec::new(),
        })
    }

    /// Encode one event and record its time.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::ImageError`] if the image cannot be
    /// encoded, or [`SlidegrabError::IoError`] if the index cannot be
    /// written.
    pub fn write(&mut self, event: &CaptureEvent) -> Result<(), SlidegrabError> {
        let seconds = event.rounded_seconds();
        let file_name = format!("{:03}_{seconds}.{}", self.written.len(), self.extension);
        let path = self.directory.join(file_name);

        event.image.save(&path)?;
        writeln!(self.index, "{seconds}")?;
        log::debug!("Saved screenshot {} at {seconds}s", path.display());

        self.written.push(path);
        Ok(())
    }

    /// Number of screenshots written so far.
    pub fn count(&self) -> usize {
        self.written.len()
    }

    /// Flush the time index and return the written image paths in order.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::IoError`] if the index cannot be flushed.
    pub fn finish(mut self) -> Result<Vec<PathBuf>, SlidegrabError> {
        self.index.flush()?;
        Ok(self.written)
    }
}
