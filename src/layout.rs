//! Per-label on-disk layout.
//!
//! Every label owns one directory under the data root:
//!
//! ```text
//! {data_dir}/{label}/
//!     {label}.mp4
//!     images_{label}/000_0.png ...
//!     ppt_{label}.pdf
//!     time_{label}.txt
//!     video_segments/  audio_segments/
//!     GenerateVideoSource.mpd
//!     GenerateVideoSource_adjust.mpd
//! ```
//!
//! A [`LabelContext`] carries the label and all of these paths and is passed
//! explicitly to every stage.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::SlidegrabError;

/// File name of the downloaded manifest.
pub const MANIFEST_FILE: &str = "GenerateVideoSource.mpd";
/// File name of the manifest rewritten to point at local segments.
pub const ADJUSTED_MANIFEST_FILE: &str = "GenerateVideoSource_adjust.mpd";
pub const VIDEO_SEGMENTS_DIR: &str = "video_segments";
pub const AUDIO_SEGMENTS_DIR: &str = "audio_segments";

/// One row of the label spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelRecord {
    pub label: String,
    pub title: Option<String>,
    pub manifest_url: Option<String>,
}

impl LabelRecord {
    /// Record with only a label, as used when labels come from the command
    /// line.
    pub fn from_label<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            title: None,
            manifest_url: None,
        }
    }
}

/// The label being processed and every path derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelContext {
    label: String,
    root: PathBuf,
}

impl LabelContext {
    /// Context for `label` under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] for an empty label or one
    /// that would escape the data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P, label: &str) -> Result<Self, SlidegrabError> {
        let label = label.trim();
        if label.is_empty()
            || label == "."
            || label == ".."
            || label.contains(['/', '\\'])
        {
            return Err(SlidegrabError::InvalidConfig(format!(
                "`{label}` is not a usable label"
            )));
        }

        Ok(Self {
            label: label.to_string(),
            root: data_dir.as_ref().join(label),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The label directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The recorded lecture video.
    pub fn video(&self) -> PathBuf {
        self.root.join(format!("{}.mp4", self.label))
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(format!("images_{}", self.label))
    }

    pub fn pdf(&self) -> PathBuf {
        self.root.join(format!("ppt_{}.pdf", self.label))
    }

    /// One rounded capture time per line, in screenshot order.
    pub fn time_index(&self) -> PathBuf {
        self.root.join(format!("time_{}.txt", self.label))
    }

    pub fn video_segments(&self) -> PathBuf {
        self.root.join(VIDEO_SEGMENTS_DIR)
    }

    pub fn audio_segments(&self) -> PathBuf {
        self.root.join(AUDIO_SEGMENTS_DIR)
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn adjusted_manifest(&self) -> PathBuf {
        self.root.join(ADJUSTED_MANIFEST_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_the_label() {
        let context = LabelContext::new("data", "cs101").unwrap();
        assert_eq!(context.root(), Path::new("data/cs101"));
        assert_eq!(context.video(), Path::new("data/cs101/cs101.mp4"));
        assert_eq!(context.images_dir(), Path::new("data/cs101/images_cs101"));
        assert_eq!(context.pdf(), Path::new("data/cs101/ppt_cs101.pdf"));
        assert_eq!(context.time_index(), Path::new("data/cs101/time_cs101.txt"));
        assert_eq!(
            context.adjusted_manifest(),
            Path::new("data/cs101/GenerateVideoSource_adjust.mpd")
        );
    }

    #[test]
    fn unusable_labels_are_rejected() {
        assert!(LabelContext::new("data", "").is_err());
        assert!(LabelContext::new("data", "  ").is_err());
        assert!(LabelContext::new("data", "..").is_err());
        assert!(LabelContext::new("data", "a/b").is_err());
    }
}
