//! Segment URL expansion and the parallel segment downloader.
//!
//! The manifest does not list its segments, so every candidate number from
//! zero up to a duration-based estimate is requested. Numbers past the real
//! end answer with an error status and are simply dropped. After the first
//! pass a verification pass re-requests only the holes: segments that are
//! missing or empty although a later segment was written.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use reqwest::blocking::Client;

use crate::config::AcquisitionOptions;
use crate::error::SlidegrabError;
use crate::http;
use crate::manifest::{INIT_SEGMENT_FILE, NUMBER_PLACEHOLDER};
use crate::progress::{NoOpProgress, OperationType, ProgressCallback, ProgressInfo};

/// One segment to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub url: String,
    pub destination: PathBuf,
    pub index: u64,
}

/// Local file name of segment `index`.
pub fn segment_file_name(index: u64) -> String {
    format!("segment{index}.mp4")
}

/// Expand `template` into `count` descriptors numbered from 0, each saved
/// as `segment{index}.mp4` inside `directory`.
pub fn expand_segment_urls(template: &str, count: u64, directory: &Path) -> Vec<SegmentDescriptor> {
    (0..count)
        .map(|index| SegmentDescriptor {
            url: template.replace(NUMBER_PLACEHOLDER, &index.to_string()),
            destination: directory.join(segment_file_name(index)),
            index,
        })
        .collect()
}

/// Outcome of downloading one track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentReport {
    /// Candidate segments requested.
    pub requested: u64,
    /// Segments present and non-empty after the last pass.
    pub written: u64,
    /// Highest segment number written, if any.
    pub highest_written: Option<u64>,
    /// Verification passes that were needed.
    pub verification_passes: u32,
    /// Segments still missing below `highest_written`.
    pub gaps: Vec<u64>,
}

impl SegmentReport {
    pub fn is_complete(&self) -> bool {
        self.written > 0 && self.gaps.is_empty()
    }
}

/// Downloads segments on a fixed-size thread pool.
pub struct SegmentDownloader {
    client: Client,
    pool: ThreadPool,
    retry_rounds: u32,
    progress: Arc<dyn ProgressCallback>,
}

impl std::fmt::Debug for SegmentDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentDownloader")
            .field("workers", &self.pool.current_num_threads())
            .field("retry_rounds", &self.retry_rounds)
            .finish_non_exhaustive()
    }
}

impl SegmentDownloader {
    /// Downloader sharing `client` across `options.workers` threads.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] if the worker pool cannot
    /// be started.
    pub fn new(client: Client, options: &AcquisitionOptions) -> Result<Self, SlidegrabError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.workers.max(1))
            .thread_name(|index| format!("segment-worker-{index}"))
            .build()
            .map_err(|error| {
                SlidegrabError::InvalidConfig(format!("cannot start download pool: {error}"))
            })?;

        Ok(Self {
            client,
            pool,
            retry_rounds: options.retry_rounds,
            progress: Arc::new(NoOpProgress),
        })
    }

    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Fetch a track's initialization segment to `segmenti.mp4`.
    ///
    /// # Errors
    ///
    /// Unlike media segments a missing init segment is fatal: returns
    /// [`SlidegrabError::Network`] or [`SlidegrabError::Http`], or
    /// [`SlidegrabError::IoError`] if the file cannot be written.
    pub fn download_init(&self, url: &str, directory: &Path) -> Result<PathBuf, SlidegrabError> {
        fs::create_dir_all(directory)?;
        let destination = directory.join(INIT_SEGMENT_FILE);
        http::fetch_to_file(&self.client, url, &destination)?;
        Ok(destination)
    }

    /// Download every segment, then run verification passes over the gaps.
    ///
    /// Individual failures are logged and dropped; the report tells what is
    /// on disk afterwards.
    pub fn download_all(&self, label: &str, segments: &[SegmentDescriptor]) -> SegmentReport {
        self.run_pass(label, segments.iter().collect());

        let mut passes = 0;
        let (mut highest, mut gaps) = scan(segments);
        while !gaps.is_empty() && passes < self.retry_rounds {
            passes += 1;
            log::debug!(
                "{label}: verification pass {passes} for {} missing segment(s)",
                gaps.len()
            );
            let retry: Vec<&SegmentDescriptor> = segments
                .iter()
                .filter(|segment| gaps.contains(&segment.index))
                .collect();
            self.run_pass(label, retry);
            (highest, gaps) = scan(segments);
        }

        if !gaps.is_empty() {
            log::warn!("{label}: segments still missing after verification: {gaps:?}");
        }

        SegmentReport {
            requested: segments.len() as u64,
            written: segments.iter().filter(|segment| is_written(&segment.destination)).count()
                as u64,
            highest_written: highest,
            verification_passes: passes,
            gaps: gaps.into_iter().collect(),
        }
    }

    fn run_pass(&self, label: &str, segments: Vec<&SegmentDescriptor>) {
        let total = segments.len() as u64;
        let completed = AtomicU64::new(0);
        let start = Instant::now();

        self.pool.install(|| {
            segments.par_iter().for_each(|segment| {
                if let Err(error) =
                    http::fetch_to_file(&self.client, &segment.url, &segment.destination)
                {
                    log::debug!("{label}: segment {} dropped: {error}", segment.index);
                }

                let current = completed.fetch_add(1, Ordering::Relaxed) + 1;
                self.progress.on_progress(&ProgressInfo {
                    operation: OperationType::SegmentDownload,
                    label: label.to_string(),
                    current,
                    total: Some(total),
                    elapsed: start.elapsed(),
                });
            });
        });
    }
}

fn is_written(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.len() > 0)
}

/// Highest written index and the unwritten indices below it.
fn scan(segments: &[SegmentDescriptor]) -> (Option<u64>, BTreeSet<u64>) {
    let written: BTreeSet<u64> = segments
        .iter()
        .filter(|segment| is_written(&segment.destination))
        .map(|segment| segment.index)
        .collect();
    let requested = segments.iter().map(|segment| segment.index);
    gaps_below_highest(&written, requested)
}

fn gaps_below_highest(
    written: &BTreeSet<u64>,
    requested: impl Iterator<Item = u64>,
) -> (Option<u64>, BTreeSet<u64>) {
    let Some(&highest) = written.last() else {
        return (None, BTreeSet::new());
    };
    let gaps = requested
        .filter(|index| *index < highest && !written.contains(index))
        .collect();
    (Some(highest), gaps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_numbers_from_zero() {
        let segments = expand_segment_urls(
            "https://cdn.example.com/v/seg-$Number$.m4s?t=1",
            60,
            Path::new("video_segments"),
        );
        assert_eq!(segments.len(), 60);
        assert_eq!(segments[0].url, "https://cdn.example.com/v/seg-0.m4s?t=1");
        assert_eq!(segments[59].url, "https://cdn.example.com/v/seg-59.m4s?t=1");
        assert_eq!(segments[7].destination, Path::new("video_segments/segment7.mp4"));
        assert_eq!(segments[7].index, 7);
    }

    #[test]
    fn trailing_misses_are_not_gaps() {
        let written: BTreeSet<u64> = [0, 1, 3, 4].into_iter().collect();
        let (highest, gaps) = gaps_below_highest(&written, 0..10);
        assert_eq!(highest, Some(4));
        assert_eq!(gaps.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn nothing_written_means_no_gaps() {
        let (highest, gaps) = gaps_below_highest(&BTreeSet::new(), 0..10);
        assert_eq!(highest, None);
        assert!(gaps.is_empty());
    }
}
