//! The video-acquisition pipeline for one label.
//!
//! Fetch the manifest, parse it, download both tracks' init and media
//! segments, and write a manifest that points at the local copies. Turning
//! that manifest into `{label}.mp4` is the [`Recorder`](crate::Recorder)'s
//! job and runs as a separate stage.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::blocking::Client;

use crate::config::AcquisitionOptions;
use crate::error::SlidegrabError;
use crate::http;
use crate::layout::LabelContext;
use crate::manifest::{self, ManifestDescriptor, Track};
use crate::progress::ProgressCallback;
use crate::segments::{SegmentDownloader, SegmentReport, expand_segment_urls};

/// What one acquisition run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSummary {
    pub label: String,
    pub duration_minutes: u64,
    pub video: SegmentReport,
    pub audio: SegmentReport,
    /// The rewritten manifest, ready for recording.
    pub adjusted_manifest: PathBuf,
}

/// Downloads lectures with a shared HTTP client and worker pool.
#[derive(Debug)]
pub struct AcquisitionPipeline {
    options: AcquisitionOptions,
    client: Client,
    downloader: SegmentDownloader,
}

impl AcquisitionPipeline {
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] for invalid options and
    /// [`SlidegrabError::Http`] if the HTTP client cannot be built.
    pub fn new(options: AcquisitionOptions) -> Result<Self, SlidegrabError> {
        options.validate()?;
        let client = http::build_client(&options)?;
        let downloader = SegmentDownloader::new(client.clone(), &options)?;
        Ok(Self {
            options,
            client,
            downloader,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.downloader = self.downloader.with_progress(callback);
        self
    }

    pub fn options(&self) -> &AcquisitionOptions {
        &self.options
    }

    /// Acquire the lecture behind `manifest_url` into `context`'s directory.
    ///
    /// Segment directories are emptied first so only this run's segments
    /// are on disk.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::Network`] or [`SlidegrabError::Http`] when
    /// the manifest or an init segment cannot be fetched,
    /// [`SlidegrabError::ManifestParse`] for an unexpected manifest and
    /// [`SlidegrabError::IoError`] for local file failures. Individual media
    /// segment failures are not errors; they show up in the report.
    pub fn acquire(
        &self,
        context: &LabelContext,
        manifest_url: &str,
    ) -> Result<AcquisitionSummary, SlidegrabError> {
        let label = context.label();
        fs::create_dir_all(context.root())?;
        reset_dir(&context.video_segments())?;
        reset_dir(&context.audio_segments())?;

        let manifest_path = context.manifest();
        if let Err(error) = manifest::fetch_manifest(&self.client, manifest_url, &manifest_path) {
            log::error!("{label}: failed to download the manifest: {error}");
            return Err(error);
        }

        let descriptor =
            manifest::parse_manifest_file(&manifest_path)?.resolved_against(manifest_url);
        let candidates = self.options.candidate_segments(descriptor.duration_minutes)?;
        log::info!(
            "{label}: {} min presentation, {candidates} candidate segment(s) per track",
            descriptor.duration_minutes
        );

        let video = self.download_track(context, &descriptor, Track::Video, candidates)?;
        let audio = self.download_track(context, &descriptor, Track::Audio, candidates)?;

        let adjusted_manifest = context.adjusted_manifest();
        manifest::write_adjusted_manifest(&manifest_path, &adjusted_manifest)?;

        Ok(AcquisitionSummary {
            label: label.to_string(),
            duration_minutes: descriptor.duration_minutes,
            video,
            audio,
            adjusted_manifest,
        })
    }

    fn download_track(
        &self,
        context: &LabelContext,
        descriptor: &ManifestDescriptor,
        track: Track,
        candidates: u64,
    ) -> Result<SegmentReport, SlidegrabError> {
        let label = context.label();
        let (init_url, media_template) = descriptor.track(track);
        let directory = context.root().join(track.directory_name());

        self.downloader.download_init(init_url, &directory)?;
        let segments = expand_segment_urls(media_template, candidates, &directory);
        let report = self.downloader.download_all(label, &segments);
        log::info!(
            "{label}: {} of {} {track:?} segment(s) written",
            report.written,
            report.requested
        );
        if report.written == 0 {
            log::warn!("{label}: no {track:?} media segment could be downloaded");
        }
        Ok(report)
    }
}

fn reset_dir(path: &Path) -> Result<(), SlidegrabError> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}
