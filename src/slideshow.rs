//! The slideshow pipeline for one label.
//!
//! `{label}.mp4` → sampled frames → capture events → numbered screenshots
//! and time index → `ppt_{label}.pdf`.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::SlideshowOptions;
use crate::error::SlidegrabError;
use crate::frames::FrameSource;
use crate::layout::LabelContext;
use crate::motion::MotionSegmenter;
use crate::pdf::PdfAssembler;
use crate::progress::{NoOpProgress, OperationType, ProgressCallback, ProgressTracker};
use crate::screenshot::ScreenshotWriter;

/// What one slideshow run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideshowSummary {
    pub label: String,
    pub frames_sampled: u64,
    pub screenshots: usize,
    pub pdf: PathBuf,
}

/// Runs the slideshow pipeline with fixed options.
pub struct SlideshowPipeline {
    options: SlideshowOptions,
    progress: Arc<dyn ProgressCallback>,
}

impl std::fmt::Debug for SlideshowPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlideshowPipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl SlideshowPipeline {
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] if `options` fail
    /// validation.
    pub fn new(options: SlideshowOptions) -> Result<Self, SlidegrabError> {
        options.validate()?;
        Ok(Self {
            options,
            progress: Arc::new(NoOpProgress),
        })
    }

    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    pub fn options(&self) -> &SlideshowOptions {
        &self.options
    }

    /// Extract the slides of `context`'s video and assemble its PDF.
    ///
    /// The screenshot directory and time index are rebuilt from scratch on
    /// every run.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::FileOpen`] or
    /// [`SlidegrabError::NoVideoStream`] if the video cannot be opened,
    /// [`SlidegrabError::Assembly`] if no slide was captured, and any I/O,
    /// decoding or encoding error met on the way.
    pub fn run(&self, context: &LabelContext) -> Result<SlideshowSummary, SlidegrabError> {
        let label = context.label();
        let source = FrameSource::open(context.video(), self.options.sampling_rate)?;
        let mut segmenter = MotionSegmenter::with_options(&self.options)?;
        let mut writer = ScreenshotWriter::create(
            context.images_dir(),
            context.time_index(),
            &self.options.image_extension,
        )?;

        let batch_size = (self.options.sampling_rate * 10.0).round().max(1.0) as u64;
        let mut tracker = ProgressTracker::new(
            Arc::clone(&self.progress),
            OperationType::FrameSampling,
            label,
            source.estimated_frames(),
            batch_size,
        );

        let mut frames_sampled = 0;
        for frame in source {
            let frame = frame?;
            frames_sampled += 1;
            tracker.advance();
            if let Some(event) = segmenter.observe(frame) {
                log::debug!(
                    "{label}: slide {} at {:.1}s (frame {})",
                    writer.count(),
                    event.timestamp,
                    event.sequence_index
                );
                writer.write(&event)?;
            }
        }
        tracker.finish();

        let screenshots = writer.finish()?.len();
        log::info!("{label}: {screenshots} slide(s) from {frames_sampled} sampled frame(s)");

        let pdf = context.pdf();
        PdfAssembler::new(self.options.page_dpi).assemble(
            context.images_dir(),
            &self.options.image_extension,
            &pdf,
        )?;

        Ok(SlideshowSummary {
            label: label.to_string(),
            frames_sampled,
            screenshots,
            pdf,
        })
    }
}
