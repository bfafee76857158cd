//! # slidegrab
//!
//! Batch tooling for recorded lectures: download a DASH lecture stream into
//! a playable file, and turn a lecture video into a PDF of its slides.
//!
//! Both pipelines are driven by a spreadsheet of labels and work inside one
//! directory per label (see [`LabelContext`]).
//!
//! ## Quick Start
//!
//! ### Extract Slides
//!
//! ```no_run
//! use slidegrab::{LabelContext, SlideshowOptions, SlideshowPipeline};
//!
//! let pipeline = SlideshowPipeline::new(SlideshowOptions::default()).unwrap();
//! let context = LabelContext::new("data", "cs101").unwrap();
//! let summary = pipeline.run(&context).unwrap();
//! println!("{} slides in {}", summary.screenshots, summary.pdf.display());
//! ```
//!
//! ### Acquire a Lecture
//!
//! ```no_run
//! use slidegrab::{AcquisitionOptions, AcquisitionPipeline, LabelContext, Recorder, VlcRecorder};
//!
//! let pipeline = AcquisitionPipeline::new(AcquisitionOptions::default()).unwrap();
//! let context = LabelContext::new("data", "cs101").unwrap();
//! let summary = pipeline
//!     .acquire(&context, "https://media.example.com/GenerateVideoSource.mpd")
//!     .unwrap();
//! VlcRecorder::default()
//!     .record(&summary.adjusted_manifest, &context.video())
//!     .unwrap();
//! ```
//!
//! ### Run a Batch
//!
//! ```no_run
//! use slidegrab::{BatchRunner, Settings, SlideshowPipeline, read_labels};
//!
//! let settings = Settings::default();
//! let records = read_labels(&settings.spreadsheet).unwrap();
//! let pipeline = SlideshowPipeline::new(settings.slideshow.clone()).unwrap();
//! let summary = BatchRunner::from_settings(&settings).run_slideshow(&pipeline, &records);
//! println!("{} ok, {} failed", summary.succeeded.len(), summary.failures.len());
//! ```
//!
//! ## How slides are found
//!
//! Frames are sampled at a fixed rate, downscaled and fed to an adaptive
//! Gaussian-mixture background model. When the share of moving pixels drops
//! below the lower edge of the [`HysteresisBand`] the slide is considered
//! settled and the full-resolution frame is captured; the next capture is
//! only possible after motion climbs back above the upper edge.
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed for decoding. Recording
//! needs a VLC executable (configurable).

pub mod acquisition;
pub mod background;
pub mod batch;
pub mod config;
mod conversion;
pub mod error;
pub mod failure_log;
pub mod frames;
pub mod http;
pub mod layout;
pub mod manifest;
pub mod motion;
pub mod pdf;
pub mod progress;
pub mod recorder;
pub mod screenshot;
pub mod segments;
pub mod slideshow;
pub mod spreadsheet;

pub use acquisition::{AcquisitionPipeline, AcquisitionSummary};
pub use background::{BackgroundModel, GaussianMixtureModel, MixtureParameters, foreground_percent};
pub use batch::{BatchRunner, BatchSummary};
pub use config::{AcquisitionOptions, HysteresisBand, Settings, SlideshowOptions};
pub use error::SlidegrabError;
pub use failure_log::{FailureLog, FailureRecord, Stage};
pub use frames::{Frame, FrameSource, set_ffmpeg_log_level};
pub use layout::{LabelContext, LabelRecord};
pub use manifest::{ManifestDescriptor, Track, parse_manifest, rewrite_manifest};
pub use motion::{CaptureEvent, MotionSegmenter, MotionState, Transition};
pub use pdf::PdfAssembler;
pub use progress::{NoOpProgress, OperationType, ProgressCallback, ProgressInfo};
pub use recorder::{Recorder, VlcRecorder};
pub use screenshot::ScreenshotWriter;
pub use segments::{SegmentDescriptor, SegmentDownloader, SegmentReport, expand_segment_urls};
pub use slideshow::{SlideshowPipeline, SlideshowSummary};
pub use spreadsheet::read_labels;
