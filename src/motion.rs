//! Motion segmentation: deciding when a slide has settled.
//!
//! [`MotionSegmenter`] feeds each sampled frame, downscaled, to a
//! [`BackgroundModel`] and measures the share of moving pixels. A two-state
//! latch ([`MotionState`]) turns that measurement into [`CaptureEvent`]s:
//!
//! - not captured → captured when the moving share drops below the band's
//!   `min_percent` after the warm-up second; this emits an event carrying
//!   the full-resolution frame;
//! - captured → not captured when the share reaches `max_percent`; this
//!   only re-arms the latch.
//!
//! # Example
//!
//! ```no_run
//! use slidegrab::{FrameSource, MotionSegmenter, SlideshowOptions};
//!
//! let options = SlideshowOptions::default();
//! let mut segmenter = MotionSegmenter::with_options(&options)?;
//! for frame in FrameSource::open("lecture.mp4", options.sampling_rate)? {
//!     if let Some(event) = segmenter.observe(frame?) {
//!         println!("slide at {:.1}s", event.timestamp);
//!     }
//! }
//! # Ok::<(), slidegrab::SlidegrabError>(())
//! ```

use std::borrow::Cow;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use image::{RgbImage, imageops::FilterType};

use crate::background::{BackgroundModel, GaussianMixtureModel, foreground_percent};
use crate::config::{HysteresisBand, SlideshowOptions};
use crate::error::SlidegrabError;
use crate::frames::Frame;

/// A detected "motion stopped" moment.
#[derive(Clone)]
pub struct CaptureEvent {
    /// Index of the frame that triggered the capture.
    pub sequence_index: u64,
    /// Lag-compensated capture time in seconds, never negative.
    pub timestamp: f64,
    /// The triggering frame at its original resolution.
    pub image: RgbImage,
}

impl CaptureEvent {
    /// Capture time rounded to whole seconds, as written to disk.
    pub fn rounded_seconds(&self) -> u64 {
        self.timestamp.round() as u64
    }
}

impl Debug for CaptureEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CaptureEvent")
            .field("sequence_index", &self.sequence_index)
            .field("timestamp", &self.timestamp)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// Outcome of one latch step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The slide settled: emit a capture.
    Captured,
    /// Motion resumed: the latch is armed again.
    Rearmed,
    None,
}

/// Per-video latch state.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionState {
    captured: bool,
    band: HysteresisBand,
    warmup_frames: u64,
    frame_dimensions: Option<(u32, u32)>,
}

impl MotionState {
    pub fn new(band: HysteresisBand, warmup_frames: u64) -> Self {
        Self {
            captured: false,
            band,
            warmup_frames,
            frame_dimensions: None,
        }
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Dimensions of the mask the model produces, set by the first frame.
    pub fn frame_dimensions(&self) -> Option<(u32, u32)> {
        self.frame_dimensions
    }

    /// Advance the latch with one measurement.
    pub fn step(&mut self, percent_diff: f64, sequence_index: u64) -> Transition {
        if !self.captured
            && percent_diff < self.band.min_percent
            && sequence_index > self.warmup_frames
        {
            self.captured = true;
            Transition::Captured
        } else if self.captured && percent_diff >= self.band.max_percent {
            self.captured = false;
            Transition::Rearmed
        } else {
            Transition::None
        }
    }
}

/// Turns a frame stream into capture events.
pub struct MotionSegmenter<M = GaussianMixtureModel> {
    model: M,
    state: MotionState,
    analysis_width: u32,
    lag_compensation: f64,
    /// Smallest gap between two reported capture times.
    min_spacing: f64,
    last_timestamp: Option<f64>,
}

impl<M> Debug for MotionSegmenter<M> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("MotionSegmenter")
            .field("state", &self.state)
            .field("analysis_width", &self.analysis_width)
            .field("lag_compensation", &self.lag_compensation)
            .field("last_timestamp", &self.last_timestamp)
            .finish_non_exhaustive()
    }
}

impl MotionSegmenter<GaussianMixtureModel> {
    /// Segmenter with the production background model sized from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] if `options` fail
    /// validation (for example an inverted hysteresis band).
    pub fn with_options(options: &SlideshowOptions) -> Result<Self, SlidegrabError> {
        let model = GaussianMixtureModel::with_history(
            options.history_length(),
            options.variance_threshold,
        );
        Self::new(model, options)
    }
}

impl<M: BackgroundModel> MotionSegmenter<M> {
    /// Segmenter driven by a caller-supplied background model.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] if `options` fail
    /// validation.
    pub fn new(model: M, options: &SlideshowOptions) -> Result<Self, SlidegrabError> {
        options.validate()?;
        Ok(Self {
            model,
            state: MotionState::new(options.band, options.warmup_frames()),
            analysis_width: options.analysis_width,
            lag_compensation: options.lag_compensation,
            min_spacing: 1.0 / options.sampling_rate,
            last_timestamp: None,
        })
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    /// Feed one frame. Returns an event when the slide has just settled.
    pub fn observe(&mut self, frame: Frame) -> Option<CaptureEvent> {
        let analysed = downscale(&frame.image, self.analysis_width);
        let mask = self.model.apply(&analysed);

        if self.state.frame_dimensions.is_none() {
            self.state.frame_dimensions = Some(mask.dimensions());
        }

        let percent_diff = foreground_percent(&mask);
        log::trace!("frame {} moving {percent_diff:.3}%", frame.index);

        match self.state.step(percent_diff, frame.index) {
            Transition::Captured => {
                let timestamp = self.compensate(frame.timestamp);
                self.last_timestamp = Some(timestamp);
                Some(CaptureEvent {
                    sequence_index: frame.index,
                    timestamp,
                    image: frame.image,
                })
            }
            Transition::Rearmed => {
                log::trace!("motion resumed at frame {}", frame.index);
                None
            }
            Transition::None => None,
        }
    }

    /// Subtract the detection lag, clamp at zero, and keep reported times
    /// strictly increasing.
    fn compensate(&self, timestamp: f64) -> f64 {
        let floor = self
            .last_timestamp
            .map_or(0.0, |previous| previous + self.min_spacing);
        (timestamp - self.lag_compensation).max(floor)
    }
}

/// Shrink `image` to `width`, keeping the aspect ratio. Narrower images are
/// analysed as they are.
fn downscale(image: &RgbImage, width: u32) -> Cow<'_, RgbImage> {
    let (source_width, source_height) = image.dimensions();
    if source_width <= width {
        return Cow::Borrowed(image);
    }

    let ratio = f64::from(width) / f64::from(source_width);
    let height = ((f64::from(source_height) * ratio).round() as u32).max(1);
    Cow::Owned(image::imageops::resize(
        image,
        width,
        height,
        FilterType::Triangle,
    ))
}
