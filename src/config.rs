//! Pipeline configuration.
//!
//! [`SlideshowOptions`] and [`AcquisitionOptions`] are builders that carry
//! every tunable of the two pipelines. [`Settings`] groups them with the
//! batch-level paths and can be loaded from a JSON file; every field has a
//! default, so a partial file only overrides what it names.
//!
//! # Example
//!
//! ```
//! use slidegrab::{HysteresisBand, SlideshowOptions};
//!
//! let options = SlideshowOptions::new()
//!     .with_sampling_rate(2.0)
//!     .with_band(HysteresisBand::new(0.5, 5.0).unwrap());
//! assert_eq!(options.warmup_frames(), 2);
//! assert_eq!(options.history_length(), 30);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SlidegrabError;

/// User agent sent with every manifest and segment request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// The "motion stopped" / "motion resumed" threshold pair, in percent of
/// foreground pixels.
///
/// A capture fires when the foreground share drops below `min_percent`; the
/// latch re-arms only once it climbs to `max_percent` or above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HysteresisBand {
    /// Below this share of moving pixels the slide is considered still.
    pub min_percent: f64,
    /// At or above this share the slide is considered to be changing again.
    pub max_percent: f64,
}

impl Default for HysteresisBand {
    fn default() -> Self {
        Self {
            min_percent: 0.3,
            max_percent: 4.0,
        }
    }
}

impl HysteresisBand {
    /// Build a band, rejecting `min_percent >= max_percent`.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] for an empty or inverted
    /// band, or for negative thresholds.
    pub fn new(min_percent: f64, max_percent: f64) -> Result<Self, SlidegrabError> {
        let band = Self {
            min_percent,
            max_percent,
        };
        band.validate()?;
        Ok(band)
    }

    pub(crate) fn validate(&self) -> Result<(), SlidegrabError> {
        if !(self.min_percent >= 0.0 && self.min_percent < self.max_percent) {
            return Err(SlidegrabError::InvalidConfig(format!(
                "hysteresis band requires 0 <= min_percent < max_percent (got {} / {})",
                self.min_percent, self.max_percent
            )));
        }
        Ok(())
    }
}

/// Settings for the slideshow pipeline (frame sampling, motion detection,
/// screenshot output and PDF assembly).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlideshowOptions {
    /// Sampled frames per second of video time.
    pub sampling_rate: f64,
    /// Background history length, in seconds of sampled video.
    pub history_multiplier: u32,
    /// Squared Mahalanobis distance above which a pixel is foreground.
    pub variance_threshold: f32,
    /// Capture / re-arm thresholds.
    pub band: HysteresisBand,
    /// Seconds subtracted from the detection time to compensate for lag.
    pub lag_compensation: f64,
    /// Width frames are downscaled to before they reach the model.
    pub analysis_width: u32,
    /// Screenshot file extension; must name a lossless format.
    pub image_extension: String,
    /// Resolution used to size PDF pages from image pixels.
    pub page_dpi: f64,
}

impl Default for SlideshowOptions {
    fn default() -> Self {
        Self {
            sampling_rate: 5.0,
            history_multiplier: 15,
            variance_threshold: 16.0,
            band: HysteresisBand::default(),
            lag_compensation: 2.0,
            analysis_width: 600,
            image_extension: "png".to_string(),
            page_dpi: 96.0,
        }
    }
}

impl SlideshowOptions {
    /// Create options with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sampling_rate(mut self, rate: f64) -> Self {
        self.sampling_rate = rate;
        self
    }

    #[must_use]
    pub fn with_band(mut self, band: HysteresisBand) -> Self {
        self.band = band;
        self
    }

    #[must_use]
    pub fn with_lag_compensation(mut self, seconds: f64) -> Self {
        self.lag_compensation = seconds;
        self
    }

    #[must_use]
    pub fn with_analysis_width(mut self, width: u32) -> Self {
        self.analysis_width = width;
        self
    }

    #[must_use]
    pub fn with_image_extension(mut self, extension: &str) -> Self {
        self.image_extension = normalize_extension(extension);
        self
    }

    /// Number of leading frames never considered for capture: one second of
    /// sampled video.
    pub fn warmup_frames(&self) -> u64 {
        self.sampling_rate.round().max(0.0) as u64
    }

    /// Background model history, in samples.
    pub fn history_length(&self) -> u32 {
        ((self.sampling_rate * f64::from(self.history_multiplier)).round() as u32).max(1)
    }

    /// Check every value for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SlidegrabError> {
        if !(self.sampling_rate.is_finite() && self.sampling_rate > 0.0) {
            return Err(SlidegrabError::InvalidConfig(format!(
                "sampling_rate must be positive (got {})",
                self.sampling_rate
            )));
        }
        if !(self.lag_compensation.is_finite() && self.lag_compensation >= 0.0) {
            return Err(SlidegrabError::InvalidConfig(format!(
                "lag_compensation must not be negative (got {})",
                self.lag_compensation
            )));
        }
        if self.analysis_width == 0 {
            return Err(SlidegrabError::InvalidConfig(
                "analysis_width must be greater than zero".to_string(),
            ));
        }
        if !matches!(
            normalize_extension(&self.image_extension).as_str(),
            "png" | "bmp" | "tiff" | "tif"
        ) {
            return Err(SlidegrabError::InvalidConfig(format!(
                "image_extension `{}` is not a lossless format",
                self.image_extension
            )));
        }
        if !(self.page_dpi.is_finite() && self.page_dpi > 0.0) {
            return Err(SlidegrabError::InvalidConfig(format!(
                "page_dpi must be positive (got {})",
                self.page_dpi
            )));
        }
        self.band.validate()
    }
}

/// Lowercase extension without a leading dot.
fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_ascii_lowercase()
}

/// Settings for the video-acquisition pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionOptions {
    /// Size of the segment download pool.
    pub workers: usize,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Heuristic segment count per minute of presentation.
    pub segments_per_minute: u64,
    /// Extra candidate segments requested past the heuristic count.
    pub segment_slack: u64,
    /// Maximum number of verification passes over missing segments.
    pub retry_rounds: u32,
    /// Recorder executable.
    pub recorder_program: PathBuf,
    /// Honour `HTTP_PROXY` and friends.
    pub use_system_proxy: bool,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 30,
            segments_per_minute: 15,
            segment_slack: 30,
            retry_rounds: 2,
            recorder_program: PathBuf::from("vlc"),
            use_system_proxy: true,
        }
    }
}

impl AcquisitionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the download pool size. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    #[must_use]
    pub fn with_retry_rounds(mut self, rounds: u32) -> Self {
        self.retry_rounds = rounds;
        self
    }

    #[must_use]
    pub fn with_recorder_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.recorder_program = program.into();
        self
    }

    #[must_use]
    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    /// Number of candidate segment URLs for a presentation of the given
    /// length.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::InvalidConfig`] if the count does not fit
    /// in a `u64`.
    pub fn candidate_segments(&self, duration_minutes: u64) -> Result<u64, SlidegrabError> {
        duration_minutes
            .checked_mul(self.segments_per_minute)
            .and_then(|count| count.checked_add(self.segment_slack))
            .ok_or_else(|| {
                SlidegrabError::InvalidConfig(format!(
                    "{duration_minutes} min at {} segment(s)/min plus {} overflows",
                    self.segments_per_minute, self.segment_slack
                ))
            })
    }

    pub fn validate(&self) -> Result<(), SlidegrabError> {
        if self.workers == 0 {
            return Err(SlidegrabError::InvalidConfig(
                "workers must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SlidegrabError::InvalidConfig(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Batch-level settings: where the data lives and how each pipeline runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root holding one directory per label.
    pub data_dir: PathBuf,
    /// Label spreadsheet.
    pub spreadsheet: PathBuf,
    /// Failure log path; `None` means `failures.jsonl` inside `data_dir`.
    pub failure_log: Option<PathBuf>,
    pub slideshow: SlideshowOptions,
    pub acquisition: AcquisitionOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            spreadsheet: PathBuf::from("data/labels.xlsx"),
            failure_log: None,
            slideshow: SlideshowOptions::default(),
            acquisition: AcquisitionOptions::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, or return the defaults when `path` is
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::IoError`] if the file cannot be read and
    /// [`SlidegrabError::Json`] if it is not valid settings JSON.
    pub fn load(path: Option<&Path>) -> Result<Self, SlidegrabError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        log::debug!("Loading settings from {}", path.display());
        let content = fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&content)?;
        let extension = normalize_extension(&settings.slideshow.image_extension);
        settings.slideshow.image_extension = extension;
        Ok(settings)
    }

    /// Resolved failure log location.
    pub fn failure_log_path(&self) -> PathBuf {
        self.failure_log
            .clone()
            .unwrap_or_else(|| self.data_dir.join("failures.jsonl"))
    }

    pub fn validate(&self) -> Result<(), SlidegrabError> {
        self.slideshow.validate()?;
        self.acquisition.validate()
    }
}
