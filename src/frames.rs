//! Time-sampled frame source.
//!
//! [`FrameSource`] opens a video with FFmpeg and yields one [`Frame`] per
//! sampling step: the k-th step positions the decoder at `k / rate` seconds
//! (in whole milliseconds) and returns the first decoded frame at or after
//! that position. Iteration ends when the decoder runs dry, never on a
//! precomputed frame count, because time-based sampling can overshoot the
//! count the container advertises.
//!
//! # Example
//!
//! ```no_run
//! use slidegrab::FrameSource;
//!
//! let source = FrameSource::open("lecture.mp4", 5.0)?;
//! for frame in source {
//!     let frame = frame?;
//!     println!("#{} at {:.1}s: {}x{}", frame.index, frame.timestamp,
//!         frame.image.width(), frame.image.height());
//! }
//! # Ok::<(), slidegrab::SlidegrabError>(())
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::RgbImage;

use crate::conversion::{
    frame_to_buffer, pts_to_seconds, rational_to_fps, seconds_to_seek_timestamp,
};
use crate::error::SlidegrabError;

/// Targets further ahead than this are reached with a container seek;
/// closer ones by decoding forward.
const SEEK_WINDOW_SECONDS: f64 = 5.0;

/// Consecutive demuxer read errors tolerated before the stream is treated
/// as ended.
const MAX_READ_ERRORS: u32 = 64;

/// One sampled video frame.
#[derive(Clone)]
pub struct Frame {
    /// 1-based position in the sampled sequence.
    pub index: u64,
    /// Sampling clock after this frame, `index / sampling_rate` seconds.
    pub timestamp: f64,
    /// Full-resolution RGB image.
    pub image: RgbImage,
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("timestamp", &self.timestamp)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// Open decoder state. Dropped as soon as the stream is exhausted.
struct Decoding {
    input_context: Input,
    decoder: VideoDecoder,
    scaler: Option<ScalingContext>,
    scaler_input: Option<(Pixel, u32, u32)>,
    video_stream_index: usize,
    time_base: Rational,
    start_seconds: f64,
    decoded_frame: VideoFrame,
    rgb_frame: VideoFrame,
    eof_sent: bool,
    /// Most recently decoded frame: seconds from stream start and pixels.
    current: Option<(f64, RgbImage)>,
}

impl Decoding {
    /// Return the first frame at or after `target` seconds, or `None` at
    /// end of stream.
    fn frame_at(
        &mut self,
        target: f64,
        tolerance: f64,
    ) -> Result<Option<RgbImage>, SlidegrabError> {
        let seek_needed = match &self.current {
            Some((seconds, image)) if *seconds + tolerance >= target => {
                return Ok(Some(image.clone()));
            }
            Some((seconds, _)) => target - *seconds > SEEK_WINDOW_SECONDS,
            None => target > SEEK_WINDOW_SECONDS,
        };
        if seek_needed {
            self.seek(target);
        }

        while let Some(seconds) = self.decode_next()? {
            if seconds + tolerance >= target {
                let image = self.convert_current_frame()?;
                self.current = Some((seconds, image.clone()));
                return Ok(Some(image));
            }
        }

        Ok(None)
    }

    fn seek(&mut self, target: f64) {
        let timestamp = seconds_to_seek_timestamp(target + self.start_seconds);
        match self.input_context.seek(timestamp, ..timestamp) {
            Ok(()) => {
                self.decoder.flush();
                self.eof_sent = false;
                self.current = None;
            }
            // Unseekable input: keep decoding forward from where we are.
            Err(error) => log::debug!("Seek to {target:.3}s failed: {error}"),
        }
    }

    /// Decode the next video frame into `decoded_frame` and return its time
    /// in seconds from stream start.
    fn decode_next(&mut self) -> Result<Option<f64>, SlidegrabError> {
        let mut read_errors = 0;

        loop {
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let pts = self.decoded_frame.pts().unwrap_or(0);
                return Ok(Some(pts_to_seconds(pts, self.time_base) - self.start_seconds));
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    read_errors = 0;
                    if packet.stream() == self.video_stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|error| SlidegrabError::VideoDecodeError(error.to_string()))?;
                    }
                }
                Err(FfmpegError::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(error) => {
                    read_errors += 1;
                    if read_errors >= MAX_READ_ERRORS {
                        log::warn!("Giving up after repeated read errors: {error}");
                        self.decoder.send_eof()?;
                        self.eof_sent = true;
                    }
                }
            }
        }
    }

    fn convert_current_frame(&mut self) -> Result<RgbImage, SlidegrabError> {
        let width = self.decoded_frame.width();
        let height = self.decoded_frame.height();
        let format = self.decoded_frame.format();

        // The decoder may report a different pixel format before the first
        // frame, so the scaler is built from real frames.
        if self.scaler_input != Some((format, width, height)) {
            self.scaler = Some(ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?);
            self.scaler_input = Some((format, width, height));
        }

        let scaler = self.scaler.as_mut().ok_or_else(|| {
            SlidegrabError::VideoDecodeError("pixel converter unavailable".to_string())
        })?;
        scaler.run(&self.decoded_frame, &mut self.rgb_frame)?;

        let buffer = frame_to_buffer(&self.rgb_frame, width, height, 3);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            SlidegrabError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }
}

/// Lazy, finite, non-restartable sequence of sampled frames.
///
/// Holds the video's decoder exclusively until the sequence is exhausted
/// (or an error is returned), then releases it.
pub struct FrameSource {
    path: PathBuf,
    sampling_rate: f64,
    /// Half a source frame: a decoded frame this close before the target
    /// counts as "at" the target.
    tolerance: f64,
    width: u32,
    height: u32,
    duration_seconds: Option<f64>,
    next_index: u64,
    decoding: Option<Decoding>,
}

impl Debug for FrameSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FrameSource")
            .field("path", &self.path)
            .field("sampling_rate", &self.sampling_rate)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("next_index", &self.next_index)
            .field("open", &self.decoding.is_some())
            .finish()
    }
}

impl FrameSource {
    /// Open `path` and prepare to sample `sampling_rate` frames per second
    /// of video time.
    ///
    /// # Errors
    ///
    /// - [`SlidegrabError::FileOpen`] if FFmpeg cannot open the file or
    ///   build a decoder for it.
    /// - [`SlidegrabError::NoVideoStream`] if the file has no video.
    /// - [`SlidegrabError::InvalidConfig`] for a non-positive rate.
    pub fn open<P: AsRef<Path>>(path: P, sampling_rate: f64) -> Result<Self, SlidegrabError> {
        let path = path.as_ref().to_path_buf();

        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(SlidegrabError::InvalidConfig(format!(
                "sampling rate must be positive (got {sampling_rate})"
            )));
        }

        log::debug!("Opening video {} at {sampling_rate} samples/s", path.display());

        let open_error = |reason: String| SlidegrabError::FileOpen {
            path: path.clone(),
            reason,
        };

        ffmpeg_next::init()
            .map_err(|error| open_error(format!("FFmpeg initialisation failed: {error}")))?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| open_error(error.to_string()))?;

        let (video_stream_index, time_base, start_time, frame_rate, decoder) = {
            let stream = input_context
                .streams()
                .best(Type::Video)
                .ok_or_else(|| SlidegrabError::NoVideoStream(path.clone()))?;

            let decoder = CodecContext::from_parameters(stream.parameters())
                .and_then(|context| context.decoder().video())
                .map_err(|error| open_error(format!("Failed to create video decoder: {error}")))?;

            (
                stream.index(),
                stream.time_base(),
                stream.start_time(),
                stream.avg_frame_rate(),
                decoder,
            )
        };

        // AV_NOPTS_VALUE marks an unknown start time.
        let start_seconds = if start_time == i64::MIN {
            0.0
        } else {
            pts_to_seconds(start_time, time_base)
        };

        let duration_microseconds = input_context.duration();
        let duration_seconds =
            (duration_microseconds > 0).then(|| duration_microseconds as f64 / 1_000_000.0);

        let tolerance = rational_to_fps(frame_rate).map_or(0.001, |fps| 0.5 / fps);

        Ok(Self {
            width: decoder.width(),
            height: decoder.height(),
            path,
            sampling_rate,
            tolerance,
            duration_seconds,
            next_index: 0,
            decoding: Some(Decoding {
                input_context,
                decoder,
                scaler: None,
                scaler_input: None,
                video_stream_index,
                time_base,
                start_seconds,
                decoded_frame: VideoFrame::empty(),
                rgb_frame: VideoFrame::empty(),
                eof_sent: false,
                current: None,
            }),
        })
    }

    /// Source resolution reported by the decoder.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Container duration, if known.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    /// Expected number of samples, from the container duration. A hint for
    /// progress reporting only.
    pub fn estimated_frames(&self) -> Option<u64> {
        self.duration_seconds
            .map(|seconds| (seconds * self.sampling_rate).ceil() as u64)
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn release(&mut self) {
        if self.decoding.take().is_some() {
            log::debug!(
                "Released decoder for {} after {} samples",
                self.path.display(),
                self.next_index
            );
        }
    }
}

impl Iterator for FrameSource {
    type Item = Result<Frame, SlidegrabError>;

    fn next(&mut self) -> Option<Self::Item> {
        let decoding = self.decoding.as_mut()?;
        let target = self.next_index as f64 / self.sampling_rate;

        match decoding.frame_at(target, self.tolerance) {
            Ok(Some(image)) => {
                self.next_index += 1;
                Some(Ok(Frame {
                    index: self.next_index,
                    timestamp: self.next_index as f64 / self.sampling_rate,
                    image,
                }))
            }
            Ok(None) => {
                self.release();
                None
            }
            Err(error) => {
                self.release();
                Some(Err(error))
            }
        }
    }
}

/// Set FFmpeg's own console verbosity by name (`quiet`, `panic`, `fatal`,
/// `error`, `warning`, `info`, `verbose`, `debug`, `trace`).
///
/// This does not affect messages emitted through the `log` crate.
///
/// # Errors
///
/// Returns [`SlidegrabError::InvalidConfig`] for an unknown name.
pub fn set_ffmpeg_log_level(name: &str) -> Result<(), SlidegrabError> {
    let level = match name.to_ascii_lowercase().as_str() {
        "quiet" => Level::Quiet,
        "panic" => Level::Panic,
        "fatal" => Level::Fatal,
        "error" => Level::Error,
        "warning" | "warn" => Level::Warning,
        "info" => Level::Info,
        "verbose" => Level::Verbose,
        "debug" => Level::Debug,
        "trace" => Level::Trace,
        other => {
            return Err(SlidegrabError::InvalidConfig(format!(
                "unknown FFmpeg log level `{other}`"
            )));
        }
    };
    ffmpeg_next::util::log::set_level(level);
    Ok(())
}
