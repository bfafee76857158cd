//! Error types for the `slidegrab` crate.
//!
//! [`SlidegrabError`] is the single error type returned by every fallible
//! operation. Variants fall into a handful of families (open, network, parse,
//! external process, assembly) which [`SlidegrabError::kind`] exposes as a
//! stable string for the failure log.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `slidegrab` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SlidegrabError {
    /// The video file could not be opened for decoding.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`crate::FrameSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file opened but carries no video stream.
    #[error("No video stream found in {0}")]
    NoVideoStream(PathBuf),

    /// A video frame could not be decoded or converted.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// A remote resource answered with a non-success status.
    #[error("Request to {url} failed with status {status}")]
    Network {
        /// Requested URL.
        url: String,
        /// HTTP status code returned by the server.
        status: u16,
    },

    /// Transport-level HTTP failure (connection refused, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The manifest did not have the expected structure.
    #[error("Manifest parse error: {0}")]
    ManifestParse(String),

    /// The label spreadsheet could not be read.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    /// The external recorder could not be run or did not produce output.
    #[error("External process `{program}` failed: {reason}")]
    ExternalProcess {
        /// Program that was invoked.
        program: String,
        /// Exit status, captured stderr, or missing-output description.
        reason: String,
    },

    /// The slide PDF could not be assembled.
    #[error("PDF assembly failed: {0}")]
    Assembly(String),

    /// Error raised by the PDF writer.
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding or decoding a frame.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// JSON (settings file or failure log) could not be read or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<FfmpegError> for SlidegrabError {
    fn from(error: FfmpegError) -> Self {
        SlidegrabError::FfmpegError(error.to_string())
    }
}

impl SlidegrabError {
    /// Stable family name recorded in the failure log.
    pub fn kind(&self) -> &'static str {
        match self {
            SlidegrabError::FileOpen { .. } | SlidegrabError::NoVideoStream(_) => "open",
            SlidegrabError::Network { .. } | SlidegrabError::Http(_) => "network",
            SlidegrabError::ManifestParse(_) | SlidegrabError::Spreadsheet(_) => "parse",
            SlidegrabError::ExternalProcess { .. } => "external-process",
            SlidegrabError::Assembly(_) | SlidegrabError::Pdf(_) => "assembly",
            SlidegrabError::VideoDecodeError(_) | SlidegrabError::FfmpegError(_) => "decode",
            SlidegrabError::InvalidConfig(_) => "config",
            SlidegrabError::IoError(_)
            | SlidegrabError::ImageError(_)
            | SlidegrabError::Json(_) => "io",
        }
    }
}
