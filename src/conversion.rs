//! Internal conversion helpers shared by the frame source.
//!
//! Pixel-buffer copying and timestamp rescaling between FFmpeg time bases,
//! seconds and the container seek unit.

use ffmpeg_next::{Rational, frame::Video as VideoFrame};

/// Copy plane 0 of a packed video frame into a tightly-packed buffer,
/// dropping any row padding FFmpeg added.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}

/// Rescale a PTS value from a stream time base to seconds.
pub(crate) fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * f64::from(time_base.numerator()) / f64::from(time_base.denominator())
}

/// Convert seconds to a container seek timestamp.
///
/// `Input::seek` with no stream selected expects AV_TIME_BASE units
/// (microseconds). The position is first expressed in whole milliseconds.
pub(crate) fn seconds_to_seek_timestamp(seconds: f64) -> i64 {
    let milliseconds = (seconds * 1000.0).round() as i64;
    milliseconds * 1000
}

/// Frames per second from a stream rate, or `None` for an unset rate.
pub(crate) fn rational_to_fps(rate: Rational) -> Option<f64> {
    if rate.denominator() == 0 || rate.numerator() <= 0 {
        None
    } else {
        Some(f64::from(rate.numerator()) / f64::from(rate.denominator()))
    }
}
