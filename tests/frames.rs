//! FrameSource and slideshow pipeline tests on a real video.
//!
//! Tests require fixture files from `tests/fixtures/generate_fixtures.sh`.

use std::fs;
use std::path::Path;

use slidegrab::{FrameSource, LabelContext, SlidegrabError, SlideshowOptions, SlideshowPipeline};

fn lecture_path() -> &'static str {
    "tests/fixtures/lecture.mp4"
}

/// The fixture path, or `None` with a visible note when it has not been
/// generated.
fn lecture_fixture(test: &str) -> Option<&'static str> {
    let path = lecture_path();
    if Path::new(path).exists() {
        Some(path)
    } else {
        eprintln!("skipping {test}: {path} missing, run tests/fixtures/generate_fixtures.sh");
        None
    }
}

// ── opening ────────────────────────────────────────────────────────

#[test]
fn missing_file_is_an_open_error() {
    let error = FrameSource::open("tests/fixtures/does_not_exist.mp4", 5.0).unwrap_err();
    assert!(matches!(error, SlidegrabError::FileOpen { .. }));
    assert_eq!(error.kind(), "open");
}

#[test]
fn garbage_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.mp4");
    fs::write(&path, b"definitely not a video").unwrap();

    let error = FrameSource::open(&path, 5.0).unwrap_err();
    assert_eq!(error.kind(), "open");
}

#[test]
fn non_positive_rate_is_rejected() {
    assert!(matches!(
        FrameSource::open(lecture_path(), 0.0),
        Err(SlidegrabError::InvalidConfig(_))
    ));
}

// ── sampling ───────────────────────────────────────────────────────

#[test]
fn samples_are_numbered_from_one_at_the_sampling_rate() {
    let Some(path) = lecture_fixture("samples_are_numbered_from_one_at_the_sampling_rate") else {
        return;
    };

    let source = FrameSource::open(path, 5.0).expect("Failed to open fixture");
    assert_eq!(source.dimensions(), (640, 360));
    let estimated = source.estimated_frames().expect("duration known");

    let frames: Vec<_> = source.map(|frame| frame.expect("Decode error")).collect();
    assert!(!frames.is_empty());
    assert!(frames.len() as u64 <= estimated + 1);
    for (position, frame) in frames.iter().enumerate() {
        let index = position as u64 + 1;
        assert_eq!(frame.index, index);
        assert!((frame.timestamp - index as f64 / 5.0).abs() < 1e-9);
        assert_eq!(frame.image.dimensions(), (640, 360));
    }
}

#[test]
fn lower_rate_yields_fewer_samples() {
    let Some(path) = lecture_fixture("lower_rate_yields_fewer_samples") else {
        return;
    };

    let fast = FrameSource::open(path, 5.0).unwrap().count();
    let slow = FrameSource::open(path, 1.0).unwrap().count();
    assert!(slow < fast);
    assert!(slow.abs_diff(fast / 5) <= 1);
}

// ── slideshow pipeline ─────────────────────────────────────────────

#[test]
fn pipeline_run_is_idempotent() {
    let Some(path) = lecture_fixture("pipeline_run_is_idempotent") else {
        return;
    };

    let data = tempfile::tempdir().unwrap();
    let context = LabelContext::new(data.path(), "lecture").unwrap();
    fs::create_dir_all(context.root()).unwrap();
    fs::copy(path, context.video()).unwrap();

    let pipeline = SlideshowPipeline::new(SlideshowOptions::default()).unwrap();
    let first = pipeline.run(&context).unwrap();
    let first_index = fs::read_to_string(context.time_index()).unwrap();
    let second = pipeline.run(&context).unwrap();

    assert!(first.screenshots >= 1);
    assert_eq!(first.screenshots, second.screenshots);
    assert_eq!(first_index, fs::read_to_string(context.time_index()).unwrap());
    assert_eq!(first_index.lines().count(), second.screenshots);
    assert_eq!(
        fs::read_dir(context.images_dir()).unwrap().count(),
        second.screenshots
    );
    assert!(second.pdf.exists());
}

#[test]
fn pipeline_without_video_fails_to_open() {
    let data = tempfile::tempdir().unwrap();
    let context = LabelContext::new(data.path(), "absent").unwrap();
    let pipeline = SlideshowPipeline::new(SlideshowOptions::default()).unwrap();

    let error = pipeline.run(&context).unwrap_err();
    assert_eq!(error.kind(), "open");
    assert!(!context.pdf().exists());
}
