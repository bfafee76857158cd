//! Settings file loading and option validation tests.

use std::fs;
use std::path::PathBuf;

use slidegrab::{AcquisitionOptions, HysteresisBand, Settings, SlidegrabError, SlideshowOptions};

// ── Settings::load ─────────────────────────────────────────────────

#[test]
fn no_path_gives_defaults() {
    let settings = Settings::load(None).unwrap();
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.failure_log_path(), PathBuf::from("data/failures.jsonl"));
}

#[test]
fn partial_file_overrides_only_what_it_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slidegrab.json");
    fs::write(
        &path,
        r#"{
            "data_dir": "/srv/lectures",
            "slideshow": { "sampling_rate": 2.0, "band": { "min_percent": 0.5, "max_percent": 6.0 } },
            "acquisition": { "workers": 4 }
        }"#,
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings.data_dir, PathBuf::from("/srv/lectures"));
    assert_eq!(
        settings.failure_log_path(),
        PathBuf::from("/srv/lectures/failures.jsonl")
    );
    assert_eq!(settings.slideshow.sampling_rate, 2.0);
    assert_eq!(settings.slideshow.warmup_frames(), 2);
    assert_eq!(settings.slideshow.history_length(), 30);
    assert_eq!(settings.slideshow.band, HysteresisBand::new(0.5, 6.0).unwrap());
    assert_eq!(settings.slideshow.lag_compensation, 2.0);
    assert_eq!(settings.acquisition.workers, 4);
    assert_eq!(settings.acquisition.retry_rounds, 2);
    assert!(settings.validate().is_ok());
}

#[test]
fn explicit_failure_log_wins() {
    let settings = Settings {
        failure_log: Some(PathBuf::from("/var/log/slidegrab.jsonl")),
        ..Settings::default()
    };
    assert_eq!(
        settings.failure_log_path(),
        PathBuf::from("/var/log/slidegrab.jsonl")
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let error = Settings::load(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(matches!(error, SlidegrabError::IoError(_)));
}

#[test]
fn malformed_file_is_a_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slidegrab.json");
    fs::write(&path, "{ data_dir: ").unwrap();
    assert!(matches!(
        Settings::load(Some(&path)),
        Err(SlidegrabError::Json(_))
    ));
}

#[test]
fn loaded_inverted_band_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slidegrab.json");
    fs::write(
        &path,
        r#"{ "slideshow": { "band": { "min_percent": 5.0, "max_percent": 1.0 } } }"#,
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    assert!(matches!(
        settings.validate(),
        Err(SlidegrabError::InvalidConfig(_))
    ));
}

#[test]
fn loaded_extension_is_normalised() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slidegrab.json");
    fs::write(&path, r#"{ "slideshow": { "image_extension": ".PNG" } }"#).unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings.slideshow.image_extension, "png");
    assert!(settings.validate().is_ok());
}

// ── option validation ──────────────────────────────────────────────

#[test]
fn slideshow_options_reject_bad_values() {
    assert!(SlideshowOptions::new().with_sampling_rate(0.0).validate().is_err());
    assert!(SlideshowOptions::new().with_sampling_rate(f64::NAN).validate().is_err());
    assert!(SlideshowOptions::new().with_lag_compensation(-1.0).validate().is_err());
    assert!(SlideshowOptions::new().with_analysis_width(0).validate().is_err());
    assert!(SlideshowOptions::new().with_image_extension("tiff").validate().is_ok());
}

#[test]
fn non_finite_values_are_rejected() {
    let nan_lag = SlideshowOptions::new().with_lag_compensation(f64::NAN);
    assert!(matches!(
        nan_lag.validate(),
        Err(SlidegrabError::InvalidConfig(_))
    ));
    let infinite_lag = SlideshowOptions::new().with_lag_compensation(f64::INFINITY);
    assert!(infinite_lag.validate().is_err());

    for dpi in [f64::NAN, f64::INFINITY, 0.0, -96.0] {
        let options = SlideshowOptions {
            page_dpi: dpi,
            ..SlideshowOptions::default()
        };
        assert!(options.validate().is_err(), "page_dpi {dpi} accepted");
    }
}

#[test]
fn uppercase_extension_in_a_literal_still_validates() {
    let options = SlideshowOptions {
        image_extension: "PNG".to_string(),
        ..SlideshowOptions::default()
    };
    assert!(options.validate().is_ok());
}

#[test]
fn acquisition_workers_are_clamped() {
    let options = AcquisitionOptions::new().with_workers(0);
    assert_eq!(options.workers, 1);
    assert!(options.validate().is_ok());

    let options = AcquisitionOptions {
        request_timeout_secs: 0,
        ..AcquisitionOptions::default()
    };
    assert!(matches!(
        options.validate(),
        Err(SlidegrabError::InvalidConfig(_))
    ));
}

#[test]
fn candidate_segments_follow_the_duration() {
    let options = AcquisitionOptions::default();
    assert_eq!(options.candidate_segments(0).unwrap(), 30);
    assert_eq!(options.candidate_segments(90).unwrap(), 1380);
}

#[test]
fn candidate_segments_overflow_is_an_error() {
    let options = AcquisitionOptions {
        segments_per_minute: u64::MAX / 2,
        ..AcquisitionOptions::default()
    };
    assert!(matches!(
        options.candidate_segments(3),
        Err(SlidegrabError::InvalidConfig(_))
    ));

    let options = AcquisitionOptions {
        segment_slack: u64::MAX,
        ..AcquisitionOptions::default()
    };
    assert!(options.candidate_segments(1).is_err());
}
