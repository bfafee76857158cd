//! Benchmarks for the background model and motion segmentation.
//!
//! Run with: cargo bench
//!
//! The sampling benchmark requires `tests/fixtures/lecture.mp4`.

use std::{hint::black_box, path::Path, time::Duration};

use criterion::Criterion;
use image::{Rgb, RgbImage};
use slidegrab::{
    BackgroundModel, Frame, FrameSource, GaussianMixtureModel, MotionSegmenter, SlideshowOptions,
};

const SAMPLE_VIDEO: &str = "tests/fixtures/lecture.mp4";

/// A grey slide with a dark block at `offset`.
fn slide(width: u32, height: u32, offset: u32) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
    for y in 40..120.min(height) {
        for x in offset..(offset + 60).min(width) {
            image.put_pixel(x, y, Rgb([30, 30, 30]));
        }
    }
    image
}

fn benchmark_background_model(criterion: &mut Criterion) {
    let frames: Vec<RgbImage> = (0..10).map(|step| slide(600, 338, step * 20)).collect();

    criterion.bench_function("mixture model apply (600x338)", |bencher| {
        let mut model = GaussianMixtureModel::with_history(75, 16.0);
        let mut index = 0;
        bencher.iter(|| {
            let mask = model.apply(black_box(&frames[index % frames.len()]));
            index += 1;
            black_box(mask);
        });
    });
}

fn benchmark_segmenter(criterion: &mut Criterion) {
    let options = SlideshowOptions::default();
    let frames: Vec<Frame> = (1..=50u32)
        .map(|index| Frame {
            index: u64::from(index),
            timestamp: f64::from(index) / options.sampling_rate,
            image: slide(1280, 720, if index <= 20 { index * 30 } else { 600 }),
        })
        .collect();

    let mut group = criterion.benchmark_group("segmenter");
    group.sample_size(10);
    group.measurement_time(Duration::from_secs(10));
    group.bench_function("50 frames at 1280x720", |bencher| {
        bencher.iter(|| {
            let mut segmenter = MotionSegmenter::with_options(&options).unwrap();
            let events = frames
                .iter()
                .cloned()
                .filter_map(|frame| segmenter.observe(frame))
                .count();
            black_box(events);
        });
    });
    group.finish();
}

fn benchmark_frame_sampling(criterion: &mut Criterion) {
    if !Path::new(SAMPLE_VIDEO).exists() {
        eprintln!("Skipping benchmark: fixture not found");
        return;
    }
    slidegrab::set_ffmpeg_log_level("error").unwrap();

    let mut group = criterion.benchmark_group("frame source");
    group.sample_size(10);
    group.bench_function("sample fixture at 5 fps", |bencher| {
        bencher.iter(|| {
            let count = FrameSource::open(SAMPLE_VIDEO, 5.0)
                .unwrap()
                .filter_map(Result::ok)
                .count();
            black_box(count);
        });
    });
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_background_model,
    benchmark_segmenter,
    benchmark_frame_sampling,
);
criterion::criterion_main!(benches);
