//! # Detection Benchmark

use comms_if::eqpt::cam::{ColorBand, RegionOfInterest};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgb, RgbImage};

use tens_lib::tracker::{
    detect::{BaselineImage, MultiMarkerDetector, SubtractionDetector, ThresholdDetector},
    Detector, SubtractionParams, ThresholdParams,
};

const WIDTH: u32 = 440;
const HEIGHT: u32 = 400;

/// A light grey scene with coloured squares drawn on it.
fn scene(squares: &[((u32, u32), u32, [u8; 3])]) -> RgbImage {
    let mut frame = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([200, 200, 200]));

    for &((x0, y0), side, colour) in squares {
        for y in y0..(y0 + side).min(HEIGHT) {
            for x in x0..(x0 + side).min(WIDTH) {
                frame.put_pixel(x, y, Rgb(colour));
            }
        }
    }

    frame
}

fn detect_benchmark(c: &mut Criterion) {
    // ---- Build frames ----

    let empty = scene(&[]);
    let robot = scene(&[((180, 160), 60, [20, 20, 20])]);
    let markers = scene(&[
        ((150, 150), 20, [255, 0, 0]),
        ((250, 150), 20, [0, 0, 255]),
        ((200, 250), 20, [0, 255, 0]),
    ]);

    // ---- Build detectors ----

    let threshold = ThresholdDetector::new(ThresholdParams::default());

    let sub_params = SubtractionParams::default();
    let subtraction = SubtractionDetector::new(
        BaselineImage::from_frame(&empty, sub_params.blur_size),
        &RegionOfInterest::full_frame(WIDTH, HEIGHT),
        sub_params,
    )
    .unwrap();

    let multi_marker = MultiMarkerDetector::new(
        vec![
            ColorBand::new([0, 100, 100], [9, 255, 255]),
            ColorBand::new([110, 100, 100], [130, 255, 255]),
            ColorBand::new([50, 100, 100], [70, 255, 255]),
        ],
        3,
    )
    .unwrap();

    // ---- Benchmarks ----

    c.bench_function("threshold detect", |b| {
        b.iter(|| threshold.detect(black_box(&robot)))
    });

    c.bench_function("subtraction detect", |b| {
        b.iter(|| subtraction.detect(black_box(&robot)))
    });

    c.bench_function("multi marker detect", |b| {
        b.iter(|| multi_marker.detect(black_box(&markers)))
    });
}

criterion_group!(benches, detect_benchmark);
criterion_main!(benches);
