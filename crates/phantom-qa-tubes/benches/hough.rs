//! Hough detection on a synthetic 256x256 working image.
//!
//!   cargo bench -p phantom-qa-tubes --bench hough

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phantom_qa_core::{gaussian_blur, GrayImage};
use phantom_qa_tubes::{hough::detect_circles, TubeDetector};

fn phantom_image() -> GrayImage {
    let size = 256;
    let mut img = GrayImage::new(size, size);
    for row in 0..3 {
        for col in 0..3 {
            let cx = 47.0 + 81.0 * col as f32;
            let cy = 47.0 + 81.0 * row as f32;
            let v = 40 + 20 * (row * 3 + col) as u8;
            for y in 0..size {
                for x in 0..size {
                    let dx = x as f32 - cx;
                    let dy = y as f32 - cy;
                    if dx * dx + dy * dy <= 34.0 * 34.0 {
                        img.data[y * size + x] = v;
                    }
                }
            }
        }
    }
    gaussian_blur(&img.view(), 9).expect("blur")
}

fn bench_detection(c: &mut Criterion) {
    let img = phantom_image();
    let detector = TubeDetector::default();
    let params = detector.hough_params(2.1333);

    c.bench_function("hough_circles_256", |b| {
        b.iter(|| detect_circles(black_box(&img.view()), black_box(&params)))
    });
    c.bench_function("tube_detector_256", |b| {
        b.iter(|| detector.detect(black_box(&img.view()), black_box(2.1333)))
    });
}

criterion_group!(benches, bench_detection);
criterion_main!(benches);
