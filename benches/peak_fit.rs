use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;

use autocollimator::{
    project_both, ChannelSelector, FitSettings, Frame, GaussianFitter, IntensityProfile, PeakFitter,
};

fn gaussian_profile(len: usize, center: f64, sigma: f64, amplitude: f64) -> IntensityProfile {
    (0..len)
        .map(|i| amplitude * (-(i as f64 - center).powi(2) / (2.0 * sigma * sigma)).exp() + 40.0)
        .collect::<Vec<_>>()
        .into()
}

fn spot_frame(width: usize, height: usize) -> Frame {
    let (cx, cy, sigma) = (width as f64 * 0.47, height as f64 * 0.53, 14.0);
    let pixels = Array2::from_shape_fn((height, width), |(r, c)| {
        let d2 = (c as f64 - cx).powi(2) + (r as f64 - cy).powi(2);
        (40.0 + 3000.0 * (-d2 / (2.0 * sigma * sigma)).exp()) as u16
    });
    Frame::mono(pixels, 12).expect("valid frame")
}

fn bench_gaussian_fit(c: &mut Criterion) {
    let fitter = GaussianFitter::new(FitSettings::default());
    let profile = gaussian_profile(1936, 811.3, 14.0, 3.0e5);

    c.bench_function("gaussian_fit_1936", |b| {
        b.iter(|| {
            let fit = fitter.fit(black_box(&profile));
            black_box(fit.map(|f| f.center).unwrap_or(f64::NAN));
        });
    });
}

fn bench_projection(c: &mut Criterion) {
    let frame = spot_frame(1936, 1236);

    c.bench_function("project_both_1936x1236", |b| {
        b.iter(|| {
            let profiles = project_both(black_box(&frame), ChannelSelector::Mono).expect("mono frame");
            black_box(profiles.x.len());
        });
    });
}

criterion_group!(benches, bench_gaussian_fit, bench_projection);
criterion_main!(benches);
