use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use tubetone::dsp::resampler::resample;

fn impulse_response(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| {
            let t = i as f32 / 48000.0;
            (-t * 5.0).exp() * (t * 700.0).cos()
        })
        .collect()
}

pub fn mono_resample_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("Resample 48k -> 44.1k");

    for &len in &[4_800, 24_000, 48_000] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let ir = impulse_response(len);
            b.iter(|| resample(black_box(&ir), 48000, 44100, 1).unwrap());
        });
    }

    group.finish();
}

pub fn stereo_resample_benchmark(c: &mut Criterion) {
    let ir = impulse_response(48_000);
    c.bench_function("Resample 48k -> 96k stereo", |b| {
        b.iter(|| resample(black_box(&ir), 48000, 96000, 2).unwrap());
    });
}

criterion_group!(benches, mono_resample_benchmarks, stereo_resample_benchmark);
criterion_main!(benches);
