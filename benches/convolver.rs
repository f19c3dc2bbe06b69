use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use tubetone::dsp::ConvolutionEngine;

const FRAGMENT: usize = 64;

fn build_engine(impulse_len: usize) -> ConvolutionEngine {
    let impulse: Vec<f32> = (0..impulse_len)
        .map(|i| {
            let t = i as f32 / 48000.0;
            (-t * 3.0).exp() * (t * 440.0 * 2.0 * std::f32::consts::PI).sin()
        })
        .collect();

    let mut engine = ConvolutionEngine::configure(1, 1, impulse_len, FRAGMENT, 8192, 0.0).unwrap();
    engine
        .load_impulse(0, 0, 1.0, &impulse, 0, impulse.len())
        .unwrap();
    engine.start_processing().unwrap();
    engine
}

pub fn fragment_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("Convolver fragments");

    for &len in &[1_000, 8_000, 24_000] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            let mut engine = build_engine(len);
            let input = vec![0.5f32; FRAGMENT];

            for _ in 0..100 {
                engine.input_buffer(0).copy_from_slice(&input);
                engine.process();
            }

            b.iter(|| {
                engine.input_buffer(0).copy_from_slice(black_box(&input));
                engine.process();
                black_box(engine.output_buffer(0));
            });
        });
    }

    group.finish();
}

pub fn stereo_cabinet_benchmark(c: &mut Criterion) {
    // The cabinet engine's fixed budget: 24000 samples, 2-in/2-out.
    let impulse: Vec<f32> = (0..24000).map(|i| (0.9995f32).powi(i)).collect();
    let mut engine = ConvolutionEngine::configure(2, 2, 24000, FRAGMENT, 8192, 0.0).unwrap();
    engine
        .load_impulse(0, 0, 1.0, &impulse, 0, impulse.len())
        .unwrap();
    engine
        .load_impulse(1, 1, 1.0, &impulse, 0, impulse.len())
        .unwrap();
    engine.start_processing().unwrap();

    let input = vec![0.5f32; FRAGMENT];
    c.bench_function("Cabinet budget fragment", |b| {
        b.iter(|| {
            engine.input_buffer(0).copy_from_slice(black_box(&input));
            engine.input_buffer(1).copy_from_slice(black_box(&input));
            engine.process();
            black_box(engine.output_buffer(0));
        });
    });
}

criterion_group!(benches, fragment_benchmarks, stereo_cabinet_benchmark);
criterion_main!(benches);
