//! Benchmarks for the state-variable filter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_synth::dsp::filter::{FilterCoefficients, SVFilter};

use crate::BLOCK_SIZES;

const SAMPLE_RATE: f32 = 48_000.0;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        // Generate a test signal (sawtooth-like ramp)
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        let clean = FilterCoefficients::new(1000.0, 0.5, 0.0, SAMPLE_RATE);
        let driven = FilterCoefficients::new(1000.0, 0.5, 0.8, SAMPLE_RATE);

        // Lowpass filter
        let mut filter = SVFilter::lowpass();
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("lowpass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filter.render(black_box(&mut buffer), black_box(&clean));
            })
        });

        // Bandpass filter
        let mut filter = SVFilter::bandpass();
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("bandpass", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filter.render(black_box(&mut buffer), black_box(&clean));
            })
        });

        // Drive adds a tanh per sample
        let mut filter = SVFilter::lowpass();
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("lowpass_driven", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filter.render(black_box(&mut buffer), black_box(&driven));
            })
        });

        // Coefficients are rebuilt once per voice per block
        group.bench_with_input(BenchmarkId::new("coefficients", size), &size, |b, _| {
            b.iter(|| FilterCoefficients::new(black_box(1234.0), 0.7, 0.2, SAMPLE_RATE))
        });
    }

    group.finish();
}
