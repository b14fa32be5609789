//! Benchmarks for wavetable, sample, FM and PM oscillators.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_synth::dsp::{
    oscillator::{Oscillator, Waveform},
    wavetable::{SampleBuffer, Wavetable},
};

use crate::BLOCK_SIZES;

const SAMPLE_RATE: f32 = 48_000.0;

pub fn bench_oscillator(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/oscillator");
    let increment = 440.0 / SAMPLE_RATE;

    let saw = Wavetable::saw();
    let sine = Wavetable::sine();
    let sample = SampleBuffer::new(
        (0..48_000).map(|i| (i as f32 * 0.01).sin()).collect(),
        SAMPLE_RATE,
    )
    .unwrap();

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Wavetable - mip level chosen once per block
        let mut osc = Oscillator::wavetable();
        group.bench_with_input(BenchmarkId::new("wavetable_saw", size), &size, |b, _| {
            b.iter(|| {
                let wave = Waveform::Table(saw.select(increment));
                for out in buffer.iter_mut() {
                    *out = osc.next_sample(&wave, black_box(increment), 0.0);
                }
            })
        });

        // Sample - fractional read with loop wrap
        let mut osc = Oscillator::sample(0.0, 48_000.0, Some((1_000.0, 40_000.0)));
        group.bench_with_input(BenchmarkId::new("sample_looped", size), &size, |b, _| {
            b.iter(|| {
                let wave = Waveform::Sample(&sample);
                for out in buffer.iter_mut() {
                    *out = osc.next_sample(&wave, black_box(1.0), 0.0);
                }
            })
        });

        // FM carrier driven by a sine modulator
        let mut modulator = Oscillator::wavetable();
        let mut carrier = Oscillator::fm();
        group.bench_with_input(BenchmarkId::new("fm_pair", size), &size, |b, _| {
            b.iter(|| {
                let wave = Waveform::Table(sine.select(increment));
                for out in buffer.iter_mut() {
                    let m = modulator.next_sample(&wave, increment * 2.0, 0.0) * 2.0;
                    *out = carrier.next_sample(&wave, black_box(increment), m);
                }
            })
        });

        // PM carrier, same modulator
        let mut modulator = Oscillator::wavetable();
        let mut carrier = Oscillator::pm();
        group.bench_with_input(BenchmarkId::new("pm_pair", size), &size, |b, _| {
            b.iter(|| {
                let wave = Waveform::Table(sine.select(increment));
                for out in buffer.iter_mut() {
                    let m = modulator.next_sample(&wave, increment * 2.0, 0.0) * 2.0;
                    *out = carrier.next_sample(&wave, black_box(increment), m);
                }
            })
        });
    }

    group.finish();
}
