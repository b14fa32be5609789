//! Benchmarks for modulation matrix evaluation.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_synth::{
    dsp::modulate::ModCurve,
    modulation::{
        matrix::ModMatrix, ModRoute, ModSourceId, ModTargetId, SourceValues, TargetValues,
    },
    MAX_ROUTES,
};

/// Cycles through sources and targets so every route lands somewhere new.
fn routes(count: usize) -> Vec<ModRoute> {
    let sources = [
        ModSourceId::Envelope(0),
        ModSourceId::Envelope(1),
        ModSourceId::Lfo(0),
        ModSourceId::Velocity,
        ModSourceId::ModWheel,
        ModSourceId::PitchBend,
    ];
    let targets = [
        ModTargetId::FilterCutoff,
        ModTargetId::OscPitch(0),
        ModTargetId::OscLevel(1),
        ModTargetId::OscPan(0),
        ModTargetId::FilterResonance,
    ];
    (0..count)
        .map(|i| {
            let route = ModRoute::new(sources[i % sources.len()], targets[i % targets.len()], 0.5);
            if i % 3 == 0 {
                route.with_curve(ModCurve::Exponential)
            } else {
                route
            }
        })
        .collect()
}

pub fn bench_matrix(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/matrix");

    let mut sources = SourceValues::new();
    sources.set(ModSourceId::ModWheel, 0.3);
    sources.set(ModSourceId::PitchBend, -0.2);
    let mut targets = TargetValues::default();

    // Evaluated once per voice per block, so cost scales with route count
    for count in [1, 8, MAX_ROUTES] {
        let routes = routes(count);
        let matrix = ModMatrix::resolve(&routes).unwrap();
        let amounts: Vec<f32> = routes.iter().map(|route| route.amount).collect();

        group.bench_with_input(BenchmarkId::new("evaluate", count), &count, |b, _| {
            b.iter(|| {
                matrix.evaluate(black_box(&amounts), black_box(&sources), &mut targets);
            })
        });
    }

    group.finish();
}
