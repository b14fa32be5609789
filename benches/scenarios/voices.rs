//! Benchmarks for complete engine blocks.
//!
//! Each case renders one block through `SynthEngine::render_block` with a
//! given number of voices held, from a bare sine to a modulated FM patch.

use std::{collections::VecDeque, hint::black_box, sync::Arc};

use criterion::{BenchmarkId, Criterion};
use saavy_synth::{
    dsp::{filter::FilterType, lfo::LfoWaveform, wavetable::Wavetable},
    modulation::{ModRoute, ModSourceId, ModTargetId},
    patch::{
        EnvelopeDescriptor, FilterDescriptor, LfoDescriptor, OscillatorDescriptor, Patch,
        PatchPublisher, VoiceMode,
    },
    synth::{EngineConfig, SynthEngine, SynthMessage, Telemetry},
};

use crate::BLOCK_SIZES;

const VOICE_COUNTS: &[usize] = &[1, 8, 16];

/// One sine, no routes. Baseline per-voice overhead.
fn sine_patch() -> Patch {
    let mut patch = Patch::new("sine");
    let sine = patch.add_wavetable(Wavetable::sine());
    patch
        .with_oscillator(OscillatorDescriptor::wavetable(sine))
        .with_voice_mode(VoiceMode::Poly { voices: 16 })
}

/// Two detuned saws, FM layer, filter envelope and LFO vibrato.
fn rich_patch() -> Patch {
    let mut patch = Patch::new("rich");
    let saw = patch.add_wavetable(Wavetable::saw());
    let sine = patch.add_wavetable(Wavetable::sine());
    patch
        .with_oscillator(OscillatorDescriptor::wavetable(saw).with_pan(-0.5))
        .with_oscillator(
            OscillatorDescriptor::wavetable(saw)
                .with_tuning(0.0, 9.0)
                .with_pan(0.5),
        )
        .with_oscillator(OscillatorDescriptor::wavetable(sine).with_level(0.0))
        .with_oscillator(OscillatorDescriptor::fm(sine, 2, 2.0).with_level(0.4))
        .with_filter(FilterDescriptor::new(FilterType::LowPass, 800.0, 0.6).with_drive(0.4))
        .with_envelope(EnvelopeDescriptor::adsr("filter", 0.01, 0.3, 0.3, 0.3))
        .with_lfo(LfoDescriptor::new(LfoWaveform::Triangle, 4.0))
        .with_route(ModRoute::new(ModSourceId::Envelope(1), ModTargetId::FilterCutoff, 0.6))
        .with_route(ModRoute::new(ModSourceId::Lfo(0), ModTargetId::OscPitch(0), 0.02))
        .with_route(ModRoute::new(ModSourceId::Lfo(0), ModTargetId::OscPitch(1), 0.02))
        .with_route(ModRoute::new(ModSourceId::Velocity, ModTargetId::OscModIndex(3), 0.5))
        .with_route(ModRoute::new(ModSourceId::ModWheel, ModTargetId::FilterCutoff, 0.3))
        .with_voice_mode(VoiceMode::Poly { voices: 16 })
}

/// Engine fed from a plain queue so the benchmark has no ring-buffer peer.
fn engine_with_notes(
    patch: Patch,
    voices: usize,
) -> (SynthEngine<VecDeque<SynthMessage>>, PatchPublisher) {
    let config = EngineConfig::default().with_max_polyphony(16);
    let publisher = PatchPublisher::new(patch, config.max_polyphony).unwrap();
    let telemetry = Arc::new(Telemetry::new(config.max_polyphony));

    let notes: VecDeque<SynthMessage> = (0..voices)
        .map(|i| SynthMessage::NoteOn {
            note: 40 + (i as u8) * 3,
            velocity: 100,
        })
        .collect();
    let engine = SynthEngine::new(config, publisher.slot(), notes, telemetry);
    (engine, publisher)
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        for &voices in VOICE_COUNTS {
            // === BASELINE ===
            let (mut engine, _publisher) = engine_with_notes(sine_patch(), voices);
            group.bench_with_input(
                BenchmarkId::new(format!("sine_x{voices}"), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        engine.render_block(black_box(&mut left), black_box(&mut right));
                    })
                },
            );

            // === MODULATED ===
            // Four oscillators, five routes, filter with drive
            let (mut engine, _publisher) = engine_with_notes(rich_patch(), voices);
            group.bench_with_input(
                BenchmarkId::new(format!("rich_x{voices}"), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        engine.render_block(black_box(&mut left), black_box(&mut right));
                    })
                },
            );
        }
    }

    group.finish();
}
