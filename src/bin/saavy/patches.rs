//! Built-in patches for the demo

use saavy_synth::{
    dsp::{
        envelope::AttackShape,
        filter::FilterType,
        lfo::LfoWaveform,
        modulate::ModCurve,
        wavetable::Wavetable,
    },
    modulation::{ModRoute, ModSourceId, ModTargetId},
    patch::{
        EnvelopeDescriptor, FilterDescriptor, LfoDescriptor, OscillatorDescriptor, Patch, VoiceMode,
    },
};

/// Detuned saw pair plus an FM bell layer through a swept low-pass.
///
/// Mod wheel opens the filter and adds vibrato.
pub fn lead() -> Patch {
    let mut patch = Patch::new("lead");
    let saw = patch.add_wavetable(Wavetable::saw());
    let sine = patch.add_wavetable(Wavetable::sine());

    patch
        .with_oscillator(OscillatorDescriptor::wavetable(saw).with_pan(-0.4))
        .with_oscillator(
            OscillatorDescriptor::wavetable(saw)
                .with_tuning(0.0, 7.0)
                .with_pan(0.4),
        )
        // Modulator for the bell layer, kept silent on its own
        .with_oscillator(
            OscillatorDescriptor::wavetable(sine)
                .with_tuning(12.0, 0.0)
                .with_level(0.0),
        )
        .with_oscillator(OscillatorDescriptor::fm(sine, 2, 1.5).with_level(0.3))
        .with_filter(FilterDescriptor::new(FilterType::LowPass, 900.0, 0.35).with_drive(0.3))
        .with_amp_envelope(
            EnvelopeDescriptor::adsr("amp", 0.01, 0.3, 0.7, 0.4)
                .with_attack_shape(AttackShape::Exponential)
                .gating(true),
        )
        .with_envelope(EnvelopeDescriptor::adsr("filter", 0.005, 0.5, 0.2, 0.4))
        .with_lfo(LfoDescriptor::new(LfoWaveform::Sine, 5.5))
        .with_route(ModRoute::new(ModSourceId::Envelope(1), ModTargetId::FilterCutoff, 0.5))
        .with_route(
            ModRoute::new(ModSourceId::ModWheel, ModTargetId::FilterCutoff, 0.4)
                .with_curve(ModCurve::Exponential),
        )
        .with_route(ModRoute::new(ModSourceId::Envelope(1), ModTargetId::OscModIndex(3), 0.3))
        .with_route(ModRoute::new(ModSourceId::Lfo(0), ModTargetId::OscPitch(0), 0.01))
        .with_route(ModRoute::new(ModSourceId::Lfo(0), ModTargetId::OscPitch(1), 0.01))
        .with_route(ModRoute::new(ModSourceId::Velocity, ModTargetId::OutputGain, 0.2))
        .with_voice_mode(VoiceMode::Poly { voices: 8 })
        .with_cc_mapping(74, ModSourceId::Controller(74))
        .with_gain(0.5)
}

/// Same patch with its voice mode flipped between poly and legato mono.
pub fn toggle_mode(patch: &Patch) -> Patch {
    let mode = match patch.voice_mode {
        VoiceMode::Poly { .. } => VoiceMode::Mono { legato: true },
        VoiceMode::Mono { .. } => VoiceMode::Poly { voices: 8 },
    };
    patch.clone().with_voice_mode(mode)
}
