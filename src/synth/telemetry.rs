use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::{
    dsp::EnvelopeStage,
    synth::voice::{Voice, VoiceState},
};

/// Read-only view of one voice, as last published by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceTelemetry {
    pub id: usize,
    pub state: VoiceState,
    pub note: u8,
    pub velocity: u8,
    pub stage: EnvelopeStage,
    /// Combined gating-envelope level.
    pub level: f32,
}

#[derive(Debug, Default)]
struct VoiceCell {
    state: AtomicU8,
    note: AtomicU8,
    velocity: AtomicU8,
    stage: AtomicU8,
    level: AtomicU32,
}

/// Per-voice atomics written once per block by the engine.
///
/// Each field is read independently, so a reader can see fields from two
/// different blocks. That is fine for meters and displays, which is all
/// this is for.
#[derive(Debug)]
pub struct Telemetry {
    voices: Box<[VoiceCell]>,
}

impl Telemetry {
    pub fn new(voices: usize) -> Self {
        Self {
            voices: (0..voices).map(|_| VoiceCell::default()).collect(),
        }
    }

    pub fn publish(&self, voices: &[Voice]) {
        for (cell, voice) in self.voices.iter().zip(voices) {
            cell.state.store(encode_state(voice.state()), Ordering::Relaxed);
            cell.note.store(voice.note(), Ordering::Relaxed);
            cell.velocity.store(voice.velocity(), Ordering::Relaxed);
            cell.stage
                .store(encode_stage(voice.amplitude_stage()), Ordering::Relaxed);
            cell.level
                .store(voice.amplitude_level().to_bits(), Ordering::Relaxed);
        }
    }

    pub fn voice(&self, id: usize) -> Option<VoiceTelemetry> {
        let cell = self.voices.get(id)?;
        Some(VoiceTelemetry {
            id,
            state: decode_state(cell.state.load(Ordering::Relaxed)),
            note: cell.note.load(Ordering::Relaxed),
            velocity: cell.velocity.load(Ordering::Relaxed),
            stage: decode_stage(cell.stage.load(Ordering::Relaxed)),
            level: f32::from_bits(cell.level.load(Ordering::Relaxed)),
        })
    }

    pub fn snapshot(&self) -> Vec<VoiceTelemetry> {
        (0..self.voices.len()).filter_map(|id| self.voice(id)).collect()
    }

    pub fn sounding(&self) -> usize {
        self.snapshot()
            .iter()
            .filter(|voice| voice.state != VoiceState::Idle)
            .count()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

fn encode_state(state: VoiceState) -> u8 {
    match state {
        VoiceState::Idle => 0,
        VoiceState::Active => 1,
        VoiceState::Releasing => 2,
    }
}

fn decode_state(raw: u8) -> VoiceState {
    match raw {
        1 => VoiceState::Active,
        2 => VoiceState::Releasing,
        _ => VoiceState::Idle,
    }
}

fn encode_stage(stage: EnvelopeStage) -> u8 {
    match stage {
        EnvelopeStage::Idle => 0,
        EnvelopeStage::Delay => 1,
        EnvelopeStage::Attack => 2,
        EnvelopeStage::Decay => 3,
        EnvelopeStage::Sustain => 4,
        EnvelopeStage::Release => 5,
    }
}

fn decode_stage(raw: u8) -> EnvelopeStage {
    match raw {
        1 => EnvelopeStage::Delay,
        2 => EnvelopeStage::Attack,
        3 => EnvelopeStage::Decay,
        4 => EnvelopeStage::Sustain,
        5 => EnvelopeStage::Release,
        _ => EnvelopeStage::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodings_round_trip() {
        for state in [VoiceState::Idle, VoiceState::Active, VoiceState::Releasing] {
            assert_eq!(decode_state(encode_state(state)), state);
        }
        for stage in [
            EnvelopeStage::Idle,
            EnvelopeStage::Delay,
            EnvelopeStage::Attack,
            EnvelopeStage::Decay,
            EnvelopeStage::Sustain,
            EnvelopeStage::Release,
        ] {
            assert_eq!(decode_stage(encode_stage(stage)), stage);
        }
    }

    #[test]
    fn publishes_voice_fields() {
        let telemetry = Telemetry::new(2);
        let mut voices = vec![Voice::new(0, 48_000.0), Voice::new(1, 48_000.0)];
        voices[1].start(72, 99, 0);
        telemetry.publish(&voices);

        let snapshot = telemetry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].state, VoiceState::Idle);
        assert_eq!(snapshot[1].state, VoiceState::Active);
        assert_eq!(snapshot[1].note, 72);
        assert_eq!(snapshot[1].velocity, 99);
        assert!(telemetry.voice(2).is_none());
    }
}
