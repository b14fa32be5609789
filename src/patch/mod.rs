//! Static sound descriptions.
//!
//! A [`Patch`] is built by a loader (or by hand), compiled once on the
//! control side into a [`CompiledPatch`], and then shared read-only with the
//! audio path. Voices never mutate it.

mod compile;
mod handle;

use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    dsp::{
        envelope::AttackShape,
        filter::FilterType,
        lfo::LfoWaveform,
        wavetable::{SampleBuffer, SampleHandle, TableHandle, Wavetable},
    },
    modulation::{ModRoute, ModSourceId},
};

pub use compile::CompiledPatch;
pub use handle::PatchPublisher;

pub const DEFAULT_PITCH_BEND_RANGE: f32 = 2.0;
pub const MAX_PITCH_BEND_RANGE: f32 = 48.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Patch {
    pub name: String,
    pub oscillators: Vec<OscillatorDescriptor>,
    pub filter: FilterDescriptor,
    pub envelopes: Vec<EnvelopeDescriptor>,
    pub lfos: Vec<LfoDescriptor>,
    pub routes: Vec<ModRoute>,
    pub voice_mode: VoiceMode,
    /// Semitones for a full pitch-wheel throw, `0..=48`.
    pub pitch_bend_range: f32,
    /// Checked before the default CC map.
    pub cc_map: Vec<CcMapping>,
    pub gain: f32,
    /// Loader-supplied tables, addressed by [`TableHandle`].
    #[cfg_attr(feature = "serde", serde(skip))]
    pub wavetables: Vec<Arc<Wavetable>>,
    /// Loader-supplied buffers, addressed by [`SampleHandle`].
    #[cfg_attr(feature = "serde", serde(skip))]
    pub samples: Vec<Arc<SampleBuffer>>,
}

impl Patch {
    /// An empty patch: no oscillators, one amplitude envelope, an open
    /// low-pass filter, 8-voice poly.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            oscillators: Vec::new(),
            filter: FilterDescriptor::default(),
            envelopes: vec![EnvelopeDescriptor::default()],
            lfos: Vec::new(),
            routes: Vec::new(),
            voice_mode: VoiceMode::default(),
            pitch_bend_range: DEFAULT_PITCH_BEND_RANGE,
            cc_map: Vec::new(),
            gain: 0.8,
            wavetables: Vec::new(),
            samples: Vec::new(),
        }
    }

    pub fn add_wavetable(&mut self, table: impl Into<Arc<Wavetable>>) -> TableHandle {
        self.wavetables.push(table.into());
        TableHandle(self.wavetables.len() as u32 - 1)
    }

    pub fn add_sample(&mut self, sample: impl Into<Arc<SampleBuffer>>) -> SampleHandle {
        self.samples.push(sample.into());
        SampleHandle(self.samples.len() as u32 - 1)
    }

    pub fn with_oscillator(mut self, oscillator: OscillatorDescriptor) -> Self {
        self.oscillators.push(oscillator);
        self
    }

    pub fn with_filter(mut self, filter: FilterDescriptor) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the first (amplitude) envelope.
    pub fn with_amp_envelope(mut self, envelope: EnvelopeDescriptor) -> Self {
        match self.envelopes.first_mut() {
            Some(first) => *first = envelope,
            None => self.envelopes.push(envelope),
        }
        self
    }

    pub fn with_envelope(mut self, envelope: EnvelopeDescriptor) -> Self {
        self.envelopes.push(envelope);
        self
    }

    pub fn with_lfo(mut self, lfo: LfoDescriptor) -> Self {
        self.lfos.push(lfo);
        self
    }

    pub fn with_route(mut self, route: ModRoute) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_voice_mode(mut self, mode: VoiceMode) -> Self {
        self.voice_mode = mode;
        self
    }

    pub fn with_pitch_bend_range(mut self, semitones: f32) -> Self {
        self.pitch_bend_range = semitones;
        self
    }

    pub fn with_cc_mapping(mut self, controller: u8, source: ModSourceId) -> Self {
        self.cc_map.push(CcMapping { controller, source });
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct OscillatorDescriptor {
    pub kind: OscillatorKind,
    pub semitones: f32,
    pub cents: f32,
    /// Base level `[0, 1]` before modulation.
    pub level: f32,
    /// Base pan `[-1, 1]` before modulation.
    pub pan: f32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OscillatorKind {
    Wavetable {
        table: TableHandle,
    },
    Sample {
        sample: SampleHandle,
        /// MIDI note at which the buffer plays back at its own pitch.
        root_note: u8,
        /// Playback start offset in buffer samples.
        start: usize,
        loop_points: Option<LoopPoints>,
    },
    /// `modulator` must be an earlier oscillator in the list.
    Fm {
        table: TableHandle,
        modulator: usize,
        index: f32,
    },
    Pm {
        table: TableHandle,
        modulator: usize,
        index: f32,
    },
}

/// Loop region in buffer samples, `start < end <= len`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPoints {
    pub start: usize,
    pub end: usize,
}

impl OscillatorDescriptor {
    fn with_kind(kind: OscillatorKind) -> Self {
        Self {
            kind,
            semitones: 0.0,
            cents: 0.0,
            level: 1.0,
            pan: 0.0,
        }
    }

    pub fn wavetable(table: TableHandle) -> Self {
        Self::with_kind(OscillatorKind::Wavetable { table })
    }

    pub fn sample(sample: SampleHandle, root_note: u8) -> Self {
        Self::with_kind(OscillatorKind::Sample {
            sample,
            root_note,
            start: 0,
            loop_points: None,
        })
    }

    pub fn fm(table: TableHandle, modulator: usize, index: f32) -> Self {
        Self::with_kind(OscillatorKind::Fm {
            table,
            modulator,
            index,
        })
    }

    pub fn pm(table: TableHandle, modulator: usize, index: f32) -> Self {
        Self::with_kind(OscillatorKind::Pm {
            table,
            modulator,
            index,
        })
    }

    pub fn with_tuning(mut self, semitones: f32, cents: f32) -> Self {
        self.semitones = semitones;
        self.cents = cents;
        self
    }

    pub fn with_level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    pub fn with_pan(mut self, pan: f32) -> Self {
        self.pan = pan;
        self
    }

    /// Sample oscillators only; ignored for the other kinds.
    pub fn with_start(mut self, offset: usize) -> Self {
        if let OscillatorKind::Sample { start, .. } = &mut self.kind {
            *start = offset;
        }
        self
    }

    /// Sample oscillators only; ignored for the other kinds.
    pub fn with_loop(mut self, loop_start: usize, loop_end: usize) -> Self {
        if let OscillatorKind::Sample { loop_points, .. } = &mut self.kind {
            *loop_points = Some(LoopPoints {
                start: loop_start,
                end: loop_end,
            });
        }
        self
    }

    /// True for oscillators that accept a modulation-index target.
    pub fn has_mod_index(&self) -> bool {
        matches!(
            self.kind,
            OscillatorKind::Fm { .. } | OscillatorKind::Pm { .. }
        )
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterDescriptor {
    pub filter_type: FilterType,
    pub cutoff_hz: f32,
    pub resonance: f32,
    pub drive: f32,
}

impl Default for FilterDescriptor {
    fn default() -> Self {
        Self {
            filter_type: FilterType::LowPass,
            cutoff_hz: 18_000.0,
            resonance: 0.0,
            drive: 0.0,
        }
    }
}

impl FilterDescriptor {
    pub fn new(filter_type: FilterType, cutoff_hz: f32, resonance: f32) -> Self {
        Self {
            filter_type,
            cutoff_hz,
            resonance,
            drive: 0.0,
        }
    }

    pub fn with_drive(mut self, drive: f32) -> Self {
        self.drive = drive;
        self
    }
}

/// Times in seconds.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeDescriptor {
    pub name: String,
    pub delay: f32,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub attack_shape: AttackShape,
    /// Scales the output seen by the modulation matrix and the voice gate.
    pub amount: f32,
    /// Multiplies the voice output; the voice is freed when every gating
    /// envelope is idle.
    pub gates_amplitude: bool,
}

impl Default for EnvelopeDescriptor {
    fn default() -> Self {
        Self::adsr("amp", 0.005, 0.1, 0.8, 0.2).gating(true)
    }
}

impl EnvelopeDescriptor {
    pub fn adsr(
        name: impl Into<String>,
        attack: f32,
        decay: f32,
        sustain: f32,
        release: f32,
    ) -> Self {
        Self {
            name: name.into(),
            delay: 0.0,
            attack,
            decay,
            sustain,
            release,
            attack_shape: AttackShape::Linear,
            amount: 1.0,
            gates_amplitude: false,
        }
    }

    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_attack_shape(mut self, shape: AttackShape) -> Self {
        self.attack_shape = shape;
        self
    }

    pub fn with_amount(mut self, amount: f32) -> Self {
        self.amount = amount;
        self
    }

    pub fn gating(mut self, gates_amplitude: bool) -> Self {
        self.gates_amplitude = gates_amplitude;
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LfoDescriptor {
    pub waveform: LfoWaveform,
    pub rate_hz: f32,
    /// Restart from phase 0 on every note start.
    pub key_sync: bool,
}

impl LfoDescriptor {
    pub fn new(waveform: LfoWaveform, rate_hz: f32) -> Self {
        Self {
            waveform,
            rate_hz,
            key_sync: false,
        }
    }

    pub fn key_synced(mut self) -> Self {
        self.key_sync = true;
        self
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceMode {
    Poly { voices: usize },
    Mono { legato: bool },
}

impl Default for VoiceMode {
    fn default() -> Self {
        VoiceMode::Poly { voices: 8 }
    }
}

impl VoiceMode {
    /// Voices this mode may use.
    pub fn polyphony(self) -> usize {
        match self {
            VoiceMode::Poly { voices } => voices,
            VoiceMode::Mono { .. } => 1,
        }
    }
}

/// Patch-defined controller mapping, checked before the default CC map.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcMapping {
    pub controller: u8,
    /// Must be a global source (mod wheel, pitch bend, aftertouch, CC slot).
    pub source: ModSourceId,
}
