//! Modulation sources, targets and the routes between them.
//!
//! Sources and targets are small enums that map onto fixed slot indices, so
//! per-voice source and target storage is a plain array and evaluating a
//! route never hashes or allocates.

pub mod matrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{dsp::modulate::ModCurve, MAX_ENVELOPES, MAX_LFOS, MAX_OSCILLATORS};

pub use matrix::ModMatrix;

const ENVELOPE_BASE: usize = 0;
const LFO_BASE: usize = ENVELOPE_BASE + MAX_ENVELOPES;
const VELOCITY: usize = LFO_BASE + MAX_LFOS;
const PITCH_BEND: usize = VELOCITY + 1;
const MOD_WHEEL: usize = PITCH_BEND + 1;
const AFTERTOUCH: usize = MOD_WHEEL + 1;
const NOTE_NUMBER: usize = AFTERTOUCH + 1;
const CONTROLLER_BASE: usize = NOTE_NUMBER + 1;

/// Where a route reads from.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModSourceId {
    /// Envelope output (level × amount), `[-1, 1]`.
    Envelope(u8),
    /// LFO output, `[-1, 1]`.
    Lfo(u8),
    /// Note-on velocity, `[0, 1]`.
    Velocity,
    /// Pitch wheel, `[-1, 1]`.
    PitchBend,
    /// CC1 unless remapped, `[0, 1]`.
    ModWheel,
    /// Generic controller slot `CC n`, `[0, 1]`.
    Controller(u8),
    /// Channel or key pressure, `[0, 1]`.
    Aftertouch,
    /// note / 127, `[0, 1]`.
    NoteNumber,
}

impl ModSourceId {
    pub const COUNT: usize = CONTROLLER_BASE + 128;

    /// Slot index, or `None` if the id is past the engine's static limits.
    pub fn index(self) -> Option<usize> {
        match self {
            ModSourceId::Envelope(n) if (n as usize) < MAX_ENVELOPES => {
                Some(ENVELOPE_BASE + n as usize)
            }
            ModSourceId::Lfo(n) if (n as usize) < MAX_LFOS => Some(LFO_BASE + n as usize),
            ModSourceId::Envelope(_) | ModSourceId::Lfo(_) => None,
            ModSourceId::Velocity => Some(VELOCITY),
            ModSourceId::PitchBend => Some(PITCH_BEND),
            ModSourceId::ModWheel => Some(MOD_WHEEL),
            ModSourceId::Aftertouch => Some(AFTERTOUCH),
            ModSourceId::NoteNumber => Some(NOTE_NUMBER),
            ModSourceId::Controller(n) if n < 128 => Some(CONTROLLER_BASE + n as usize),
            ModSourceId::Controller(_) => None,
        }
    }

    /// Global sources are shared by all voices and written by commands;
    /// the rest are computed per voice.
    pub fn is_global(self) -> bool {
        matches!(
            self,
            ModSourceId::PitchBend
                | ModSourceId::ModWheel
                | ModSourceId::Controller(_)
                | ModSourceId::Aftertouch
        )
    }

    pub fn is_bipolar(self) -> bool {
        matches!(
            self,
            ModSourceId::Envelope(_) | ModSourceId::Lfo(_) | ModSourceId::PitchBend
        )
    }
}

/// Which parameter a route writes to.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModTargetId {
    OscPitch(u8),
    OscLevel(u8),
    OscPan(u8),
    OscModIndex(u8),
    FilterCutoff,
    FilterResonance,
    FilterDrive,
    OutputGain,
}

const OSC_PITCH_BASE: usize = 0;
const OSC_LEVEL_BASE: usize = OSC_PITCH_BASE + MAX_OSCILLATORS;
const OSC_PAN_BASE: usize = OSC_LEVEL_BASE + MAX_OSCILLATORS;
const OSC_MOD_INDEX_BASE: usize = OSC_PAN_BASE + MAX_OSCILLATORS;
const FILTER_CUTOFF: usize = OSC_MOD_INDEX_BASE + MAX_OSCILLATORS;
const FILTER_RESONANCE: usize = FILTER_CUTOFF + 1;
const FILTER_DRIVE: usize = FILTER_RESONANCE + 1;
const OUTPUT_GAIN: usize = FILTER_DRIVE + 1;

impl ModTargetId {
    pub const COUNT: usize = OUTPUT_GAIN + 1;

    pub fn index(self) -> Option<usize> {
        let osc = |base: usize, n: u8| ((n as usize) < MAX_OSCILLATORS).then(|| base + n as usize);
        match self {
            ModTargetId::OscPitch(n) => osc(OSC_PITCH_BASE, n),
            ModTargetId::OscLevel(n) => osc(OSC_LEVEL_BASE, n),
            ModTargetId::OscPan(n) => osc(OSC_PAN_BASE, n),
            ModTargetId::OscModIndex(n) => osc(OSC_MOD_INDEX_BASE, n),
            ModTargetId::FilterCutoff => Some(FILTER_CUTOFF),
            ModTargetId::FilterResonance => Some(FILTER_RESONANCE),
            ModTargetId::FilterDrive => Some(FILTER_DRIVE),
            ModTargetId::OutputGain => Some(OUTPUT_GAIN),
        }
    }

    /// Oscillator this target belongs to, if any.
    pub fn oscillator(self) -> Option<usize> {
        match self {
            ModTargetId::OscPitch(n)
            | ModTargetId::OscLevel(n)
            | ModTargetId::OscPan(n)
            | ModTargetId::OscModIndex(n) => Some(n as usize),
            _ => None,
        }
    }

    /// Units contributed by a full-scale route.
    pub fn depth(self) -> f32 {
        match self {
            ModTargetId::OscPitch(_) => 24.0,  // semitones
            ModTargetId::OscModIndex(_) => 8.0,
            ModTargetId::FilterCutoff => 8.0, // octaves
            _ => 1.0,
        }
    }

    /// Symmetric bound the summed modulation is clamped to.
    pub fn limit(self) -> f32 {
        match self {
            ModTargetId::OscPitch(_) => 48.0,
            ModTargetId::OscPan(_) => 2.0,
            ModTargetId::OscModIndex(_) => 16.0,
            ModTargetId::FilterCutoff => 10.0,
            _ => 1.0,
        }
    }
}

fn limit_for_slot(slot: usize) -> f32 {
    match slot {
        s if s < OSC_LEVEL_BASE => ModTargetId::OscPitch(0).limit(),
        s if s < OSC_PAN_BASE => ModTargetId::OscLevel(0).limit(),
        s if s < OSC_MOD_INDEX_BASE => ModTargetId::OscPan(0).limit(),
        s if s < FILTER_CUTOFF => ModTargetId::OscModIndex(0).limit(),
        FILTER_CUTOFF => ModTargetId::FilterCutoff.limit(),
        _ => 1.0,
    }
}

/// One source → target connection.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModRoute {
    pub source: ModSourceId,
    pub target: ModTargetId,
    /// `[-1, 1]`; may be changed live via `SynthMessage::SetRouteAmount`.
    pub amount: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub curve: ModCurve,
}

impl ModRoute {
    pub fn new(source: ModSourceId, target: ModTargetId, amount: f32) -> Self {
        Self {
            source,
            target,
            amount,
            curve: ModCurve::Linear,
        }
    }

    pub fn with_curve(mut self, curve: ModCurve) -> Self {
        self.curve = curve;
        self
    }
}

/// Current value of every source slot.
///
/// The engine owns one of these: global slots are written by commands,
/// per-voice slots are overwritten by each voice before it evaluates its
/// routes.
#[derive(Debug, Clone)]
pub struct SourceValues {
    values: [f32; ModSourceId::COUNT],
}

impl Default for SourceValues {
    fn default() -> Self {
        Self {
            values: [0.0; ModSourceId::COUNT],
        }
    }
}

impl SourceValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, clamped to the source's range. Out-of-range ids are
    /// ignored.
    pub fn set(&mut self, source: ModSourceId, value: f32) {
        let Some(slot) = source.index() else {
            return;
        };
        let value = if !value.is_finite() {
            0.0
        } else if source.is_bipolar() {
            value.clamp(-1.0, 1.0)
        } else {
            value.clamp(0.0, 1.0)
        };
        self.values[slot] = value;
    }

    pub fn get(&self, source: ModSourceId) -> f32 {
        source.index().map_or(0.0, |slot| self.values[slot])
    }

    #[inline]
    pub(crate) fn slot(&self, slot: usize) -> f32 {
        self.values.get(slot).copied().unwrap_or(0.0)
    }

    /// Raw per-voice write; callers pass already-ranged values.
    #[inline]
    pub(crate) fn set_slot(&mut self, slot: usize, value: f32) {
        if let Some(v) = self.values.get_mut(slot) {
            *v = value;
        }
    }
}

/// Summed, clamped modulation per target slot for one voice and block.
#[derive(Debug, Clone)]
pub struct TargetValues {
    values: [f32; ModTargetId::COUNT],
}

impl Default for TargetValues {
    fn default() -> Self {
        Self {
            values: [0.0; ModTargetId::COUNT],
        }
    }
}

impl TargetValues {
    pub fn get(&self, target: ModTargetId) -> f32 {
        target.index().map_or(0.0, |slot| self.values[slot])
    }

    #[inline]
    pub fn pitch(&self, oscillator: usize) -> f32 {
        self.values[OSC_PITCH_BASE + oscillator]
    }

    #[inline]
    pub fn level(&self, oscillator: usize) -> f32 {
        self.values[OSC_LEVEL_BASE + oscillator]
    }

    #[inline]
    pub fn pan(&self, oscillator: usize) -> f32 {
        self.values[OSC_PAN_BASE + oscillator]
    }

    #[inline]
    pub fn mod_index(&self, oscillator: usize) -> f32 {
        self.values[OSC_MOD_INDEX_BASE + oscillator]
    }

    pub fn cutoff_octaves(&self) -> f32 {
        self.values[FILTER_CUTOFF]
    }

    pub fn resonance(&self) -> f32 {
        self.values[FILTER_RESONANCE]
    }

    pub fn drive(&self) -> f32 {
        self.values[FILTER_DRIVE]
    }

    pub fn gain(&self) -> f32 {
        self.values[OUTPUT_GAIN]
    }

    pub(crate) fn store(&mut self, slot: usize, value: f32) {
        let limit = limit_for_slot(slot);
        self.values[slot] = if value.is_finite() {
            value.clamp(-limit, limit)
        } else {
            0.0
        };
    }
}

/// Source slot for a per-voice envelope (no bounds check).
pub(crate) fn envelope_slot(n: usize) -> usize {
    ENVELOPE_BASE + n
}

pub(crate) fn lfo_slot(n: usize) -> usize {
    LFO_BASE + n
}

pub(crate) const VELOCITY_SLOT: usize = VELOCITY;
pub(crate) const NOTE_NUMBER_SLOT: usize = NOTE_NUMBER;
