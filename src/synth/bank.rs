use std::f32::consts::FRAC_PI_4;

use arrayvec::ArrayVec;

use crate::{
    dsp::{
        oscillator::{Oscillator, Waveform},
        wavetable::TableHandle,
    },
    io::converter::midi_pitch_to_freq,
    modulation::TargetValues,
    patch::{CompiledPatch, OscillatorKind},
    MAX_OSCILLATORS,
};

const MAX_MOD_INDEX: f32 = 16.0;

#[derive(Debug, Clone)]
struct Slot {
    oscillator: Oscillator,
    modulator: Option<usize>,
    // Per-block values, set by `prepare`
    increment: f32,
    index: f32,
    left: f32,
    right: f32,
}

/// The oscillators of one voice, evaluated in list order.
///
/// FM/PM modulators are always earlier slots, so a single forward pass
/// sees every modulator's output before its carrier needs it. A
/// modulator's raw output drives its carrier; its level only affects how
/// loud it is in the mix.
#[derive(Debug, Clone, Default)]
pub struct OscillatorBank {
    slots: ArrayVec<Slot, MAX_OSCILLATORS>,
}

impl OscillatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the slots for a patch. Phases start at zero.
    pub fn configure(&mut self, patch: &CompiledPatch) {
        self.slots.clear();
        for descriptor in patch.patch().oscillators.iter().take(MAX_OSCILLATORS) {
            let (oscillator, modulator) = match descriptor.kind {
                OscillatorKind::Wavetable { .. } => (Oscillator::wavetable(), None),
                OscillatorKind::Sample {
                    sample,
                    start,
                    loop_points,
                    ..
                } => (
                    Oscillator::sample(
                        start as f64,
                        patch.sample(sample).map_or(0.0, |buffer| buffer.len() as f64),
                        loop_points.map(|points| (points.start as f64, points.end as f64)),
                    ),
                    None,
                ),
                OscillatorKind::Fm { modulator, .. } => (Oscillator::fm(), Some(modulator)),
                OscillatorKind::Pm { modulator, .. } => (Oscillator::pm(), Some(modulator)),
            };
            self.slots.push(Slot {
                oscillator,
                modulator,
                increment: 0.0,
                index: 0.0,
                left: 0.0,
                right: 0.0,
            });
        }
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.oscillator.reset();
        }
    }

    /// Work out this block's increments, mix gains and modulation indices,
    /// and pick each oscillator's waveform source.
    pub fn prepare<'a>(
        &mut self,
        patch: &'a CompiledPatch,
        note: f32,
        bend_semitones: f32,
        targets: &TargetValues,
        sample_rate: f32,
    ) -> ArrayVec<Waveform<'a>, MAX_OSCILLATORS> {
        let mut waves = ArrayVec::new();

        for (i, (slot, descriptor)) in self
            .slots
            .iter_mut()
            .zip(&patch.patch().oscillators)
            .enumerate()
        {
            let pitch = note
                + descriptor.semitones
                + descriptor.cents / 100.0
                + bend_semitones
                + targets.pitch(i);
            let freq = midi_pitch_to_freq(pitch);
            let increment = freq / sample_rate;

            let (wave, increment, base_index) = match descriptor.kind {
                OscillatorKind::Wavetable { table } => {
                    (table_wave(patch, table, increment), increment, 0.0)
                }
                OscillatorKind::Fm { table, index, .. } | OscillatorKind::Pm { table, index, .. } => {
                    (table_wave(patch, table, increment), increment, index)
                }
                OscillatorKind::Sample {
                    sample, root_note, ..
                } => match patch.sample(sample) {
                    Some(buffer) => {
                        let root = midi_pitch_to_freq(root_note as f32);
                        let rate = buffer.sample_rate() / sample_rate;
                        (Waveform::Sample(buffer), freq / root * rate, 0.0)
                    }
                    None => (Waveform::Silent, 0.0, 0.0),
                },
            };

            slot.increment = if increment.is_finite() { increment } else { 0.0 };
            slot.index = (base_index + targets.mod_index(i)).clamp(0.0, MAX_MOD_INDEX);

            let level = (descriptor.level + targets.level(i)).clamp(0.0, 1.0);
            let pan = (descriptor.pan + targets.pan(i)).clamp(-1.0, 1.0);
            // Equal power: pan -1 → full left, 0 → -3 dB each side, 1 → full right
            let angle = (pan + 1.0) * FRAC_PI_4;
            slot.left = level * angle.cos();
            slot.right = level * angle.sin();

            waves.push(wave);
        }

        waves
    }

    /// One stereo frame from every oscillator.
    #[inline]
    pub fn next_frame(&mut self, waves: &[Waveform]) -> (f32, f32) {
        let mut outputs = [0.0f32; MAX_OSCILLATORS];
        let mut left = 0.0;
        let mut right = 0.0;

        for (i, (slot, wave)) in self.slots.iter_mut().zip(waves).enumerate() {
            let modulation = match slot.modulator {
                Some(m) if m < i => outputs[m] * slot.index,
                _ => 0.0,
            };
            let out = slot.oscillator.next_sample(wave, slot.increment, modulation);
            outputs[i] = out;
            left += out * slot.left;
            right += out * slot.right;
        }

        (left, right)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Phase (or sample position) of each oscillator.
    pub fn phases(&self) -> impl Iterator<Item = f64> + '_ {
        self.slots.iter().map(|slot| slot.oscillator.phase())
    }
}

fn table_wave(patch: &CompiledPatch, table: TableHandle, increment: f32) -> Waveform<'_> {
    match patch.wavetable(table) {
        Some(table) => Waveform::Table(table.select(increment)),
        None => Waveform::Silent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dsp::wavetable::{SampleBuffer, Wavetable},
        modulation::{ModRoute, ModSourceId, ModTargetId, SourceValues},
        patch::{OscillatorDescriptor, Patch},
    };

    const SAMPLE_RATE: f32 = 48_000.0;

    #[test]
    fn pan_is_equal_power() {
        let mut patch = Patch::new("pan");
        let table = patch.add_wavetable(Wavetable::sine());
        let patch = patch
            .with_oscillator(OscillatorDescriptor::wavetable(table).with_pan(-1.0))
            .compile()
            .unwrap();

        let mut bank = OscillatorBank::new();
        bank.configure(&patch);
        let waves = bank.prepare(&patch, 69.0, 0.0, &TargetValues::default(), SAMPLE_RATE);

        let mut right_energy = 0.0;
        let mut left_energy = 0.0;
        for _ in 0..480 {
            let (l, r) = bank.next_frame(&waves);
            left_energy += l * l;
            right_energy += r * r;
        }
        assert!(left_energy > 1.0);
        assert!(right_energy < 1e-6);
    }

    #[test]
    fn pitch_offsets_add_up() {
        let mut patch = Patch::new("tuning");
        let table = patch.add_wavetable(Wavetable::sine());
        let patch = patch
            .with_oscillator(OscillatorDescriptor::wavetable(table).with_tuning(12.0, 0.0))
            .with_route(ModRoute::new(ModSourceId::ModWheel, ModTargetId::OscPitch(0), 0.5))
            .compile()
            .unwrap();

        let mut sources = SourceValues::new();
        sources.set(ModSourceId::ModWheel, 1.0);
        let mut targets = TargetValues::default();
        patch
            .matrix()
            .evaluate(patch.default_amounts(), &sources, &mut targets);

        let mut bank = OscillatorBank::new();
        bank.configure(&patch);
        // 45 + 12 semitones + 12 from the route + 0 bend = 69 → 440 Hz
        bank.prepare(&patch, 45.0, 0.0, &targets, SAMPLE_RATE);
        assert!((bank.slots[0].increment - 440.0 / SAMPLE_RATE).abs() < 1e-6);
    }

    #[test]
    fn sample_increment_follows_root_and_rate() {
        let mut patch = Patch::new("sample");
        let sample = patch.add_sample(SampleBuffer::new(vec![0.5; 1000], 24_000.0).unwrap());
        let patch = patch
            .with_oscillator(OscillatorDescriptor::sample(sample, 60))
            .compile()
            .unwrap();

        let mut bank = OscillatorBank::new();
        bank.configure(&patch);
        // One octave up, buffer at half the engine rate → 2 × 0.5
        bank.prepare(&patch, 72.0, 0.0, &TargetValues::default(), SAMPLE_RATE);
        assert!((bank.slots[0].increment - 1.0).abs() < 1e-4);
    }

    #[test]
    fn fm_carrier_follows_modulator() {
        let mut patch = Patch::new("fm");
        let table = patch.add_wavetable(Wavetable::sine());
        let patch = patch
            .with_oscillator(OscillatorDescriptor::wavetable(table).with_level(0.0))
            .with_oscillator(OscillatorDescriptor::fm(table, 0, 4.0))
            .compile()
            .unwrap();

        let mut plain = Patch::new("plain");
        let plain_table = plain.add_wavetable(Wavetable::sine());
        let plain = plain
            .with_oscillator(OscillatorDescriptor::wavetable(plain_table))
            .compile()
            .unwrap();

        let render = |patch: &CompiledPatch| {
            let mut bank = OscillatorBank::new();
            bank.configure(patch);
            let waves = bank.prepare(patch, 60.0, 0.0, &TargetValues::default(), SAMPLE_RATE);
            (0..256).map(|_| bank.next_frame(&waves).0).collect::<Vec<_>>()
        };

        let fm = render(&patch);
        let reference = render(&plain);
        assert!(fm.iter().all(|s| s.is_finite()));
        let difference: f32 = fm.iter().zip(&reference).map(|(a, b)| (a - b).abs()).sum();
        assert!(difference > 1.0);
    }
}
