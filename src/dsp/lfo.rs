//! Low Frequency Oscillators used as per-voice modulation sources.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::oscillator::wrap_phase;

/*
Low Frequency Oscillators
=========================

An LFO is an oscillator running below hearing (~0.01 Hz to ~20 Hz). It
doesn't make sound; it moves other parameters.

Vocabulary
----------

  control-rate    Slow enough to be evaluated once per audio block rather
                  than once per sample.
  bipolar         Output swings -1.0 to +1.0. Every shape here is bipolar.
  key sync        Phase resets to 0 when a note starts.
  free-running    Phase carries on from wherever it was.


Block-Rate Evaluation
---------------------

Each voice reads its LFOs once per block:

    value  = shape(phase)           ← used for the whole block
    phase += rate × block_len / sample_rate

At 5 Hz with 256-sample blocks at 48 kHz that is ~37 updates per cycle,
plenty for vibrato or a filter sweep.


Shapes (phase p ∈ [0, 1))
-------------------------

    SINE        sin(2πp)
    TRIANGLE    1 - 4|p - 0.5|     starts at -1, peaks at p = 0.5
    SAW         2p - 1             rising ramp
    SQUARE      +1 for p < 0.5, else -1
    S&H         random value, redrawn each time the phase wraps

Sample & hold draws from a xorshift32 generator. It is seeded per voice so
two voices don't move in lockstep, and it is deterministic so a test can
predict it.
*/

pub const MIN_LFO_RATE_HZ: f32 = 0.01;
pub const MAX_LFO_RATE_HZ: f32 = 50.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoWaveform {
    #[default]
    Sine,
    Triangle,
    Saw,
    Square,
    SampleAndHold,
}

#[derive(Debug, Clone)]
pub struct Lfo {
    waveform: LfoWaveform,
    rate_hz: f32,
    key_sync: bool,
    phase: f32,
    held: f32,
    rng: u32,
}

impl Lfo {
    pub fn new(waveform: LfoWaveform, rate_hz: f32, key_sync: bool) -> Self {
        let mut lfo = Self {
            waveform,
            rate_hz: rate_hz.clamp(MIN_LFO_RATE_HZ, MAX_LFO_RATE_HZ),
            key_sync,
            phase: 0.0,
            held: 0.0,
            rng: 0x9E37_79B9,
        };
        lfo.held = lfo.draw();
        lfo
    }

    /// Reseed the sample & hold generator. Zero is remapped since xorshift
    /// would get stuck there.
    pub fn seed(&mut self, seed: u32) {
        self.rng = if seed == 0 { 0x9E37_79B9 } else { seed };
        self.held = self.draw();
    }

    pub fn note_on(&mut self) {
        if self.key_sync {
            self.phase = 0.0;
            if self.waveform == LfoWaveform::SampleAndHold {
                self.held = self.draw();
            }
        }
    }

    /// Current value in `[-1, 1]`.
    pub fn value(&self) -> f32 {
        let p = self.phase;
        match self.waveform {
            LfoWaveform::Sine => (std::f32::consts::TAU * p).sin(),
            LfoWaveform::Triangle => 1.0 - 4.0 * (p - 0.5).abs(),
            LfoWaveform::Saw => 2.0 * p - 1.0,
            LfoWaveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoWaveform::SampleAndHold => self.held,
        }
    }

    /// Move forward by `samples` at `sample_rate`.
    pub fn advance(&mut self, samples: usize, sample_rate: f32) {
        let step = self.rate_hz * samples as f32 / sample_rate;
        let next = self.phase + step;
        if next >= 1.0 && self.waveform == LfoWaveform::SampleAndHold {
            self.held = self.draw();
        }
        self.phase = wrap_phase(next);
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn waveform(&self) -> LfoWaveform {
        self.waveform
    }

    pub fn rate_hz(&self) -> f32 {
        self.rate_hz
    }

    fn draw(&mut self) -> f32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_start_where_expected() {
        assert!(Lfo::new(LfoWaveform::Sine, 1.0, true).value().abs() < 1e-6);
        assert_eq!(Lfo::new(LfoWaveform::Triangle, 1.0, true).value(), -1.0);
        assert_eq!(Lfo::new(LfoWaveform::Saw, 1.0, true).value(), -1.0);
        assert_eq!(Lfo::new(LfoWaveform::Square, 1.0, true).value(), 1.0);
    }

    #[test]
    fn advances_at_block_rate() {
        let mut lfo = Lfo::new(LfoWaveform::Sine, 1.0, true);
        // Quarter cycle: 12000 samples at 48 kHz
        lfo.advance(12_000, 48_000.0);
        assert!((lfo.value() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn key_sync_resets_phase() {
        let mut synced = Lfo::new(LfoWaveform::Saw, 2.0, true);
        let mut free = Lfo::new(LfoWaveform::Saw, 2.0, false);
        synced.advance(5_000, 48_000.0);
        free.advance(5_000, 48_000.0);

        synced.note_on();
        free.note_on();
        assert_eq!(synced.phase(), 0.0);
        assert!(free.phase() > 0.0);
    }

    #[test]
    fn sample_and_hold_changes_only_on_wrap() {
        let mut lfo = Lfo::new(LfoWaveform::SampleAndHold, 10.0, false);
        lfo.seed(1234);
        let first = lfo.value();
        assert!((-1.0..=1.0).contains(&first));

        lfo.advance(100, 48_000.0);
        assert_eq!(lfo.value(), first);

        // 10 Hz wraps every 4800 samples
        lfo.advance(4_800, 48_000.0);
        assert_ne!(lfo.value(), first);
    }

    #[test]
    fn rate_is_clamped() {
        assert_eq!(Lfo::new(LfoWaveform::Sine, 500.0, false).rate_hz(), MAX_LFO_RATE_HZ);
        assert_eq!(Lfo::new(LfoWaveform::Sine, 0.0, false).rate_hz(), MIN_LFO_RATE_HZ);
    }
}
