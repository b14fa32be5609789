//! Per-voice signal generators.

use super::wavetable::{SampleBuffer, TableLevel};

/*
Oscillators
===========

Every oscillator here is a phase accumulator plus a way of turning phase
into a sample.

Vocabulary
----------

  phase         Position inside one cycle, kept in [0, 1).
  increment     How far phase moves per sample: frequency / sample_rate.
                440 Hz at 48 kHz → 0.00917 cycles per sample.
  wrap          Folding phase back into [0, 1) after each step.
  carrier       The oscillator you hear.
  modulator     An earlier oscillator whose output bends the carrier.
  index         How hard the modulator bends the carrier.


Four Kinds
----------

WAVETABLE
    phase → table lookup (see `dsp/wavetable.rs`).

        out = table[phase]
        phase += increment

SAMPLE
    Reads a recorded buffer instead of a single cycle. The "phase" is a
    position in buffer samples, starting at a start offset:

        out = buffer[position]
        position += increment × (buffer_rate / engine_rate)

    With loop points, crossing the loop end jumps back by the loop length,
    and the sample just before the loop end interpolates towards the loop
    start so the seam doesn't click. Without them, running off the end
    parks the position at the buffer length and gives silence.

FM (frequency modulation)
    The modulator changes how fast the carrier moves:

        increment' = increment × (1 + modulator × index)
        out = table[phase]
        phase += increment'

    increment' is clamped to ±0.5 (Nyquist) so a wild index can't make the
    accumulator jump more than half a cycle.

PM (phase modulation)
    The modulator shifts where the carrier reads, not where it is:

        out = table[phase + modulator × index]
        phase += increment

    This is the "FM" of most classic digital synths. The accumulator never
    sees the modulation, so pitch stays exactly put.


Phase Wrapping
--------------

    wrapped = phase - floor(phase)

handles negative phases too (FM with a large negative index runs the
carrier backwards). Rounding can push `wrapped` to exactly 1.0 for tiny
negative inputs, so that case folds to 0. A NaN or infinite phase also
resets to 0: one bad modulation value must never poison a voice forever.
*/

/// Fold any phase into `[0, 1)`. Non-finite input resets to 0.
#[inline]
pub fn wrap_phase(phase: f32) -> f32 {
    if !phase.is_finite() {
        return 0.0;
    }
    let wrapped = phase - phase.floor();
    if wrapped >= 1.0 || wrapped < 0.0 {
        0.0
    } else {
        wrapped
    }
}

/// Source data an oscillator reads from for the current block.
#[derive(Debug, Clone, Copy)]
pub enum Waveform<'a> {
    Table(TableLevel<'a>),
    Sample(&'a SampleBuffer),
    Silent,
}

impl Waveform<'_> {
    #[inline]
    fn read_table(&self, phase: f32) -> f32 {
        match self {
            Waveform::Table(level) => level.read(phase),
            _ => 0.0,
        }
    }
}

/// Runtime state of one oscillator slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Oscillator {
    Wavetable {
        phase: f32,
    },
    Sample {
        position: f64,
        start: f64,
        /// Buffer length; a one-shot stops here.
        end: f64,
        /// `(loop_start, loop_end)` in buffer samples.
        looping: Option<(f64, f64)>,
    },
    Fm {
        phase: f32,
    },
    Pm {
        phase: f32,
    },
}

impl Oscillator {
    pub fn wavetable() -> Self {
        Oscillator::Wavetable { phase: 0.0 }
    }

    pub fn sample(start: f64, end: f64, looping: Option<(f64, f64)>) -> Self {
        Oscillator::Sample {
            position: start,
            start,
            end,
            looping,
        }
    }

    pub fn fm() -> Self {
        Oscillator::Fm { phase: 0.0 }
    }

    pub fn pm() -> Self {
        Oscillator::Pm { phase: 0.0 }
    }

    /// Current output without moving. `modulation` only matters for PM,
    /// where it is the read-phase offset.
    #[inline]
    pub fn sample_at(&self, wave: &Waveform, modulation: f32) -> f32 {
        match *self {
            Oscillator::Wavetable { phase } | Oscillator::Fm { phase } => wave.read_table(phase),
            Oscillator::Pm { phase } => wave.read_table(wrap_phase(phase + modulation)),
            Oscillator::Sample {
                position, looping, ..
            } => match (wave, looping) {
                (Waveform::Sample(buffer), Some((loop_start, loop_end))) => {
                    buffer.read_looped(position, loop_start, loop_end)
                }
                (Waveform::Sample(buffer), None) => buffer.read(position),
                _ => 0.0,
            },
        }
    }

    /// Step the accumulator. `modulation` only matters for FM, where it
    /// scales the increment.
    #[inline]
    pub fn advance(&mut self, increment: f32, modulation: f32) {
        match self {
            Oscillator::Wavetable { phase } | Oscillator::Pm { phase } => {
                *phase = wrap_phase(*phase + increment);
            }
            Oscillator::Fm { phase } => {
                let bent = (increment * (1.0 + modulation)).clamp(-0.5, 0.5);
                *phase = wrap_phase(*phase + bent);
            }
            Oscillator::Sample {
                position,
                end,
                looping,
                ..
            } => {
                let mut next = *position + increment as f64;
                if let Some((loop_start, loop_end)) = *looping {
                    let length = loop_end - loop_start;
                    if next >= loop_end && length > 0.0 {
                        next = loop_start + (next - loop_start) % length;
                    }
                }
                *position = if next.is_finite() {
                    next.clamp(0.0, *end)
                } else {
                    *end
                };
            }
        }
    }

    /// Read then advance.
    #[inline]
    pub fn next_sample(&mut self, wave: &Waveform, increment: f32, modulation: f32) -> f32 {
        let out = self.sample_at(wave, modulation);
        self.advance(increment, modulation);
        out
    }

    /// Phase back to zero (sample playback back to its start offset).
    pub fn reset(&mut self) {
        match self {
            Oscillator::Wavetable { phase } | Oscillator::Fm { phase } | Oscillator::Pm { phase } => {
                *phase = 0.0
            }
            Oscillator::Sample {
                position, start, ..
            } => *position = *start,
        }
    }

    /// Phase in `[0, 1)` for table oscillators, buffer position for samples.
    pub fn phase(&self) -> f64 {
        match *self {
            Oscillator::Wavetable { phase } | Oscillator::Fm { phase } | Oscillator::Pm { phase } => {
                phase as f64
            }
            Oscillator::Sample { position, .. } => position,
        }
    }
}
