//! Externally supplied waveform data.
//!
//! Loaders build [`Wavetable`]s and [`SampleBuffer`]s on the control side and
//! hand them to a patch, which oscillators then address by handle. Nothing in
//! here allocates after construction.

use std::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::PatchError;

/*
Band-limited Wavetables
=======================

A wavetable is one cycle of a waveform stored as N samples. Reading it at
phase p ∈ [0, 1) with linear interpolation gives an oscillator at any pitch.

The catch is aliasing: a sawtooth has harmonics all the way up. Played at
5 kHz, its 5th harmonic (25 kHz) lands above Nyquist and folds back as
inharmonic garbage. The fix is to keep several copies ("mip levels") of the
table, each with fewer harmonics:

  level 0   harmonics 1..=H        (low notes)
  level 1   harmonics 1..=H/2      (one octave up)
  level 2   harmonics 1..=H/4
  ...       down to a single sine

For a phase increment `inc` (cycles per sample), the highest harmonic that
stays below Nyquist is floor(0.5 / inc). We pick the first level whose
harmonic count fits.

Tables are built additively:

  table[j] = Σ  a_h × sin(2π h j / N)
             h

using an integer index into a single sine cycle, so every partial lands
exactly on a sample of that cycle. Each level is scaled by the peak of
level 0 so switching levels does not change loudness.
*/

pub const DEFAULT_TABLE_SIZE: usize = 2048;

/// Stable reference from an oscillator descriptor into `Patch::wavetables`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle(pub u32);

/// Stable reference from an oscillator descriptor into `Patch::samples`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleHandle(pub u32);

#[derive(Debug, Clone)]
struct MipLevel {
    data: Box<[f32]>,
    harmonics: usize,
}

#[derive(Debug, Clone)]
pub struct Wavetable {
    levels: Vec<MipLevel>,
    size: usize,
}

/// One mip level chosen for the current block.
#[derive(Debug, Clone, Copy)]
pub struct TableLevel<'a> {
    data: &'a [f32],
    mask: usize,
}

impl TableLevel<'_> {
    /// Linear-interpolated lookup at `phase` ∈ [0, 1).
    #[inline]
    pub fn read(&self, phase: f32) -> f32 {
        let position = phase * self.data.len() as f32;
        let index = position as usize;
        let frac = position - index as f32;
        let a = self.data[index & self.mask];
        let b = self.data[(index + 1) & self.mask];
        a + (b - a) * frac
    }
}

impl Wavetable {
    /// Build mip levels from harmonic amplitudes (`harmonics[0]` = fundamental).
    pub fn from_harmonics(harmonics: &[f32], size: usize) -> Result<Self, PatchError> {
        if size < 4 || !size.is_power_of_two() {
            return Err(PatchError::InvalidWavetable("size must be a power of two >= 4"));
        }
        if harmonics.is_empty() {
            return Err(PatchError::InvalidWavetable("no harmonics"));
        }
        if harmonics.iter().any(|a| !a.is_finite()) {
            return Err(PatchError::InvalidWavetable("non-finite harmonic amplitude"));
        }
        if harmonics.iter().all(|&a| a == 0.0) {
            return Err(PatchError::InvalidWavetable("all harmonics are zero"));
        }
        Ok(Self::build(harmonics, size))
    }

    /// Wrap a single, already band-limited cycle supplied by a loader.
    pub fn from_cycle(cycle: Vec<f32>) -> Result<Self, PatchError> {
        let size = cycle.len();
        if size < 4 || !size.is_power_of_two() {
            return Err(PatchError::InvalidWavetable("cycle length must be a power of two >= 4"));
        }
        if cycle.iter().any(|s| !s.is_finite()) {
            return Err(PatchError::InvalidWavetable("non-finite sample in cycle"));
        }
        Ok(Self {
            levels: vec![MipLevel {
                data: cycle.into_boxed_slice(),
                harmonics: size / 2,
            }],
            size,
        })
    }

    pub fn sine() -> Self {
        Self::build(&[1.0], DEFAULT_TABLE_SIZE)
    }

    pub fn saw() -> Self {
        let harmonics: Vec<f32> = (1..DEFAULT_TABLE_SIZE / 2)
            .map(|h| if h % 2 == 1 { 1.0 } else { -1.0 } / h as f32)
            .collect();
        Self::build(&harmonics, DEFAULT_TABLE_SIZE)
    }

    pub fn square() -> Self {
        let harmonics: Vec<f32> = (1..DEFAULT_TABLE_SIZE / 2)
            .map(|h| if h % 2 == 1 { 1.0 / h as f32 } else { 0.0 })
            .collect();
        Self::build(&harmonics, DEFAULT_TABLE_SIZE)
    }

    pub fn triangle() -> Self {
        let harmonics: Vec<f32> = (1..DEFAULT_TABLE_SIZE / 2)
            .map(|h| match h % 4 {
                1 => 1.0 / (h * h) as f32,
                3 => -1.0 / (h * h) as f32,
                _ => 0.0,
            })
            .collect();
        Self::build(&harmonics, DEFAULT_TABLE_SIZE)
    }

    fn build(harmonics: &[f32], size: usize) -> Self {
        let sine: Vec<f64> = (0..size)
            .map(|j| (TAU * j as f64 / size as f64).sin())
            .collect();
        let mask = size - 1;

        let mut limit = harmonics.len().min(size / 2 - 1).max(1);
        let mut raw_levels = Vec::new();
        loop {
            let mut data = vec![0.0f64; size];
            for (h, &amp) in harmonics.iter().take(limit).enumerate() {
                if amp == 0.0 {
                    continue;
                }
                let h = h + 1;
                for (j, out) in data.iter_mut().enumerate() {
                    *out += amp as f64 * sine[(h * j) & mask];
                }
            }
            raw_levels.push((data, limit));

            if limit <= 1 {
                break;
            }
            limit /= 2;
        }

        let peak = raw_levels
            .first()
            .map(|(data, _)| data.iter().fold(0.0f64, |acc, &x| acc.max(x.abs())))
            .unwrap_or(1.0);
        let scale = if peak > 0.0 { 1.0 / peak } else { 1.0 };

        let levels = raw_levels
            .into_iter()
            .map(|(data, harmonics)| MipLevel {
                data: data.iter().map(|&x| (x * scale) as f32).collect(),
                harmonics,
            })
            .collect();

        Self { levels, size }
    }

    /// Pick the richest level that keeps every harmonic below Nyquist.
    pub fn select(&self, increment: f32) -> TableLevel<'_> {
        let inc = increment.abs().max(f32::MIN_POSITIVE);
        let allowed = (0.5 / inc).floor() as usize;
        let level = self
            .levels
            .iter()
            .find(|level| level.harmonics <= allowed)
            .or_else(|| self.levels.last());

        match level {
            Some(level) => TableLevel {
                data: &level.data,
                mask: self.size - 1,
            },
            None => TableLevel {
                data: &[0.0; 1],
                mask: 0,
            },
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }
}

/// A mono sample buffer with its own recording rate.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    data: Box<[f32]>,
    sample_rate: f32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, sample_rate: f32) -> Result<Self, PatchError> {
        if data.is_empty() {
            return Err(PatchError::InvalidSample("empty buffer"));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PatchError::InvalidSample("sample rate must be positive"));
        }
        if data.iter().any(|s| !s.is_finite()) {
            return Err(PatchError::InvalidSample("non-finite sample"));
        }
        Ok(Self {
            data: data.into_boxed_slice(),
            sample_rate,
        })
    }

    /// Linear-interpolated read; positions past the end are silent.
    #[inline]
    pub fn read(&self, position: f64) -> f32 {
        if !(position >= 0.0) {
            return 0.0;
        }
        let index = position as usize;
        let Some(&a) = self.data.get(index) else {
            return 0.0;
        };
        let b = self.data.get(index + 1).copied().unwrap_or(0.0);
        let frac = (position - index as f64) as f32;
        a + (b - a) * frac
    }

    /// Like `read`, but the sample after the last one in the loop is the
    /// loop start, so the seam interpolates smoothly.
    #[inline]
    pub fn read_looped(&self, position: f64, loop_start: f64, loop_end: f64) -> f32 {
        if !(position >= 0.0) {
            return 0.0;
        }
        let index = position as usize;
        let Some(&a) = self.data.get(index) else {
            return 0.0;
        };
        let mut next = index as f64 + 1.0;
        if next >= loop_end && loop_end > loop_start {
            next -= loop_end - loop_start;
        }
        let b = self.data.get(next as usize).copied().unwrap_or(0.0);
        let frac = (position - index as f64) as f32;
        a + (b - a) * frac
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_table_matches_sin() {
        let table = Wavetable::sine();
        let level = table.select(440.0 / 48_000.0);
        for i in 0..64 {
            let phase = i as f32 / 64.0;
            let expected = (std::f32::consts::TAU * phase).sin();
            assert!((level.read(phase) - expected).abs() < 1e-3);
        }
    }

    #[test]
    fn higher_pitches_select_fewer_harmonics() {
        let table = Wavetable::saw();
        assert!(table.level_count() > 5);

        let low = table.select(55.0 / 48_000.0);
        let high = table.select(8_000.0 / 48_000.0);
        // A full band saw rises almost everywhere; a few partials rise far less
        let rising = |level: &TableLevel| {
            (1..table.size())
                .filter(|&i| {
                    let p0 = (i - 1) as f32 / table.size() as f32;
                    let p1 = i as f32 / table.size() as f32;
                    (level.read(p1) - level.read(p0)) > 0.0
                })
                .count()
        };
        assert!(rising(&high) < rising(&low));
    }

    #[test]
    fn levels_are_normalized() {
        let table = Wavetable::square();
        let level = table.select(20.0 / 48_000.0);
        let peak = (0..table.size())
            .map(|i| level.read(i as f32 / table.size() as f32).abs())
            .fold(0.0f32, f32::max);
        assert!((peak - 1.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(Wavetable::from_harmonics(&[1.0], 1000).is_err());
        assert!(Wavetable::from_harmonics(&[], 1024).is_err());
        assert!(Wavetable::from_harmonics(&[0.0, 0.0], 1024).is_err());
        assert!(Wavetable::from_cycle(vec![0.0; 3]).is_err());
        assert!(Wavetable::from_cycle(vec![f32::NAN; 8]).is_err());
        assert!(Wavetable::from_cycle(vec![0.0, 1.0, 0.0, -1.0]).is_ok());
    }

    #[test]
    fn sample_buffer_interpolates_and_ends_silent() {
        let buffer = SampleBuffer::new(vec![0.0, 1.0, 0.0], 44_100.0).unwrap();
        assert!((buffer.read(0.5) - 0.5).abs() < 1e-6);
        assert!((buffer.read(1.25) - 0.75).abs() < 1e-6);
        assert_eq!(buffer.read(3.0), 0.0);
        assert_eq!(buffer.read(-1.0), 0.0);
        assert!(SampleBuffer::new(vec![], 44_100.0).is_err());
        assert!(SampleBuffer::new(vec![0.0], 0.0).is_err());
    }
}
