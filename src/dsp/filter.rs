use std::f32::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
| type              | constructed by       | passes          | rejects      |
| ----------------- | -------------------- | --------------- | ------------ |
| low-pass          | LPF                  | below cutoff    | above cutoff |
| high-pass         | HPF                  | above cutoff    | below cutoff |
| band-pass         | LPF ∘ HPF (series)   | between cutoffs | outside      |
| notch / band-stop | LPF + HPF (parallel) | outside         | between      |

Stability
---------

The topology-preserving SVF stays stable for any g > 0 and k > 0, so
instead of trusting the modulated inputs we clamp the coefficients
themselves:

  cutoff     [10 Hz, 0.49 × sample_rate]   → g = tan(π fc / fs) ≤ tan(0.49π)
  resonance  [0, 1]                        → k = 2 - 2r, floored at 0.02

k = 0 would be a lossless resonator (self-oscillation). The floor keeps the
peak gain at roughly 1/k = 50 so the output can ring but never diverge.

Drive blends in a tanh stage before the filter:

  x' = x × (1 - drive) + tanh(x × (1 + 9 × drive)) × drive

which is exactly the dry signal at drive = 0 and bounded at drive = 1.
*/

pub const MIN_CUTOFF_HZ: f32 = 10.0;
pub const MAX_CUTOFF_RATIO: f32 = 0.49;
pub const MAX_RESONANCE: f32 = 1.0;
const MIN_DAMPING: f32 = 0.02;
const MAX_DRIVE_GAIN: f32 = 9.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    #[default]
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

/// Clamp a (possibly modulated) cutoff into `(0, Nyquist)`.
#[inline]
pub fn clamp_cutoff(cutoff_hz: f32, sample_rate: f32) -> f32 {
    let max = sample_rate * MAX_CUTOFF_RATIO;
    if cutoff_hz.is_nan() {
        return max;
    }
    cutoff_hz.clamp(MIN_CUTOFF_HZ, max)
}

/// Coefficients shared by every channel of a voice for one block.
#[derive(Debug, Clone, Copy)]
pub struct FilterCoefficients {
    g: f32,
    k: f32,
    h: f32,
    drive: f32,
    drive_gain: f32,
}

impl FilterCoefficients {
    pub fn new(cutoff_hz: f32, resonance: f32, drive: f32, sample_rate: f32) -> Self {
        let cutoff = clamp_cutoff(cutoff_hz, sample_rate);
        let resonance = if resonance.is_finite() {
            resonance.clamp(0.0, MAX_RESONANCE)
        } else {
            0.0
        };
        let drive = if drive.is_finite() {
            drive.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let g = (PI * cutoff / sample_rate).tan();
        let k = (2.0 - 2.0 * resonance).max(MIN_DAMPING);

        Self {
            g,
            k,
            h: 1.0 / (1.0 + g * (g + k)),
            drive,
            drive_gain: 1.0 + MAX_DRIVE_GAIN * drive,
        }
    }

    pub fn g(&self) -> f32 {
        self.g
    }

    pub fn k(&self) -> f32 {
        self.k
    }

    #[inline]
    fn saturate(&self, sample: f32) -> f32 {
        if self.drive <= 0.0 {
            return sample;
        }
        sample * (1.0 - self.drive) + (sample * self.drive_gain).tanh() * self.drive
    }
}

#[derive(Debug, Clone)]
pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory
    filter_type: FilterType,
}

impl SVFilter {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            filter_type,
        }
    }

    pub fn lowpass() -> Self {
        Self::new(FilterType::LowPass)
    }

    pub fn highpass() -> Self {
        Self::new(FilterType::HighPass)
    }

    pub fn bandpass() -> Self {
        Self::new(FilterType::BandPass)
    }

    pub fn notch() -> Self {
        Self::new(FilterType::Notch)
    }

    pub fn next_sample(&mut self, sample: f32, coeffs: &FilterCoefficients) -> FilterOutputs {
        let FilterCoefficients { g, k, h, .. } = *coeffs;
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    /// Drive, filter and select the configured response for one sample.
    #[inline]
    pub fn process(&mut self, sample: f32, coeffs: &FilterCoefficients) -> f32 {
        let outputs = self.next_sample(coeffs.saturate(sample), coeffs);
        match self.filter_type {
            FilterType::LowPass => outputs.lowpass,
            FilterType::HighPass => outputs.highpass,
            FilterType::BandPass => outputs.bandpass,
            FilterType::Notch => outputs.notch,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32], coeffs: &FilterCoefficients) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample, coeffs);
        }
        self.sanitize();
    }

    /// Reset the integrators if denormal or non-finite input poisoned them.
    pub fn sanitize(&mut self) {
        if !self.ic1eq.is_finite() || !self.ic2eq.is_finite() {
            self.reset();
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    pub fn set_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }
}
