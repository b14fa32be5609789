//! Route curves and order-independent accumulation.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Parameter Modulation
====================

A modulation route takes a source value (an envelope, an LFO, the mod
wheel...), shapes it, scales it, and adds it to a parameter:

    contribution = curve(source) × amount × depth

  amount    Per-route knob in [-1, 1]. Negative inverts the route.
  depth     Per-target units for a full-scale route (24 semitones for
            pitch, 8 octaves for cutoff...). Lives with the target so the
            same amount means "the same much" everywhere.
  curve     Reshapes the source before scaling.


Curves
------

LINEAR
    curve(x) = x

EXPONENTIAL
    curve(x) = sign(x) × (e^(4|x|) - 1) / (e^4 - 1)

    Most of the travel happens near the top. Good for cutoff sweeps from a
    velocity or mod wheel that should feel gentle at first.

         1 |              .
           |            .
           |         .
           |    . '
         0 +'------------- x
           0              1

STEPPED(n)
    curve(x) = round(x × n) / n

    Quantizes into n steps per unit. An LFO into pitch with n = 12 and a
    one-octave depth walks semitones.

Inputs are clamped to [-1, 1] before shaping, so every curve maps
[-1, 1] → [-1, 1].


Summing Routes
--------------

Several routes can hit the same target. Float addition is not associative,
so summing them in route order would make the result depend on the order
the patch lists them in. We sum in f64 with Neumaier compensation, which
carries the low-order bits lost by each addition in a second accumulator:

    t = sum + x
    if |sum| >= |x|:  c += (sum - t) + x
    else:             c += (x - t) + sum
    sum = t

and round to f32 once at the end. For the handful of routes per target the
result is identical whatever the order.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModCurve {
    #[default]
    Linear,
    Exponential,
    /// Quantize to `steps` per unit (at least 1).
    Stepped { steps: u8 },
}

impl ModCurve {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        let x = if x.is_finite() { x.clamp(-1.0, 1.0) } else { 0.0 };
        match self {
            ModCurve::Linear => x,
            ModCurve::Exponential => {
                const NORM: f32 = 53.598_15; // e^4 - 1
                x.signum() * ((4.0 * x.abs()).exp() - 1.0) / NORM
            }
            ModCurve::Stepped { steps } => {
                let n = steps.max(1) as f32;
                (x * n).round() / n
            }
        }
    }
}

/// Neumaier compensated sum in `f64`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompensatedSum {
    sum: f64,
    compensation: f64,
}

impl CompensatedSum {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, value: f64) {
        let t = self.sum + value;
        if self.sum.abs() >= value.abs() {
            self.compensation += (self.sum - t) + value;
        } else {
            self.compensation += (value - t) + self.sum;
        }
        self.sum = t;
    }

    #[inline]
    pub fn total(&self) -> f64 {
        self.sum + self.compensation
    }
}
