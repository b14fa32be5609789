#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
DAHDSR-style Envelope Implementation
====================================

This module implements the per-voice envelope generator: a small state
machine that produces a 0.0 - 1.0 level every sample. It drives voice
amplitude directly and doubles as a modulation source.

Vocabulary
----------

  level       The envelope's current value (0.0 to 1.0) before `amount`.

  output      level × amount. This is what the modulation matrix sees and,
              for amplitude envelopes, what multiplies the voice signal.

  stage       Which phase we're in: Idle, Delay, Attack, Decay, Sustain,
              Release.

  progress    elapsed / total samples of the current stage (0.0 to 1.0).
              Every ramp is computed from progress rather than accumulated
              increments, so each stage lands exactly on its target.


The Shape
---------

  Level
    1.0 ┐        ╱╲
        │       ╱  ╲___________
    S   │      ╱               ╲
        │     ╱                 ╲
    0.0 └────╱───────────────────╲──→ Time
        Delay Attack Decay Sustain Release

Attack can be LINEAR (straight ramp) or EXPONENTIAL, a concave RC-style
curve that rises fast and eases into the peak:

    curve(p) = (1 - e^(-5p)) / (1 - e^(-5))

Decay and release are linear ramps.


Retriggering
------------

A note-on while the envelope is still sounding does NOT snap back to zero.
The new attack starts from the current level and only covers the remaining
distance to 1.0, at the configured slope:

    attack_samples_remaining = attack_samples × (1 - level)

The delay stage holds whatever level the retrigger started from (0.0 when
coming from Idle). This keeps stolen or retriggered voices click-free.


State Machine
-------------

    Idle ──note_on──→ Delay ──→ Attack ──→ Decay ──→ Sustain
      ↑                 │          │         │          │
      │                 └──────────┴─note_off┴──────────┘
      │                                 ↓
      └──────────── level = 0 ──── Release

Zero-length stages complete immediately.
*/

/// Curve used for the attack ramp.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttackShape {
    #[default]
    Linear,
    Exponential,
}

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvelopeStage {
    #[default]
    Idle, // Inactive, level = 0
    Delay,   // Holding the start level before the attack
    Attack,  // Ramping up to 1.0
    Decay,   // Ramping down to sustain level
    Sustain, // Holding sustain level while the gate is high
    Release, // Gate went low, ramping down to 0
}

const EXP_ATTACK_CURVATURE: f32 = 5.0;

#[derive(Debug, Clone)]
pub struct Envelope {
    // Stage lengths in samples (set by `configure`)
    delay_samples: u32,
    attack_samples: u32,
    decay_samples: u32,
    release_samples: u32,
    sustain_level: f32,
    attack_shape: AttackShape,
    amount: f32,

    // Runtime state
    stage: EnvelopeStage,
    level: f32,
    stage_start: f32,
    stage_elapsed: u32,
    stage_total: u32,
}

#[inline]
fn seconds_to_samples(seconds: f32, sample_rate: f32) -> u32 {
    let samples = seconds * sample_rate;
    if samples.is_finite() && samples > 0.0 {
        samples.round().min(u32::MAX as f32) as u32
    } else {
        0
    }
}

#[inline]
fn exponential_curve(progress: f32) -> f32 {
    (1.0 - (-EXP_ATTACK_CURVATURE * progress).exp()) / (1.0 - (-EXP_ATTACK_CURVATURE).exp())
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self::adsr(sample_rate, 0.01, 0.1, 0.7, 0.3)
    }

    pub fn adsr(sample_rate: f32, attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        let mut env = Self {
            delay_samples: 0,
            attack_samples: 0,
            decay_samples: 0,
            release_samples: 0,
            sustain_level: 0.0,
            attack_shape: AttackShape::Linear,
            amount: 1.0,

            stage: EnvelopeStage::Idle,
            level: 0.0,
            stage_start: 0.0,
            stage_elapsed: 0,
            stage_total: 0,
        };
        env.configure(
            sample_rate,
            EnvelopeTimes {
                delay: 0.0,
                attack,
                decay,
                sustain,
                release,
            },
            AttackShape::Linear,
            1.0,
        );
        env
    }

    pub fn with_delay(mut self, sample_rate: f32, delay: f32) -> Self {
        self.delay_samples = seconds_to_samples(delay, sample_rate);
        self
    }

    pub fn with_attack_shape(mut self, shape: AttackShape) -> Self {
        self.attack_shape = shape;
        self
    }

    pub fn with_amount(mut self, amount: f32) -> Self {
        self.amount = amount.clamp(-1.0, 1.0);
        self
    }

    /// Replace the stage times without touching the runtime state.
    pub fn configure(
        &mut self,
        sample_rate: f32,
        times: EnvelopeTimes,
        attack_shape: AttackShape,
        amount: f32,
    ) {
        self.delay_samples = seconds_to_samples(times.delay, sample_rate);
        self.attack_samples = seconds_to_samples(times.attack, sample_rate);
        self.decay_samples = seconds_to_samples(times.decay, sample_rate);
        self.release_samples = seconds_to_samples(times.release, sample_rate);
        self.sustain_level = times.sustain.clamp(0.0, 1.0);
        self.attack_shape = attack_shape;
        self.amount = amount.clamp(-1.0, 1.0);
    }

    /// Gate high. Starts from the current level when already sounding.
    pub fn note_on(&mut self) {
        let start = if self.stage == EnvelopeStage::Idle {
            0.0
        } else {
            self.level
        };
        self.level = start;

        if self.delay_samples > 0 {
            self.enter(EnvelopeStage::Delay, start, self.delay_samples);
        } else {
            self.enter_attack();
        }
    }

    /// Gate low: start the release phase from the current level.
    pub fn note_off(&mut self) {
        if self.stage == EnvelopeStage::Idle {
            return;
        }
        self.enter_release();
    }

    fn enter(&mut self, stage: EnvelopeStage, start: f32, total: u32) {
        self.stage = stage;
        self.stage_start = start;
        self.stage_elapsed = 0;
        self.stage_total = total;
    }

    fn enter_attack(&mut self) {
        let remaining = (1.0 - self.level).clamp(0.0, 1.0);
        let total = (self.attack_samples as f32 * remaining).ceil() as u32;
        if total == 0 {
            self.level = 1.0;
            self.enter_decay();
        } else {
            self.enter(EnvelopeStage::Attack, self.level, total);
        }
    }

    fn enter_decay(&mut self) {
        if self.decay_samples == 0 {
            self.level = self.sustain_level;
            self.enter(EnvelopeStage::Sustain, self.sustain_level, 0);
        } else {
            self.enter(EnvelopeStage::Decay, self.level, self.decay_samples);
        }
    }

    fn enter_release(&mut self) {
        if self.release_samples == 0 {
            self.level = 0.0;
            self.enter(EnvelopeStage::Idle, 0.0, 0);
        } else {
            self.enter(EnvelopeStage::Release, self.level, self.release_samples);
        }
    }

    #[inline]
    fn step_progress(&mut self) -> f32 {
        self.stage_elapsed = self.stage_elapsed.saturating_add(1);
        self.stage_elapsed as f32 / self.stage_total.max(1) as f32
    }

    #[inline]
    fn stage_done(&self) -> bool {
        self.stage_elapsed >= self.stage_total
    }

    /// Advance the envelope by one sample and return its output.
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => {
                self.level = 0.0;
            }

            EnvelopeStage::Delay => {
                self.level = self.stage_start;
                self.step_progress();
                if self.stage_done() {
                    self.enter_attack();
                }
            }

            EnvelopeStage::Attack => {
                let progress = self.step_progress();
                let shaped = match self.attack_shape {
                    AttackShape::Linear => progress,
                    AttackShape::Exponential => exponential_curve(progress),
                };
                self.level = self.stage_start + (1.0 - self.stage_start) * shaped;

                if self.stage_done() {
                    self.level = 1.0;
                    self.enter_decay();
                }
            }

            EnvelopeStage::Decay => {
                let progress = self.step_progress();
                self.level = self.stage_start + (self.sustain_level - self.stage_start) * progress;

                if self.stage_done() {
                    self.level = self.sustain_level;
                    self.enter(EnvelopeStage::Sustain, self.sustain_level, 0);
                }
            }

            EnvelopeStage::Sustain => {
                self.level = self.sustain_level;
            }

            EnvelopeStage::Release => {
                let progress = self.step_progress();
                self.level = (self.stage_start * (1.0 - progress)).max(0.0);

                if self.stage_done() {
                    self.level = 0.0;
                    self.enter(EnvelopeStage::Idle, 0.0, 0);
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.output()
    }

    /// Render a block of envelope outputs into the buffer.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    /// Returns true if the envelope is producing output (not idle).
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    /// Force the envelope to idle without a release.
    pub fn reset(&mut self) {
        self.level = 0.0;
        self.enter(EnvelopeStage::Idle, 0.0, 0);
    }

    /// Current level (0.0 to 1.0), before `amount`.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Current level scaled by `amount`.
    pub fn output(&self) -> f32 {
        self.level * self.amount
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn sustain_level(&self) -> f32 {
        self.sustain_level
    }

    pub fn amount(&self) -> f32 {
        self.amount
    }
}

/// Stage durations in seconds plus the sustain level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeTimes {
    pub delay: f32,
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}
