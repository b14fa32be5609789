use arrayvec::ArrayVec;

use crate::{
    dsp::{
        envelope::{Envelope, EnvelopeStage, EnvelopeTimes},
        filter::{FilterCoefficients, SVFilter},
        lfo::Lfo,
    },
    modulation::{
        envelope_slot, lfo_slot, ModSourceId, SourceValues, TargetValues, NOTE_NUMBER_SLOT,
        VELOCITY_SLOT,
    },
    patch::CompiledPatch,
    synth::bank::OscillatorBank,
    MAX_ENVELOPES, MAX_LFOS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Idle, // Available for allocation
    Active,    // Gate high
    Releasing, // Gate low, gating envelopes still ringing
}

/// One slot of the voice pool.
///
/// Everything a voice needs is sized at construction; `configure` and
/// `start` only overwrite fields.
#[derive(Debug, Clone)]
pub struct Voice {
    id: usize,
    note: u8,
    velocity: u8,
    state: VoiceState,
    age: u64,
    sample_rate: f32,
    bank: OscillatorBank,
    envelopes: ArrayVec<Envelope, MAX_ENVELOPES>,
    gates: [bool; MAX_ENVELOPES],
    lfos: ArrayVec<Lfo, MAX_LFOS>,
    filters: [SVFilter; 2],
    targets: TargetValues,
}

impl Voice {
    pub fn new(id: usize, sample_rate: f32) -> Self {
        Self {
            id,
            note: 0,
            velocity: 0,
            state: VoiceState::Idle,
            age: 0,
            sample_rate,
            bank: OscillatorBank::new(),
            envelopes: ArrayVec::new(),
            gates: [false; MAX_ENVELOPES],
            lfos: ArrayVec::new(),
            filters: [SVFilter::lowpass(), SVFilter::lowpass()],
            targets: TargetValues::default(),
        }
    }

    /// Adopt a patch's layout. Silences the voice.
    pub fn configure(&mut self, patch: &CompiledPatch) {
        let descriptor = patch.patch();
        self.bank.configure(patch);

        self.envelopes.clear();
        self.gates = [false; MAX_ENVELOPES];
        for (i, env) in descriptor.envelopes.iter().take(MAX_ENVELOPES).enumerate() {
            let mut envelope = Envelope::new(self.sample_rate);
            envelope.configure(
                self.sample_rate,
                EnvelopeTimes {
                    delay: env.delay,
                    attack: env.attack,
                    decay: env.decay,
                    sustain: env.sustain,
                    release: env.release,
                },
                env.attack_shape,
                env.amount,
            );
            self.envelopes.push(envelope);
            self.gates[i] = env.gates_amplitude;
        }

        self.lfos.clear();
        for (i, lfo) in descriptor.lfos.iter().take(MAX_LFOS).enumerate() {
            let mut runtime = Lfo::new(lfo.waveform, lfo.rate_hz, lfo.key_sync);
            // Distinct sample & hold streams per voice and per LFO
            runtime.seed((self.id as u32 + 1).wrapping_mul(0x9E37_79B9) ^ (i as u32 + 1));
            self.lfos.push(runtime);
        }

        for filter in &mut self.filters {
            filter.set_type(descriptor.filter.filter_type);
        }
        self.kill();
    }

    /// Note start. A voice that is still sounding retriggers from its
    /// current level; an idle one starts clean.
    pub fn start(&mut self, note: u8, velocity: u8, age: u64) {
        if self.state == VoiceState::Idle {
            self.bank.reset();
            for filter in &mut self.filters {
                filter.reset();
            }
        }

        self.note = note;
        self.velocity = velocity;
        self.age = age;
        self.state = VoiceState::Active;

        for envelope in &mut self.envelopes {
            envelope.note_on();
        }
        for lfo in &mut self.lfos {
            lfo.note_on();
        }
    }

    /// Change pitch and velocity without touching envelopes (legato).
    pub fn retune(&mut self, note: u8, velocity: u8) {
        self.note = note;
        self.velocity = velocity;
    }

    pub fn release(&mut self) {
        if self.state == VoiceState::Active {
            self.state = VoiceState::Releasing;
            for envelope in &mut self.envelopes {
                envelope.note_off();
            }
        }
    }

    /// Immediate silence, no release.
    pub fn kill(&mut self) {
        self.state = VoiceState::Idle;
        self.note = 0;
        self.velocity = 0;
        for envelope in &mut self.envelopes {
            envelope.reset();
        }
        for filter in &mut self.filters {
            filter.reset();
        }
    }

    /// Render and add this voice into `left`/`right`.
    ///
    /// `sources` carries the engine's global source values; the voice
    /// overwrites its own per-voice slots before evaluating the matrix.
    pub fn render(
        &mut self,
        patch: &CompiledPatch,
        sources: &mut SourceValues,
        amounts: &[f32],
        left: &mut [f32],
        right: &mut [f32],
    ) {
        if self.state == VoiceState::Idle {
            return;
        }

        for (i, envelope) in self.envelopes.iter().enumerate() {
            sources.set_slot(envelope_slot(i), envelope.output());
        }
        for (i, lfo) in self.lfos.iter().enumerate() {
            sources.set_slot(lfo_slot(i), lfo.value());
        }
        sources.set_slot(VELOCITY_SLOT, self.velocity as f32 / 127.0);
        sources.set_slot(NOTE_NUMBER_SLOT, self.note as f32 / 127.0);

        patch.matrix().evaluate(amounts, sources, &mut self.targets);

        let bend = sources.get(ModSourceId::PitchBend) * patch.pitch_bend_range();
        let waves = self.bank.prepare(
            patch,
            self.note as f32,
            bend,
            &self.targets,
            self.sample_rate,
        );

        let filter = patch.patch().filter;
        let coeffs = FilterCoefficients::new(
            filter.cutoff_hz * self.targets.cutoff_octaves().exp2(),
            filter.resonance + self.targets.resonance(),
            filter.drive + self.targets.drive(),
            self.sample_rate,
        );
        let gain = (patch.gain() + self.targets.gain()).clamp(0.0, 1.0);

        let [filter_l, filter_r] = &mut self.filters;
        for (out_l, out_r) in left.iter_mut().zip(right.iter_mut()) {
            let (l, r) = self.bank.next_frame(&waves);

            let mut amp = gain;
            for (envelope, &gates) in self.envelopes.iter_mut().zip(&self.gates) {
                let level = envelope.next_sample();
                if gates {
                    amp *= level;
                }
            }

            *out_l += filter_l.process(l, &coeffs) * amp;
            *out_r += filter_r.process(r, &coeffs) * amp;
        }
        filter_l.sanitize();
        filter_r.sanitize();

        let frames = left.len().min(right.len());
        for lfo in &mut self.lfos {
            lfo.advance(frames, self.sample_rate);
        }

        if self.gating_envelopes_idle() {
            self.state = VoiceState::Idle;
        }
    }

    fn gating_envelopes_idle(&self) -> bool {
        self.envelopes
            .iter()
            .zip(&self.gates)
            .filter(|(_, &gates)| gates)
            .all(|(envelope, _)| !envelope.is_active())
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Idle
    }

    /// Active or releasing.
    pub fn is_sounding(&self) -> bool {
        matches!(self.state, VoiceState::Active | VoiceState::Releasing)
    }

    /// Combined level of the gating envelopes, used to pick steal victims.
    pub fn amplitude_level(&self) -> f32 {
        self.envelopes
            .iter()
            .zip(&self.gates)
            .filter(|(_, &gates)| gates)
            .map(|(envelope, _)| envelope.output().abs())
            .product()
    }

    /// Stage of the first gating envelope.
    pub fn amplitude_stage(&self) -> EnvelopeStage {
        self.envelopes
            .iter()
            .zip(&self.gates)
            .find(|(_, &gates)| gates)
            .map_or(EnvelopeStage::Idle, |(envelope, _)| envelope.stage())
    }

    /// Phase (or sample position) of each oscillator.
    pub fn oscillator_phases(&self) -> impl Iterator<Item = f64> + '_ {
        self.bank.phases()
    }
}
