use std::ops::RangeInclusive;

use arrayvec::ArrayVec;

use super::{CcMapping, OscillatorKind, Patch, VoiceMode, MAX_PITCH_BEND_RANGE};
use crate::{
    dsp::{
        filter::MIN_CUTOFF_HZ,
        lfo::{MAX_LFO_RATE_HZ, MIN_LFO_RATE_HZ},
        modulate::ModCurve,
        wavetable::{SampleBuffer, SampleHandle, TableHandle, Wavetable},
    },
    modulation::{ModMatrix, ModSourceId, ModTargetId},
    PatchError, MAX_ENVELOPES, MAX_LFOS, MAX_OSCILLATORS, MAX_ROUTES, MAX_VOICES,
};

const MAX_CUTOFF_HZ: f32 = 24_000.0;
const MAX_TUNING_SEMITONES: f32 = 48.0;
const MAX_MOD_INDEX: f32 = 16.0;

/// A patch that passed validation, with its routes resolved.
///
/// This is what crosses to the audio path. Everything a voice looks up per
/// block is either a field here or an index into one.
#[derive(Debug, Clone)]
pub struct CompiledPatch {
    patch: Patch,
    matrix: ModMatrix,
    amounts: ArrayVec<f32, MAX_ROUTES>,
}

impl CompiledPatch {
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    pub fn name(&self) -> &str {
        &self.patch.name
    }

    pub fn matrix(&self) -> &ModMatrix {
        &self.matrix
    }

    /// Route amounts as written in the patch; the engine copies these into
    /// its live amount table when the patch is adopted.
    pub fn default_amounts(&self) -> &[f32] {
        &self.amounts
    }

    pub fn wavetable(&self, handle: TableHandle) -> Option<&Wavetable> {
        self.patch
            .wavetables
            .get(handle.0 as usize)
            .map(|table| table.as_ref())
    }

    pub fn sample(&self, handle: SampleHandle) -> Option<&SampleBuffer> {
        self.patch
            .samples
            .get(handle.0 as usize)
            .map(|sample| sample.as_ref())
    }

    pub fn voice_mode(&self) -> VoiceMode {
        self.patch.voice_mode
    }

    pub fn pitch_bend_range(&self) -> f32 {
        self.patch.pitch_bend_range
    }

    pub fn gain(&self) -> f32 {
        self.patch.gain
    }

    pub fn cc_mappings(&self) -> &[CcMapping] {
        &self.patch.cc_map
    }
}

fn check_range(
    parameter: impl FnOnce() -> String,
    value: f32,
    range: RangeInclusive<f32>,
) -> Result<(), PatchError> {
    if value.is_finite() && range.contains(&value) {
        Ok(())
    } else {
        Err(PatchError::OutOfRange {
            parameter: parameter(),
            value,
        })
    }
}

fn check_count(what: &'static str, count: usize, max: usize) -> Result<(), PatchError> {
    if count > max {
        Err(PatchError::TooMany { what, count, max })
    } else {
        Ok(())
    }
}

impl Patch {
    /// Validate everything and resolve the routes.
    ///
    /// Any failure rejects the whole patch; nothing partial is returned.
    pub fn compile(self) -> Result<CompiledPatch, PatchError> {
        self.validate_limits()?;
        self.validate_oscillators()?;
        self.validate_envelopes()?;
        self.validate_globals()?;
        self.validate_routes()?;

        let matrix = ModMatrix::resolve(&self.routes)?;
        let amounts = self.routes.iter().map(|route| route.amount).collect();

        Ok(CompiledPatch {
            patch: self,
            matrix,
            amounts,
        })
    }

    fn validate_limits(&self) -> Result<(), PatchError> {
        check_count("oscillators", self.oscillators.len(), MAX_OSCILLATORS)?;
        check_count("envelopes", self.envelopes.len(), MAX_ENVELOPES)?;
        check_count("lfos", self.lfos.len(), MAX_LFOS)?;
        check_count("routes", self.routes.len(), MAX_ROUTES)?;
        if let VoiceMode::Poly { voices } = self.voice_mode {
            if voices == 0 || voices > MAX_VOICES {
                return Err(PatchError::OutOfRange {
                    parameter: "voice_mode.voices".into(),
                    value: voices as f32,
                });
            }
        }
        Ok(())
    }

    fn validate_oscillators(&self) -> Result<(), PatchError> {
        for (i, osc) in self.oscillators.iter().enumerate() {
            check_range(|| format!("oscillator {i} level"), osc.level, 0.0..=1.0)?;
            check_range(|| format!("oscillator {i} pan"), osc.pan, -1.0..=1.0)?;
            check_range(
                || format!("oscillator {i} semitones"),
                osc.semitones,
                -MAX_TUNING_SEMITONES..=MAX_TUNING_SEMITONES,
            )?;
            check_range(|| format!("oscillator {i} cents"), osc.cents, -100.0..=100.0)?;

            match osc.kind {
                OscillatorKind::Wavetable { table } => self.check_table(i, table)?,
                OscillatorKind::Fm {
                    table,
                    modulator,
                    index,
                }
                | OscillatorKind::Pm {
                    table,
                    modulator,
                    index,
                } => {
                    self.check_table(i, table)?;
                    if modulator >= i {
                        return Err(PatchError::InvalidModulator {
                            oscillator: i,
                            modulator,
                        });
                    }
                    check_range(
                        || format!("oscillator {i} modulation index"),
                        index,
                        0.0..=MAX_MOD_INDEX,
                    )?;
                }
                OscillatorKind::Sample {
                    sample,
                    root_note,
                    start,
                    loop_points,
                } => {
                    let buffer = self
                        .samples
                        .get(sample.0 as usize)
                        .ok_or(PatchError::UnknownSample {
                            oscillator: i,
                            handle: sample,
                        })?;
                    if root_note > 127 {
                        return Err(PatchError::OutOfRange {
                            parameter: format!("oscillator {i} root note"),
                            value: root_note as f32,
                        });
                    }
                    if start >= buffer.len() {
                        return Err(PatchError::InvalidLoop { oscillator: i });
                    }
                    if let Some(points) = loop_points {
                        if points.start >= points.end || points.end > buffer.len() {
                            return Err(PatchError::InvalidLoop { oscillator: i });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_table(&self, oscillator: usize, handle: TableHandle) -> Result<(), PatchError> {
        if (handle.0 as usize) < self.wavetables.len() {
            Ok(())
        } else {
            Err(PatchError::UnknownWavetable { oscillator, handle })
        }
    }

    fn validate_envelopes(&self) -> Result<(), PatchError> {
        for (i, env) in self.envelopes.iter().enumerate() {
            let name = &env.name;
            for (stage, value) in [
                ("delay", env.delay),
                ("attack", env.attack),
                ("decay", env.decay),
                ("release", env.release),
            ] {
                check_range(
                    || format!("envelope {i} ({name}) {stage}"),
                    value,
                    0.0..=f32::MAX,
                )?;
            }
            check_range(
                || format!("envelope {i} ({name}) sustain"),
                env.sustain,
                0.0..=1.0,
            )?;
            check_range(
                || format!("envelope {i} ({name}) amount"),
                env.amount,
                -1.0..=1.0,
            )?;
        }
        if !self.envelopes.iter().any(|env| env.gates_amplitude) {
            return Err(PatchError::NoAmplitudeEnvelope);
        }

        for (i, lfo) in self.lfos.iter().enumerate() {
            check_range(
                || format!("lfo {i} rate"),
                lfo.rate_hz,
                MIN_LFO_RATE_HZ..=MAX_LFO_RATE_HZ,
            )?;
        }
        Ok(())
    }

    fn validate_globals(&self) -> Result<(), PatchError> {
        check_range(
            || "filter cutoff".into(),
            self.filter.cutoff_hz,
            MIN_CUTOFF_HZ..=MAX_CUTOFF_HZ,
        )?;
        check_range(|| "filter resonance".into(), self.filter.resonance, 0.0..=1.0)?;
        check_range(|| "filter drive".into(), self.filter.drive, 0.0..=1.0)?;
        check_range(|| "gain".into(), self.gain, 0.0..=1.0)?;
        check_range(
            || "pitch bend range".into(),
            self.pitch_bend_range,
            0.0..=MAX_PITCH_BEND_RANGE,
        )?;

        for mapping in &self.cc_map {
            if mapping.controller > 127
                || !mapping.source.is_global()
                || mapping.source.index().is_none()
            {
                return Err(PatchError::InvalidCcMapping {
                    controller: mapping.controller,
                });
            }
        }
        Ok(())
    }

    fn validate_routes(&self) -> Result<(), PatchError> {
        for (route_index, route) in self.routes.iter().enumerate() {
            if !(route.amount.is_finite() && (-1.0..=1.0).contains(&route.amount)) {
                return Err(PatchError::RouteAmountOutOfRange {
                    route: route_index,
                    amount: route.amount,
                });
            }
            if let ModCurve::Stepped { steps: 0 } = route.curve {
                return Err(PatchError::OutOfRange {
                    parameter: format!("route {route_index} steps"),
                    value: 0.0,
                });
            }

            let source_exists = match route.source {
                ModSourceId::Envelope(n) => (n as usize) < self.envelopes.len(),
                ModSourceId::Lfo(n) => (n as usize) < self.lfos.len(),
                other => other.index().is_some(),
            };
            if !source_exists {
                return Err(PatchError::UnresolvedSource {
                    route: route_index,
                    source: route.source,
                });
            }

            let target_exists = match (route.target, route.target.oscillator()) {
                (ModTargetId::OscModIndex(_), Some(n)) => self
                    .oscillators
                    .get(n)
                    .is_some_and(|osc| osc.has_mod_index()),
                (_, Some(n)) => n < self.oscillators.len(),
                (_, None) => true,
            };
            if !target_exists {
                return Err(PatchError::UnresolvedTarget {
                    route: route_index,
                    target: route.target,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modulation::ModRoute,
        patch::{EnvelopeDescriptor, LfoDescriptor, OscillatorDescriptor},
        dsp::lfo::LfoWaveform,
    };

    fn base() -> (Patch, TableHandle) {
        let mut patch = Patch::new("test");
        let table = patch.add_wavetable(Wavetable::sine());
        (patch, table)
    }

    #[test]
    fn default_patch_compiles() {
        let (patch, table) = base();
        let compiled = patch
            .with_oscillator(OscillatorDescriptor::wavetable(table))
            .with_route(ModRoute::new(
                ModSourceId::Envelope(0),
                ModTargetId::FilterCutoff,
                0.5,
            ))
            .compile()
            .unwrap();

        assert_eq!(compiled.matrix().len(), 1);
        assert_eq!(compiled.default_amounts(), &[0.5]);
        assert!(compiled.wavetable(table).is_some());
        assert!(compiled.wavetable(TableHandle(7)).is_none());
    }

    #[test]
    fn rejects_out_of_range_amount() {
        let (patch, _) = base();
        let err = patch
            .with_route(ModRoute::new(ModSourceId::Velocity, ModTargetId::OutputGain, 1.5))
            .compile()
            .unwrap_err();
        assert_eq!(
            err,
            PatchError::RouteAmountOutOfRange {
                route: 0,
                amount: 1.5
            }
        );
    }

    #[test]
    fn rejects_routes_to_missing_parameters() {
        let (patch, table) = base();
        let patch = patch.with_oscillator(OscillatorDescriptor::wavetable(table));

        let missing_osc = patch
            .clone()
            .with_route(ModRoute::new(ModSourceId::Velocity, ModTargetId::OscLevel(1), 0.5))
            .compile();
        assert!(matches!(missing_osc, Err(PatchError::UnresolvedTarget { .. })));

        let index_on_wavetable = patch
            .clone()
            .with_route(ModRoute::new(ModSourceId::Velocity, ModTargetId::OscModIndex(0), 0.5))
            .compile();
        assert!(matches!(index_on_wavetable, Err(PatchError::UnresolvedTarget { .. })));

        let missing_lfo = patch
            .clone()
            .with_route(ModRoute::new(ModSourceId::Lfo(0), ModTargetId::FilterCutoff, 0.5))
            .compile();
        assert!(matches!(missing_lfo, Err(PatchError::UnresolvedSource { .. })));

        let with_lfo = patch
            .with_lfo(LfoDescriptor::new(LfoWaveform::Triangle, 3.0))
            .with_route(ModRoute::new(ModSourceId::Lfo(0), ModTargetId::FilterCutoff, 0.5))
            .compile();
        assert!(with_lfo.is_ok());
    }

    #[test]
    fn modulators_must_come_first() {
        let (patch, table) = base();
        let self_modulating = patch
            .clone()
            .with_oscillator(OscillatorDescriptor::fm(table, 0, 1.0))
            .compile();
        assert_eq!(
            self_modulating.unwrap_err(),
            PatchError::InvalidModulator {
                oscillator: 0,
                modulator: 0
            }
        );

        let stacked = patch
            .with_oscillator(OscillatorDescriptor::wavetable(table))
            .with_oscillator(OscillatorDescriptor::pm(table, 0, 2.0))
            .with_route(ModRoute::new(ModSourceId::ModWheel, ModTargetId::OscModIndex(1), 1.0))
            .compile();
        assert!(stacked.is_ok());
    }

    #[test]
    fn requires_an_amplitude_envelope() {
        let (mut patch, _) = base();
        patch.envelopes[0].gates_amplitude = false;
        assert_eq!(patch.compile().unwrap_err(), PatchError::NoAmplitudeEnvelope);
    }

    #[test]
    fn rejects_bad_static_parameters() {
        let (patch, _) = base();
        assert!(patch
            .clone()
            .with_envelope(EnvelopeDescriptor::adsr("neg", -0.1, 0.1, 0.5, 0.1))
            .compile()
            .is_err());
        assert!(patch
            .clone()
            .with_envelope(EnvelopeDescriptor::adsr("sus", 0.1, 0.1, 1.5, 0.1))
            .compile()
            .is_err());
        assert!(patch.clone().with_gain(f32::NAN).compile().is_err());
        assert!(patch.clone().with_pitch_bend_range(60.0).compile().is_err());
        assert!(patch
            .clone()
            .with_voice_mode(VoiceMode::Poly { voices: 0 })
            .compile()
            .is_err());
        assert_eq!(
            patch
                .with_cc_mapping(74, ModSourceId::Velocity)
                .compile()
                .unwrap_err(),
            PatchError::InvalidCcMapping { controller: 74 }
        );
    }

    #[test]
    fn sample_loops_are_checked() {
        let mut patch = Patch::new("sample");
        let sample = patch.add_sample(SampleBuffer::new(vec![0.0; 100], 44_100.0).unwrap());

        let ok = patch
            .clone()
            .with_oscillator(OscillatorDescriptor::sample(sample, 60).with_loop(10, 100))
            .compile();
        assert!(ok.is_ok());

        let backwards = patch
            .clone()
            .with_oscillator(OscillatorDescriptor::sample(sample, 60).with_loop(50, 10))
            .compile();
        assert_eq!(backwards.unwrap_err(), PatchError::InvalidLoop { oscillator: 0 });

        let missing = patch
            .with_oscillator(OscillatorDescriptor::sample(SampleHandle(3), 60))
            .compile();
        assert!(matches!(missing, Err(PatchError::UnknownSample { .. })));
    }

    #[test]
    fn limits_are_enforced() {
        let (mut patch, table) = base();
        for _ in 0..=MAX_OSCILLATORS {
            patch.oscillators.push(OscillatorDescriptor::wavetable(table));
        }
        assert!(matches!(
            patch.compile(),
            Err(PatchError::TooMany {
                what: "oscillators",
                ..
            })
        ));
    }
}
