use crate::{
    dsp::wavetable::{SampleHandle, TableHandle},
    modulation::{ModSourceId, ModTargetId},
};

/// Reasons a patch is rejected at load time.
///
/// Every variant is detected before the patch reaches the audio path. A
/// rejected patch is never published, so whatever was playing keeps playing.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchError {
    TooMany {
        what: &'static str,
        count: usize,
        max: usize,
    },
    OutOfRange {
        parameter: String,
        value: f32,
    },
    RouteAmountOutOfRange {
        route: usize,
        amount: f32,
    },
    UnresolvedSource {
        route: usize,
        source: ModSourceId,
    },
    UnresolvedTarget {
        route: usize,
        target: ModTargetId,
    },
    /// FM/PM modulators must come earlier in the oscillator list.
    InvalidModulator {
        oscillator: usize,
        modulator: usize,
    },
    UnknownWavetable {
        oscillator: usize,
        handle: TableHandle,
    },
    UnknownSample {
        oscillator: usize,
        handle: SampleHandle,
    },
    InvalidLoop {
        oscillator: usize,
    },
    NoAmplitudeEnvelope,
    InvalidCcMapping {
        controller: u8,
    },
    PolyphonyExceedsEngine {
        voices: usize,
        max: usize,
    },
    InvalidWavetable(&'static str),
    InvalidSample(&'static str),
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchError::TooMany { what, count, max } => {
                write!(f, "too many {what}: {count} (max {max})")
            }
            PatchError::OutOfRange { parameter, value } => {
                write!(f, "{parameter} out of range: {value}")
            }
            PatchError::RouteAmountOutOfRange { route, amount } => {
                write!(f, "route {route} amount {amount} outside [-1, 1]")
            }
            PatchError::UnresolvedSource { route, source } => {
                write!(f, "route {route} reads missing source {source:?}")
            }
            PatchError::UnresolvedTarget { route, target } => {
                write!(f, "route {route} writes missing target {target:?}")
            }
            PatchError::InvalidModulator {
                oscillator,
                modulator,
            } => write!(
                f,
                "oscillator {oscillator} cannot be modulated by oscillator {modulator}"
            ),
            PatchError::UnknownWavetable { oscillator, handle } => {
                write!(f, "oscillator {oscillator} references unknown wavetable {}", handle.0)
            }
            PatchError::UnknownSample { oscillator, handle } => {
                write!(f, "oscillator {oscillator} references unknown sample {}", handle.0)
            }
            PatchError::InvalidLoop { oscillator } => {
                write!(f, "oscillator {oscillator} has invalid start/loop points")
            }
            PatchError::NoAmplitudeEnvelope => {
                write!(f, "no envelope gates the voice amplitude")
            }
            PatchError::InvalidCcMapping { controller } => {
                write!(f, "CC {controller} is mapped to a non-controller source")
            }
            PatchError::PolyphonyExceedsEngine { voices, max } => {
                write!(f, "patch asks for {voices} voices, engine holds {max}")
            }
            PatchError::InvalidWavetable(reason) => write!(f, "invalid wavetable: {reason}"),
            PatchError::InvalidSample(reason) => write!(f, "invalid sample buffer: {reason}"),
        }
    }
}

impl std::error::Error for PatchError {}
