//! Low-level DSP primitives embedded inside voices.
//!
//! These components are allocation-free and realtime-safe once constructed,
//! making them safe to embed directly inside voice structs. They stay focused
//! on the signal-processing math; routing and voice lifecycle live in
//! `modulation` and `synth`.

/// Delay/attack/decay/sustain/release envelope generator.
pub mod envelope;
/// State-variable filter implementation with multiple responses.
pub mod filter;
/// Low frequency oscillators used as modulation sources.
pub mod lfo;
/// Route curves and order-independent accumulation.
pub mod modulate;
/// Wavetable, sample, FM and PM oscillators.
pub mod oscillator;
/// Band-limited wavetables and sample buffers supplied by loaders.
pub mod wavetable;

pub use envelope::EnvelopeStage;
