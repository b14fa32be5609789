//! Whole-engine benchmarks.
//!
//! These drive `SynthEngine::render_block` the way an audio callback does,
//! with realistic patches and several voices sounding.

mod voices;

pub use voices::bench_voices;
