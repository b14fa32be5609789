//! Benchmarks for low-level DSP primitives.

mod envelope;
mod filter;
mod matrix;
mod oscillator;

pub use envelope::bench_envelope;
pub use filter::bench_filter;
pub use matrix::bench_matrix;
pub use oscillator::bench_oscillator;
