pub mod dsp;
pub mod error;
pub mod io;
pub mod modulation; // Source/target routing evaluated once per block
pub mod patch; // Static sound descriptions and their validation
pub mod synth; // Voice management, polyphony, engine/controller pair

pub use error::PatchError;

pub const MAX_BLOCK_SIZE: usize = 2048;

/// Upper bounds that let every voice be built without runtime allocation.
pub const MAX_OSCILLATORS: usize = 8;
pub const MAX_ENVELOPES: usize = 4;
pub const MAX_LFOS: usize = 4;
pub const MAX_ROUTES: usize = 32;
pub const MAX_VOICES: usize = 64;
