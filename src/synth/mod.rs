// Purpose: voice management, polyphony, and the engine/controller pair
// This layer sits above the dsp primitives and the modulation matrix

pub mod allocator;
pub mod bank;
#[cfg(feature = "rtrb")]
pub mod controller;
pub mod engine;
pub mod message;
#[cfg(feature = "rtrb")]
pub mod queue;
pub mod telemetry;
pub mod voice;

#[cfg(feature = "rtrb")]
pub use controller::{channel, SynthController};
pub use engine::{EngineConfig, SynthEngine};
pub use message::{MessageReceiver, SynthMessage};
pub use telemetry::{Telemetry, VoiceTelemetry};
pub use voice::VoiceState;
