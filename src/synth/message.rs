#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::modulation::ModSourceId;

/// Commands from the control side, drained by the engine at block start.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
    /// Normalized wheel position, `[-1, 1]`.
    PitchBend { value: f32 },
    /// Write a global modulation source (mod wheel, aftertouch, CC slot).
    SetSource { source: ModSourceId, value: f32 },
    /// Live macro write to one route's amount.
    SetRouteAmount { route: usize, amount: f32 },
    AllNotesOff,
    Panic,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}

/// Plain vectors work as a receiver too, which keeps tests and offline
/// renders free of a ring buffer.
impl MessageReceiver for std::collections::VecDeque<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        self.pop_front()
    }
}
