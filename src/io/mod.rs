// Purpose - external interfaces: decoded MIDI in, engine commands out

pub mod converter;
pub mod midi;

pub use converter::{midi_note_to_freq, midi_pitch_to_freq, CcAction, MidiTranslator};
pub use midi::MidiEvent;
