use crate::{
    io::midi::MidiEvent, modulation::ModSourceId, patch::CcMapping, synth::message::SynthMessage,
};

/// What a controller number does once translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcAction {
    /// Write the normalized value to a global modulation source.
    Source(ModSourceId),
    AllNotesOff,
    Panic,
}

const DEFAULT_CC_MAP: [(u8, CcAction); 3] = [
    (1, CcAction::Source(ModSourceId::ModWheel)),
    (120, CcAction::Panic),
    (123, CcAction::AllNotesOff),
];

/// Maps decoded MIDI events onto engine commands.
///
/// Pure and allocation-free: one table lookup per controller message.
#[derive(Debug, Clone)]
pub struct MidiTranslator {
    channel: Option<u8>,
    cc_map: [Option<CcAction>; 128],
}

impl Default for MidiTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiTranslator {
    /// Omni, default controller map.
    pub fn new() -> Self {
        let mut translator = Self {
            channel: None,
            cc_map: [None; 128],
        };
        translator.reset_cc_map();
        translator
    }

    /// Listen to a single channel (0-15) only.
    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn set_channel(&mut self, channel: Option<u8>) {
        self.channel = channel;
    }

    fn reset_cc_map(&mut self) {
        self.cc_map = [None; 128];
        for (controller, action) in DEFAULT_CC_MAP {
            self.cc_map[controller as usize] = Some(action);
        }
    }

    /// Overlay a patch's own mappings on top of the defaults.
    pub fn set_patch_mappings(&mut self, mappings: &[CcMapping]) {
        self.reset_cc_map();
        for mapping in mappings {
            if let Some(slot) = self.cc_map.get_mut(mapping.controller as usize) {
                *slot = Some(CcAction::Source(mapping.source));
            }
        }
    }

    pub fn cc_action(&self, controller: u8) -> Option<CcAction> {
        self.cc_map.get(controller as usize).copied().flatten()
    }

    pub fn translate(&self, event: MidiEvent) -> Option<SynthMessage> {
        if let Some(channel) = self.channel {
            if event.channel() != channel {
                return None;
            }
        }

        match event {
            MidiEvent::NoteOn { key, velocity, .. } if velocity > 0 => Some(SynthMessage::NoteOn {
                note: key & 0x7F,
                velocity: velocity & 0x7F,
            }),
            MidiEvent::NoteOn { key, .. } | MidiEvent::NoteOff { key, .. } => {
                Some(SynthMessage::NoteOff { note: key & 0x7F })
            }
            MidiEvent::PitchBend { value, .. } => Some(SynthMessage::PitchBend {
                value: normalize_bend(value),
            }),
            MidiEvent::ControlChange {
                controller, value, ..
            } => match self.cc_action(controller)? {
                CcAction::Source(source) => Some(SynthMessage::SetSource {
                    source,
                    value: normalize_7bit(value),
                }),
                CcAction::AllNotesOff => Some(SynthMessage::AllNotesOff),
                CcAction::Panic => Some(SynthMessage::Panic),
            },
            MidiEvent::ChannelPressure { value, .. } | MidiEvent::PolyPressure { value, .. } => {
                Some(SynthMessage::SetSource {
                    source: ModSourceId::Aftertouch,
                    value: normalize_7bit(value),
                })
            }
            MidiEvent::ProgramChange { .. } => None,
        }
    }
}

#[inline]
fn normalize_7bit(value: u8) -> f32 {
    value.min(127) as f32 / 127.0
}

/// `-8192 → -1.0`, `0 → 0.0`, `8191 → 1.0`.
#[inline]
fn normalize_bend(value: i16) -> f32 {
    let value = value.clamp(-8192, 8191) as f32;
    if value < 0.0 {
        value / 8192.0
    } else {
        value / 8191.0
    }
}

pub fn midi_note_to_freq(note: u8) -> f32 {
    midi_pitch_to_freq(note as f32)
}

/// Fractional MIDI pitch (69.0 = A4) to Hz.
#[inline]
pub fn midi_pitch_to_freq(pitch: f32) -> f32 {
    440.0 * 2.0_f32.powf((pitch - 69.0) / 12.0)
}
