use arrayvec::ArrayVec;

use crate::{
    modulation::SourceValues,
    patch::{CompiledPatch, VoiceMode},
    synth::voice::{Voice, VoiceState},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeldNote {
    note: u8,
    velocity: u8,
}

/// Owns the voice pool and decides which voice plays which note.
///
/// The pool is sized once for the engine's maximum polyphony. A patch only
/// selects how much of it is usable, so switching patches never allocates.
#[derive(Debug)]
pub struct VoiceAllocator {
    voices: Vec<Voice>,
    polyphony: usize,
    mode: VoiceMode,
    /// Mono mode's last-note-priority stack, most recent last.
    held: ArrayVec<HeldNote, 128>,
    next_age: u64,
}

impl VoiceAllocator {
    pub fn new(max_voices: usize, sample_rate: f32) -> Self {
        let max_voices = max_voices.max(1);
        Self {
            voices: (0..max_voices).map(|id| Voice::new(id, sample_rate)).collect(),
            polyphony: max_voices,
            mode: VoiceMode::Poly { voices: max_voices },
            held: ArrayVec::new(),
            next_age: 0,
        }
    }

    /// Adopt a patch. Every voice is silenced.
    pub fn configure(&mut self, patch: &CompiledPatch) {
        self.mode = patch.voice_mode();
        self.polyphony = self.mode.polyphony().clamp(1, self.voices.len());
        for voice in &mut self.voices {
            voice.configure(patch);
        }
        self.held.clear();
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) {
        let age = self.next_age;
        self.next_age += 1;

        match self.mode {
            VoiceMode::Poly { .. } => self.poly_note_on(note, velocity, age),
            VoiceMode::Mono { legato } => self.mono_note_on(note, velocity, age, legato),
        }
    }

    pub fn note_off(&mut self, note: u8) {
        match self.mode {
            VoiceMode::Poly { .. } => {
                for voice in self.pool_mut() {
                    if voice.note() == note && voice.state() == VoiceState::Active {
                        voice.release();
                    }
                }
            }
            VoiceMode::Mono { .. } => self.mono_note_off(note),
        }
    }

    /// Release everything.
    pub fn all_notes_off(&mut self) {
        self.held.clear();
        for voice in &mut self.voices {
            voice.release();
        }
    }

    /// Silence everything now.
    pub fn panic(&mut self) {
        self.held.clear();
        for voice in &mut self.voices {
            voice.kill();
        }
    }

    pub fn render(
        &mut self,
        patch: &CompiledPatch,
        sources: &mut SourceValues,
        amounts: &[f32],
        left: &mut [f32],
        right: &mut [f32],
    ) {
        for voice in &mut self.voices {
            voice.render(patch, sources, amounts, left, right);
        }
    }

    fn pool_mut(&mut self) -> &mut [Voice] {
        &mut self.voices[..self.polyphony]
    }

    fn poly_note_on(&mut self, note: u8, velocity: u8, age: u64) {
        let pool = &self.voices[..self.polyphony];

        let index = pool
            .iter()
            .position(|v| v.note() == note && v.state() == VoiceState::Active)
            .or_else(|| pool.iter().position(Voice::is_free))
            .or_else(|| {
                // Quietest releasing voice first
                pool.iter()
                    .enumerate()
                    .filter(|(_, v)| v.state() == VoiceState::Releasing)
                    .min_by(|(_, a), (_, b)| a.amplitude_level().total_cmp(&b.amplitude_level()))
                    .map(|(i, _)| i)
            })
            .or_else(|| {
                // Then the oldest held voice
                pool.iter()
                    .enumerate()
                    .min_by_key(|(_, v)| v.age())
                    .map(|(i, _)| i)
            });

        if let Some(index) = index {
            self.voices[index].start(note, velocity, age);
        }
    }

    fn mono_note_on(&mut self, note: u8, velocity: u8, age: u64, legato: bool) {
        let another_held = self.held.iter().any(|held| held.note != note);

        self.held.retain(|held| held.note != note);
        if self.held.is_full() {
            self.held.remove(0);
        }
        self.held.push(HeldNote { note, velocity });

        let voice = &mut self.voices[0];
        if legato && another_held && voice.is_sounding() {
            voice.retune(note, velocity);
        } else {
            voice.start(note, velocity, age);
        }
    }

    fn mono_note_off(&mut self, note: u8) {
        let Some(position) = self.held.iter().position(|held| held.note == note) else {
            return;
        };
        let was_top = position + 1 == self.held.len();
        self.held.remove(position);
        if !was_top {
            return;
        }

        let voice = &mut self.voices[0];
        match self.held.last() {
            Some(previous) if voice.is_sounding() => {
                voice.retune(previous.note, previous.velocity)
            }
            Some(_) => {}
            None => voice.release(),
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Voices currently active or releasing.
    pub fn sounding_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_sounding()).count()
    }

    pub fn polyphony(&self) -> usize {
        self.polyphony
    }

    /// Notes held in mono mode, oldest first.
    pub fn held_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.held.iter().map(|held| held.note)
    }
}
