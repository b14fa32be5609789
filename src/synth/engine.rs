use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use arrayvec::ArrayVec;

use crate::{
    modulation::{ModSourceId, SourceValues},
    patch::CompiledPatch,
    synth::{
        allocator::VoiceAllocator,
        message::{MessageReceiver, SynthMessage},
        telemetry::Telemetry,
    },
    MAX_BLOCK_SIZE, MAX_ROUTES, MAX_VOICES,
};

/// Smallest backlog the command queue runs with: room for the latest
/// note-off of every MIDI note plus one all-notes-off and one panic, the
/// commands overflow may never drop.
pub const MIN_BACKLOG_CAPACITY: usize = 128 + 2;

/// Engine-wide settings fixed at construction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    /// Size of the voice pool; patches may ask for fewer.
    pub max_polyphony: usize,
    /// Ring buffer slots between controller and engine.
    pub queue_capacity: usize,
    /// Commands the controller holds back when the ring is full. Never
    /// less than `MIN_BACKLOG_CAPACITY` once sanitized.
    pub backlog_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            max_polyphony: 16,
            queue_capacity: 1024,
            backlog_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_max_polyphony(mut self, voices: usize) -> Self {
        self.max_polyphony = voices;
        self
    }

    /// Pull every field into a usable range.
    pub fn sanitized(self) -> Self {
        let sample_rate = if self.sample_rate.is_finite() && self.sample_rate > 0.0 {
            self.sample_rate
        } else {
            Self::default().sample_rate
        };
        Self {
            sample_rate,
            max_polyphony: self.max_polyphony.clamp(1, MAX_VOICES),
            queue_capacity: self.queue_capacity.max(1),
            backlog_capacity: self.backlog_capacity.max(MIN_BACKLOG_CAPACITY),
        }
    }
}

/// The audio-path half of the synth.
///
/// `render_block` is the only thing the audio callback calls. It never
/// allocates, locks or logs: commands arrive through `R`, patches through
/// the shared slot, and telemetry leaves through atomics.
pub struct SynthEngine<R: MessageReceiver> {
    config: EngineConfig,
    slot: Arc<ArcSwap<CompiledPatch>>,
    patch: Arc<CompiledPatch>,
    rx: R,
    allocator: VoiceAllocator,
    sources: SourceValues,
    amounts: ArrayVec<f32, MAX_ROUTES>,
    telemetry: Arc<Telemetry>,
}

impl<R: MessageReceiver> SynthEngine<R> {
    pub fn new(
        config: EngineConfig,
        slot: Arc<ArcSwap<CompiledPatch>>,
        rx: R,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        let config = config.sanitized();
        let patch = slot.load_full();
        let mut engine = Self {
            config,
            slot,
            patch: Arc::clone(&patch),
            rx,
            allocator: VoiceAllocator::new(config.max_polyphony, config.sample_rate),
            sources: SourceValues::new(),
            amounts: ArrayVec::new(),
            telemetry,
        };
        engine.adopt(patch);
        engine
    }

    /// Render one block of stereo audio. Both buffers are overwritten.
    pub fn render_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.sync_patch();
        while let Some(message) = self.rx.pop() {
            self.handle(message);
        }

        left.fill(0.0);
        right.fill(0.0);
        let frames = left.len().min(right.len());

        let mut start = 0;
        while start < frames {
            let end = (start + MAX_BLOCK_SIZE).min(frames);
            self.allocator.render(
                &self.patch,
                &mut self.sources,
                &self.amounts,
                &mut left[start..end],
                &mut right[start..end],
            );
            start = end;
        }

        self.telemetry.publish(self.allocator.voices());
    }

    fn sync_patch(&mut self) {
        let current = self.slot.load();
        if Arc::ptr_eq(&current, &self.patch) {
            return;
        }
        let patch = Guard::into_inner(current);
        self.adopt(patch);
    }

    /// Switch to a new patch: silence everything and reload route amounts.
    fn adopt(&mut self, patch: Arc<CompiledPatch>) {
        self.allocator.configure(&patch);
        self.amounts.clear();
        self.amounts
            .extend(patch.default_amounts().iter().copied().take(MAX_ROUTES));
        // The previous Arc is released here, but the publisher still holds
        // a clone, so this never frees memory on the audio thread.
        self.patch = patch;
    }

    fn handle(&mut self, message: SynthMessage) {
        match message {
            SynthMessage::NoteOn { note, velocity } if velocity > 0 => {
                self.allocator.note_on(note.min(127), velocity.min(127));
            }
            SynthMessage::NoteOn { note, .. } | SynthMessage::NoteOff { note } => {
                self.allocator.note_off(note.min(127));
            }
            SynthMessage::PitchBend { value } => {
                self.sources.set(ModSourceId::PitchBend, value);
            }
            SynthMessage::SetSource { source, value } => {
                if source.is_global() {
                    self.sources.set(source, value);
                }
            }
            SynthMessage::SetRouteAmount { route, amount } => {
                if let Some(slot) = self.amounts.get_mut(route) {
                    if amount.is_finite() {
                        *slot = amount.clamp(-1.0, 1.0);
                    }
                }
            }
            SynthMessage::AllNotesOff => self.allocator.all_notes_off(),
            SynthMessage::Panic => self.allocator.panic(),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    pub fn allocator(&self) -> &VoiceAllocator {
        &self.allocator
    }

    pub fn patch(&self) -> &CompiledPatch {
        &self.patch
    }

    /// Live route amounts.
    pub fn route_amounts(&self) -> &[f32] {
        &self.amounts
    }

    pub fn source(&self, source: ModSourceId) -> f32 {
        self.sources.get(source)
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }
}
