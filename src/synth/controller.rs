use std::sync::Arc;

use rtrb::{Consumer, RingBuffer};
use tracing::info;

use crate::{
    io::{converter::MidiTranslator, midi::MidiEvent},
    modulation::ModSourceId,
    patch::{CompiledPatch, Patch, PatchPublisher},
    synth::{
        engine::{EngineConfig, SynthEngine},
        message::SynthMessage,
        queue::CommandSender,
        telemetry::Telemetry,
    },
    PatchError,
};

/// Build a connected engine/controller pair.
///
/// The engine goes to the audio callback; the controller stays on the
/// control thread. The initial patch must validate, including against the
/// engine's voice pool size.
pub fn channel(
    config: EngineConfig,
    patch: Patch,
) -> Result<(SynthEngine<Consumer<SynthMessage>>, SynthController), PatchError> {
    let config = config.sanitized();
    let publisher = PatchPublisher::new(patch, config.max_polyphony)?;
    let (tx, rx) = RingBuffer::new(config.queue_capacity);
    let telemetry = Arc::new(Telemetry::new(config.max_polyphony));

    let engine = SynthEngine::new(config, publisher.slot(), rx, Arc::clone(&telemetry));

    let mut translator = MidiTranslator::new();
    translator.set_patch_mappings(publisher.current().cc_mappings());

    info!(
        sample_rate = config.sample_rate,
        voices = config.max_polyphony,
        queue = config.queue_capacity,
        "synth engine created"
    );

    let controller = SynthController {
        sender: CommandSender::new(tx, config.backlog_capacity),
        publisher,
        translator,
        telemetry,
    };
    Ok((engine, controller))
}

/// The control-side half: sends commands, swaps patches, reads telemetry.
pub struct SynthController {
    sender: CommandSender,
    publisher: PatchPublisher,
    translator: MidiTranslator,
    telemetry: Arc<Telemetry>,
}

impl SynthController {
    /// Queue a raw command. Returns how many queued commands were dropped.
    pub fn send(&mut self, message: SynthMessage) -> usize {
        let dropped = self.sender.send(message);
        self.publisher.collect();
        dropped
    }

    pub fn note_on(&mut self, note: u8, velocity: u8) -> usize {
        self.send(SynthMessage::NoteOn { note, velocity })
    }

    pub fn note_off(&mut self, note: u8) -> usize {
        self.send(SynthMessage::NoteOff { note })
    }

    /// `value` in `[-1, 1]`.
    pub fn pitch_bend(&mut self, value: f32) -> usize {
        self.send(SynthMessage::PitchBend { value })
    }

    pub fn set_source(&mut self, source: ModSourceId, value: f32) -> usize {
        self.send(SynthMessage::SetSource { source, value })
    }

    /// Macro write: changes one route's amount without reloading the patch.
    pub fn set_route_amount(&mut self, route: usize, amount: f32) -> usize {
        self.send(SynthMessage::SetRouteAmount { route, amount })
    }

    pub fn all_notes_off(&mut self) -> usize {
        self.send(SynthMessage::AllNotesOff)
    }

    pub fn panic(&mut self) -> usize {
        self.send(SynthMessage::Panic)
    }

    /// Translate and queue a decoded MIDI event.
    pub fn handle_midi(&mut self, event: MidiEvent) -> usize {
        match self.translator.translate(event) {
            Some(message) => self.send(message),
            None => 0,
        }
    }

    /// Validate and publish a new patch. On error the current patch keeps
    /// playing and the error is returned (and logged).
    pub fn load_patch(&mut self, patch: Patch) -> Result<(), PatchError> {
        let compiled = self.publisher.publish(patch)?;
        self.translator.set_patch_mappings(compiled.cc_mappings());
        Ok(())
    }

    pub fn current_patch(&self) -> Arc<CompiledPatch> {
        self.publisher.current()
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub fn translator_mut(&mut self) -> &mut MidiTranslator {
        &mut self.translator
    }

    /// Push any backlogged commands and release patches the engine no
    /// longer uses. Call periodically from the control thread.
    pub fn flush(&mut self) -> usize {
        let moved = self.sender.flush();
        self.publisher.collect();
        moved
    }

    pub fn pending(&self) -> usize {
        self.sender.pending()
    }

    pub fn dropped(&self) -> u64 {
        self.sender.dropped()
    }
}
