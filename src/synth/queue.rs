use std::collections::VecDeque;

use rtrb::{Producer, PushError};
use tracing::warn;

use crate::synth::{engine::MIN_BACKLOG_CAPACITY, message::SynthMessage};

/// Control-side end of the command ring buffer.
///
/// When the ring is full, commands wait in a bounded backlog and are
/// flushed on the next send. When the backlog is full too, the oldest
/// droppable command goes. A command is never dropped if it is the most
/// recent note-off for its note, or an all-notes-off or panic that nothing
/// later supersedes, so a stuck note can't be caused by overflow.
///
/// Repeated all-notes-off and panic commands collapse into the latest one,
/// which caps the protected set at one note-off per note plus those two.
/// The backlog is never smaller than that.
pub struct CommandSender {
    tx: Producer<SynthMessage>,
    backlog: VecDeque<SynthMessage>,
    backlog_capacity: usize,
    dropped: u64,
}

impl CommandSender {
    pub fn new(tx: Producer<SynthMessage>, backlog_capacity: usize) -> Self {
        let backlog_capacity = backlog_capacity.max(MIN_BACKLOG_CAPACITY);
        Self {
            tx,
            backlog: VecDeque::with_capacity(backlog_capacity + 1),
            backlog_capacity,
            dropped: 0,
        }
    }

    /// Queue a command. Returns how many commands were dropped to make room.
    pub fn send(&mut self, message: SynthMessage) -> usize {
        self.flush();

        if self.backlog.is_empty() {
            match self.tx.push(message) {
                Ok(()) => return 0,
                Err(PushError::Full(message)) => self.backlog.push_back(message),
            }
        } else {
            if matches!(message, SynthMessage::AllNotesOff | SynthMessage::Panic) {
                self.backlog.retain(|queued| *queued != message);
            }
            self.backlog.push_back(message);
        }

        let mut dropped = 0;
        while self.backlog.len() > self.backlog_capacity {
            let Some(victim) = self.oldest_droppable() else {
                break;
            };
            self.backlog.remove(victim);
            dropped += 1;
        }

        if dropped > 0 {
            self.dropped += dropped as u64;
            warn!(
                dropped,
                total = self.dropped,
                pending = self.backlog.len(),
                "command queue overflow"
            );
        }
        dropped
    }

    /// Move as much of the backlog into the ring as fits.
    pub fn flush(&mut self) -> usize {
        let mut moved = 0;
        while let Some(&message) = self.backlog.front() {
            if self.tx.push(message).is_err() {
                break;
            }
            self.backlog.pop_front();
            moved += 1;
        }
        moved
    }

    /// Commands waiting in the backlog.
    pub fn pending(&self) -> usize {
        self.backlog.len()
    }

    /// Total commands dropped since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn oldest_droppable(&self) -> Option<usize> {
        (0..self.backlog.len()).find(|&i| !self.is_protected(i))
    }

    fn is_protected(&self, index: usize) -> bool {
        let mut later = self.backlog.iter().skip(index + 1);
        match self.backlog[index] {
            SynthMessage::Panic => true,
            SynthMessage::AllNotesOff => !later.any(|m| *m == SynthMessage::Panic),
            // The engine clamps notes to 127, so that is the key here too
            SynthMessage::NoteOff { note } => !later.any(|m| match *m {
                SynthMessage::NoteOff { note: n } => n.min(127) == note.min(127),
                SynthMessage::AllNotesOff | SynthMessage::Panic => true,
                _ => false,
            }),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rtrb::RingBuffer;

    use super::*;
    use crate::synth::message::MessageReceiver;

    /// A sender whose ring is already full, so every send lands in the backlog.
    fn jammed(backlog_capacity: usize) -> (CommandSender, rtrb::Consumer<SynthMessage>) {
        let (tx, rx) = RingBuffer::new(1);
        let mut sender = CommandSender::new(tx, backlog_capacity);
        sender.send(SynthMessage::PitchBend { value: 0.0 });
        (sender, rx)
    }

    fn note_offs(sender: &CommandSender) -> usize {
        sender
            .backlog
            .iter()
            .filter(|m| matches!(m, SynthMessage::NoteOff { .. }))
            .count()
    }

    #[test]
    fn overflow_goes_to_backlog_then_flushes() {
        let (tx, mut rx) = RingBuffer::new(2);
        let mut sender = CommandSender::new(tx, 8);

        for note in 0..4 {
            assert_eq!(sender.send(SynthMessage::NoteOn { note, velocity: 1 }), 0);
        }
        assert_eq!(sender.pending(), 2);

        while MessageReceiver::pop(&mut rx).is_some() {}
        assert_eq!(sender.flush(), 2);
        assert_eq!(sender.pending(), 0);
    }

    #[test]
    fn zero_backlog_still_keeps_the_only_note_off() {
        let (tx, mut rx) = RingBuffer::new(1);
        let mut sender = CommandSender::new(tx, 0);

        assert_eq!(
            sender.send(SynthMessage::NoteOn {
                note: 60,
                velocity: 100
            }),
            0
        );
        assert_eq!(sender.send(SynthMessage::NoteOff { note: 60 }), 0);
        assert_eq!(sender.pending(), 1);
        assert_eq!(sender.dropped(), 0);

        assert!(matches!(
            MessageReceiver::pop(&mut rx),
            Some(SynthMessage::NoteOn { note: 60, .. })
        ));
        sender.flush();
        assert_eq!(
            MessageReceiver::pop(&mut rx),
            Some(SynthMessage::NoteOff { note: 60 })
        );
    }

    #[test]
    fn latest_note_off_per_note_survives() {
        let (mut sender, _rx) = jammed(0);

        sender.send(SynthMessage::NoteOff { note: 60 });
        sender.send(SynthMessage::NoteOff { note: 60 });
        for note in 0..128 {
            assert_eq!(sender.send(SynthMessage::NoteOn { note, velocity: 1 }), 0);
        }
        assert_eq!(sender.pending(), MIN_BACKLOG_CAPACITY);

        // Superseded note-off goes first
        assert_eq!(sender.send(SynthMessage::NoteOn { note: 1, velocity: 1 }), 1);
        assert_eq!(sender.backlog[0], SynthMessage::NoteOff { note: 60 });
        assert_eq!(note_offs(&sender), 1);

        // Then the oldest note-on
        assert_eq!(sender.send(SynthMessage::NoteOn { note: 2, velocity: 1 }), 1);
        assert_eq!(sender.backlog[0], SynthMessage::NoteOff { note: 60 });
        assert_eq!(
            sender.backlog[1],
            SynthMessage::NoteOn {
                note: 1,
                velocity: 1
            }
        );
        assert_eq!(sender.dropped(), 2);
    }

    #[test]
    fn repeated_panics_collapse() {
        let (mut sender, _rx) = jammed(0);

        for _ in 0..500 {
            sender.send(SynthMessage::Panic);
            sender.send(SynthMessage::AllNotesOff);
        }
        assert_eq!(
            sender.backlog,
            [SynthMessage::Panic, SynthMessage::AllNotesOff]
        );
        assert_eq!(sender.dropped(), 0);
    }

    #[test]
    fn protected_commands_always_fit() {
        let (mut sender, _rx) = jammed(0);

        sender.send(SynthMessage::Panic);
        sender.send(SynthMessage::AllNotesOff);
        for note in 0..=255u8 {
            sender.send(SynthMessage::NoteOff { note });
        }
        for note in 0..200 {
            sender.send(SynthMessage::NoteOn { note, velocity: 1 });
        }

        assert_eq!(sender.pending(), MIN_BACKLOG_CAPACITY);
        assert_eq!(sender.backlog[0], SynthMessage::Panic);
        assert_eq!(sender.backlog[1], SynthMessage::AllNotesOff);
        // 128..=255 all land on note 127; only the last of them is kept
        assert_eq!(note_offs(&sender), 128);
        assert!(sender
            .backlog
            .contains(&SynthMessage::NoteOff { note: 255 }));
    }

    #[test]
    fn later_all_notes_off_supersedes_earlier_note_offs() {
        let (mut sender, _rx) = jammed(0);

        for note in 0..128 {
            sender.send(SynthMessage::NoteOff { note });
        }
        sender.send(SynthMessage::AllNotesOff);
        sender.send(SynthMessage::NoteOn {
            note: 60,
            velocity: 1,
        });
        assert_eq!(sender.pending(), MIN_BACKLOG_CAPACITY);

        assert_eq!(
            sender.send(SynthMessage::NoteOn {
                note: 61,
                velocity: 1
            }),
            1
        );
        assert_eq!(sender.backlog[0], SynthMessage::NoteOff { note: 1 });
        assert!(sender.backlog.contains(&SynthMessage::AllNotesOff));
    }
}
