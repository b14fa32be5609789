//! TUI module for saavy
//!
//! Plays the synth from the computer keyboard and shows voice activity and
//! the output waveform.

mod status;
mod voices;
mod waveform;

use std::time::{Duration, Instant};

use color_eyre::eyre::Result as EyreResult;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};
use rtrb::Consumer;
use tracing::{info, warn};

use saavy_synth::{
    modulation::ModSourceId,
    patch::Patch,
    synth::{SynthController, VoiceState},
};

use super::patches;
use status::{render_status, AudioStats, StatusInfo};
use voices::render_voices;
use waveform::render_waveform;

/// Audio visualization buffer size
const VIS_BUFFER_SIZE: usize = 1024;

/// Terminals rarely report key releases, so notes stop after this long
const NOTE_LENGTH: Duration = Duration::from_millis(400);

/// Semitone offsets for a piano-style row: a w s e d f t g y h u j k
const KEYBOARD: [(char, u8); 13] = [
    ('a', 0),
    ('w', 1),
    ('s', 2),
    ('e', 3),
    ('d', 4),
    ('f', 5),
    ('t', 6),
    ('g', 7),
    ('y', 8),
    ('h', 9),
    ('u', 10),
    ('j', 11),
    ('k', 12),
];

/// UI application state
pub struct UiApp {
    controller: SynthController,
    /// Ring buffer receiver for audio samples
    audio_rx: Consumer<f32>,
    /// Audio sample buffer for visualization
    audio_buffer: Vec<f32>,
    sample_rate: f32,
    /// Editable copy of the loaded patch, republished on changes
    patch: Patch,
    /// MIDI note of the `a` key
    base_note: u8,
    mod_wheel: f32,
    /// Notes started from the keyboard and when they stop
    sounding: Vec<(u8, Instant)>,
    message: Option<String>,
    /// Whether the app should quit
    should_quit: bool,
}

impl UiApp {
    pub fn new(
        controller: SynthController,
        audio_rx: Consumer<f32>,
        sample_rate: f32,
        patch: Patch,
    ) -> Self {
        Self {
            controller,
            audio_rx,
            audio_buffer: vec![0.0; VIS_BUFFER_SIZE],
            sample_rate,
            patch,
            base_note: 60,
            mod_wheel: 0.0,
            sounding: Vec::new(),
            message: None,
            should_quit: false,
        }
    }

    /// Run the UI event loop
    pub fn run(&mut self, terminal: &mut DefaultTerminal) -> EyreResult<()> {
        while !self.should_quit {
            self.poll_audio();
            self.release_expired();
            self.controller.flush();

            terminal.draw(|frame| self.render(frame))?;

            // Handle keyboard input (non-blocking, ~60fps)
            if event::poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }

        self.controller.all_notes_off();
        self.controller.flush();
        Ok(())
    }

    /// Poll for new audio samples from ring buffer
    fn poll_audio(&mut self) {
        let mut received = false;
        while let Ok(sample) = self.audio_rx.pop() {
            self.audio_buffer.push(sample);
            received = true;
        }

        if received && self.audio_buffer.len() > VIS_BUFFER_SIZE {
            let excess = self.audio_buffer.len() - VIS_BUFFER_SIZE;
            self.audio_buffer.drain(0..excess);
        }
    }

    fn release_expired(&mut self) {
        let now = Instant::now();
        let controller = &mut self.controller;
        self.sounding.retain(|&(note, until)| {
            if now < until {
                return true;
            }
            controller.note_off(note);
            false
        });
    }

    /// Handle keyboard input
    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('z') => self.base_note = self.base_note.saturating_sub(12).max(12),
            KeyCode::Char('x') => self.base_note = (self.base_note + 12).min(108),
            KeyCode::Char('[') => self.nudge_mod_wheel(-0.1),
            KeyCode::Char(']') => self.nudge_mod_wheel(0.1),
            KeyCode::Char('p') => {
                self.sounding.clear();
                self.controller.panic();
                self.message = Some("panic".to_string());
            }
            KeyCode::Char('m') => self.toggle_mode(),
            KeyCode::Char(c) => {
                if let Some(&(_, offset)) = KEYBOARD.iter().find(|(key, _)| *key == c) {
                    self.play(self.base_note + offset);
                }
            }
            _ => {}
        }
    }

    fn play(&mut self, note: u8) {
        let until = Instant::now() + NOTE_LENGTH;
        match self.sounding.iter_mut().find(|(held, _)| *held == note) {
            // Key repeat: keep holding instead of retriggering
            Some(entry) => entry.1 = until,
            None => {
                self.controller.note_on(note, 100);
                self.sounding.push((note, until));
            }
        }
    }

    fn nudge_mod_wheel(&mut self, delta: f32) {
        self.mod_wheel = (self.mod_wheel + delta).clamp(0.0, 1.0);
        self.controller.set_source(ModSourceId::ModWheel, self.mod_wheel);
    }

    fn toggle_mode(&mut self) {
        let next = patches::toggle_mode(&self.patch);
        match self.controller.load_patch(next.clone()) {
            Ok(()) => {
                info!(mode = ?next.voice_mode, "voice mode changed");
                self.message = Some(format!("{:?}", next.voice_mode));
                self.sounding.clear();
                self.patch = next;
            }
            Err(err) => {
                warn!(%err, "patch change rejected");
                self.message = Some(err.to_string());
            }
        }
    }

    /// Render the UI
    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Status bar
                Constraint::Min(6),    // Voices
                Constraint::Length(8), // Waveform
                Constraint::Length(1), // Help bar
            ])
            .split(area);

        let telemetry = self.controller.telemetry().snapshot();
        let info = StatusInfo {
            patch: self.controller.current_patch().name().to_string(),
            mode: self.patch.voice_mode,
            sounding: telemetry
                .iter()
                .filter(|voice| voice.state != VoiceState::Idle)
                .count(),
            base_note: self.base_note,
            mod_wheel: self.mod_wheel,
            sample_rate: self.sample_rate,
            pending: self.controller.pending(),
            dropped: self.controller.dropped(),
            message: self.message.clone(),
        };
        let stats = AudioStats::from_buffer(&self.audio_buffer);

        render_status(frame, chunks[0], &info, &stats);
        render_voices(frame, chunks[1], &telemetry);
        render_waveform(frame, chunks[2], &self.audio_buffer);

        let help = Paragraph::new(
            " [A-K] Play  [Z/X] Octave  [ [ ] ] Mod wheel  [M] Mono/Poly  [P] Panic  [Q] Quit",
        )
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }
}
