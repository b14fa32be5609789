//! Status bar widget - shows patch, voice mode, controls and audio stats

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use saavy_synth::patch::VoiceMode;

use super::voices::note_name;

/// Audio statistics for display
pub struct AudioStats {
    pub peak: f32,
    pub rms: f32,
}

impl AudioStats {
    /// Compute audio stats from a buffer
    pub fn from_buffer(buffer: &[f32]) -> Self {
        if buffer.is_empty() {
            return Self { peak: 0.0, rms: 0.0 };
        }
        let peak = buffer.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()));
        let rms = (buffer.iter().map(|&x| x * x).sum::<f32>() / buffer.len() as f32).sqrt();
        Self { peak, rms }
    }
}

/// Everything the status bar shows besides audio levels
pub struct StatusInfo {
    pub patch: String,
    pub mode: VoiceMode,
    pub sounding: usize,
    pub base_note: u8,
    pub mod_wheel: f32,
    pub sample_rate: f32,
    /// Commands waiting for room in the queue
    pub pending: usize,
    pub dropped: u64,
    pub message: Option<String>,
}

/// Render the status bar
pub fn render_status(frame: &mut Frame, area: Rect, info: &StatusInfo, audio_stats: &AudioStats) {
    let block = Block::default().title(" saavy ").borders(Borders::ALL);

    let mode = match info.mode {
        VoiceMode::Poly { voices } => format!("Poly {voices}"),
        VoiceMode::Mono { legato: true } => "Mono legato".to_string(),
        VoiceMode::Mono { legato: false } => "Mono".to_string(),
    };

    // Format sample rate nicely (e.g., 48000 -> "48kHz")
    let sample_rate_khz = info.sample_rate / 1000.0;

    let mut spans = vec![
        Span::styled(format!(" {}  ", info.patch), Style::default().fg(Color::Cyan)),
        Span::styled(format!("{mode}  "), Style::default().fg(Color::Green)),
        Span::styled(
            format!("Voices: {}  ", info.sounding),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("Base: {}  ", note_name(info.base_note)),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            format!("Wheel: {:.1}  ", info.mod_wheel),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled(
            format!("{:.1}kHz  ", sample_rate_khz),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("Peak: {:.2}  RMS: {:.2}  ", audio_stats.peak, audio_stats.rms),
            Style::default().fg(Color::Magenta),
        ),
    ];

    if info.pending > 0 || info.dropped > 0 {
        spans.push(Span::styled(
            format!("Queue: {} waiting, {} dropped  ", info.pending, info.dropped),
            Style::default().fg(Color::Red),
        ));
    }
    if let Some(message) = &info.message {
        spans.push(Span::styled(
            message.clone(),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}
