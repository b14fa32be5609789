//! Voice meters - one row per voice in the engine's pool

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use saavy_synth::{
    dsp::EnvelopeStage,
    synth::{VoiceState, VoiceTelemetry},
};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI note number to a name like `C4` (60 = C4)
pub fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[note as usize % 12], octave)
}

/// Render one meter row per voice
pub fn render_voices(frame: &mut Frame, area: Rect, voices: &[VoiceTelemetry]) {
    let block = Block::default().title(" Voices ").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width < 24 {
        return;
    }

    let label_width = 22usize;
    let meter_width = (inner.width as usize).saturating_sub(label_width);

    // Pools taller than the panel are cut off at the bottom
    let rows = inner.height as usize;
    let lines: Vec<Line> = voices
        .iter()
        .take(rows)
        .map(|voice| voice_line(voice, meter_width))
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn voice_line(voice: &VoiceTelemetry, meter_width: usize) -> Line<'static> {
    let (color, note) = match voice.state {
        VoiceState::Idle => (Color::DarkGray, "--".to_string()),
        VoiceState::Active => (Color::Green, note_name(voice.note)),
        VoiceState::Releasing => (Color::Yellow, note_name(voice.note)),
    };

    let stage = match voice.stage {
        EnvelopeStage::Idle => "idle",
        EnvelopeStage::Delay => "delay",
        EnvelopeStage::Attack => "attack",
        EnvelopeStage::Decay => "decay",
        EnvelopeStage::Sustain => "sustain",
        EnvelopeStage::Release => "release",
    };

    let filled = (voice.level.clamp(0.0, 1.0) * meter_width as f32).round() as usize;
    let meter = format!(
        "{}{}",
        "█".repeat(filled),
        "·".repeat(meter_width.saturating_sub(filled))
    );

    Line::from(vec![
        Span::styled(format!("{:>3} ", voice.id), Style::default().fg(Color::DarkGray)),
        Span::styled(format!("{note:<5}"), Style::default().fg(color)),
        Span::styled(format!("{stage:<8}"), Style::default().fg(Color::White)),
        Span::styled(format!("{:>3}  ", voice.velocity), Style::default().fg(Color::DarkGray)),
        Span::styled(meter, Style::default().fg(color)),
    ])
}
