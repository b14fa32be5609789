//! Saavy - main application builder and runner

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::RingBuffer;
use tracing::{error, info};

use super::ui::UiApp;

use saavy_synth::{
    patch::Patch,
    synth::{self, EngineConfig},
    MAX_BLOCK_SIZE,
};

/// Samples kept in flight for the oscilloscope
const SCOPE_CAPACITY: usize = 8192;

/// Main application builder
pub struct Saavy {
    config: EngineConfig,
    patch: Patch,
}

impl Saavy {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            patch: Patch::new("init"),
        }
    }

    /// Size of the engine's voice pool
    pub fn max_polyphony(mut self, voices: usize) -> Self {
        self.config = self.config.with_max_polyphony(voices);
        self
    }

    /// Patch loaded at startup
    pub fn patch(mut self, patch: Patch) -> Self {
        self.patch = patch;
        self
    }

    /// Open the default output device and hand the terminal to the UI
    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        info!(sample_rate, channels, "audio device opened");

        let (mut engine, controller) = synth::channel(
            self.config.with_sample_rate(sample_rate),
            self.patch.clone(),
        )
        .wrap_err("startup patch rejected")?;

        let (mut scope_tx, scope_rx) = RingBuffer::<f32>::new(SCOPE_CAPACITY);
        let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
        let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| {
                for chunk in data.chunks_mut(MAX_BLOCK_SIZE * channels) {
                    let frames = chunk.len() / channels;
                    let (block_l, block_r) = (&mut left[..frames], &mut right[..frames]);
                    engine.render_block(block_l, block_r);

                    for (i, frame) in chunk.chunks_mut(channels).enumerate() {
                        let (l, r) = (block_l[i], block_r[i]);
                        match frame {
                            [mono] => *mono = 0.5 * (l + r),
                            [out_l, out_r, rest @ ..] => {
                                *out_l = l;
                                *out_r = r;
                                rest.fill(0.0);
                            }
                            [] => {}
                        }
                        // Scope is best effort; a full ring just skips samples
                        let _ = scope_tx.push(0.5 * (l + r));
                    }
                }
            },
            |err| error!(%err, "audio stream error"),
            None,
        )?;

        stream.play()?;

        let mut terminal = ratatui::init();
        let result = UiApp::new(controller, scope_rx, sample_rate, self.patch).run(&mut terminal);
        ratatui::restore();
        result
    }
}

impl Default for Saavy {
    fn default() -> Self {
        Self::new()
    }
}
