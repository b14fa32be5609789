//! saavy - Terminal synthesizer interface
//!
//! Run with: cargo run
//! Logs go to `saavy.log` (override with SAAVY_LOG_FILE, filter with RUST_LOG).

mod app;
mod patches;
mod ui;

use std::{fs::File, sync::Mutex};

use app::Saavy;
use color_eyre::eyre::{Result as EyreResult, WrapErr};
use tracing_subscriber::EnvFilter;

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    init_logging()?;

    Saavy::new()
        .max_polyphony(16)
        .patch(patches::lead())
        .run()
}

/// The TUI owns the terminal, so logs go to a file.
fn init_logging() -> EyreResult<()> {
    let path = std::env::var("SAAVY_LOG_FILE").unwrap_or_else(|_| "saavy.log".to_string());
    let file =
        File::create(&path).wrap_err_with(|| format!("failed to create log file {path}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
