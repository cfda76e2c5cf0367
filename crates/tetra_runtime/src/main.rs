//! Tetra Runtime
//!
//! Headless binary: reserves the arena, builds the tetrahedron scene and
//! drives the frame loop with audio pushed to a simulated device.

mod app;
mod palette;
mod scene;

use anyhow::Result;
use app::App;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tetra_audio::FrameReport;
use tetra_services::Settings;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tetra", version, about = "Arena-backed tetrahedron demo with mixed audio")]
struct Cli {
    /// JSON settings file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to run
    #[arg(short, long, default_value_t = 600)]
    frames: u64,

    /// 16-bit PCM WAV to play in the background instead of a test tone
    #[arg(short, long)]
    sound: Option<PathBuf>,

    /// Sleep out the rest of each frame instead of running flat out
    #[arg(long)]
    realtime: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::load_or_default(cli.config.as_deref())?;
    let mut app = App::init(&settings, cli.sound.as_deref())?;

    let dt = app.clock().frame_duration();
    for _ in 0..cli.frames {
        let started = Instant::now();
        if let FrameReport::Skipped(reason) = app.frame(dt)? {
            tracing::debug!(?reason, frame = app.clock().frame_count(), "audio skipped");
        }

        match app.clock().sleep_budget(started.elapsed()) {
            Some(rest) if cli.realtime => std::thread::sleep(rest),
            Some(_) => {}
            None => tracing::debug!(frame = app.clock().frame_count(), "frame overran its budget"),
        }
    }

    app.teardown();
    Ok(())
}
