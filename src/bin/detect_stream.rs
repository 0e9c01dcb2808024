//! detect_stream - per-frame object detections from a local video as NDJSON
//!
//! stdout carries the protocol only; diagnostics go to stderr via `log`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use detect_stream::{prepare, CancelToken, DetectorCapability, StreamConfig, StreamEmitter};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file to stream. Without it the configured video directory is
    /// scanned for the first .mp4/.avi/.mov/.mkv/.webm.
    video: Option<PathBuf>,
    /// Seed for the simulated telemetry fields.
    #[arg(long)]
    seed: Option<u64>,
    /// Stop after this many frame records.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = StreamConfig::load()?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("error setting Ctrl-C handler")?;

    let capability = DetectorCapability::probe(&config.model_path, &config.detector);
    let startup = prepare(args.video.as_deref(), &config, capability);

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let stdout = std::io::stdout();
    let mut emitter = StreamEmitter::new(stdout.lock(), rng, &config);

    if let Some(mut pipeline) = emitter.start(startup)? {
        emitter.run(&mut pipeline, &cancel, args.max_frames)?;
    }
    emitter.into_inner().flush().context("flush stdout")?;
    Ok(())
}
