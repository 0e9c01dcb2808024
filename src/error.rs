use std::path::PathBuf;

use thiserror::Error;

/// Why the stream fell back to a degraded record instead of streaming.
///
/// Every variant is recovered locally: the message becomes the `message`
/// field of the single degraded record and the process still exits
/// successfully.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Detector not available: {reason}")]
    DetectorUnavailable { reason: String },

    #[error(
        "No video file. Add a .mp4 (or .avi/.mov/.mkv/.webm) to {} for real detection.",
        dir.display()
    )]
    NoInputResolved { dir: PathBuf },

    #[error("Invalid video path: {}", path.display())]
    InvalidInputPath { path: PathBuf },

    #[error("Video file could not be opened. Check path and codec. ({reason})")]
    SourceUnavailable { path: PathBuf, reason: String },
}
