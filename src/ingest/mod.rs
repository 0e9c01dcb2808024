//! Frame ingestion sources.
//!
//! This module provides the sources the stream loop pulls frames from:
//! - Local video files, decoded by FFmpeg (feature: ingest-file-ffmpeg) with a
//!   GStreamer `decodebin` fallback (feature: ingest-file-gstreamer)
//! - In-memory frame sequences (tests, embedding)
//!
//! All sources produce packed RGB24 `Frame`s, signal end-of-stream with
//! `Ok(None)`, and can be rewound to their first frame.
//!
//! The ingestion layer MUST NOT:
//! - Fetch remote URLs
//! - Write decoded frames to disk

use anyhow::Result;

use crate::frame::Frame;

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-file-gstreamer")]
pub(crate) mod file_gstreamer;
pub mod memory;

pub use file::{FileSource, OpenStrategy};
pub use memory::MemorySource;

/// A finite, rewindable sequence of decoded frames.
pub trait VideoSource {
    /// Backend identifier for logs.
    fn name(&self) -> &'static str;

    /// Decode the next frame. `Ok(None)` signals end-of-stream.
    fn read(&mut self) -> Result<Option<Frame>>;

    /// Seek back to the first frame.
    fn rewind(&mut self) -> Result<()>;
}
