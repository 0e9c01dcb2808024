//! Wire records of the detection stream.
//!
//! The stream is newline-delimited JSON: one object per line, flushed as soon
//! as it is written. Two shapes exist, `FrameRecord` for each processed frame
//! and `DegradedRecord` for the single fallback message emitted when
//! detection cannot run.

use std::io::Write;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One detected object in unit-square coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Top-left corner, fraction of frame width.
    pub x: f64,
    /// Top-left corner, fraction of frame height.
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub confidence: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame: u64,
    pub boxes: Vec<Detection>,
    pub count: usize,
    pub fps: f64,
    pub latency_ms: f64,
    /// Simulated sensor temperature, not measured hardware state.
    pub temp_c: f64,
    /// Simulated stream-level confidence filler.
    pub confidence: f64,
    /// Base64 JPEG preview with overlays drawn.
    pub frame_jpeg: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DegradedRecord {
    pub simulated: bool,
    pub no_video: bool,
    pub message: String,
    pub frame: u64,
    pub boxes: Vec<Detection>,
    pub count: usize,
    pub fps: u32,
    pub latency_ms: u32,
    pub temp_c: u32,
    pub confidence: u32,
}

impl DegradedRecord {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            simulated: true,
            no_video: true,
            message: message.into(),
            frame: 0,
            boxes: Vec::new(),
            count: 0,
            fps: 0,
            latency_ms: 0,
            temp_c: 0,
            confidence: 0,
        }
    }
}

/// Serialize `record` as one line and flush it.
pub fn write_line<W: Write, T: Serialize>(out: &mut W, record: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, record).context("serialize stream record")?;
    out.write_all(b"\n").context("write stream record")?;
    out.flush().context("flush stream record")?;
    Ok(())
}
