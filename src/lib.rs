//! Detect Stream
//!
//! Streams single-class object detections from a local video file as
//! newline-delimited JSON on stdout, one record per decoded frame, with a
//! JPEG preview of each annotated frame embedded in the record.
//!
//! # Module Structure
//!
//! - `ingest`: Video sources (FFmpeg/GStreamer file decoding, in-memory)
//! - `detect`: Detector contract, capability probe, YOLO backend
//! - `normalize`: Pixel boxes to unit-square detections
//! - `preview`: Overlay drawing, downscale, JPEG + base64
//! - `stream`: Startup/streaming state machine and the NDJSON writer loop
//! - `resolve`: Which video to open
//!
//! If detection cannot run at all, the stream consists of one degraded
//! record explaining why, and the process exits cleanly.

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod normalize;
pub mod preview;
pub mod record;
pub mod resolve;
pub mod stream;
pub mod telemetry;

pub use config::{DetectorSettings, PreviewSettings, StreamConfig};
pub use detect::{Detector, DetectorCapability, PixelBox};
pub use error::StartupError;
pub use frame::Frame;
pub use ingest::{FileSource, MemorySource, VideoSource};
pub use preview::PreviewCompositor;
pub use record::{DegradedRecord, Detection, FrameRecord};
pub use stream::{prepare, CancelToken, Pipeline, StreamEmitter, StreamState};
pub use telemetry::Telemetry;
