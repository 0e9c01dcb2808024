//! Stream emitter: the startup/streaming state machine behind the NDJSON
//! protocol.
//!
//! Startup either yields a [`Pipeline`] (resolved video + opened source +
//! available detector) or a single [`DegradedRecord`]. Once streaming, every
//! iteration reads one frame, rewinding at end-of-stream, runs detection,
//! normalizes the boxes, renders the preview and writes exactly one flushed
//! line. Nothing but external cancellation (or a frame cap) ends the loop.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use rand::Rng;

use crate::config::StreamConfig;
use crate::detect::{Detector, DetectorCapability};
use crate::error::StartupError;
use crate::frame::Frame;
use crate::ingest::{FileSource, VideoSource};
use crate::normalize::{normalize, round_to};
use crate::preview::PreviewCompositor;
use crate::record::{write_line, DegradedRecord, Detection, FrameRecord};
use crate::resolve::resolve_input;
use crate::telemetry::Telemetry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Startup,
    Streaming,
    DegradedDone,
}

/// Shared stop flag, polled between iterations.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a streaming run needs, acquired at startup.
pub struct Pipeline {
    pub source: Box<dyn VideoSource>,
    pub detector: Box<dyn Detector>,
    pub video_path: PathBuf,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn VideoSource>,
        detector: Box<dyn Detector>,
        video_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            detector,
            video_path: video_path.into(),
        }
    }
}

/// Acquire the pipeline: detector first, then input resolution, then the
/// decoder. The first failure decides the degraded message.
pub fn prepare(
    explicit: Option<&Path>,
    config: &StreamConfig,
    capability: DetectorCapability,
) -> Result<Pipeline, StartupError> {
    let detector = match capability {
        DetectorCapability::Available(detector) => detector,
        DetectorCapability::Unavailable(reason) => {
            return Err(StartupError::DetectorUnavailable { reason })
        }
    };

    let video_path = resolve_input(explicit, &config.video_dir)?;
    let source = FileSource::open(&video_path).map_err(|e| StartupError::SourceUnavailable {
        path: video_path.clone(),
        reason: format!("{:#}", e),
    })?;
    log::debug!(
        "opened {} with {} decoder",
        source.path().display(),
        source.strategy()
    );

    Ok(Pipeline::new(Box::new(source), detector, video_path))
}

pub struct StreamEmitter<W: Write, R: Rng> {
    out: W,
    telemetry: Telemetry<R>,
    compositor: PreviewCompositor,
    default_fps: f64,
    frame_index: u64,
    last_iteration_start: Option<Instant>,
    state: StreamState,
}

impl<W: Write, R: Rng> StreamEmitter<W, R> {
    pub fn new(out: W, rng: R, config: &StreamConfig) -> Self {
        Self {
            out,
            telemetry: Telemetry::new(rng),
            compositor: PreviewCompositor::new(config.preview.clone()),
            default_fps: config.default_fps,
            frame_index: 0,
            last_iteration_start: None,
            state: StreamState::Startup,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frame_index
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Leave `Startup`. A startup failure is written as the degraded record
    /// and `None` is returned; otherwise the pipeline is handed back for
    /// [`run`](Self::run).
    pub fn start(
        &mut self,
        startup: Result<Pipeline, StartupError>,
    ) -> Result<Option<Pipeline>> {
        if self.state != StreamState::Startup {
            return Err(anyhow!("stream already started ({:?})", self.state));
        }
        match startup {
            Ok(pipeline) => {
                log::info!("detector starting on: {}", pipeline.video_path.display());
                self.state = StreamState::Streaming;
                Ok(Some(pipeline))
            }
            Err(err) => {
                self.emit_degraded(&err)?;
                Ok(None)
            }
        }
    }

    /// Write the single degraded record and finish.
    pub fn emit_degraded(&mut self, err: &StartupError) -> Result<()> {
        if self.state != StreamState::Startup {
            return Err(anyhow!("degraded record only valid at startup"));
        }
        log::warn!("{}", err);
        write_line(&mut self.out, &DegradedRecord::new(err.to_string()))?;
        self.state = StreamState::DegradedDone;
        Ok(())
    }

    /// Stream until `cancel` is set or `max_frames` records were written.
    pub fn run(
        &mut self,
        pipeline: &mut Pipeline,
        cancel: &CancelToken,
        max_frames: Option<u64>,
    ) -> Result<()> {
        if self.state != StreamState::Streaming {
            return Err(anyhow!("cannot stream from {:?}", self.state));
        }
        while !cancel.is_cancelled() {
            if max_frames.is_some_and(|max| self.frame_index >= max) {
                log::info!("frame limit reached after {} frames", self.frame_index);
                break;
            }
            self.step(pipeline.source.as_mut(), pipeline.detector.as_mut())?;
        }
        if cancel.is_cancelled() {
            log::info!("stream cancelled after {} frames", self.frame_index);
        }
        Ok(())
    }

    /// One streaming iteration; writes and returns its record.
    pub fn step(
        &mut self,
        source: &mut dyn VideoSource,
        detector: &mut dyn Detector,
    ) -> Result<FrameRecord> {
        let started = Instant::now();
        let fps = self.fps_since_last(started);

        let frame = next_frame(source)?;

        let detect_start = Instant::now();
        let pixel_boxes = detector
            .detect(&frame)
            .with_context(|| format!("{} failed on frame {}", detector.name(), self.frame_index))?;
        let latency_ms = round_to(detect_start.elapsed().as_secs_f64() * 1000.0, 1);

        let boxes: Vec<Detection> = pixel_boxes
            .iter()
            .map(|bbox| normalize(bbox, frame.width, frame.height))
            .collect();
        let sample = self.telemetry.sample();
        let frame_jpeg = self
            .compositor
            .compose(&frame, &boxes)
            .with_context(|| format!("preview for frame {}", self.frame_index))?;

        let record = FrameRecord {
            frame: self.frame_index,
            count: boxes.len(),
            boxes,
            fps,
            latency_ms,
            temp_c: sample.temp_c,
            confidence: sample.confidence,
            frame_jpeg,
        };
        write_line(&mut self.out, &record)?;
        self.frame_index += 1;
        Ok(record)
    }

    fn fps_since_last(&mut self, now: Instant) -> f64 {
        let fps = match self.last_iteration_start.replace(now) {
            Some(prev) => {
                let secs = now.duration_since(prev).as_secs_f64();
                if secs > 0.0 {
                    round_to(1.0 / secs, 1)
                } else {
                    self.default_fps
                }
            }
            None => self.default_fps,
        };
        if fps.is_finite() {
            fps
        } else {
            self.default_fps
        }
    }
}

/// Read a frame, rewinding once at end-of-stream.
fn next_frame(source: &mut dyn VideoSource) -> Result<Frame> {
    if let Some(frame) = source.read()? {
        return Ok(frame);
    }
    log::debug!("{}: end of stream, rewinding", source.name());
    source.rewind()?;
    source
        .read()?
        .ok_or_else(|| anyhow!("{} yielded no frames after rewind", source.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::PixelBox;
    use crate::ingest::MemorySource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct FixedDetector(Vec<PixelBox>);

    impl Detector for FixedDetector {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&mut self, _frame: &Frame) -> Result<Vec<PixelBox>> {
            Ok(self.0.clone())
        }
    }

    fn emitter() -> StreamEmitter<Vec<u8>, StdRng> {
        StreamEmitter::new(Vec::new(), StdRng::seed_from_u64(1), &StreamConfig::default())
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn rewinds_at_end_of_stream() -> Result<()> {
        let mut source = MemorySource::new(vec![
            Frame::filled(4, 4, [1, 1, 1]),
            Frame::filled(4, 4, [2, 2, 2]),
        ]);
        let first = next_frame(&mut source)?;
        next_frame(&mut source)?;
        let looped = next_frame(&mut source)?;
        assert_eq!(first.pixels(), looped.pixels());
        Ok(())
    }

    #[test]
    fn empty_source_is_an_error() {
        let mut source = MemorySource::new(Vec::new());
        assert!(next_frame(&mut source).is_err());
    }

    #[test]
    fn step_counts_and_reports_default_fps_first() -> Result<()> {
        let mut emitter = emitter();
        let mut pipeline = emitter
            .start(Ok(Pipeline::new(
                Box::new(MemorySource::new(vec![Frame::filled(8, 8, [0, 0, 0])])),
                Box::new(FixedDetector(Vec::new())),
                "memory",
            )))?
            .context("pipeline")?;
        assert_eq!(emitter.state(), StreamState::Streaming);

        let first = emitter.step(pipeline.source.as_mut(), pipeline.detector.as_mut())?;
        let second = emitter.step(pipeline.source.as_mut(), pipeline.detector.as_mut())?;
        assert_eq!(first.frame, 0);
        assert_eq!(first.fps, 30.0);
        assert_eq!(second.frame, 1);
        assert!(second.fps.is_finite() && second.fps > 0.0);
        assert!(first.boxes.is_empty());
        assert_eq!(first.count, 0);
        assert_eq!(emitter.frames_emitted(), 2);

        let text = String::from_utf8(emitter.into_inner())?;
        assert_eq!(text.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn degraded_only_from_startup() -> Result<()> {
        let mut emitter = emitter();
        let err = StartupError::DetectorUnavailable {
            reason: "missing".into(),
        };
        emitter.emit_degraded(&err)?;
        assert_eq!(emitter.state(), StreamState::DegradedDone);
        assert!(emitter.emit_degraded(&err).is_err());
        Ok(())
    }

    #[test]
    fn run_requires_streaming_state() {
        let mut emitter = emitter();
        let mut pipeline = Pipeline::new(
            Box::new(MemorySource::new(Vec::new())),
            Box::new(FixedDetector(Vec::new())),
            "memory",
        );
        assert!(emitter
            .run(&mut pipeline, &CancelToken::new(), Some(1))
            .is_err());
    }

    #[test]
    fn unavailable_detector_wins_over_missing_video() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = StreamConfig {
            video_dir: dir.path().to_path_buf(),
            ..StreamConfig::default()
        };
        let result = prepare(
            Some(Path::new("/definitely/not/here.mp4")),
            &config,
            DetectorCapability::Unavailable("no model".into()),
        );
        assert!(matches!(
            result,
            Err(StartupError::DetectorUnavailable { .. })
        ));
    }
}
