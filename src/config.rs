use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_VIDEO_DIR: &str = ".";
/// COCO class index for "person".
const DEFAULT_TARGET_CLASS: usize = 0;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_PREVIEW_MAX_WIDTH: u32 = 640;
/// Previews are never wider than this, whatever the config asks for.
pub const PREVIEW_WIDTH_LIMIT: u32 = 640;
const DEFAULT_JPEG_QUALITY: u8 = 85;
/// Reported on the first frame, before any inter-frame interval exists.
const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    model_path: Option<PathBuf>,
    video_dir: Option<PathBuf>,
    default_fps: Option<f64>,
    detector: Option<DetectorConfigFile>,
    preview: Option<PreviewConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    target_class: Option<usize>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PreviewConfigFile {
    max_width: Option<u32>,
    jpeg_quality: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub model_path: PathBuf,
    /// Directory scanned for a video when no path is given.
    pub video_dir: PathBuf,
    pub default_fps: f64,
    pub detector: DetectorSettings,
    pub preview: PreviewSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub target_class: usize,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Side of the square model input in pixels.
    pub input_size: u32,
}

#[derive(Debug, Clone)]
pub struct PreviewSettings {
    pub max_width: u32,
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            video_dir: PathBuf::from(DEFAULT_VIDEO_DIR),
            default_fps: DEFAULT_FPS,
            detector: DetectorSettings::default(),
            preview: PreviewSettings::default(),
        }
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            target_class: DEFAULT_TARGET_CLASS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_PREVIEW_MAX_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl StreamConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DETECT_STREAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: StreamConfigFile) -> Self {
        let defaults = Self::default();
        let detector = file.detector.unwrap_or_default();
        let preview = file.preview.unwrap_or_default();
        Self {
            model_path: file.model_path.unwrap_or(defaults.model_path),
            video_dir: file.video_dir.unwrap_or(defaults.video_dir),
            default_fps: file.default_fps.unwrap_or(defaults.default_fps),
            detector: DetectorSettings {
                target_class: detector
                    .target_class
                    .unwrap_or(defaults.detector.target_class),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(defaults.detector.confidence_threshold),
                iou_threshold: detector
                    .iou_threshold
                    .unwrap_or(defaults.detector.iou_threshold),
                input_size: detector.input_size.unwrap_or(defaults.detector.input_size),
            },
            preview: PreviewSettings {
                max_width: preview.max_width.unwrap_or(defaults.preview.max_width),
                jpeg_quality: preview
                    .jpeg_quality
                    .unwrap_or(defaults.preview.jpeg_quality),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("DETECT_STREAM_MODEL") {
            if !path.trim().is_empty() {
                self.model_path = PathBuf::from(path);
            }
        }
        if let Ok(dir) = std::env::var("DETECT_STREAM_VIDEO_DIR") {
            if !dir.trim().is_empty() {
                self.video_dir = PathBuf::from(dir);
            }
        }
        if let Ok(class) = std::env::var("DETECT_STREAM_TARGET_CLASS") {
            self.detector.target_class = class
                .trim()
                .parse()
                .map_err(|_| anyhow!("DETECT_STREAM_TARGET_CLASS must be a class index"))?;
        }
        if let Ok(threshold) = std::env::var("DETECT_STREAM_CONFIDENCE") {
            self.detector.confidence_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("DETECT_STREAM_CONFIDENCE must be a number in [0, 1]"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(anyhow!("iou_threshold must be within [0, 1]"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        if self.preview.max_width == 0 || self.preview.max_width > PREVIEW_WIDTH_LIMIT {
            return Err(anyhow!(
                "preview max_width must be within 1..={}",
                PREVIEW_WIDTH_LIMIT
            ));
        }
        if !(1..=100).contains(&self.preview.jpeg_quality) {
            return Err(anyhow!("preview jpeg_quality must be within 1..=100"));
        }
        if !(self.default_fps.is_finite() && self.default_fps > 0.0) {
            return Err(anyhow!("default_fps must be a positive number"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<StreamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
