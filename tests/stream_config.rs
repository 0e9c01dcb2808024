use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use detect_stream::config::StreamConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DETECT_STREAM_CONFIG",
        "DETECT_STREAM_MODEL",
        "DETECT_STREAM_VIDEO_DIR",
        "DETECT_STREAM_TARGET_CLASS",
        "DETECT_STREAM_CONFIDENCE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model_path": "/models/yolov8s.onnx",
        "video_dir": "/srv/clips",
        "default_fps": 25.0,
        "detector": {
            "target_class": 2,
            "confidence_threshold": 0.4,
            "iou_threshold": 0.5,
            "input_size": 320
        },
        "preview": {
            "max_width": 480,
            "jpeg_quality": 70
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("DETECT_STREAM_CONFIG", file.path());
    std::env::set_var("DETECT_STREAM_VIDEO_DIR", "/tmp/videos");
    std::env::set_var("DETECT_STREAM_CONFIDENCE", "0.6");

    let cfg = StreamConfig::load().expect("load config");

    assert_eq!(cfg.model_path, PathBuf::from("/models/yolov8s.onnx"));
    assert_eq!(cfg.video_dir, PathBuf::from("/tmp/videos"));
    assert_eq!(cfg.default_fps, 25.0);
    assert_eq!(cfg.detector.target_class, 2);
    assert_eq!(cfg.detector.confidence_threshold, 0.6);
    assert_eq!(cfg.detector.iou_threshold, 0.5);
    assert_eq!(cfg.detector.input_size, 320);
    assert_eq!(cfg.preview.max_width, 480);
    assert_eq!(cfg.preview.jpeg_quality, 70);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let cfg = StreamConfig::load().expect("load defaults");
    assert_eq!(cfg.model_path, PathBuf::from("yolov8n.onnx"));
    assert_eq!(cfg.video_dir, PathBuf::from("."));
    assert_eq!(cfg.default_fps, 30.0);
    assert_eq!(cfg.detector.target_class, 0);
    assert_eq!(cfg.preview.max_width, 640);
    assert_eq!(cfg.preview.jpeg_quality, 85);
}

#[test]
fn rejects_invalid_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("DETECT_STREAM_CONFIDENCE", "1.5");
    assert!(StreamConfig::load().is_err());

    std::env::set_var("DETECT_STREAM_CONFIDENCE", "high");
    assert!(StreamConfig::load().is_err());

    clear_env();
    std::env::set_var("DETECT_STREAM_TARGET_CLASS", "-1");
    assert!(StreamConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_preview_wider_than_limit() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ \"preview\": { \"max_width\": 1920 } }")
        .expect("write config");
    std::env::set_var("DETECT_STREAM_CONFIG", file.path());
    assert!(StreamConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ \"preview\": { \"jpeg_quality\": 0 } }")
        .expect("write config");
    std::env::set_var("DETECT_STREAM_CONFIG", file.path());
    assert!(StreamConfig::load().is_err());

    std::io::Write::write_all(&mut file, b"not json").expect("append garbage");
    assert!(StreamConfig::load().is_err());

    clear_env();
}
