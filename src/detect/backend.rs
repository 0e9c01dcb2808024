use std::path::Path;

use anyhow::Result;

use crate::config::DetectorSettings;
use crate::detect::result::PixelBox;
use crate::frame::Frame;

/// Object detector restricted to a single target class.
///
/// Implementations receive the decoded frame by reference and return boxes in
/// absolute pixel corners of that frame. An empty vector means "nothing
/// detected"; it never stands in for "detector missing", which is reported
/// once at startup through `DetectorCapability`.
pub trait Detector {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run class-restricted inference on one frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<PixelBox>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Outcome of the startup capability check.
pub enum DetectorCapability {
    Available(Box<dyn Detector>),
    Unavailable(String),
}

impl DetectorCapability {
    /// Check, once, whether a detector can run with this build and model.
    pub fn probe(model_path: &Path, settings: &DetectorSettings) -> Self {
        #[cfg(feature = "backend-tract")]
        {
            if !model_path.is_file() {
                return Self::Unavailable(format!(
                    "model weights not found at {}",
                    model_path.display()
                ));
            }
            match crate::detect::backends::YoloBackend::load(model_path, settings) {
                Ok(mut backend) => {
                    if let Err(e) = backend.warm_up() {
                        return Self::Unavailable(format!("detector warm-up failed: {:#}", e));
                    }
                    Self::Available(Box::new(backend))
                }
                Err(e) => Self::Unavailable(format!("{:#}", e)),
            }
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            let _ = settings;
            Self::Unavailable(format!(
                "detector support not compiled in (rebuild with --features backend-tract and provide {})",
                model_path.display()
            ))
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl std::fmt::Debug for DetectorCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(detector) => f.debug_tuple("Available").field(&detector.name()).finish(),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}
