mod backend;
mod backends;
mod result;

pub use backend::{Detector, DetectorCapability};
#[cfg(feature = "backend-tract")]
pub use backends::YoloBackend;
pub use result::{nms, PixelBox};
