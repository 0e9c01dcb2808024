//! Simulated per-frame telemetry.
//!
//! `temp_c` and the stream-level `confidence` are filler values drawn
//! independently each frame from fixed bands. Nothing here reads hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::normalize::round_to;

const TEMP_BASE_C: f64 = 42.0;
const TEMP_SPAN_C: f64 = 8.0;
const CONFIDENCE_BASE: f64 = 0.92;
const CONFIDENCE_SPAN: f64 = 0.06;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TelemetrySample {
    pub temp_c: f64,
    pub confidence: f64,
}

/// Telemetry generator over an injectable RNG.
pub struct Telemetry<R> {
    rng: R,
}

impl<R: Rng> Telemetry<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn sample(&mut self) -> TelemetrySample {
        let temp_c = TEMP_BASE_C + self.rng.gen::<f64>() * TEMP_SPAN_C;
        let confidence = CONFIDENCE_BASE + self.rng.gen::<f64>() * CONFIDENCE_SPAN;
        TelemetrySample {
            temp_c: round_to(temp_c, 1),
            confidence: round_to(confidence, 3),
        }
    }
}

impl Telemetry<StdRng> {
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}
