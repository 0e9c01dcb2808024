#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use fast_image_resize as fr;
use tract_onnx::prelude::*;

use crate::config::DetectorSettings;
use crate::detect::backend::Detector;
use crate::detect::result::{nms, PixelBox};
use crate::frame::Frame;

/// YOLOv8 detector running an exported ONNX model through tract.
///
/// The frame is stretched to the square model input (no letterbox) and the
/// `[1, 4 + classes, proposals]` output is decoded back into frame pixels.
/// Only proposals whose best class is the configured target survive, then
/// greedy NMS removes duplicates.
pub struct YoloBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    target_class: usize,
    confidence_threshold: f32,
    iou_threshold: f32,
    resizer: fr::Resizer,
    resize_buf: Vec<u8>,
}

impl YoloBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(model_path: P, settings: &DetectorSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = settings.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size: settings.input_size,
            target_class: settings.target_class,
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            resizer: fr::Resizer::new(),
            resize_buf: Vec::new(),
        })
    }

    fn build_input(&mut self, frame: &Frame) -> Result<Tensor> {
        let size = self.input_size;
        let src = fr::images::ImageRef::new(
            frame.width,
            frame.height,
            frame.pixels(),
            fr::PixelType::U8x3,
        )
        .context("failed to wrap frame for model resize")?;

        let len = (size as usize) * (size as usize) * 3;
        let mut buf = std::mem::take(&mut self.resize_buf);
        buf.resize(len, 0);
        let mut dst = fr::images::Image::from_vec_u8(size, size, buf, fr::PixelType::U8x3)
            .context("failed to create model input buffer")?;

        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
        self.resizer
            .resize(&src, &mut dst, Some(&options))
            .context("failed to resize frame to model input")?;
        self.resize_buf = dst.into_vec();

        let pixels = &self.resize_buf;
        let side = size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            pixels[(y * side + x) * 3 + c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<PixelBox>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("expected a [1, 4 + classes, proposals] output")?;

        let attributes = view.shape()[1];
        let proposals = view.shape()[2];
        if attributes <= 4 + self.target_class {
            return Err(anyhow!(
                "model reports {} classes; target class {} is out of range",
                attributes.saturating_sub(4),
                self.target_class
            ));
        }

        let scale_x = frame.width as f32 / self.input_size as f32;
        let scale_y = frame.height as f32 / self.input_size as f32;
        let max_x = frame.width as f32;
        let max_y = frame.height as f32;

        let mut candidates = Vec::new();
        for i in 0..proposals {
            let score = view[[0, 4 + self.target_class, i]];
            if score < self.confidence_threshold {
                continue;
            }
            let best = (4..attributes)
                .map(|row| view[[0, row, i]])
                .fold(f32::NEG_INFINITY, f32::max);
            if score < best {
                continue;
            }

            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];
            candidates.push(PixelBox {
                x1: ((cx - w / 2.0) * scale_x).clamp(0.0, max_x),
                y1: ((cy - h / 2.0) * scale_y).clamp(0.0, max_y),
                x2: ((cx + w / 2.0) * scale_x).clamp(0.0, max_x),
                y2: ((cy + h / 2.0) * scale_y).clamp(0.0, max_y),
                confidence: score,
            });
        }

        Ok(nms(candidates, self.iou_threshold))
    }
}

impl Detector for YoloBackend {
    fn name(&self) -> &'static str {
        "yolov8-tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<PixelBox>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::filled(self.input_size, self.input_size, [114, 114, 114]);
        self.detect(&blank).map(|_| ())
    }
}
