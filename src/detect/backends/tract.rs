#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectorBackend, RawOutput};
use crate::frame::Frame;

/// Output tensors of an exported SSD-style detection graph, in the order
/// boxes, scores, classes.
pub const DEFAULT_OUTPUT_NAMES: [&str; 3] = [
    "detection_boxes:0",
    "detection_scores:0",
    "detection_classes:0",
];

/// Tract-based backend for ONNX detection graphs.
///
/// The graph takes a `uint8 [1, H, W, 3]` image and yields boxes
/// `[1, N, 4]` as `[y1, x1, y2, x2]`, scores `[1, N]` and classes `[1, N]`.
/// Tract executes on the CPU only. Frames whose size differs from the model
/// input are resized first; normalized box coordinates are unaffected.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let mut model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?;

        if let Err(err) = model.set_output_names(DEFAULT_OUTPUT_NAMES) {
            log::warn!(
                "TractBackend: {} lacks named detection outputs ({}); using graph output order",
                model_path.display(),
                err
            );
        }

        let model = model
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    u8::datum_type(),
                    tvec!(1, height as usize, width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input)",
            model_path.display(),
            width,
            height
        );

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let frame = frame.resized(self.width, self.height);
        let pixels = frame.pixels();
        let width = self.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, self.height as usize, width, 3),
            |(_, y, x, channel)| pixels[(y * width + x) * 3 + channel],
        );
        input.into_tensor()
    }

    fn extract(outputs: TVec<TValue>) -> Result<RawOutput> {
        if outputs.len() < 3 {
            return Err(anyhow!(
                "detection graph produced {} outputs, expected boxes, scores and classes",
                outputs.len()
            ));
        }
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("box tensor was not f32")?;
        let scores = outputs[1]
            .to_array_view::<f32>()
            .context("score tensor was not f32")?;
        let classes = outputs[2]
            .to_array_view::<f32>()
            .context("class tensor was not f32")?;

        let box_values: Vec<f64> = boxes.iter().map(|v| *v as f64).collect();
        if box_values.len() % 4 != 0 {
            return Err(anyhow!(
                "box tensor length {} is not a multiple of 4",
                box_values.len()
            ));
        }

        Ok(RawOutput {
            boxes: box_values
                .chunks_exact(4)
                .map(|b| [b[0], b[1], b[2], b[3]])
                .collect(),
            scores: scores.iter().map(|s| *s as f64).collect(),
            classes: classes.iter().map(|c| c.round().max(0.0) as u32).collect(),
        })
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame) -> Result<RawOutput> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        Self::extract(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::from_rgb(
            vec![0u8; (self.width as usize) * (self.height as usize) * 3],
            self.width,
            self.height,
        )?;
        self.infer(&blank).map(|_| ())
    }
}
