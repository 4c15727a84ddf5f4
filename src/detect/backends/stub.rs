use anyhow::Result;

use crate::detect::backend::{DetectorBackend, RawOutput};
use crate::frame::Frame;

/// Stub backend for `stub://` model paths and tests.
///
/// Returns the same raw output for every frame. The default output is empty,
/// so a hub running on the stub logs zero detections per frame.
#[derive(Clone, Debug, Default)]
pub struct StubBackend {
    output: RawOutput,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every frame with `output`.
    pub fn with_output(output: RawOutput) -> Self {
        Self { output }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, _frame: &Frame) -> Result<RawOutput> {
        Ok(self.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_repeats_output() -> Result<()> {
        let output = RawOutput {
            boxes: vec![[0.1, 0.1, 0.2, 0.2]],
            scores: vec![0.5],
            classes: vec![1],
        };
        let mut backend = StubBackend::with_output(output.clone());
        let frame = Frame::from_rgb(vec![0u8; 12], 2, 2)?;

        assert_eq!(backend.infer(&frame)?, output);
        assert_eq!(backend.infer(&frame)?, output);
        assert_eq!(StubBackend::new().infer(&frame)?, RawOutput::default());
        Ok(())
    }
}
