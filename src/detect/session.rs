use anyhow::{anyhow, Result};

use crate::config::PipelineConfig;
use crate::detect::backend::{DetectorBackend, RawDetection};
use crate::detect::backends::StubBackend;
use crate::detect::filter::DetectionFilter;
use crate::detect::result::{build_result, FrameOutcome};
use crate::frame::Frame;

/// Owns one loaded detection backend and runs it one frame at a time.
///
/// Constructed once at startup and passed to whoever drives the frames.
/// Model weights are loaded by the backend constructor and never reloaded;
/// dropping the session releases them.
pub struct DetectorSession {
    backend: Box<dyn DetectorBackend>,
    filter: DetectionFilter,
}

impl DetectorSession {
    pub fn new(backend: Box<dyn DetectorBackend>, filter: DetectionFilter) -> Self {
        Self { backend, filter }
    }

    /// Build the backend named by `config.model_path`.
    ///
    /// `stub://...` selects the stub backend. Anything else is an ONNX model
    /// file and needs the `backend-tract` feature. Load failures are fatal.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        if config.force_cpu {
            log::info!("DetectorSession: CPU-only execution forced");
        }

        let backend: Box<dyn DetectorBackend> = if config.model_path.starts_with("stub://") {
            log::warn!(
                "DetectorSession: using stub backend for {}; no real detections will be produced",
                config.model_path
            );
            Box::new(StubBackend::new())
        } else {
            load_model_backend(config)?
        };

        let mut session = Self::new(backend, config.detection_filter());
        session.backend.warm_up()?;
        log::info!(
            "DetectorSession: backend '{}' ready (output threshold {})",
            session.backend.name(),
            session.filter.output_threshold()
        );
        Ok(session)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn filter(&self) -> &DetectionFilter {
        &self.filter
    }

    /// Run the backend on one frame and zip its output into detection slots.
    pub fn infer(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let output = self.backend.infer(frame)?;
        if !output.is_consistent() {
            log::warn!(
                "backend '{}' returned mismatched output lengths (boxes={}, scores={}, classes={})",
                self.backend.name(),
                output.boxes.len(),
                output.scores.len(),
                output.classes.len()
            );
        }
        Ok(output.into_detections())
    }

    /// Infer, filter and build the result for one frame. Never fails.
    pub fn detect(&mut self, source_id: &str, frame: &Frame) -> FrameOutcome {
        let raw = self.infer(frame);
        build_result(source_id, raw, &self.filter)
    }
}

#[cfg(feature = "backend-tract")]
fn load_model_backend(config: &PipelineConfig) -> Result<Box<dyn DetectorBackend>> {
    use anyhow::Context;

    let path = std::path::Path::new(&config.model_path);
    if !path.is_file() {
        return Err(anyhow!("model file {} not found", path.display()));
    }
    let backend = crate::detect::backends::TractBackend::new(
        path,
        config.model_input.width,
        config.model_input.height,
    )
    .with_context(|| format!("failed to load detector from {}", path.display()))?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_model_backend(config: &PipelineConfig) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "loading model {} requires the backend-tract feature",
        config.model_path
    ))
}
