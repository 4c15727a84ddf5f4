use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::detect::backend::RawDetection;
use crate::detect::category::Category;
use crate::detect::coords::{truncate_float, CanonicalBox, CONF_DIGITS};
use crate::detect::filter::DetectionFilter;

/// One detection that survived filtering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub category: Category,
    /// Truncated to three decimal places.
    #[serde(rename = "conf")]
    pub confidence: f64,
    pub bbox: CanonicalBox,
}

/// Why a frame produced no detections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The detection backend raised while scoring the frame.
    #[serde(rename = "Failure inference")]
    Inference,
    /// The frame could not be decoded or accessed before inference.
    #[serde(rename = "Failure image access")]
    ImageAccess,
}

impl FailureKind {
    pub fn tag(self) -> &'static str {
        match self {
            FailureKind::Inference => "Failure inference",
            FailureKind::ImageAccess => "Failure image access",
        }
    }
}

/// Per-frame detection result.
///
/// Exactly one of the two shapes is populated: `detections` and
/// `max_detection_conf` on success, `failure` alone on failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Identifies the frame or its source.
    #[serde(rename = "file")]
    pub source_id: String,
    #[serde(rename = "max_detection_conf", skip_serializing_if = "Option::is_none")]
    pub max_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<Detection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl DetectionResult {
    pub fn success(source_id: impl Into<String>, detections: Vec<Detection>, max: f64) -> Self {
        Self {
            source_id: source_id.into(),
            max_confidence: Some(truncate_float(max, CONF_DIGITS)),
            detections: Some(detections),
            failure: None,
        }
    }

    pub fn failure(source_id: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            source_id: source_id.into(),
            max_confidence: None,
            detections: None,
            failure: Some(kind),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Detections, empty on the failure path.
    pub fn detections(&self) -> &[Detection] {
        self.detections.as_deref().unwrap_or(&[])
    }

    /// Max confidence, `0.0` when there were no detections or the frame failed.
    pub fn max_confidence(&self) -> f64 {
        self.max_confidence.unwrap_or(0.0)
    }
}

/// A built result plus the alert-side flag computed alongside it.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameOutcome {
    pub result: DetectionResult,
    pub animal_present: bool,
}

impl FrameOutcome {
    pub fn failure(source_id: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            result: DetectionResult::failure(source_id, kind),
            animal_present: false,
        }
    }
}

/// Assemble the result for one frame.
///
/// Inference errors are logged and turned into a failure result; they never
/// propagate past this point.
pub fn build_result(
    source_id: &str,
    raw: Result<Vec<RawDetection>>,
    filter: &DetectionFilter,
) -> FrameOutcome {
    match raw {
        Ok(raw) => {
            let outcome = filter.apply(&raw);
            FrameOutcome {
                result: DetectionResult::success(
                    source_id,
                    outcome.detections,
                    outcome.max_confidence,
                ),
                animal_present: outcome.animal_present,
            }
        }
        Err(err) => {
            log::warn!("frame {} failed during inference: {:#}", source_id, err);
            FrameOutcome::failure(source_id, FailureKind::Inference)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::coords::NativeBox;
    use anyhow::anyhow;

    fn example_raw() -> Vec<RawDetection> {
        vec![
            RawDetection {
                bbox: NativeBox::new(0.1, 0.2, 0.4, 0.5),
                class_id: 1,
                score: 0.92,
            },
            RawDetection {
                bbox: NativeBox::new(0.0, 0.0, 1.0, 1.0),
                class_id: 3,
                score: 0.99,
            },
        ]
    }

    #[test]
    fn success_path_has_no_failure() {
        let outcome = build_result("cam-1", Ok(example_raw()), &DetectionFilter::default());
        assert!(!outcome.result.is_failure());
        assert_eq!(outcome.result.source_id, "cam-1");
        assert_eq!(outcome.result.detections().len(), 1);
        assert_eq!(outcome.result.max_confidence(), 0.92);
        assert!(outcome.animal_present);
    }

    #[test]
    fn empty_frame_reports_zero_max() {
        let outcome = build_result("cam-1", Ok(Vec::new()), &DetectionFilter::default());
        assert_eq!(outcome.result.max_confidence, Some(0.0));
        assert_eq!(outcome.result.detections, Some(Vec::new()));
        assert!(!outcome.animal_present);
    }

    #[test]
    fn errors_become_failure_results() {
        let outcome = build_result(
            "cam-1",
            Err(anyhow!("backend exploded")),
            &DetectionFilter::default(),
        );
        assert_eq!(outcome.result.failure, Some(FailureKind::Inference));
        assert!(outcome.result.detections.is_none());
        assert!(outcome.result.max_confidence.is_none());
        assert!(outcome.result.detections().is_empty());
        assert!(!outcome.animal_present);
    }

    #[test]
    fn json_shape_matches_output_format() -> Result<()> {
        let outcome = build_result("cam-1", Ok(example_raw()), &DetectionFilter::default());
        let value = serde_json::to_value(&outcome.result)?;
        assert_eq!(
            value,
            serde_json::json!({
                "file": "cam-1",
                "max_detection_conf": 0.92,
                "detections": [
                    {"category": "1", "conf": 0.92, "bbox": [0.2, 0.1, 0.3, 0.3]}
                ]
            })
        );

        let failed = DetectionResult::failure("cam-2", FailureKind::ImageAccess);
        assert_eq!(
            serde_json::to_value(&failed)?,
            serde_json::json!({"file": "cam-2", "failure": "Failure image access"})
        );
        Ok(())
    }
}
