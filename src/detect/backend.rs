use anyhow::Result;

use crate::detect::coords::NativeBox;
use crate::frame::Frame;

/// One backend detection slot: native box, class id, score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub bbox: NativeBox,
    pub class_id: u32,
    pub score: f64,
}

/// Raw backend output for a single frame: three parallel sequences indexed by
/// detection slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawOutput {
    /// `[y_min, x_min, y_max, x_max]`, normalized.
    pub boxes: Vec<[f64; 4]>,
    pub scores: Vec<f64>,
    pub classes: Vec<u32>,
}

impl RawOutput {
    pub fn from_detections(detections: &[RawDetection]) -> Self {
        Self {
            boxes: detections.iter().map(|d| d.bbox.0).collect(),
            scores: detections.iter().map(|d| d.score).collect(),
            classes: detections.iter().map(|d| d.class_id).collect(),
        }
    }

    /// True when the three sequences have the same length.
    pub fn is_consistent(&self) -> bool {
        self.boxes.len() == self.scores.len() && self.scores.len() == self.classes.len()
    }

    /// Zip the parallel sequences into detection slots.
    ///
    /// Extra entries in a longer sequence are dropped.
    pub fn into_detections(self) -> Vec<RawDetection> {
        self.boxes
            .into_iter()
            .zip(self.scores)
            .zip(self.classes)
            .map(|((bbox, score), class_id)| RawDetection {
                bbox: NativeBox(bbox),
                class_id,
                score,
            })
            .collect()
    }
}

/// Detection backend: an opaque scoring function over a single frame.
///
/// `infer` takes `&mut self`, so a backend is never invoked concurrently.
/// Implementations must not hold on to the frame beyond the call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on one frame (batch size 1).
    fn infer(&mut self, frame: &Frame) -> Result<RawOutput>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_detections_zips_slots_in_order() {
        let output = RawOutput {
            boxes: vec![[0.1, 0.2, 0.4, 0.5], [0.0, 0.0, 1.0, 1.0]],
            scores: vec![0.92, 0.99],
            classes: vec![1, 3],
        };
        assert!(output.is_consistent());

        let detections = output.into_detections();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].class_id, 1);
        assert_eq!(detections[1].score, 0.99);
        assert_eq!(detections[1].bbox, NativeBox::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn mismatched_lengths_truncate_to_shortest() {
        let output = RawOutput {
            boxes: vec![[0.0, 0.0, 0.5, 0.5]; 3],
            scores: vec![0.5, 0.6],
            classes: vec![1, 2, 2],
        };
        assert!(!output.is_consistent());
        assert_eq!(output.into_detections().len(), 2);
    }
}
