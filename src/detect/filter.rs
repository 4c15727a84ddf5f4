//! Confidence filtering.
//!
//! Turns raw backend slots into output detections. Three things happen here:
//! the excluded category is dropped outright, everything at or below the
//! output threshold is dropped from the list, and the animal-present flag is
//! computed for the alert path.

use crate::detect::backend::RawDetection;
use crate::detect::category::Category;
use crate::detect::coords::{truncate_float, CONF_DIGITS};
use crate::detect::result::Detection;

/// Minimum confidence (exclusive) for a detection to appear in a result.
pub const DEFAULT_OUTPUT_CONFIDENCE_THRESHOLD: f64 = 0.1;

/// Category that never reaches the output, whatever its score.
pub const EXCLUDED_CATEGORY: Category = Category::Vehicle;

/// How the animal-present flag relates to the output threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AnimalFlagPolicy {
    /// Any non-excluded raw slot with the animal class sets the flag, even
    /// when its score is below the output threshold.
    #[default]
    AnyRawSlot,
    /// Only detections that made it into the output list set the flag.
    IncludedOnly,
}

/// Result of filtering one frame's raw detections.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterOutcome {
    pub detections: Vec<Detection>,
    /// Highest score among included detections (untruncated), `0.0` if none.
    pub max_confidence: f64,
    pub animal_present: bool,
}

/// Output-threshold filter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionFilter {
    output_threshold: f64,
    flag_policy: AnimalFlagPolicy,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_CONFIDENCE_THRESHOLD)
    }
}

impl DetectionFilter {
    pub fn new(output_threshold: f64) -> Self {
        Self {
            output_threshold,
            flag_policy: AnimalFlagPolicy::default(),
        }
    }

    pub fn with_flag_policy(mut self, policy: AnimalFlagPolicy) -> Self {
        self.flag_policy = policy;
        self
    }

    pub fn output_threshold(&self) -> f64 {
        self.output_threshold
    }

    pub fn flag_policy(&self) -> AnimalFlagPolicy {
        self.flag_policy
    }

    pub fn apply(&self, raw: &[RawDetection]) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();

        for slot in raw {
            let category = Category::from_id(slot.class_id);
            if category == EXCLUDED_CATEGORY {
                continue;
            }

            // Gate on the raw score. The reported confidence is truncated
            // afterwards and may equal the threshold.
            let included = slot.score > self.output_threshold;
            if included {
                outcome.detections.push(Detection {
                    category,
                    confidence: truncate_float(slot.score, CONF_DIGITS),
                    bbox: slot.bbox.to_canonical(),
                });
                if slot.score > outcome.max_confidence {
                    outcome.max_confidence = slot.score;
                }
            }

            if category == Category::Animal {
                match self.flag_policy {
                    AnimalFlagPolicy::AnyRawSlot => outcome.animal_present = true,
                    AnimalFlagPolicy::IncludedOnly if included => outcome.animal_present = true,
                    AnimalFlagPolicy::IncludedOnly => {}
                }
            }
        }

        outcome
    }
}

/// Filter with the default flag policy.
pub fn filter_detections(raw: &[RawDetection], output_threshold: f64) -> FilterOutcome {
    DetectionFilter::new(output_threshold).apply(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::coords::{CanonicalBox, NativeBox};

    fn slot(bbox: [f64; 4], score: f64, class_id: u32) -> RawDetection {
        RawDetection {
            bbox: NativeBox(bbox),
            class_id,
            score,
        }
    }

    #[test]
    fn threshold_is_exclusive() {
        let threshold = 0.1;
        let at = filter_detections(&[slot([0.0, 0.0, 0.5, 0.5], threshold, 2)], threshold);
        assert!(at.detections.is_empty());
        assert_eq!(at.max_confidence, 0.0);

        let above = filter_detections(
            &[slot([0.0, 0.0, 0.5, 0.5], threshold + 1e-6, 2)],
            threshold,
        );
        assert_eq!(above.detections.len(), 1);
    }

    #[test]
    fn threshold_applies_to_raw_score_before_truncation() {
        let outcome = filter_detections(&[slot([0.0, 0.0, 0.5, 0.5], 0.1005, 1)], 0.1);
        assert_eq!(outcome.detections.len(), 1);
        assert_eq!(outcome.detections[0].confidence, 0.1);
        assert_eq!(outcome.max_confidence, 0.1005);
        assert!(outcome.animal_present);

        let below = filter_detections(&[slot([0.0, 0.0, 0.5, 0.5], 0.0999, 1)], 0.1);
        assert!(below.detections.is_empty());
    }

    #[test]
    fn excluded_category_is_dropped_regardless_of_score() {
        let outcome = filter_detections(
            &[
                slot([0.0, 0.0, 1.0, 1.0], 0.99, 3),
                slot([0.0, 0.0, 1.0, 1.0], 1.0, 3),
            ],
            0.1,
        );
        assert!(outcome.detections.is_empty());
        assert_eq!(outcome.max_confidence, 0.0);
        assert!(!outcome.animal_present);
    }

    #[test]
    fn max_confidence_tracks_included_only() {
        let outcome = filter_detections(
            &[
                slot([0.0, 0.0, 0.2, 0.2], 0.4, 2),
                slot([0.1, 0.1, 0.3, 0.3], 0.7, 1),
                slot([0.2, 0.2, 0.4, 0.4], 0.05, 1),
                slot([0.2, 0.2, 0.4, 0.4], 0.95, 3),
            ],
            0.1,
        );
        assert_eq!(outcome.detections.len(), 2);
        assert_eq!(outcome.max_confidence, 0.7);
        let true_max = outcome
            .detections
            .iter()
            .map(|d| d.confidence)
            .fold(0.0, f64::max);
        assert_eq!(true_max, 0.7);
    }

    #[test]
    fn end_to_end_example() {
        let outcome = filter_detections(
            &[
                slot([0.1, 0.2, 0.4, 0.5], 0.92, 1),
                slot([0.0, 0.0, 1.0, 1.0], 0.99, 3),
            ],
            0.1,
        );
        assert_eq!(outcome.detections.len(), 1);
        let det = &outcome.detections[0];
        assert_eq!(det.bbox, CanonicalBox([0.2, 0.1, 0.3, 0.3]));
        assert_eq!(det.confidence, 0.92);
        assert_eq!(det.category.to_string(), "1");
        assert_eq!(outcome.max_confidence, 0.92);
        assert!(outcome.animal_present);
    }

    #[test]
    fn low_confidence_animal_still_sets_flag_by_default() {
        let raw = [slot([0.1, 0.1, 0.2, 0.2], 0.02, 1)];

        let outcome = DetectionFilter::new(0.1).apply(&raw);
        assert!(outcome.detections.is_empty());
        assert!(outcome.animal_present);

        let gated = DetectionFilter::new(0.1)
            .with_flag_policy(AnimalFlagPolicy::IncludedOnly)
            .apply(&raw);
        assert!(gated.detections.is_empty());
        assert!(!gated.animal_present);
    }

    #[test]
    fn person_only_frames_do_not_set_flag() {
        let outcome = filter_detections(&[slot([0.1, 0.1, 0.5, 0.5], 0.9, 2)], 0.1);
        assert_eq!(outcome.detections.len(), 1);
        assert!(!outcome.animal_present);
    }

    #[test]
    fn confidences_are_truncated() {
        let outcome = filter_detections(&[slot([0.1, 0.1, 0.5, 0.5], 0.876_54, 2)], 0.1);
        assert_eq!(outcome.detections[0].confidence, 0.876);
        assert_eq!(outcome.max_confidence, 0.876_54);
    }
}
