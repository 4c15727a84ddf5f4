//! Box coordinate conversion.
//!
//! Detection backends report boxes as `[y_min, x_min, y_max, x_max]`. The
//! pipeline reports `[x_min, y_min, width, height]`. Both are normalized to
//! `[0, 1]` relative to the frame. No clamping or validation happens here: a
//! backend that emits an inverted box gets a negative width back.

use serde::{Deserialize, Serialize};

/// Decimal places kept for box coordinates.
pub const COORD_DIGITS: u32 = 4;
/// Decimal places kept for confidences.
pub const CONF_DIGITS: u32 = 3;

// Absorbs representation error such as 0.3 * 1e4 = 2999.9999999999995.
const TRUNCATE_EPSILON: f64 = 1e-9;

/// Backend-native box: `[y_min, x_min, y_max, x_max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeBox(pub [f64; 4]);

/// Pipeline box: `[x_min, y_min, width, height]`, truncated to [`COORD_DIGITS`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalBox(pub [f64; 4]);

impl NativeBox {
    pub fn new(y_min: f64, x_min: f64, y_max: f64, x_max: f64) -> Self {
        Self([y_min, x_min, y_max, x_max])
    }

    pub fn to_canonical(self) -> CanonicalBox {
        to_canonical(self)
    }
}

impl CanonicalBox {
    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn width(&self) -> f64 {
        self.0[2]
    }

    pub fn height(&self) -> f64 {
        self.0[3]
    }

    pub fn to_native(self) -> NativeBox {
        to_native(self)
    }
}

/// Convert `[y1, x1, y2, x2]` into `[x1, y1, x2 - x1, y2 - y1]`.
pub fn to_canonical(native: NativeBox) -> CanonicalBox {
    let [y1, x1, y2, x2] = native.0;
    let width = x2 - x1;
    let height = y2 - y1;
    CanonicalBox([x1, y1, width, height].map(|v| truncate_float(v, COORD_DIGITS)))
}

/// Convert `[x, y, w, h]` back into `[y, x, y + h, x + w]`.
///
/// Exact inverse of [`to_canonical`] up to the truncation applied there.
pub fn to_native(canonical: CanonicalBox) -> NativeBox {
    let [x1, y1, width, height] = canonical.0;
    NativeBox([y1, x1, y1 + height, x1 + width])
}

/// Truncate `value` to `precision` decimal places (floor, never rounds up).
pub fn truncate_float(value: f64, precision: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(precision as i32);
    (value * factor + TRUNCATE_EPSILON).floor() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() <= tol, "{a} != {b} (tol {tol})");
    }

    #[test]
    fn canonical_swaps_axes_and_computes_extent() {
        let canonical = to_canonical(NativeBox::new(0.1, 0.2, 0.4, 0.5));
        assert_eq!(canonical, CanonicalBox([0.2, 0.1, 0.3, 0.3]));
    }

    #[test]
    fn truncation_never_rounds_up() {
        assert_eq!(truncate_float(0.123_49, 4), 0.1234);
        assert_eq!(truncate_float(0.123_99, 4), 0.1239);
        assert_eq!(truncate_float(0.9999, 3), 0.999);
        assert_eq!(truncate_float(0.92, 3), 0.92);
    }

    #[test]
    fn inverted_boxes_pass_through() {
        let canonical = to_canonical(NativeBox::new(0.5, 0.5, 0.25, 0.25));
        assert!(canonical.width() < 0.0);
        assert!(canonical.height() < 0.0);
    }

    #[test]
    fn round_trip_within_coordinate_precision() {
        let boxes = [
            [0.1, 0.2, 0.4, 0.5],
            [0.0, 0.0, 1.0, 1.0],
            [0.123_456, 0.654_321, 0.777_777, 0.999_999],
            [0.333_3, 0.25, 0.666_6, 0.75],
            [0.01, 0.02, 0.011, 0.021],
        ];
        for raw in boxes {
            let native = NativeBox(raw);
            let back = to_native(to_canonical(native));
            for (a, b) in native.0.iter().zip(back.0.iter()) {
                // One truncation on the corner, one on the extent.
                assert_close(*a, *b, 2e-4);
            }
        }
    }

    #[test]
    fn canonical_serializes_as_plain_array() -> anyhow::Result<()> {
        let json = serde_json::to_string(&CanonicalBox([0.2, 0.1, 0.3, 0.3]))?;
        assert_eq!(json, "[0.2,0.1,0.3,0.3]");
        Ok(())
    }
}
