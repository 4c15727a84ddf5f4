mod backend;
mod backends;
mod category;
pub mod coords;
mod filter;
mod result;
mod session;

pub use backend::{DetectorBackend, RawDetection, RawOutput};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{FnBackend, StubBackend};
pub use category::{Category, DEFAULT_LABEL_MAP};
pub use coords::{CanonicalBox, NativeBox};
pub use filter::{
    filter_detections, AnimalFlagPolicy, DetectionFilter, FilterOutcome,
    DEFAULT_OUTPUT_CONFIDENCE_THRESHOLD, EXCLUDED_CATEGORY,
};
pub use result::{build_result, Detection, DetectionResult, FailureKind, FrameOutcome};
pub use session::DetectorSession;
