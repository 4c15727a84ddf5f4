//! Camera-trap monitoring pipeline.
//!
//! An edge device streams frames to a central hub. The hub runs an object
//! detector on every frame, turns the backend's raw boxes into a thresholded,
//! coordinate-normalized [`DetectionResult`], and raises an alert whenever an
//! animal shows up.
//!
//! # Per-frame flow
//!
//! ```text
//! FrameFeed -> DetectorSession::infer -> DetectionFilter -> DetectionResult
//!                                                        -> AlertDispatcher / renderer
//! ```
//!
//! Exactly one frame is in flight at a time. Nothing is carried from one
//! frame to the next.
//!
//! # Module Structure
//!
//! - `frame`: Immutable RGB frames
//! - `detect`: Coordinate normalizer, filter, result builder, detector session, backends
//! - `alert`: Alert decision and sinks
//! - `pipeline`: The receive / infer / dispatch driver
//! - `transport`: Edge-to-hub frame exchange over TCP
//! - `ingest`: Frame sources (static images, V4L2)
//! - `enhance`: Optional low-light enhancement applied on the edge
//! - `render`: Bounding-box annotation of frames
//! - `config`: Hub configuration (file + environment)

pub mod alert;
pub mod config;
pub mod detect;
pub mod enhance;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod transport;

pub use alert::{should_alert, AlertDispatcher, AlertSink, AlertTone, Silent, TerminalBell};
pub use config::PipelineConfig;
pub use detect::{
    AnimalFlagPolicy, CanonicalBox, Category, Detection, DetectionFilter, DetectionResult,
    DetectorBackend, DetectorSession, FailureKind, FilterOutcome, FnBackend, FrameOutcome,
    NativeBox, RawDetection, RawOutput, StubBackend,
};
pub use frame::Frame;
pub use ingest::{FrameSource, ImageFileSource, SyntheticSource};
pub use pipeline::{
    FrameFeed, IncomingFrame, JsonLineSink, PipelineDriver, PipelineStats, ResultSink, SourceFeed,
};
pub use transport::{Endpoint, FrameEncoding, FrameHub, FrameMessage, FrameSender};
