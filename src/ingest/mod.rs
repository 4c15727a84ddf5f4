//! Frame sources.
//!
//! - Static images on disk (`ImageFileSource`)
//! - USB/V4L2 devices (feature: ingest-v4l2)
//! - Synthetic `stub://` devices (`SyntheticSource`)
//!
//! Sources hand out one `Frame` at a time and keep nothing once it has been
//! returned.

mod images;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod retry;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::frame::Frame;

pub use images::{find_images, is_image_file, ImageFileSource, IMAGE_EXTENSIONS};
pub use retry::{CaptureRetry, DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_RETRY_BACKOFF};
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// Anything that produces frames on demand.
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Human-readable source identifier (device path, directory, ...).
    fn describe(&self) -> String;
}
