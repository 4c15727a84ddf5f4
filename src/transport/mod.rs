//! Edge-to-hub frame transport.
//!
//! Point-to-point TCP with at most one frame outstanding: the edge pushes a
//! frame, the hub answers with a fixed acknowledgment, and only then does the
//! edge send the next one. No authentication, retries, or sequence numbers.

mod endpoint;
mod hub;
mod sender;
pub mod wire;

pub use endpoint::{parse_endpoint, Endpoint, DEFAULT_PORT};
pub use hub::FrameHub;
pub use sender::FrameSender;
pub use wire::{FrameEncoding, FrameMessage, ACK};
