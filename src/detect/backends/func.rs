use anyhow::Result;

use crate::detect::backend::{DetectorBackend, RawOutput};
use crate::frame::Frame;

/// Adapts a plain `frame -> raw output` function into a backend.
pub struct FnBackend<F> {
    name: &'static str,
    func: F,
}

impl<F> FnBackend<F>
where
    F: FnMut(&Frame) -> Result<RawOutput> + Send,
{
    pub fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> DetectorBackend for FnBackend<F>
where
    F: FnMut(&Frame) -> Result<RawOutput> + Send,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn infer(&mut self, frame: &Frame) -> Result<RawOutput> {
        (self.func)(frame)
    }
}
