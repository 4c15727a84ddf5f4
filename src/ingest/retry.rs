//! Bounded retry around a flaky frame source.

use std::time::Duration;

use anyhow::Result;

use super::FrameSource;
use crate::frame::Frame;

/// Failed captures in a row before the source is given up on.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 10;
/// Pause after a failed capture.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRetry {
    pub max_consecutive_failures: u32,
    pub backoff: Duration,
}

impl Default for CaptureRetry {
    fn default() -> Self {
        Self {
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl CaptureRetry {
    /// Pull the next frame, sleeping `backoff` after each failure.
    ///
    /// Returns the last capture error once `max_consecutive_failures` captures
    /// in a row have failed. A successful capture resets the count.
    pub fn next_frame(&self, source: &mut dyn FrameSource) -> Result<Option<Frame>> {
        let mut failures = 0u32;
        loop {
            match source.next_frame() {
                Ok(frame) => return Ok(frame),
                Err(err) => {
                    failures += 1;
                    if failures >= self.max_consecutive_failures.max(1) {
                        return Err(err.context(format!(
                            "{} failed {} capture(s) in a row",
                            source.describe(),
                            failures
                        )));
                    }
                    log::warn!(
                        "capture from {} failed ({}/{}): {:#}",
                        source.describe(),
                        failures,
                        self.max_consecutive_failures,
                        err
                    );
                    if !self.backoff.is_zero() {
                        std::thread::sleep(self.backoff);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    /// Fails `failures` times, then yields one frame, then ends.
    struct Flaky {
        failures: u32,
        calls: u32,
    }

    impl FrameSource for Flaky {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            self.calls += 1;
            if self.calls <= self.failures {
                return Err(anyhow!("device busy (call {})", self.calls));
            }
            if self.calls == self.failures + 1 {
                return Frame::from_rgb(vec![0; 3], 1, 1).map(Some);
            }
            Ok(None)
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    fn no_backoff(max: u32) -> CaptureRetry {
        CaptureRetry {
            max_consecutive_failures: max,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn recovers_after_transient_failures() -> Result<()> {
        let mut source = Flaky { failures: 3, calls: 0 };
        let frame = no_backoff(5).next_frame(&mut source)?;
        assert!(frame.is_some());
        assert_eq!(source.calls, 4);
        assert!(no_backoff(5).next_frame(&mut source)?.is_none());
        Ok(())
    }

    #[test]
    fn gives_up_with_the_last_error() {
        let mut source = Flaky {
            failures: u32::MAX,
            calls: 0,
        };
        let err = no_backoff(4).next_frame(&mut source).unwrap_err();
        assert_eq!(source.calls, 4);
        let text = format!("{:#}", err);
        assert!(text.contains("failed 4 capture(s) in a row"));
        assert!(text.contains("device busy (call 4)"));
    }

    #[test]
    fn waits_between_failed_captures() -> Result<()> {
        let mut source = Flaky { failures: 2, calls: 0 };
        let retry = CaptureRetry {
            max_consecutive_failures: 3,
            backoff: Duration::from_millis(20),
        };
        let started = std::time::Instant::now();
        assert!(retry.next_frame(&mut source)?.is_some());
        assert!(started.elapsed() >= Duration::from_millis(40));
        Ok(())
    }
}
