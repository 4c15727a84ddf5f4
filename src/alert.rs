//! Alert decision and sinks.
//!
//! The decision is a pure function of the frame's animal-present flag. The
//! audible effect is delegated to an [`AlertSink`]; a failing sink is logged
//! and never stops monitoring.

use std::io::Write;

use anyhow::{Context, Result};

use crate::detect::FrameOutcome;

/// Tone requested from the alert sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlertTone {
    pub frequency_hz: u32,
    pub duration_ms: u64,
}

impl Default for AlertTone {
    fn default() -> Self {
        Self {
            frequency_hz: 2500,
            duration_ms: 500,
        }
    }
}

/// Alert iff an animal was flagged on the current frame.
pub fn should_alert(animal_present: bool) -> bool {
    animal_present
}

/// Something that makes noise.
pub trait AlertSink {
    fn alert(&mut self, tone: AlertTone) -> Result<()>;
}

/// Rings the terminal bell (BEL) on the wrapped writer.
///
/// Terminals have no notion of pitch or length, so the tone is only logged.
pub struct TerminalBell<W: Write> {
    out: W,
}

impl TerminalBell<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self {
            out: std::io::stderr(),
        }
    }
}

impl<W: Write> TerminalBell<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> AlertSink for TerminalBell<W> {
    fn alert(&mut self, tone: AlertTone) -> Result<()> {
        log::debug!(
            "bell: {} Hz for {} ms",
            tone.frequency_hz,
            tone.duration_ms
        );
        self.out.write_all(b"\x07").context("write bell")?;
        self.out.flush().context("flush bell")?;
        Ok(())
    }
}

/// Makes no sound; the dispatcher's log line is the only trace.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl AlertSink for Silent {
    fn alert(&mut self, _tone: AlertTone) -> Result<()> {
        Ok(())
    }
}

/// Turns frame outcomes into alerts.
pub struct AlertDispatcher<S: AlertSink> {
    sink: S,
    tone: AlertTone,
    alerts_raised: u64,
}

impl<S: AlertSink> AlertDispatcher<S> {
    pub fn new(sink: S, tone: AlertTone) -> Self {
        Self {
            sink,
            tone,
            alerts_raised: 0,
        }
    }

    /// Alert for this frame if warranted. Returns whether an alert was raised.
    pub fn dispatch(&mut self, outcome: &FrameOutcome) -> bool {
        if !should_alert(outcome.animal_present) {
            return false;
        }
        self.alerts_raised += 1;
        log::info!(
            "animal detected on {} (max conf {:.3})",
            outcome.result.source_id,
            outcome.result.max_confidence()
        );
        if let Err(err) = self.sink.alert(self.tone) {
            log::warn!("alert sink failed: {:#}", err);
        }
        true
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
