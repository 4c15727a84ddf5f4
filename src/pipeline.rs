//! The receive / infer / dispatch loop.
//!
//! One cycle per frame: await a frame, run the detector session, build the
//! result, raise an alert if an animal was flagged, then hand the result to
//! the configured sinks. Exactly one cycle is in flight at a time.
//!
//! Per-frame problems (undecodable payloads, backend errors, failing sinks)
//! are logged and the loop moves on. A sender that breaks framing or hangs
//! up mid-frame is dropped inside the hub, which goes back to accepting. The
//! run only ends on end-of-stream, a shutdown request, or a feed error the
//! feed itself cannot recover from, such as a failing listener.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::alert::{AlertDispatcher, AlertSink};
use crate::detect::{DetectorSession, FailureKind, FrameOutcome};
use crate::frame::Frame;
use crate::ingest::{FrameSource, ImageFileSource};
use crate::transport::{FrameHub, FrameMessage};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// A frame as it arrives at the driver. Decoding may already have failed.
pub struct IncomingFrame {
    pub source_id: String,
    pub frame: Result<Frame>,
}

impl IncomingFrame {
    pub fn decoded(source_id: impl Into<String>, frame: Frame) -> Self {
        Self {
            source_id: source_id.into(),
            frame: Ok(frame),
        }
    }

    /// Decode a transport message. Bad payloads are kept as errors.
    pub fn from_message(message: FrameMessage) -> Self {
        let frame = message.decode_frame();
        Self {
            source_id: message.source_id,
            frame,
        }
    }
}

/// Where the driver gets its frames from.
pub trait FrameFeed {
    /// Block for the next frame. `Ok(None)` is end of stream; `Err` ends the run.
    fn next_incoming(&mut self) -> Result<Option<IncomingFrame>>;
}

impl FrameFeed for FrameHub {
    fn next_incoming(&mut self) -> Result<Option<IncomingFrame>> {
        Ok(self.recv()?.map(IncomingFrame::from_message))
    }
}

/// Static images: each file's path becomes its source id.
impl FrameFeed for ImageFileSource {
    fn next_incoming(&mut self) -> Result<Option<IncomingFrame>> {
        Ok(self.next_path().map(|path| IncomingFrame {
            source_id: path.display().to_string(),
            frame: Frame::open(&path),
        }))
    }
}

/// Adapts a local [`FrameSource`] into a feed, numbering frames as it goes.
///
/// A source error for one frame becomes a failed frame, not a failed run.
pub struct SourceFeed<S: FrameSource> {
    source: S,
    sequence: u64,
}

impl<S: FrameSource> SourceFeed<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            sequence: 0,
        }
    }
}

impl<S: FrameSource> FrameFeed for SourceFeed<S> {
    fn next_incoming(&mut self) -> Result<Option<IncomingFrame>> {
        let source_id = format!("{}#{}", self.source.describe(), self.sequence);
        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => Ok(frame),
            Ok(None) => return Ok(None),
            Err(err) => Err(err),
        };
        self.sequence += 1;
        Ok(Some(IncomingFrame { source_id, frame }))
    }
}

/// Consumer of finished frames. `frame` is `None` when decoding failed.
pub trait ResultSink {
    fn handle(&mut self, frame: Option<&Frame>, outcome: &FrameOutcome) -> Result<()>;
}

impl<F> ResultSink for F
where
    F: FnMut(Option<&Frame>, &FrameOutcome) -> Result<()>,
{
    fn handle(&mut self, frame: Option<&Frame>, outcome: &FrameOutcome) -> Result<()> {
        self(frame, outcome)
    }
}

/// Writes each result as one line of JSON.
pub struct JsonLineSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for JsonLineSink<W> {
    fn handle(&mut self, _frame: Option<&Frame>, outcome: &FrameOutcome) -> Result<()> {
        serde_json::to_writer(&mut self.out, &outcome.result).context("serialize result")?;
        self.out.write_all(b"\n").context("write result line")?;
        self.out.flush().context("flush result line")?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames: u64,
    pub failures: u64,
    pub alerts: u64,
}

pub struct PipelineDriver<F: FrameFeed, A: AlertSink> {
    feed: F,
    session: DetectorSession,
    dispatcher: AlertDispatcher<A>,
    sinks: Vec<Box<dyn ResultSink>>,
    shutdown: Arc<AtomicBool>,
    stats: PipelineStats,
    last_health_log: Instant,
}

impl<F: FrameFeed, A: AlertSink> PipelineDriver<F, A> {
    pub fn new(feed: F, session: DetectorSession, dispatcher: AlertDispatcher<A>) -> Self {
        Self {
            feed,
            session,
            dispatcher,
            sinks: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            stats: PipelineStats::default(),
            last_health_log: Instant::now(),
        }
    }

    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Share an externally owned shutdown flag (e.g. one set from a signal handler).
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn dispatcher(&self) -> &AlertDispatcher<A> {
        &self.dispatcher
    }

    /// Run cycles until end of stream or shutdown.
    ///
    /// The shutdown flag is checked between cycles only.
    pub fn run(&mut self) -> Result<PipelineStats> {
        log::info!(
            "pipeline running with backend '{}'",
            self.session.backend_name()
        );
        while !self.shutdown.load(Ordering::SeqCst) {
            if self.run_cycle()?.is_none() {
                log::info!("frame feed ended");
                break;
            }
            if self.last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                self.log_health();
                self.last_health_log = Instant::now();
            }
        }
        self.log_health();
        Ok(self.stats)
    }

    /// One full cycle. `Ok(None)` when the feed is exhausted.
    pub fn run_cycle(&mut self) -> Result<Option<FrameOutcome>> {
        let Some(incoming) = self.feed.next_incoming()? else {
            return Ok(None);
        };
        let IncomingFrame { source_id, frame } = incoming;

        let (frame, outcome) = match frame {
            Ok(frame) => {
                let outcome = self.session.detect(&source_id, &frame);
                (Some(frame), outcome)
            }
            Err(err) => {
                log::warn!("frame {} could not be decoded: {:#}", source_id, err);
                (None, FrameOutcome::failure(&source_id, FailureKind::ImageAccess))
            }
        };

        self.stats.frames += 1;
        if outcome.result.is_failure() {
            self.stats.failures += 1;
        }
        if self.dispatcher.dispatch(&outcome) {
            self.stats.alerts += 1;
        }
        log::debug!(
            "frame {}: {} detection(s), max conf {:.3}, animal={}",
            outcome.result.source_id,
            outcome.result.detections().len(),
            outcome.result.max_confidence(),
            outcome.animal_present
        );

        for sink in &mut self.sinks {
            if let Err(err) = sink.handle(frame.as_ref(), &outcome) {
                log::warn!("result sink failed for {}: {:#}", source_id, err);
            }
        }
        Ok(Some(outcome))
    }

    fn log_health(&self) {
        log::info!(
            "pipeline frames={} failures={} alerts={}",
            self.stats.frames,
            self.stats.failures,
            self.stats.alerts
        );
    }
}
