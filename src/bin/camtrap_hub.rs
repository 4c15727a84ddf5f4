//! camtrap_hub - central detection node.
//!
//! This daemon:
//! 1. Loads the detector once at startup (fatal on failure)
//! 2. Accepts frames from an edge sender over TCP, acknowledging each one
//! 3. Runs detection, prints one JSON result per frame on stdout
//! 4. Rings the terminal bell whenever an animal is flagged
//! 5. Optionally keeps the latest annotated frame per source on disk

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camtrap::pipeline::JsonLineSink;
use camtrap::render::RenderSink;
use camtrap::transport::{parse_endpoint, DEFAULT_PORT};
use camtrap::{
    AlertDispatcher, DetectorSession, FrameHub, PipelineConfig, PipelineDriver, TerminalBell,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Camera-trap detection hub")]
struct Args {
    /// Listen endpoint (tcp://host:port). Overrides CAMTRAP_BIND / config file.
    #[arg(long)]
    bind: Option<String>,

    /// ONNX model file, or stub://name for the stub backend.
    #[arg(long)]
    model: Option<String>,

    /// Force CPU execution of the detector.
    #[arg(long)]
    cpu_only: bool,

    /// Confidence a detection must exceed to be reported.
    #[arg(long)]
    output_threshold: Option<f64>,

    /// Confidence a detection must exceed to be drawn.
    #[arg(long)]
    render_threshold: Option<f64>,

    /// Keep the latest annotated frame per source in this directory
    /// (`result_img` when given without a value).
    #[arg(long, num_args = 0..=1, default_missing_value = "result_img")]
    render_dir: Option<PathBuf>,

    /// Exit after the first sender disconnects.
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = PipelineConfig::load_unvalidated()?;
    if let Some(bind) = args.bind {
        cfg.bind_addr = bind;
    }
    if let Some(model) = args.model {
        cfg.model_path = model;
    }
    if args.cpu_only {
        cfg.force_cpu = true;
    }
    if let Some(threshold) = args.output_threshold {
        cfg.thresholds.output = threshold;
    }
    if let Some(threshold) = args.render_threshold {
        cfg.thresholds.render = threshold;
    }
    cfg.validate()?;

    let session = DetectorSession::from_config(&cfg)
        .with_context(|| format!("failed to start detector from {}", cfg.model_path))?;

    let endpoint = parse_endpoint(&cfg.bind_addr, DEFAULT_PORT)?;
    let mut hub = FrameHub::bind(&endpoint)?;
    if args.once {
        hub = hub.single_peer();
    }
    log::info!("camtrap_hub listening on {}", hub.local_addr()?);

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        if handler_flag.swap(true, Ordering::SeqCst) {
            // Second signal: the loop may be blocked waiting for a frame.
            std::process::exit(130);
        }
        log::info!("shutdown requested; finishing current frame (Ctrl-C again to exit now)");
    })
    .context("failed to set Ctrl-C handler")?;

    let dispatcher = AlertDispatcher::new(TerminalBell::stderr(), cfg.alert_tone);
    let mut driver = PipelineDriver::new(hub, session, dispatcher)
        .with_shutdown(shutdown)
        .with_sink(JsonLineSink::new(std::io::stdout()));
    if let Some(dir) = args.render_dir {
        log::info!("writing annotated frames to {}", dir.display());
        driver = driver.with_sink(RenderSink::new(dir, cfg.thresholds.render));
    }

    let stats = driver.run()?;
    log::info!(
        "camtrap_hub stopped: frames={} failures={} alerts={}",
        stats.frames,
        stats.failures,
        stats.alerts
    );
    Ok(())
}
