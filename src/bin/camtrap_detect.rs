//! camtrap_detect - run the detector over static images.
//!
//! Prints one JSON result per image on stdout and writes an annotated copy
//! (`<stem>_detections.<ext>`) next to each input, or into `--output-dir`.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use camtrap::render::AnnotatedCopySink;
use camtrap::{
    AlertDispatcher, DetectorSession, ImageFileSource, JsonLineSink, PipelineConfig,
    PipelineDriver, Silent,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run camera-trap detection on image files")]
struct Args {
    /// Image file or directory of images.
    input: PathBuf,

    /// Descend into subdirectories.
    #[arg(long)]
    recursive: bool,

    /// Write annotated images here instead of next to the inputs.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Skip writing annotated images.
    #[arg(long)]
    no_render: bool,

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
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = PipelineConfig::load_unvalidated()?;
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

    let images = ImageFileSource::open(&args.input, args.recursive)?;
    let total = images.remaining();
    if total == 0 {
        return Err(anyhow!("no images found at {}", args.input.display()));
    }
    log::info!("running detector on {} image(s)", total);

    let session = DetectorSession::from_config(&cfg)
        .with_context(|| format!("failed to start detector from {}", cfg.model_path))?;
    let dispatcher = AlertDispatcher::new(Silent, cfg.alert_tone);
    let mut driver = PipelineDriver::new(images, session, dispatcher)
        .with_sink(JsonLineSink::new(std::io::stdout()));
    if !args.no_render {
        driver = driver.with_sink(AnnotatedCopySink::new(
            args.output_dir,
            cfg.thresholds.render,
        ));
    }

    let stats = driver.run()?;
    log::info!(
        "processed {} image(s): {} failed, {} with animals",
        stats.frames,
        stats.failures,
        stats.alerts
    );
    Ok(())
}
