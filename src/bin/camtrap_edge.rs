//! camtrap_edge - edge frame sender.
//!
//! Captures frames from a camera (V4L2), a synthetic `stub://` device, or a
//! directory of images, optionally enhances them for low light, and pushes
//! them one at a time to the hub, waiting for each acknowledgment.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use camtrap::enhance::{enhance_frame, EnhanceSettings};
use camtrap::ingest::{CaptureRetry, SyntheticSource};
use camtrap::transport::Endpoint;
use camtrap::{FrameSender, FrameSource, ImageFileSource};

#[derive(Parser, Debug)]
#[command(author, version, about = "Camera-trap edge sender")]
struct Args {
    /// Hub host name or address.
    #[arg(long, env = "CAMTRAP_SERVER_IP", default_value = "127.0.0.1")]
    server_ip: String,

    /// Hub port.
    #[arg(long, env = "CAMTRAP_PORT", default_value_t = camtrap::transport::DEFAULT_PORT)]
    port: u16,

    /// V4L2 device, stub://name, or an image file/directory.
    #[arg(long, env = "CAMTRAP_DEVICE", default_value = "/dev/video0")]
    device: String,

    /// Capture width.
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Capture height.
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// Capture frame rate requested from the device.
    #[arg(long, default_value_t = 10)]
    fps: u32,

    /// Descend into subdirectories when --device is a directory.
    #[arg(long)]
    recursive: bool,

    /// Apply white balance and CLAHE before sending.
    #[arg(long)]
    enhance: bool,

    /// Send JPEG instead of raw RGB, at the given quality.
    #[arg(long, num_args = 0..=1, default_missing_value = "90")]
    jpeg: Option<u8>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Pause between frames, in milliseconds.
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,

    /// Give up after this many failed captures in a row.
    #[arg(long, default_value_t = camtrap::ingest::DEFAULT_MAX_CONSECUTIVE_FAILURES)]
    max_capture_failures: u32,

    /// Identifier sent with every frame. Defaults to the host name.
    #[arg(long, env = "CAMTRAP_SOURCE_ID")]
    source_id: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let source_id = args.source_id.clone().unwrap_or_else(host_name);
    let mut source = open_source(&args)?;
    log::info!(
        "camtrap_edge capturing from {} ({}x{} @ {} fps requested)",
        source.describe(),
        args.width,
        args.height,
        args.fps
    );

    let endpoint = Endpoint {
        host: args.server_ip.clone(),
        port: args.port,
    };
    let mut sender = FrameSender::connect(&endpoint)?;
    if let Some(quality) = args.jpeg {
        sender = sender.with_jpeg(quality);
    }
    log::info!("camtrap_edge sending as '{}' to {}", source_id, endpoint);

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("failed to set Ctrl-C handler")?;

    let settings = EnhanceSettings::default();
    let retry = CaptureRetry {
        max_consecutive_failures: args.max_capture_failures,
        ..CaptureRetry::default()
    };
    let interval = Duration::from_millis(args.interval_ms);
    let mut last_health_log = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        if args.max_frames.is_some_and(|max| sender.frames_sent() >= max) {
            break;
        }
        let Some(frame) = retry.next_frame(source.as_mut())? else {
            log::info!("source {} exhausted", source.describe());
            break;
        };
        let frame = if args.enhance {
            enhance_frame(&frame, &settings)
        } else {
            frame
        };

        sender.send_frame(&source_id, &frame)?;

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            log::info!("frames sent={} to {}", sender.frames_sent(), sender.endpoint());
            last_health_log = Instant::now();
        }
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    let sent = sender.frames_sent();
    sender.close()?;
    log::info!("camtrap_edge stopped after {} frame(s)", sent);
    Ok(())
}

fn open_source(args: &Args) -> Result<Box<dyn FrameSource>> {
    let path = Path::new(&args.device);
    if args.device.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(
            args.device.clone(),
            args.width,
            args.height,
        )));
    }
    if path.is_dir() || (path.is_file() && camtrap::ingest::is_image_file(path)) {
        return Ok(Box::new(ImageFileSource::open(path, args.recursive)?));
    }
    open_device(args)
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(args: &Args) -> Result<Box<dyn FrameSource>> {
    use camtrap::ingest::{V4l2Config, V4l2Source};

    let mut source = V4l2Source::new(V4l2Config {
        device: args.device.clone(),
        target_fps: args.fps,
        width: args.width,
        height: args.height,
    })?;
    source.connect()?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(args: &Args) -> Result<Box<dyn FrameSource>> {
    Err(anyhow::anyhow!(
        "capturing from {} requires the ingest-v4l2 feature",
        args.device
    ))
}

fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "camtrap-edge".to_string())
}
