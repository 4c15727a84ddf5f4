//! Bounding-box annotation of frames.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::detect::{CanonicalBox, Detection, FrameOutcome};
use crate::frame::Frame;
use crate::pipeline::ResultSink;

/// Inserted between the file stem and extension of annotated copies.
pub const DETECTION_FILENAME_INSERT: &str = "_detections";

/// Box outline thickness in pixels.
pub const BOX_THICKNESS: u32 = 3;

/// Indexed by category id modulo 4 (group, animal, person, vehicle).
const PALETTE: [Rgb<u8>; 4] = [
    Rgb([255, 215, 0]),
    Rgb([240, 248, 255]),
    Rgb([255, 99, 71]),
    Rgb([0, 191, 255]),
];

fn colour_for(detection: &Detection) -> Rgb<u8> {
    PALETTE[(detection.category.id() % PALETTE.len() as u32) as usize]
}

/// Draw every detection with `conf > render_threshold` onto a copy of `frame`.
pub fn annotate(frame: &Frame, detections: &[Detection], render_threshold: f64) -> RgbImage {
    let mut image = frame.to_rgb_image();
    let (img_w, img_h) = image.dimensions();
    if img_w == 0 || img_h == 0 {
        return image;
    }

    for detection in detections {
        if detection.confidence <= render_threshold {
            continue;
        }
        let colour = colour_for(detection);
        for inset in 0..BOX_THICKNESS {
            if let Some(rect) = rect_from_bbox(&detection.bbox, img_w, img_h, inset) {
                draw_hollow_rect_mut(&mut image, rect, colour);
            }
        }
    }
    image
}

/// Convert a normalized `[x, y, w, h]` box to a pixel rectangle shrunk by `inset`.
fn rect_from_bbox(bbox: &CanonicalBox, img_w: u32, img_h: u32, inset: u32) -> Option<Rect> {
    let [x, y, w, h] = bbox.0;
    let max_x = (img_w - 1) as f64;
    let max_y = (img_h - 1) as f64;
    let inset = inset as f64;

    let x1 = (x * img_w as f64).clamp(0.0, max_x) + inset;
    let y1 = (y * img_h as f64).clamp(0.0, max_y) + inset;
    let x2 = ((x + w) * img_w as f64).clamp(0.0, max_x) - inset;
    let y2 = ((y + h) * img_h as f64).clamp(0.0, max_y) - inset;
    if x2 < x1 || y2 < y1 {
        return None;
    }

    let width = (x2 - x1).max(1.0).round() as u32;
    let height = (y2 - y1).max(1.0).round() as u32;
    Some(Rect::at(x1.round() as i32, y1.round() as i32).of_size(width, height))
}

/// `c:/foo/bar.jpg` becomes `c:/foo/bar_detections.jpg`.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string());
    let name = match input.extension() {
        Some(ext) => format!("{stem}{DETECTION_FILENAME_INSERT}.{}", ext.to_string_lossy()),
        None => format!("{stem}{DETECTION_FILENAME_INSERT}"),
    };
    input.with_file_name(name)
}

/// Where the annotated copy of `input` goes, honouring an explicit output directory.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let default = default_output_path(input);
    match (output_dir, default.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => default,
    }
}

pub fn save(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save(path)
        .with_context(|| format!("failed to save annotated image {}", path.display()))
}

/// Keeps the latest annotated frame per source in a directory.
pub struct RenderSink {
    dir: PathBuf,
    render_threshold: f64,
}

impl RenderSink {
    pub fn new(dir: impl Into<PathBuf>, render_threshold: f64) -> Self {
        Self {
            dir: dir.into(),
            render_threshold,
        }
    }

    pub fn path_for(&self, source_id: &str) -> PathBuf {
        let safe: String = source_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}{DETECTION_FILENAME_INSERT}.jpg"))
    }
}

impl ResultSink for RenderSink {
    fn handle(&mut self, frame: Option<&Frame>, outcome: &FrameOutcome) -> Result<()> {
        let Some(frame) = frame else {
            return Ok(());
        };
        let image = annotate(frame, outcome.result.detections(), self.render_threshold);
        save(&image, &self.path_for(&outcome.result.source_id))
    }
}

/// Writes an annotated copy next to each input image (or into `output_dir`).
///
/// Expects the result's source id to be the input file path.
pub struct AnnotatedCopySink {
    output_dir: Option<PathBuf>,
    render_threshold: f64,
}

impl AnnotatedCopySink {
    pub fn new(output_dir: Option<PathBuf>, render_threshold: f64) -> Self {
        Self {
            output_dir,
            render_threshold,
        }
    }
}

impl ResultSink for AnnotatedCopySink {
    fn handle(&mut self, frame: Option<&Frame>, outcome: &FrameOutcome) -> Result<()> {
        let Some(frame) = frame else {
            return Ok(());
        };
        let input = Path::new(&outcome.result.source_id);
        let path = output_path_for(input, self.output_dir.as_deref());
        let image = annotate(frame, outcome.result.detections(), self.render_threshold);
        save(&image, &path)?;
        log::debug!("annotated {} -> {}", input.display(), path.display());
        Ok(())
    }
}
