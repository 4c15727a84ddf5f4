//! Static image source.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
use crate::frame::Frame;

/// File extensions treated as images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "gif", "png"];

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// List image files in `dir`, sorted, optionally descending into subdirectories.
pub fn find_images(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current)
            .with_context(|| format!("failed to read directory {}", current.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", current.display()))?;
            let path = entry.path();
            if path.is_dir() {
                if recursive {
                    pending.push(path);
                }
            } else if is_image_file(&path) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Yields frames decoded from a list of image files.
///
/// Files that fail to decode are surfaced as errors from `next_frame`; use
/// [`ImageFileSource::next_path`] when each file should be handled on its own.
pub struct ImageFileSource {
    label: String,
    pending: VecDeque<PathBuf>,
}

impl ImageFileSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            label: format!("{} image(s)", paths.len()),
            pending: paths.into(),
        }
    }

    /// A single image file or every image in a directory.
    pub fn open(path: &Path, recursive: bool) -> Result<Self> {
        let paths = if path.is_dir() {
            find_images(path, recursive)?
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(anyhow!("{} is neither a file nor a directory", path.display()));
        };
        if paths.is_empty() {
            log::warn!("ImageFileSource: no images found under {}", path.display());
        }
        Ok(Self {
            label: path.display().to_string(),
            pending: paths.into(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Pop the next path without decoding it.
    pub fn next_path(&mut self) -> Option<PathBuf> {
        self.pending.pop_front()
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.pending.pop_front() {
            Some(path) => Frame::open(&path).map(Some),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
