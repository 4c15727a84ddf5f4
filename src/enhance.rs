//! Low-light enhancement for camera-trap frames.
//!
//! Gray-world white balance removes the colour cast of IR-assisted night
//! footage, then contrast-limited adaptive histogram equalization (CLAHE) on
//! luma brings out detail in dark regions. Chroma is left untouched.

use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnhanceSettings {
    /// Pixels at or above this saturation are ignored when estimating the cast.
    pub saturation_threshold: f32,
    /// CLAHE clip limit, as a multiple of the mean histogram bin height.
    pub clip_limit: f32,
    /// CLAHE tile grid (columns, rows).
    pub tile_grid: (u32, u32),
}

impl Default for EnhanceSettings {
    fn default() -> Self {
        Self {
            saturation_threshold: 0.99,
            clip_limit: 6.0,
            tile_grid: (8, 8),
        }
    }
}

/// White-balance and equalize a frame.
pub fn enhance_frame(frame: &Frame, settings: &EnhanceSettings) -> Frame {
    let width = frame.width();
    let height = frame.height();
    let mut rgb = frame.pixels().to_vec();
    if rgb.is_empty() {
        return frame.clone();
    }

    gray_world_balance(&mut rgb, settings.saturation_threshold);

    let count = (width as usize) * (height as usize);
    let mut luma = Vec::with_capacity(count);
    let mut chroma = Vec::with_capacity(count);
    for px in rgb.chunks_exact(3) {
        let (y, cb, cr) = rgb_to_ycbcr(px[0], px[1], px[2]);
        luma.push(to_u8(y));
        chroma.push((cb, cr));
    }

    clahe(
        &mut luma,
        width,
        height,
        settings.clip_limit,
        settings.tile_grid,
    );

    for ((px, y), (cb, cr)) in rgb.chunks_exact_mut(3).zip(luma).zip(chroma) {
        let [r, g, b] = ycbcr_to_rgb(y as f32, cb, cr);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }

    // Same dimensions and length as the input, so this cannot fail.
    Frame::from_rgb(rgb, width, height).unwrap_or_else(|_| frame.clone())
}

/// Scale each channel so the mean of unsaturated pixels is neutral gray.
pub fn gray_world_balance(rgb: &mut [u8], saturation_threshold: f32) {
    let mut sums = [0f64; 3];
    for px in rgb.chunks_exact(3) {
        let max = px.iter().copied().max().unwrap_or(0);
        let min = px.iter().copied().min().unwrap_or(0);
        if max == 0 {
            continue;
        }
        let saturation = (max - min) as f32 / max as f32;
        if saturation >= saturation_threshold {
            continue;
        }
        for (sum, value) in sums.iter_mut().zip(px) {
            *sum += *value as f64;
        }
    }

    if sums.iter().any(|s| *s <= 0.0) {
        return;
    }
    let mean = sums.iter().sum::<f64>() / 3.0;
    let gains = sums.map(|s| mean / s);

    for px in rgb.chunks_exact_mut(3) {
        for (value, gain) in px.iter_mut().zip(gains) {
            *value = (*value as f64 * gain).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Contrast-limited adaptive histogram equalization of an 8-bit plane.
pub fn clahe(plane: &mut [u8], width: u32, height: u32, clip_limit: f32, grid: (u32, u32)) {
    let w = width as usize;
    let h = height as usize;
    if w == 0 || h == 0 || plane.len() != w * h {
        return;
    }

    let tile_w = w.div_ceil(grid.0.max(1) as usize);
    let tile_h = h.div_ceil(grid.1.max(1) as usize);
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    let mut luts = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for value in &plane[y * w + x0..y * w + x1] {
                    hist[*value as usize] += 1;
                }
            }
            let area = ((x1 - x0) * (y1 - y0)) as u32;
            luts.push(clipped_equalization_lut(&mut hist, area, clip_limit));
        }
    }

    let lut_at = |tx: usize, ty: usize| &luts[ty * tiles_x + tx];
    for y in 0..h {
        let (ty0, ty1, ay) = neighbours(y, tile_h, tiles_y);
        for x in 0..w {
            let (tx0, tx1, ax) = neighbours(x, tile_w, tiles_x);
            let value = plane[y * w + x] as usize;
            let top = lut_at(tx0, ty0)[value] as f32 * (1.0 - ax) + lut_at(tx1, ty0)[value] as f32 * ax;
            let bottom =
                lut_at(tx0, ty1)[value] as f32 * (1.0 - ax) + lut_at(tx1, ty1)[value] as f32 * ax;
            plane[y * w + x] = to_u8(top * (1.0 - ay) + bottom * ay);
        }
    }
}

/// Tiles whose centres bracket `pos`, and the weight of the second one.
fn neighbours(pos: usize, tile: usize, tiles: usize) -> (usize, usize, f32) {
    let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
    if f <= 0.0 {
        return (0, 0, 0.0);
    }
    let t0 = (f.floor() as usize).min(tiles - 1);
    let t1 = (t0 + 1).min(tiles - 1);
    let weight = if t0 == t1 { 0.0 } else { f - t0 as f32 };
    (t0, t1, weight)
}

fn clipped_equalization_lut(hist: &mut [u32; 256], area: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if area == 0 {
        for (i, item) in lut.iter_mut().enumerate() {
            *item = i as u8;
        }
        return lut;
    }

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }
        let spread = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += spread + u32::from(i < remainder);
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    for (bin, item) in hist.iter().zip(lut.iter_mut()) {
        cumulative += *bin;
        *item = to_u8(cumulative as f32 * scale);
    }
    lut
}

fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    (y, cb, cr)
}

fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32) -> [u8; 3] {
    let cb = cb - 128.0;
    let cr = cr - 128.0;
    [
        to_u8(y + 1.402 * cr),
        to_u8(y - 0.344_136 * cb - 0.714_136 * cr),
        to_u8(y + 1.772 * cb),
    ]
}

fn to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_world_removes_colour_cast() {
        let mut rgb = [100u8, 100, 150].repeat(16);
        gray_world_balance(&mut rgb, 0.99);
        for px in rgb.chunks_exact(3) {
            assert!(px.iter().all(|v| (*v as i32 - 117).abs() <= 1), "{px:?}");
        }
    }

    #[test]
    fn gray_world_ignores_fully_saturated_pixels() {
        // Pure red is saturation 1.0 and must not drive the estimate.
        let mut rgb = [[255u8, 0, 0], [90, 90, 90], [90, 90, 90]].concat();
        gray_world_balance(&mut rgb, 0.99);
        assert_eq!(&rgb[3..6], &[90, 90, 90]);
    }

    #[test]
    fn clahe_stretches_low_contrast_plane() {
        let (w, h) = (256u32, 256u32);
        let mut plane: Vec<u8> = (0..h)
            .flat_map(|_| (0..w).map(|x| 100 + (x / 16) as u8))
            .collect();
        let before = plane.iter().max().unwrap() - plane.iter().min().unwrap();

        clahe(&mut plane, w, h, 6.0, (8, 8));
        let after = plane.iter().max().unwrap() - plane.iter().min().unwrap();
        assert!(after > before, "range {before} -> {after}");
    }

    #[test]
    fn enhance_preserves_dimensions() {
        let frame = Frame::from_rgb([20u8, 30, 60].repeat(40 * 30), 40, 30).unwrap();
        let out = enhance_frame(&frame, &EnhanceSettings::default());
        assert_eq!((out.width(), out.height()), (40, 30));
        assert_eq!(out.pixels().len(), frame.pixels().len());
    }
}
