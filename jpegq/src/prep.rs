//! Pixel preparation ahead of comparison: luma extraction, nearest-neighbour
//! rescaling and fisheye correction.

use imgref::{ImgRef, ImgVec};

use crate::consts::{LUMA_B, LUMA_G, LUMA_R};
use crate::image::PixelBuffer;
use crate::Error;

/// Converts RGB samples to 8-bit luma, `Y = 0.299R + 0.587G + 0.114B`,
/// rounded half up.
///
/// Luma input is returned as a copy.
///
/// # Errors
/// Returns [`Error::UnsupportedComponents`] for anything but 1 or 3 components.
pub fn grayscale(img: &PixelBuffer) -> Result<PixelBuffer, Error> {
    if img.is_luma() {
        return Ok(img.clone());
    }
    if !img.is_rgb() {
        return Err(Error::UnsupportedComponents {
            components: img.components(),
        });
    }
    let (width, height) = (img.width(), img.height());
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        out.extend(
            img.rgb_row(y)
                .iter()
                .map(|px| luma(px.r, px.g, px.b)),
        );
    }
    Ok(PixelBuffer::packed(out, width, height, 1))
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    (f64::from(r) * LUMA_R + f64::from(g) * LUMA_G + f64::from(b) * LUMA_B + 0.5) as u8
}

/// Nearest-neighbour rescale to `width x height`.
///
/// Destination `(x, y)` samples source `(x / width * src_width + 0.5)`,
/// truncated and clamped to the last column/row.
///
/// # Panics
/// Panics if either target dimension is zero.
#[must_use]
pub fn rescale_nearest(img: ImgRef<'_, u8>, width: usize, height: usize) -> ImgVec<u8> {
    assert!(width > 0 && height > 0, "rescale target must be non-empty");
    let (src_w, src_h) = (img.width(), img.height());
    let map = |i: usize, new: usize, old: usize| -> usize {
        let pos = f64::from(i as f32 / new as f32 * old as f32) + 0.5;
        (pos as usize).min(old - 1)
    };
    let columns: Vec<usize> = (0..width).map(|x| map(x, width, src_w)).collect();
    let (buf, stride) = (img.buf(), img.stride());
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let start = map(y, height, src_h) * stride;
        let row = &buf[start..start + src_w];
        out.extend(columns.iter().map(|&sx| row[sx]));
    }
    ImgVec::new(out, width, height)
}

/// Clamps `value` into `[low, high]`.
#[inline]
#[must_use]
pub fn clamp(low: f32, value: f32, high: f32) -> f32 {
    if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    }
}

/// Bilinear sample of component `channel` at fractional `(x, y)`.
///
/// The result is truncated toward zero. Coordinates must lie inside the
/// image.
#[must_use]
pub fn interpolate(img: &PixelBuffer, x: f32, y: f32, channel: usize) -> u8 {
    let c = img.components();
    let (x1, x2) = (x.floor() as usize, x.ceil() as usize);
    let (y1, y2) = (y.floor() as usize, y.ceil() as usize);
    let px = f64::from(x - x1 as f32);
    let py = f64::from(y - y1 as f32);

    let sample = |sx: usize, sy: usize| f64::from(img.row(sy)[sx * c + channel]);
    let top = sample(x1, y1) * (1.0 - px) + sample(x2, y1) * px;
    let bottom = sample(x1, y2) * (1.0 - px) + sample(x2, y2) * px;
    (top * (1.0 - py) + bottom * py) as u8
}

/// Radial fisheye correction.
///
/// Each output pixel at distance `r` (normalized by the image diagonal and
/// scaled by `strength`) from the centre samples the input at
/// `atan(r) / r` times its offset, after scaling offsets by `zoom`.
#[must_use]
pub fn defish(img: &PixelBuffer, strength: f32, zoom: f32) -> PixelBuffer {
    let (width, height, c) = (img.width(), img.height(), img.components());
    let cx = (width / 2) as f32;
    let cy = (height / 2) as f32;
    let len = ((width * width + height * height) as f64).sqrt() as f32;
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    let mut out = vec![0u8; width * height * c];
    for y in 0..height {
        for x in 0..width {
            let dx = (cx - x as f32) * zoom;
            let dy = (cy - y as f32) * zoom;
            let r = (dx * dx + dy * dy).sqrt() / len * strength;
            let theta = if r == 0.0 { 1.0 } else { r.atan() / r };
            let sx = clamp(0.0, width as f32 / 2.0 - theta * dx, max_x);
            let sy = clamp(0.0, height as f32 / 2.0 - theta * dy, max_y);

            let base = (y * width + x) * c;
            for channel in 0..c {
                out[base + channel] = interpolate(img, sx, sy, channel);
            }
        }
    }
    PixelBuffer::packed(out, width, height, c)
}
