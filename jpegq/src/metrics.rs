//! Per-sample error measures.
//!
//! These work on raw sample grids, so an RGB buffer is passed through
//! [`PixelBuffer::samples`](crate::PixelBuffer::samples) and every channel
//! counts as one sample.

use imgref::ImgRef;

use crate::{check_same_size, Error};

/// Mean of squared per-sample differences.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if the images differ in size.
pub fn mse(reference: ImgRef<'_, u8>, distorted: ImgRef<'_, u8>) -> Result<f64, Error> {
    check_same_size(reference, distorted)?;
    let mut sum = 0u64;
    for (a, b) in reference.rows().zip(distorted.rows()) {
        for (&p, &q) in a.iter().zip(b) {
            let d = u64::from(p.abs_diff(q));
            sum += d * d;
        }
    }
    Ok(sum as f64 / sample_count(reference))
}

/// Peak signal-to-noise ratio in dB, `10 * log10(255² / MSE)`.
///
/// Identical images give `f64::INFINITY`.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if the images differ in size.
pub fn psnr(reference: ImgRef<'_, u8>, distorted: ImgRef<'_, u8>) -> Result<f64, Error> {
    let mse = mse(reference, distorted)?;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (255.0 * 255.0 / mse).log10())
}

/// Mean absolute per-sample difference. Lower is more similar.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if the images differ in size.
pub fn mean_pixel_error(
    reference: ImgRef<'_, u8>,
    distorted: ImgRef<'_, u8>,
) -> Result<f64, Error> {
    check_same_size(reference, distorted)?;
    let mut sum = 0u64;
    for (a, b) in reference.rows().zip(distorted.rows()) {
        sum += a
            .iter()
            .zip(b)
            .map(|(&p, &q)| u64::from(p.abs_diff(q)))
            .sum::<u64>();
    }
    Ok(sum as f64 / sample_count(reference))
}

fn sample_count(img: ImgRef<'_, u8>) -> f64 {
    (img.width() * img.height()) as f64
}
