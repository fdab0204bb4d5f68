//! smallfry: PSNR blended with a JPEG block-edge artifact penalty.
//!
//! Both factors are normalized against the peak luma of the reference, so
//! dark images are judged more leniently.

use imgref::ImgRef;

use crate::consts::{
    BLOCK_SIZE, SMALLFRY_AAE_WEIGHT, SMALLFRY_FULL_PENALTY, SMALLFRY_PARTIAL_PENALTY,
    SMALLFRY_PSNR_WEIGHT,
};
use crate::{check_same_size, Error};

/// Computes the smallfry score between two luma images. Higher is better;
/// identical images score about 115.7.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if the images differ in size and
/// [`Error::ImageTooSmall`] if either side is shorter than one 8x8 block.
pub fn smallfry(reference: ImgRef<'_, u8>, distorted: ImgRef<'_, u8>) -> Result<f64, Error> {
    check_same_size(reference, distorted)?;
    let (width, height) = (reference.width(), reference.height());
    if width < BLOCK_SIZE || height < BLOCK_SIZE {
        return Err(Error::ImageTooSmall {
            width,
            height,
            min: BLOCK_SIZE,
        });
    }

    let max = max_luma(reference);
    let p = psnr_factor(reference, distorted, max);
    let a = aae_factor(reference, distorted, max);
    Ok(p * SMALLFRY_PSNR_WEIGHT + a * SMALLFRY_AAE_WEIGHT)
}

fn max_luma(img: ImgRef<'_, u8>) -> u8 {
    img.rows()
        .flat_map(|row| row.iter().copied())
        .max()
        .unwrap_or(0)
}

fn psnr_factor(reference: ImgRef<'_, u8>, distorted: ImgRef<'_, u8>, max: u8) -> f64 {
    let mut sum = 0u64;
    for (a, b) in reference.rows().zip(distorted.rows()) {
        for (&p, &q) in a.iter().zip(b) {
            let d = u64::from(p.abs_diff(q));
            sum += d * d;
        }
    }
    let mse = sum as f64 / (reference.width() * reference.height()) as f64;
    let mut ret = 10.0 * (65025.0 / mse).log10();

    let max = f64::from(max);
    if max > 128.0 {
        ret /= 50.0;
    } else {
        ret /= (0.0016 * (max * max)) - (0.38 * max + 72.5);
    }
    ret.min(1.0).max(0.0)
}

/// Ratio of the step across a block edge to the mean step beside it.
#[inline]
fn edge_ratio(before: i32, left: i32, right: i32, after: i32) -> f64 {
    let step = f64::from((left - right).abs());
    let beside = f64::from((before - left).abs() + (right - after).abs());
    step / ((beside + 0.0001) / 2.0)
}

#[inline]
fn penalty(ratio: f64) -> f64 {
    if ratio > SMALLFRY_FULL_PENALTY {
        1.0
    } else if ratio > SMALLFRY_PARTIAL_PENALTY {
        (ratio - SMALLFRY_PARTIAL_PENALTY) / (SMALLFRY_FULL_PENALTY - SMALLFRY_PARTIAL_PENALTY)
    } else {
        0.0
    }
}

fn aae_factor(reference: ImgRef<'_, u8>, distorted: ImgRef<'_, u8>, max: u8) -> f64 {
    let (width, height) = (reference.width(), reference.height());
    let (rb, rs) = (reference.buf(), reference.stride());
    let (db, ds) = (distorted.buf(), distorted.stride());
    let diff = |x: usize, y: usize| i32::from(rb[y * rs + x].abs_diff(db[y * ds + x]));

    let mut sum = 0.0f64;
    let mut count = 0usize;

    // Vertical block edges, every row
    for y in 0..height {
        let mut x = BLOCK_SIZE - 1;
        while x + 2 < width {
            count += 1;
            sum += penalty(edge_ratio(
                diff(x - 1, y),
                diff(x, y),
                diff(x + 1, y),
                diff(x + 2, y),
            ));
            x += BLOCK_SIZE;
        }
    }

    // Horizontal block edges, every column
    let mut y = BLOCK_SIZE - 1;
    while y + 2 < height {
        for x in 0..width {
            count += 1;
            sum += penalty(edge_ratio(
                diff(x, y - 1),
                diff(x, y),
                diff(x, y + 1),
                diff(x, y + 2),
            ));
        }
        y += BLOCK_SIZE;
    }

    if count == 0 {
        return 1.0;
    }

    let ret = 1.0 - sum / count as f64;
    let max = f64::from(max);
    let cf_max = if max > 128.0 {
        0.65
    } else {
        0.65 + 0.35 * ((128.0 - max) / 128.0)
    };
    let cf = cf_max.max((0.25 + (1000.0 * count as f64) / sum).min(1.0));
    ret * cf
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::Img;

    fn gradient(width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .map(|i| (40 + (i % width) * 3 + (i / width) * 2) as u8)
            .collect()
    }

    #[test]
    fn test_identical_scores_full_weight() {
        let img = Img::new(gradient(32, 32), 32, 32);
        let score = smallfry(img.as_ref(), img.as_ref()).unwrap();
        let expected = SMALLFRY_PSNR_WEIGHT + SMALLFRY_AAE_WEIGHT;
        assert!((score - expected).abs() < 1e-9, "{score}");
    }

    #[test]
    fn test_penalty_ramp() {
        assert_eq!(penalty(1.0), 0.0);
        assert_eq!(penalty(2.0), 0.0);
        assert!((penalty(3.5) - 0.5).abs() < 1e-12);
        assert_eq!(penalty(5.0), 1.0);
        assert_eq!(penalty(9.0), 1.0);
    }

    #[test]
    fn test_blocking_is_penalized() {
        let (w, h) = (32, 32);
        let reference = gradient(w, h);
        // Fine dither versus alternating block offsets
        let mut smooth = reference.clone();
        let mut blocky = reference.clone();
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                smooth[i] = smooth[i].wrapping_add(if (x + y) % 2 == 0 { 2 } else { 0 });
                if (x / 8) % 2 == 1 {
                    blocky[i] = blocky[i].wrapping_add(12);
                }
            }
        }
        let a = smallfry(
            Img::new(reference.clone(), w, h).as_ref(),
            Img::new(smooth, w, h).as_ref(),
        )
        .unwrap();
        let b = smallfry(
            Img::new(reference, w, h).as_ref(),
            Img::new(blocky, w, h).as_ref(),
        )
        .unwrap();
        assert!(a > b, "{a} <= {b}");
    }

    #[test]
    fn test_psnr_factor_clamped() {
        let a = Img::new(vec![200u8; 64], 8, 8);
        let b = Img::new(vec![0u8; 64], 8, 8);
        let f = psnr_factor(a.as_ref(), b.as_ref(), 200);
        assert!((0.0..=1.0).contains(&f));
        // Black reference flips the normalization sign
        let black = Img::new(vec![0u8; 64], 8, 8);
        let grey = Img::new(vec![3u8; 64], 8, 8);
        assert_eq!(psnr_factor(black.as_ref(), grey.as_ref(), 0), 0.0);
    }

    #[test]
    fn test_too_small() {
        let img = Img::new(vec![0u8; 7 * 20], 7, 20);
        assert!(matches!(
            smallfry(img.as_ref(), img.as_ref()),
            Err(Error::ImageTooSmall { min: 8, .. })
        ));
    }

    #[test]
    fn test_single_block_has_no_edges() {
        let a = Img::new(gradient(8, 8), 8, 8);
        let b: Vec<u8> = gradient(8, 8).iter().map(|v| v + 1).collect();
        let b = Img::new(b, 8, 8);
        assert_eq!(aae_factor(a.as_ref(), b.as_ref(), 200), 1.0);
    }
}
