//! One-shot comparison of two decoded images.

use std::fmt;

use tracing::debug;

use crate::codec::ColorFormat;
use crate::hash::PerceptualHash;
use crate::image::PixelBuffer;
use crate::metrics::{mean_pixel_error, psnr};
use crate::ms_ssim::{ms_ssim, MsSsimParams};
use crate::prep::grayscale;
use crate::smallfry::smallfry;
use crate::ssim::{ssim, SsimParams, Window};
use crate::Error;

/// Comparison method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareMethod {
    /// Perceptual hash difference, 0..=99. Works across sizes.
    #[default]
    Fast,
    Psnr,
    Ssim,
    MsSsim,
    Smallfry,
    Mpe,
}

impl CompareMethod {
    /// Label printed next to scores.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Fast => "FAST",
            Self::Psnr => "PSNR",
            Self::Ssim => "SSIM",
            Self::MsSsim => "MS-SSIM",
            Self::Smallfry => "SMALLFRY",
            Self::Mpe => "MPE",
        }
    }

    /// Pixel layout the inputs should be decoded to.
    #[must_use]
    pub fn color_format(self) -> ColorFormat {
        match self {
            Self::Psnr => ColorFormat::Rgb,
            _ => ColorFormat::Luma,
        }
    }
}

/// Outcome of [`compare`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub method: CompareMethod,
    pub value: f64,
}

impl fmt::Display for Comparison {
    /// `fast` prints the bare difference; other methods print `LABEL: score`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method {
            CompareMethod::Fast => write!(f, "{}", self.value as u32),
            method => write!(f, "{}: {:.6}", method.label(), self.value),
        }
    }
}

/// Compares two images with `method`.
///
/// `hash_size` is only used by [`CompareMethod::Fast`].
///
/// # Errors
/// Every method except `Fast` returns [`Error::DimensionMismatch`] for
/// differently sized images. Metric errors are passed through.
pub fn compare(
    method: CompareMethod,
    a: &PixelBuffer,
    b: &PixelBuffer,
    hash_size: usize,
) -> Result<Comparison, Error> {
    if method != CompareMethod::Fast && !a.same_size(b) {
        return Err(Error::DimensionMismatch {
            w1: a.width(),
            h1: a.height(),
            w2: b.width(),
            h2: b.height(),
        });
    }

    let value = match method {
        CompareMethod::Fast => {
            let (ga, gb) = (grayscale(a)?, grayscale(b)?);
            let ha = PerceptualHash::from_luma(ga.as_luma()?, hash_size)?;
            let hb = PerceptualHash::from_luma(gb.as_luma()?, hash_size)?;
            f64::from(ha.difference(&hb)?)
        }
        CompareMethod::Psnr if a.components() == b.components() => psnr(a.samples(), b.samples())?,
        _ => {
            let (ga, gb) = (grayscale(a)?, grayscale(b)?);
            let (la, lb) = (ga.as_luma()?, gb.as_luma()?);
            match method {
                CompareMethod::Psnr => psnr(la, lb)?,
                CompareMethod::Ssim => {
                    ssim(la, lb, &SsimParams::new().with_window(Window::Linear))?
                }
                CompareMethod::MsSsim => ms_ssim(la, lb, &MsSsimParams::default())?,
                CompareMethod::Smallfry => smallfry(la, lb)?,
                CompareMethod::Mpe | CompareMethod::Fast => mean_pixel_error(la, lb)?,
            }
        }
    };
    debug!(method = method.label(), value, "compared");
    Ok(Comparison { method, value })
}
