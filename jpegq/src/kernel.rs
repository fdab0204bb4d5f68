//! Windowed filter kernels.
//!
//! A [`Kernel`] is a small rectangular weight matrix. It is applied either as
//! a same-size filter that reads past the image edges through the kernel's
//! [`Boundary`] policy, or as a "valid" convolution that only visits
//! positions where the whole window fits inside the image.
//!
//! Products are formed in f32 and accumulated in f64, row by row, in kernel
//! order. Windows with an even side are anchored so that the extra tap falls
//! on the low (left/top) side of the output position.

use crate::consts::{LOWPASS_97, LOWPASS_97_SIZE};
use crate::image::ImageF;
use crate::Error;

/// Allowed deviation of a kernel's weight sum from 1.
const NORMALIZATION_TOLERANCE: f64 = 1e-3;

/// How samples outside the image are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Boundary {
    /// Mirror across the nearest edge, repeating the edge sample
    /// (`-1 → 0`, `-2 → 1`, `w → w-1`).
    #[default]
    Symmetric,
}

impl Boundary {
    #[inline]
    fn resolve(self, i: isize, len: usize) -> usize {
        match self {
            Self::Symmetric => reflect(i, len),
        }
    }
}

/// Maps `i` into `0..len` by symmetric reflection.
#[inline]
pub(crate) fn reflect(i: isize, len: usize) -> usize {
    let n = len as isize;
    if (0..n).contains(&i) {
        return i as usize;
    }
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m < n {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Immutable 2D filter weights, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: Vec<f32>,
    width: usize,
    height: usize,
    boundary: Boundary,
}

impl Kernel {
    /// Creates a kernel from row-major weights.
    ///
    /// # Errors
    /// Returns [`Error::InvalidKernel`] if the weight count does not match the
    /// shape, and [`Error::UnnormalizedKernel`] if the weights do not sum to 1.
    pub fn new(weights: Vec<f32>, width: usize, height: usize) -> Result<Self, Error> {
        if width == 0 || height == 0 || weights.len() != width * height {
            return Err(Error::InvalidKernel {
                width,
                height,
                len: weights.len(),
            });
        }
        let sum: f64 = weights.iter().map(|&w| f64::from(w)).sum();
        if (sum - 1.0).abs() > NORMALIZATION_TOLERANCE {
            return Err(Error::UnnormalizedKernel { sum });
        }
        Ok(Self {
            weights,
            width,
            height,
            boundary: Boundary::Symmetric,
        })
    }

    /// Square averaging window with every weight `1 / size²`.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    #[must_use]
    pub fn box_filter(size: usize) -> Self {
        assert!(size > 0, "box filter needs a non-zero size");
        let weight = 1.0 / (size * size) as f32;
        Self {
            weights: vec![weight; size * size],
            width: size,
            height: size,
            boundary: Boundary::Symmetric,
        }
    }

    /// Circular-symmetric Gaussian window of odd `size`.
    ///
    /// Weights are normalized and then rounded to six decimals, which is the
    /// published precision of the SSIM reference window.
    #[must_use]
    pub fn gaussian(size: usize, sigma: f64) -> Self {
        let center = (size / 2) as f64;
        let denom = 2.0 * sigma * sigma;
        let raw: Vec<f64> = (0..size * size)
            .map(|i| {
                let dx = (i % size) as f64 - center;
                let dy = (i / size) as f64 - center;
                (-(dx * dx + dy * dy) / denom).exp()
            })
            .collect();
        let sum: f64 = raw.iter().sum();
        let weights = raw
            .iter()
            .map(|&w| ((w / sum) * 1e6).round() / 1e6)
            .map(|w| w as f32)
            .collect();
        Self {
            weights,
            width: size,
            height: size,
            boundary: Boundary::Symmetric,
        }
    }

    /// 9x9 CDF 9/7 low-pass filter used between pyramid levels.
    #[must_use]
    pub fn lowpass_97() -> Self {
        Self {
            weights: LOWPASS_97.to_vec(),
            width: LOWPASS_97_SIZE,
            height: LOWPASS_97_SIZE,
            boundary: Boundary::Symmetric,
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[must_use]
    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Output size of [`Kernel::convolve_valid`] for an input of the given
    /// size, or `None` when the window does not fit at all.
    #[must_use]
    pub fn valid_size(&self, width: usize, height: usize) -> Option<(usize, usize)> {
        if width < self.width || height < self.height {
            return None;
        }
        Some((width - self.width + 1, height - self.height + 1))
    }

    /// Filters the single output position `(x, y)`.
    #[must_use]
    pub fn filter_at(&self, img: &ImageF, x: usize, y: usize) -> f32 {
        let (w, h) = (img.width(), img.height());
        let x0 = x as isize - (self.width / 2) as isize;
        let y0 = y as isize - (self.height / 2) as isize;
        let interior = x0 >= 0
            && y0 >= 0
            && x0 as usize + self.width <= w
            && y0 as usize + self.height <= h;

        let mut sum = 0.0f64;
        for (j, krow) in self.weights.chunks_exact(self.width).enumerate() {
            let row = img.row(self.boundary.resolve(y0 + j as isize, h));
            if interior {
                let start = x0 as usize;
                for (&p, &k) in row[start..start + self.width].iter().zip(krow) {
                    sum += f64::from(p * k);
                }
            } else {
                for (i, &k) in krow.iter().enumerate() {
                    let sx = self.boundary.resolve(x0 + i as isize, w);
                    sum += f64::from(row[sx] * k);
                }
            }
        }
        sum as f32
    }

    /// Same-size filter with boundary extension.
    #[must_use]
    pub fn filter(&self, img: &ImageF) -> ImageF {
        let mut out = ImageF::new(img.width(), img.height());
        self.filter_rows(img, &mut out);
        out
    }

    /// Same-size filter writing into a caller-provided image.
    ///
    /// # Errors
    /// Returns [`Error::DimensionMismatch`] if `dst` differs in size from `src`.
    pub fn filter_into(&self, src: &ImageF, dst: &mut ImageF) -> Result<(), Error> {
        if !src.same_size(dst) {
            return Err(Error::DimensionMismatch {
                w1: src.width(),
                h1: src.height(),
                w2: dst.width(),
                h2: dst.height(),
            });
        }
        self.filter_rows(src, dst);
        Ok(())
    }

    /// Same-size filter replacing the contents of `img`.
    pub fn filter_in_place(&self, img: &mut ImageF) {
        let filtered = self.filter(img);
        img.copy_from(&filtered);
    }

    fn filter_rows(&self, src: &ImageF, dst: &mut ImageF) {
        for y in 0..src.height() {
            for x in 0..src.width() {
                dst.set(x, y, self.filter_at(src, x, y));
            }
        }
    }

    /// Convolution over positions where the whole window lies inside `img`.
    ///
    /// The result is `(w - kw + 1) x (h - kh + 1)`; output `(x, y)` covers
    /// input columns `x..x + kw` and rows `y..y + kh`.
    ///
    /// # Errors
    /// Returns [`Error::ImageTooSmall`] if the window is larger than the image.
    pub fn convolve_valid(&self, img: &ImageF) -> Result<ImageF, Error> {
        let (dw, dh) =
            self.valid_size(img.width(), img.height())
                .ok_or(Error::ImageTooSmall {
                    width: img.width(),
                    height: img.height(),
                    min: self.width.max(self.height),
                })?;
        let mut out = ImageF::new(dw, dh);
        for y in 0..dh {
            let out_row = out.row_mut(y);
            for (x, dst) in out_row.iter_mut().enumerate() {
                let mut sum = 0.0f64;
                for (j, krow) in self.weights.chunks_exact(self.width).enumerate() {
                    let row = &img.row(y + j)[x..x + self.width];
                    for (&p, &k) in row.iter().zip(krow) {
                        sum += f64::from(p * k);
                    }
                }
                *dst = sum as f32;
            }
        }
        Ok(out)
    }
}
