//! # jpegq
//!
//! Perceptual image similarity metrics and a quality-targeted JPEG
//! recompressor built on them.
//!
//! The metric engine compares two equally sized 8-bit images:
//! - [`mse`], [`psnr`] and [`mean_pixel_error`]: per-sample error measures
//! - [`ssim`]: windowed structural similarity (Gaussian 11x11 or flat 8x8)
//! - [`ms_ssim`]: multi-scale SSIM over a 9/7 low-pass pyramid
//! - [`smallfry`]: PSNR blended with a JPEG block-edge artifact penalty
//!
//! [`PerceptualHash`] is a gradient hash for near-duplicate detection, and
//! [`recompress`] bisects JPEG quality until one of the metrics reaches a
//! target score.
//!
//! ## Example
//!
//! ```rust
//! use jpegq::{ssim, Img, SsimParams};
//!
//! let width = 32;
//! let height = 32;
//! let pixels: Vec<u8> = (0..width * height).map(|i| (i * 7 % 251) as u8).collect();
//! let img = Img::new(pixels, width, height);
//!
//! let score = ssim(img.as_ref(), img.as_ref(), &SsimParams::default())?;
//! assert!((score - 1.0).abs() < 1e-5);
//! # Ok::<(), jpegq::Error>(())
//! ```
//!
//! ## Features
//!
//! - **`codec`** (default): [`ImageCodec`], a JPEG/PPM codec backed by the
//!   `image` crate

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::float_cmp)]

pub mod consts;
pub mod decimate;
pub mod image;
pub mod kernel;

mod codec;
mod compare;
mod filetype;
mod hash;
mod metadata;
mod metrics;
mod ms_ssim;
pub mod prep;
mod recompress;
mod smallfry;
mod ssim;

pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::RGB8;

#[cfg(feature = "codec")]
pub use codec::ImageCodec;
pub use codec::{Codec, ColorFormat, EncodeSettings, Subsampling};
pub use compare::{compare, CompareMethod, Comparison};
pub use filetype::{FileType, InputType};
pub use hash::PerceptualHash;
pub use image::{ImageF, PixelBuffer};
pub use kernel::{Boundary, Kernel};
pub use metadata::{scan_metadata, Metadata};
pub use metrics::{mean_pixel_error, mse, psnr};
pub use ms_ssim::{ms_ssim, MsSsimParams, MsSsimVariant};
pub use recompress::{
    recompress, CopyReason, Method, QualityPreset, RecompressError, RecompressOptions, Recompressed,
};
pub use smallfry::smallfry;
pub use ssim::{ssim, SsimFormula, SsimParams, Window};

/// Error type for metric, pixel and codec operations.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Image is too small for the requested operation.
    ImageTooSmall {
        /// Image width.
        width: usize,
        /// Image height.
        height: usize,
        /// Smallest usable side.
        min: usize,
    },
    /// Image dimensions don't match.
    DimensionMismatch {
        /// First image width.
        w1: usize,
        /// First image height.
        h1: usize,
        /// Second image width.
        w2: usize,
        /// Second image height.
        h2: usize,
    },
    /// Zero width or height.
    InvalidDimensions {
        /// Width provided.
        width: usize,
        /// Height provided.
        height: usize,
    },
    /// Buffer is shorter than its dimensions require.
    InvalidBufferSize {
        /// Minimum buffer size.
        expected: usize,
        /// Actual buffer size.
        actual: usize,
    },
    /// Row stride is shorter than a packed row.
    InvalidStride {
        /// Stride provided, in samples.
        stride: usize,
        /// Packed row length, in samples.
        row: usize,
    },
    /// Only luma (1) and RGB (3) samples are supported here.
    UnsupportedComponents {
        /// Component count provided.
        components: usize,
    },
    /// Kernel weight count doesn't match its shape.
    InvalidKernel {
        /// Kernel width.
        width: usize,
        /// Kernel height.
        height: usize,
        /// Number of weights provided.
        len: usize,
    },
    /// Kernel weights don't sum to 1.
    UnnormalizedKernel {
        /// Actual weight sum.
        sum: f64,
    },
    /// Per-scale weight vectors are shorter than the scale count.
    InvalidWeights {
        /// Requested scales.
        scales: usize,
        /// Contrast weights provided.
        betas: usize,
        /// Structure weights provided.
        gammas: usize,
    },
    /// Hash size must be non-zero.
    InvalidHashSize {
        /// Size provided.
        size: usize,
    },
    /// Hashes of different sizes can't be compared.
    HashSizeMismatch {
        /// Bits in the first hash.
        left: usize,
        /// Bits in the second hash.
        right: usize,
    },
    /// Text is not a square string of '0'/'1'.
    InvalidHashString {
        /// Length of the rejected text.
        len: usize,
    },
    /// Input is neither JPEG nor PPM.
    UnknownFileType,
    /// The codec failed to decode or encode.
    Codec {
        /// Backend error message.
        message: String,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ImageTooSmall { width, height, min } => {
                write!(f, "image too small: {width}x{height} (minimum {min}x{min})")
            }
            Self::DimensionMismatch { w1, h1, w2, h2 } => {
                write!(f, "image dimensions don't match: {w1}x{h1} vs {w2}x{h2}")
            }
            Self::InvalidDimensions { width, height } => {
                write!(f, "invalid dimensions: {width}x{height}")
            }
            Self::InvalidBufferSize { expected, actual } => {
                write!(f, "buffer size {actual} is smaller than required {expected}")
            }
            Self::InvalidStride { stride, row } => {
                write!(f, "stride {stride} is shorter than row length {row}")
            }
            Self::UnsupportedComponents { components } => {
                write!(f, "unsupported component count {components}")
            }
            Self::InvalidKernel { width, height, len } => {
                write!(f, "kernel {width}x{height} needs {} weights, got {len}", width * height)
            }
            Self::UnnormalizedKernel { sum } => {
                write!(f, "kernel weights sum to {sum}, expected 1")
            }
            Self::InvalidWeights {
                scales,
                betas,
                gammas,
            } => write!(
                f,
                "{scales} scales need as many weights (got {betas} contrast, {gammas} structure)"
            ),
            Self::InvalidHashSize { size } => write!(f, "invalid hash size {size}"),
            Self::HashSizeMismatch { left, right } => {
                write!(f, "hash sizes don't match: {left} vs {right} bits")
            }
            Self::InvalidHashString { len } => {
                write!(f, "invalid hash string of length {len}")
            }
            Self::UnknownFileType => write!(f, "unknown file type"),
            Self::Codec { message } => write!(f, "codec error: {message}"),
        }
    }
}

impl std::error::Error for Error {}

/// Returns an error unless both views have the same dimensions.
pub(crate) fn check_same_size<T>(a: ImgRef<'_, T>, b: ImgRef<'_, T>) -> Result<(), Error> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(Error::DimensionMismatch {
            w1: a.width(),
            h1: a.height(),
            w2: b.width(),
            h2: b.height(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::DimensionMismatch {
            w1: 8,
            h1: 8,
            w2: 16,
            h2: 16,
        };
        assert_eq!(err.to_string(), "image dimensions don't match: 8x8 vs 16x16");

        let err = Error::ImageTooSmall {
            width: 4,
            height: 4,
            min: 8,
        };
        assert!(err.to_string().contains("4x4"));
        assert_eq!(Error::UnknownFileType.to_string(), "unknown file type");
    }

    #[test]
    fn test_check_same_size() {
        let a = Img::new(vec![0u8; 6], 3, 2);
        let b = Img::new(vec![0u8; 6], 2, 3);
        assert!(check_same_size(a.as_ref(), a.as_ref()).is_ok());
        assert!(matches!(
            check_same_size(a.as_ref(), b.as_ref()),
            Err(Error::DimensionMismatch { w1: 3, h1: 2, w2: 2, h2: 3 })
        ));
    }
}
