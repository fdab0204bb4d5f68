//! Numeric constants shared by the metrics and the optimizer.

// ============================================================================
// SSIM
// ============================================================================

/// Side of the circular-symmetric Gaussian window.
pub const GAUSSIAN_WINDOW_SIZE: usize = 11;
/// Standard deviation of the Gaussian window.
pub const GAUSSIAN_WINDOW_SIGMA: f64 = 1.5;
/// Side of the flat (linear) window.
pub const LINEAR_WINDOW_SIZE: usize = 8;

/// Luminance stabilization constant.
pub const SSIM_K1: f32 = 0.01;
/// Contrast stabilization constant.
pub const SSIM_K2: f32 = 0.03;
/// Dynamic range of 8-bit samples.
pub const SSIM_DYNAMIC_RANGE: u32 = 255;

/// Images whose short side exceeds this are pre-scaled before windowing.
pub const SSIM_SCALE_REFERENCE: f32 = 256.0;

// ============================================================================
// MS-SSIM
// ============================================================================

pub const MS_SSIM_SCALES: usize = 5;

/// Per-scale contrast exponents.
pub const MS_SSIM_BETAS: [f32; MS_SSIM_SCALES] = [0.0448, 0.2856, 0.3001, 0.2363, 0.1333];
/// Per-scale structure exponents.
pub const MS_SSIM_GAMMAS: [f32; MS_SSIM_SCALES] = [0.0448, 0.2856, 0.3001, 0.2363, 0.1333];
/// Luminance exponent, applied at the coarsest scale only.
pub const MS_SSIM_ALPHA: f32 = 0.1333;

/// Pyramid step between scales.
pub const MS_SSIM_DECIMATION: usize = 2;

/// 9x9 low-pass filter built from the CDF 9/7 analysis wavelet.
pub const LOWPASS_97_SIZE: usize = 9;
#[rustfmt::skip]
pub const LOWPASS_97: [f32; LOWPASS_97_SIZE * LOWPASS_97_SIZE] = [
     0.000714, -0.000450, -0.002090,  0.007132,  0.016114,  0.007132, -0.002090, -0.000450,  0.000714,
    -0.000450,  0.000283,  0.001316, -0.004490, -0.010146, -0.004490,  0.001316,  0.000283, -0.000450,
    -0.002090,  0.001316,  0.006115, -0.020867, -0.047149, -0.020867,  0.006115,  0.001316, -0.002090,
     0.007132, -0.004490, -0.020867,  0.071207,  0.160885,  0.071207, -0.020867, -0.004490,  0.007132,
     0.016114, -0.010146, -0.047149,  0.160885,  0.363505,  0.160885, -0.047149, -0.010146,  0.016114,
     0.007132, -0.004490, -0.020867,  0.071207,  0.160885,  0.071207, -0.020867, -0.004490,  0.007132,
    -0.002090,  0.001316,  0.006115, -0.020867, -0.047149, -0.020867,  0.006115,  0.001316, -0.002090,
    -0.000450,  0.000283,  0.001316, -0.004490, -0.010146, -0.004490,  0.001316,  0.000283, -0.000450,
     0.000714, -0.000450, -0.002090,  0.007132,  0.016114,  0.007132, -0.002090, -0.000450,  0.000714,
];

// ============================================================================
// smallfry
// ============================================================================

pub const SMALLFRY_PSNR_WEIGHT: f64 = 37.1891885161239;
pub const SMALLFRY_AAE_WEIGHT: f64 = 78.5328607296973;

/// Discontinuity ratio above which a block edge takes the full penalty.
pub const SMALLFRY_FULL_PENALTY: f64 = 5.0;
/// Discontinuity ratio above which a block edge takes a partial penalty.
pub const SMALLFRY_PARTIAL_PENALTY: f64 = 2.0;

/// JPEG block size; artifact scanning runs along these boundaries.
pub const BLOCK_SIZE: usize = 8;

// ============================================================================
// Pixel prep / hashing
// ============================================================================

pub const LUMA_R: f64 = 0.299;
pub const LUMA_G: f64 = 0.587;
pub const LUMA_B: f64 = 0.114;

pub const DEFAULT_HASH_SIZE: usize = 16;

// ============================================================================
// Recompression
// ============================================================================

/// Comment written into every recompressed file and checked on input.
pub const COMMENT: &str = "Compressed by jpeg-recompress";

pub const DEFAULT_ATTEMPTS: u32 = 6;
pub const DEFAULT_QUALITY_MIN: u8 = 40;
pub const DEFAULT_QUALITY_MAX: u8 = 95;

/// Upper bound on APPn/COM segments carried over from the input.
pub const MAX_METADATA_MARKERS: usize = 20;
