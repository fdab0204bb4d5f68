//! Common test utilities for jpegq tests.
//!
//! Holds the 22x15 reference image used by the published SSIM test suite,
//! plus small helpers to build luma images and buffers from it.

#![allow(dead_code)]

pub mod generators;

use jpegq::{ImageF, Img, ImgVec, Kernel, PixelBuffer};

pub const FIXTURE_WIDTH: usize = 22;
pub const FIXTURE_HEIGHT: usize = 15;

/// 22x15 luma image with a diagonal band of dark pixels.
#[rustfmt::skip]
pub const FIXTURE: [u8; FIXTURE_WIDTH * FIXTURE_HEIGHT] = [
    27, 25, 83, 56, 139, 147, 119, 153, 147, 132, 113, 147, 160, 163, 169, 151, 148, 120, 113, 149, 132, 145,
    0, 0, 25, 25, 73, 49, 148, 145, 126, 127, 113, 110, 116, 102, 99, 118, 161, 149, 149, 129, 114, 137,
    136, 154, 0, 0, 24, 29, 76, 63, 143, 137, 114, 117, 116, 117, 147, 142, 119, 98, 163, 139, 147, 137,
    114, 117, 141, 147, 0, 0, 23, 23, 66, 51, 144, 144, 102, 95, 104, 130, 147, 161, 129, 125, 85, 131,
    97, 111, 119, 107, 132, 144, 0, 0, 24, 26, 36, 104, 135, 147, 110, 136, 101, 163, 170, 172, 150, 124,
    122, 135, 118, 85, 116, 120, 136, 147, 0, 0, 24, 21, 30, 51, 148, 151, 120, 33, 66, 79, 164, 95,
    50, 132, 130, 76, 117, 142, 120, 130, 137, 143, 0, 0, 25, 24, 48, 50, 147, 150, 145, 43, 120, 147,
    170, 136, 169, 155, 105, 132, 43, 118, 120, 143, 141, 153, 0, 0, 23, 23, 44, 46, 144, 158, 135, 149,
    110, 94, 122, 114, 149, 136, 74, 57, 92, 104, 99, 149, 166, 166, 0, 0, 25, 27, 61, 46, 143, 163,
    137, 151, 132, 64, 163, 174, 145, 74, 205, 91, 101, 88, 94, 95, 97, 95, 0, 0, 21, 26, 150, 39,
    149, 75, 89, 108, 111, 98, 19, 21, 80, 229, 26, 94, 100, 102, 106, 94, 110, 101, 0, 0, 21, 24,
    161, 38, 99, 110, 95, 112, 126, 94, 89, 63, 108, 228, 119, 111, 102, 99, 97, 105, 83, 99, 0, 0,
    24, 21, 155, 81, 112, 93, 71, 104, 111, 95, 111, 235, 64, 228, 105, 110, 113, 108, 98, 105, 112, 112,
    0, 0, 23, 20, 61, 92, 91, 69, 74, 107, 97, 98, 99, 117, 66, 92, 104, 104, 106, 106, 101, 74,
    86, 83, 0, 0, 21, 88, 83, 92, 95, 86, 94, 93, 86, 111, 98, 106, 86, 118, 110, 108, 113, 107,
];

/// The fixture as a luma image.
pub fn fixture() -> ImgVec<u8> {
    Img::new(FIXTURE.to_vec(), FIXTURE_WIDTH, FIXTURE_HEIGHT)
}

/// The fixture with every pixel raised by `delta`.
pub fn fixture_shifted(delta: u8) -> ImgVec<u8> {
    Img::new(
        FIXTURE.iter().map(|&p| p.saturating_add(delta)).collect(),
        FIXTURE_WIDTH,
        FIXTURE_HEIGHT,
    )
}

/// The fixture smoothed by a 2x2 averaging filter and rounded back to bytes.
pub fn fixture_blurred() -> ImgVec<u8> {
    let kernel = Kernel::new(vec![0.25; 4], 2, 2).unwrap();
    let smoothed = kernel.filter(&ImageF::from_luma(fixture().as_ref()));
    let mut out = Vec::with_capacity(FIXTURE.len());
    for y in 0..smoothed.height() {
        out.extend(smoothed.row(y).iter().map(|&v| v.round().clamp(0.0, 255.0) as u8));
    }
    Img::new(out, FIXTURE_WIDTH, FIXTURE_HEIGHT)
}

/// Packed luma buffer from raw samples.
pub fn luma(data: Vec<u8>, width: usize, height: usize) -> ImgVec<u8> {
    assert_eq!(data.len(), width * height, "luma buffer size");
    Img::new(data, width, height)
}

/// Packed RGB pixel buffer from raw interleaved samples.
pub fn rgb_buffer(data: Vec<u8>, width: usize, height: usize) -> PixelBuffer {
    PixelBuffer::new(data, width, height, 3).unwrap()
}

/// Binary PPM file contents for interleaved RGB samples.
pub fn ppm(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = format!("P6\n{width} {height}\n255\n").into_bytes();
    out.extend_from_slice(data);
    out
}

#[track_caller]
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}
