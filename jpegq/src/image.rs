//! Image buffer types.
//!
//! [`PixelBuffer`] owns 8-bit samples as a decoder produces them (luma or
//! interleaved RGB) and may carry row padding. [`ImageF`] is the f32 plane
//! that every windowed computation in this crate runs on.

use std::ops::{Index, IndexMut};

use imgref::{Img, ImgRef};
use rgb::{FromSlice, RGB8};

use crate::Error;

/// Owned 8-bit samples with an explicit row stride.
///
/// `components` is 1 for luma and 3 for interleaved RGB. `stride` counts
/// samples (not pixels) and is never smaller than `width * components`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
    stride: usize,
    components: usize,
}

impl PixelBuffer {
    /// Wraps tightly packed samples.
    ///
    /// # Errors
    /// See [`PixelBuffer::with_stride`].
    pub fn new(data: Vec<u8>, width: usize, height: usize, components: usize) -> Result<Self, Error> {
        Self::with_stride(data, width, height, width * components, components)
    }

    /// Wraps samples whose rows are `stride` samples apart.
    ///
    /// # Errors
    /// Returns an error for zero dimensions, a component count other than
    /// 1 or 3, a stride shorter than a packed row, or a buffer too short to
    /// hold the last row.
    pub fn with_stride(
        data: Vec<u8>,
        width: usize,
        height: usize,
        stride: usize,
        components: usize,
    ) -> Result<Self, Error> {
        if components != 1 && components != 3 {
            return Err(Error::UnsupportedComponents { components });
        }
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        let row = width * components;
        if stride < row {
            return Err(Error::InvalidStride { stride, row });
        }
        let expected = stride * (height - 1) + row;
        if data.len() < expected {
            return Err(Error::InvalidBufferSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
            components,
        })
    }

    /// Wraps packed samples produced inside the crate.
    pub(crate) fn packed(data: Vec<u8>, width: usize, height: usize, components: usize) -> Self {
        debug_assert_eq!(data.len(), width * height * components);
        Self {
            data,
            width,
            height,
            stride: width * components,
            components,
        }
    }

    /// Copies a luma view into a packed buffer.
    #[must_use]
    pub fn from_luma(img: ImgRef<'_, u8>) -> Self {
        let mut data = Vec::with_capacity(img.width() * img.height());
        for row in img.rows() {
            data.extend_from_slice(row);
        }
        Self {
            data,
            width: img.width(),
            height: img.height(),
            stride: img.width(),
            components: 1,
        }
    }

    /// Copies an RGB view into a packed buffer.
    #[must_use]
    pub fn from_rgb(img: ImgRef<'_, RGB8>) -> Self {
        let mut data = Vec::with_capacity(img.width() * img.height() * 3);
        for row in img.rows() {
            for px in row {
                data.extend_from_slice(&[px.r, px.g, px.b]);
            }
        }
        Self {
            data,
            width: img.width(),
            height: img.height(),
            stride: img.width() * 3,
            components: 3,
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

    /// Samples per row, including padding.
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    #[must_use]
    pub fn components(&self) -> usize {
        self.components
    }

    #[must_use]
    pub fn is_luma(&self) -> bool {
        self.components == 1
    }

    #[must_use]
    pub fn is_rgb(&self) -> bool {
        self.components == 3
    }

    /// Returns `true` when both buffers have the same width and height.
    #[must_use]
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Returns the samples of row `y` without padding.
    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width * self.components]
    }

    /// Mutable samples of row `y` without padding.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride;
        let len = self.width * self.components;
        &mut self.data[start..start + len]
    }

    /// Views the buffer as a grid of raw samples, `width * components` wide.
    #[must_use]
    pub fn samples(&self) -> ImgRef<'_, u8> {
        Img::new_stride(
            &self.data[..],
            self.width * self.components,
            self.height,
            self.stride,
        )
    }

    /// Views a single-component buffer as a luma image.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedComponents`] for RGB buffers.
    pub fn as_luma(&self) -> Result<ImgRef<'_, u8>, Error> {
        if !self.is_luma() {
            return Err(Error::UnsupportedComponents {
                components: self.components,
            });
        }
        Ok(self.samples())
    }

    /// Returns row `y` of an RGB buffer as pixels.
    ///
    /// # Panics
    /// Panics if the buffer is not RGB.
    #[must_use]
    pub fn rgb_row(&self, y: usize) -> &[RGB8] {
        assert!(self.is_rgb(), "rgb_row on a {}-component buffer", self.components);
        self.row(y).as_rgb()
    }

    /// Returns the samples with row padding removed.
    #[must_use]
    pub fn to_packed(&self) -> Vec<u8> {
        if self.stride == self.width * self.components {
            let len = self.width * self.components * self.height;
            return self.data[..len].to_vec();
        }
        let mut out = Vec::with_capacity(self.width * self.components * self.height);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }

    /// Raw storage, including padding.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Single-channel floating point image.
///
/// Every filter, decimation and SSIM map in this crate stores its samples
/// as f32 in one of these, with rows padded for alignment.
#[derive(Debug, Clone)]
pub struct ImageF {
    data: Vec<f32>,
    width: usize,
    height: usize,
    stride: usize, // pixels per row (may be > width for alignment)
}

impl ImageF {
    /// Creates a new image filled with zeros.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        // Align stride to 16 floats (64 bytes)
        let stride = (width + 15) & !15;
        Self {
            data: vec![0.0; stride * height],
            width,
            height,
            stride,
        }
    }

    /// Creates an image from packed row-major data.
    ///
    /// # Panics
    /// Panics if data length doesn't match width * height.
    #[must_use]
    pub fn from_vec(data: Vec<f32>, width: usize, height: usize) -> Self {
        assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
            stride: width,
        }
    }

    /// Converts an 8-bit luma view, honouring its stride.
    #[must_use]
    pub fn from_luma(img: ImgRef<'_, u8>) -> Self {
        let mut out = Self::new(img.width(), img.height());
        for (y, row) in img.rows().enumerate() {
            for (dst, &src) in out.row_mut(y).iter_mut().zip(row) {
                *dst = f32::from(src);
            }
        }
        out
    }

    /// Image width in pixels.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Image height in pixels.
    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels per row (may include padding).
    #[inline]
    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns a reference to a row.
    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// Returns a mutable reference to a row.
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// Gets a pixel value.
    #[inline]
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.stride + x]
    }

    /// Sets a pixel value.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.stride + x] = value;
    }

    /// Checks if two images have the same dimensions.
    #[must_use]
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Copies data from another image.
    ///
    /// # Panics
    /// Panics if dimensions don't match.
    pub fn copy_from(&mut self, other: &Self) {
        assert!(self.same_size(other));
        for y in 0..self.height {
            self.row_mut(y).copy_from_slice(other.row(y));
        }
    }

    /// Applies `f` to every pixel pair of two equally sized images.
    pub(crate) fn zip_map(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Self {
        debug_assert!(self.same_size(other));
        let mut out = Self::new(self.width, self.height);
        for y in 0..self.height {
            let (a, b) = (self.row(y), other.row(y));
            for ((dst, &p), &q) in out.row_mut(y).iter_mut().zip(a).zip(b) {
                *dst = f(p, q);
            }
        }
        out
    }

    /// Sum of all pixels, accumulated in f64.
    #[must_use]
    pub fn sum(&self) -> f64 {
        (0..self.height)
            .map(|y| self.row(y).iter().map(|&v| f64::from(v)).sum::<f64>())
            .sum()
    }
}

impl Index<(usize, usize)> for ImageF {
    type Output = f32;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.data[y * self.stride + x]
    }
}

impl IndexMut<(usize, usize)> for ImageF {
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        &mut self.data[y * self.stride + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_creation() {
        let img = ImageF::new(100, 50);
        assert_eq!(img.width(), 100);
        assert_eq!(img.height(), 50);
        assert!(img.stride() >= 100);
        assert_eq!(img.stride() % 16, 0);
    }

    #[test]
    fn test_pixel_access() {
        let mut img = ImageF::new(10, 10);
        img.set(5, 3, 42.0);
        assert!((img.get(5, 3) - 42.0).abs() < 0.001);
        assert!((img[(5, 3)] - 42.0).abs() < 0.001);
    }

    #[test]
    fn test_from_luma_honours_stride() {
        // 3x2 image with one padding byte per row
        let data = [1u8, 2, 3, 99, 4, 5, 6, 99];
        let view = Img::new_stride(&data[..], 3, 2, 4);
        let img = ImageF::from_luma(view);
        assert_eq!(img.row(0), &[1.0, 2.0, 3.0]);
        assert_eq!(img.row(1), &[4.0, 5.0, 6.0]);
        assert!((img.sum() - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_pixel_buffer_validation() {
        assert!(matches!(
            PixelBuffer::new(vec![0; 8], 2, 2, 2),
            Err(Error::UnsupportedComponents { components: 2 })
        ));
        assert!(matches!(
            PixelBuffer::with_stride(vec![0; 12], 2, 2, 5, 3),
            Err(Error::InvalidStride { stride: 5, row: 6 })
        ));
        assert!(matches!(
            PixelBuffer::new(vec![0; 5], 2, 2, 3),
            Err(Error::InvalidBufferSize { expected: 12, actual: 5 })
        ));
        assert!(matches!(
            PixelBuffer::new(Vec::new(), 0, 4, 1),
            Err(Error::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_pixel_buffer_rows_and_packing() {
        let data = vec![10, 20, 30, 0, 40, 50, 60, 0];
        let buf = PixelBuffer::with_stride(data, 1, 2, 4, 3).unwrap();
        assert!(buf.is_rgb());
        assert_eq!(buf.rgb_row(1), &[RGB8::new(40, 50, 60)]);
        assert_eq!(buf.to_packed(), vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(buf.samples().width(), 3);
        assert!(buf.as_luma().is_err());
    }
}
