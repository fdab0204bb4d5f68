//! Gradient perceptual hash.

use std::fmt;
use std::str::FromStr;

use imgref::ImgRef;

use crate::prep::rescale_nearest;
use crate::Error;

/// An `N x N` bit grid of horizontal gradients.
///
/// Each bit is set when a cell of the downscaled image is darker than its
/// right-hand neighbour. The last column has no neighbour and stays clear.
/// Brightness, white balance and scale changes leave the hash mostly intact.
///
/// ```rust
/// use jpegq::{Img, PerceptualHash};
///
/// let img = Img::new((0..64).collect::<Vec<u8>>(), 8, 8);
/// let hash = PerceptualHash::from_luma(img.as_ref(), 4)?;
/// assert_eq!(hash.distance(&hash)?, 0);
/// assert_eq!(hash.to_string().len(), 16);
/// # Ok::<(), jpegq::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptualHash {
    bits: Vec<bool>,
    size: usize,
}

impl PerceptualHash {
    /// Hashes a luma image at `size x size` resolution.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHashSize`] for a zero size and
    /// [`Error::InvalidDimensions`] for an empty image.
    pub fn from_luma(img: ImgRef<'_, u8>, size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::InvalidHashSize { size });
        }
        if img.width() == 0 || img.height() == 0 {
            return Err(Error::InvalidDimensions {
                width: img.width(),
                height: img.height(),
            });
        }
        let scaled = rescale_nearest(img, size, size);
        Ok(Self::from_grid(scaled.buf(), size))
    }

    fn from_grid(cells: &[u8], size: usize) -> Self {
        let mut bits = Vec::with_capacity(size * size);
        for row in cells.chunks_exact(size) {
            bits.extend(row.windows(2).map(|pair| pair[0] < pair[1]));
            bits.push(false);
        }
        Self { bits, size }
    }

    /// Grid side length.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bits in row-major order.
    #[must_use]
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Hamming distance: the number of differing bits.
    ///
    /// # Errors
    /// Returns [`Error::HashSizeMismatch`] if the hashes differ in size.
    pub fn distance(&self, other: &Self) -> Result<u32, Error> {
        if self.bits.len() != other.bits.len() {
            return Err(Error::HashSizeMismatch {
                left: self.bits.len(),
                right: other.bits.len(),
            });
        }
        Ok(self
            .bits
            .iter()
            .zip(&other.bits)
            .filter(|(a, b)| a != b)
            .count() as u32)
    }

    /// Distance scaled to `0..=99` (`distance * 100 / bits`).
    ///
    /// # Errors
    /// Returns [`Error::HashSizeMismatch`] if the hashes differ in size.
    pub fn difference(&self, other: &Self) -> Result<u32, Error> {
        let distance = self.distance(other)?;
        Ok(scaled_difference(distance, self.bits.len()))
    }
}

/// `distance * 100 / bits`, widened so large hashes don't overflow.
fn scaled_difference(distance: u32, bits: usize) -> u32 {
    (u64::from(distance) * 100 / bits as u64) as u32
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.bits {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for PerceptualHash {
    type Err = Error;

    /// Parses the `'1'`/`'0'` form produced by `Display`. The length must be
    /// a non-zero perfect square.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidHashString { len: s.len() };
        let size = (s.len() as f64).sqrt() as usize;
        if size == 0 || size * size != s.len() {
            return Err(invalid());
        }
        let bits = s
            .bytes()
            .map(|b| match b {
                b'1' => Ok(true),
                b'0' => Ok(false),
                _ => Err(invalid()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { bits, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::Img;

    fn zigzag() -> Vec<u8> {
        (0..16u8).map(|x| if x % 2 == 1 { 16 - x } else { x }).collect()
    }

    #[test]
    fn test_gradient_bits() {
        let hash = PerceptualHash::from_grid(&zigzag(), 4);
        assert!(hash.bits()[0]);
        assert!(!hash.bits()[1]);
        assert!(!hash.bits()[5]);
        assert!(hash.bits()[9]);
        // Last column never set
        for row in 0..4 {
            assert!(!hash.bits()[row * 4 + 3]);
        }
    }

    #[test]
    fn test_from_luma_same_size_skips_scaling() {
        let img = Img::new(zigzag(), 4, 4);
        let hash = PerceptualHash::from_luma(img.as_ref(), 4).unwrap();
        assert_eq!(hash.to_string(), "1010101001000100");
    }

    #[test]
    fn test_hamming() {
        let a: PerceptualHash = "101010101".parse().unwrap();
        let b: PerceptualHash = "111011101".parse().unwrap();
        assert_eq!(a.distance(&b).unwrap(), 2);
        assert_eq!(b.distance(&a).unwrap(), 2);
        assert_eq!(a.distance(&a).unwrap(), 0);
        assert_eq!(a.difference(&b).unwrap(), 22);
    }

    #[test]
    fn test_difference_of_large_hashes() {
        // 7000 x 7000 bits; distance * 100 exceeds u32::MAX
        let bits = 7000 * 7000;
        assert_eq!(scaled_difference(45_000_000, bits), 91);
        assert_eq!(scaled_difference(0, bits), 0);
    }

    #[test]
    fn test_brightness_shift_keeps_hash() {
        let base: Vec<u8> = (0..32 * 32).map(|i| ((i * 37) % 200) as u8).collect();
        let brighter: Vec<u8> = base.iter().map(|&v| v + 40).collect();
        let a = PerceptualHash::from_luma(Img::new(base, 32, 32).as_ref(), 16).unwrap();
        let b = PerceptualHash::from_luma(Img::new(brighter, 32, 32).as_ref(), 16).unwrap();
        assert_eq!(a.distance(&b).unwrap(), 0);
    }

    #[test]
    fn test_parse_rejects_bad_text() {
        assert!(matches!(
            "10101".parse::<PerceptualHash>(),
            Err(Error::InvalidHashString { len: 5 })
        ));
        assert!("10x1".parse::<PerceptualHash>().is_err());
        assert!("".parse::<PerceptualHash>().is_err());
    }

    #[test]
    fn test_size_mismatch_and_zero_size() {
        let a: PerceptualHash = "1010".parse().unwrap();
        let b: PerceptualHash = "101010101".parse().unwrap();
        assert!(matches!(
            a.distance(&b),
            Err(Error::HashSizeMismatch { left: 4, right: 9 })
        ));
        let img = Img::new(vec![0u8; 4], 2, 2);
        assert!(matches!(
            PerceptualHash::from_luma(img.as_ref(), 0),
            Err(Error::InvalidHashSize { size: 0 })
        ));
    }
}
