//! Deterministic synthetic images for jpegq tests.
//!
//! Every generator uses an LCG PRNG or a closed formula, so inputs are
//! identical across platforms.

#![allow(dead_code)]

// ============================================================================
// LCG PRNG
// ============================================================================

/// LCG pseudo-random number generator (deterministic)
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u8(&mut self) -> u8 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) & 0xFF) as u8
    }

    pub fn next_u8_range(&mut self, min: u8, max: u8) -> u8 {
        let range = (max - min) as u64 + 1;
        let val = self.next_u8() as u64;
        (min as u64 + (val * range / 256)) as u8
    }
}

// ============================================================================
// Luma generators
// ============================================================================

/// Diagonal luma gradient
pub fn gen_gradient(width: usize, height: usize) -> Vec<u8> {
    let span = (width + height).saturating_sub(2).max(1);
    (0..height)
        .flat_map(|y| (0..width).map(move |x| ((x + y) * 255 / span) as u8))
        .collect()
}

/// Luma checkerboard with square blocks
pub fn gen_checkerboard(width: usize, height: usize, block_size: usize, lo: u8, hi: u8) -> Vec<u8> {
    (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| {
                if (x / block_size + y / block_size) % 2 == 0 {
                    lo
                } else {
                    hi
                }
            })
        })
        .collect()
}

/// Random luma samples
pub fn gen_random(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    (0..width * height).map(|_| rng.next_u8()).collect()
}

/// Smooth image with mild texture, close to photographic content
pub fn gen_textured(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let base = gen_gradient(width, height);
    base.iter()
        .map(|&v| (i16::from(v) / 2 + 64 + i16::from(rng.next_u8_range(0, 16))) as u8)
        .collect()
}

/// Overlapping low-frequency waves with no noise, compresses like a photo
pub fn gen_waves(width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let (fx, fy) = (x as f64, y as f64);
            let v = 110.0
                + 50.0 * (fx / 7.0 + fy / 13.0).sin()
                + 30.0 * (fy / 5.0).cos()
                + 20.0 * (fx * fy / 300.0).sin();
            out.push(v.clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Interleaved RGB image with a different gradient per channel
pub fn gen_rgb(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    let mut data = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = 128u8.wrapping_add(rng.next_u8_range(0, 24));
            data.extend_from_slice(&[r, g, b]);
        }
    }
    data
}

// ============================================================================
// Distortions
// ============================================================================

/// Add a constant to every sample
pub fn distort_brightness(img: &[u8], delta: i16) -> Vec<u8> {
    img.iter()
        .map(|&v| (i16::from(v) + delta).clamp(0, 255) as u8)
        .collect()
}

/// Add symmetric random noise of at most `amplitude`
pub fn distort_noise(img: &[u8], seed: u64, amplitude: u8) -> Vec<u8> {
    let mut rng = Lcg::new(seed);
    img.iter()
        .map(|&v| {
            let noise = i16::from(rng.next_u8_range(0, amplitude * 2)) - i16::from(amplitude);
            (i16::from(v) + noise).clamp(0, 255) as u8
        })
        .collect()
}

/// 3x3 box blur with clamped edges (luma)
pub fn distort_blur(img: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0u32;
            let mut count = 0u32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx >= 0 && ny >= 0 && (nx as usize) < width && (ny as usize) < height {
                        sum += u32::from(img[ny as usize * width + nx as usize]);
                        count += 1;
                    }
                }
            }
            out[y * width + x] = (sum / count) as u8;
        }
    }
    out
}

/// Reduce to `levels` evenly spaced grey values
pub fn distort_quantize(img: &[u8], levels: u8) -> Vec<u8> {
    let step = 256 / u16::from(levels.max(2));
    img.iter()
        .map(|&v| ((u16::from(v) / step) * step).min(255) as u8)
        .collect()
}
