//! Low-pass decimation and multi-scale pyramids.
//!
//! [`decimate`] filters an image and keeps every `factor`-th sample on each
//! axis. Output sizes round up, so a 5x5 image decimated by 2 becomes 3x3
//! and the last row and column still contribute.
//!
//! [`ScalePlan`] decides once, from the input size alone, how many levels a
//! pyramid will have. [`Pyramid`] then walks that plan for a pair of images,
//! holding only the current level alive.

use crate::image::ImageF;
use crate::kernel::Kernel;

/// Filters `img` with `kernel` and subsamples by `factor`.
///
/// # Panics
/// Panics if `factor` is zero.
#[must_use]
pub fn decimate(img: &ImageF, factor: usize, kernel: &Kernel) -> ImageF {
    assert!(factor > 0, "decimation factor must be non-zero");
    let width = img.width().div_ceil(factor);
    let height = img.height().div_ceil(factor);
    let mut out = ImageF::new(width, height);
    for y in 0..height {
        for x in 0..width {
            out.set(x, y, kernel.filter_at(img, x * factor, y * factor));
        }
    }
    out
}

/// Dimensions of every level a pyramid will produce.
///
/// Level 0 is the input. Descending stops before any level whose short side
/// would fall below `min_size`, or once `max_levels` levels are planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalePlan {
    levels: Vec<(usize, usize)>,
    factor: usize,
}

impl ScalePlan {
    /// # Panics
    /// Panics if `factor` is zero.
    #[must_use]
    pub fn new(width: usize, height: usize, factor: usize, min_size: usize, max_levels: usize) -> Self {
        assert!(factor > 0, "decimation factor must be non-zero");
        let mut levels = Vec::with_capacity(max_levels);
        let (mut w, mut h) = (width, height);
        while levels.len() < max_levels && w.min(h) >= min_size {
            levels.push((w, h));
            w = w.div_ceil(factor);
            h = h.div_ceil(factor);
        }
        Self { levels, factor }
    }

    /// Number of planned levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[must_use]
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Index of the coarsest planned level.
    #[must_use]
    pub fn coarsest(&self) -> Option<usize> {
        self.levels.len().checked_sub(1)
    }

    /// Dimensions of `level`, if planned.
    #[must_use]
    pub fn dims(&self, level: usize) -> Option<(usize, usize)> {
        self.levels.get(level).copied()
    }

    /// `(level, (width, height))` pairs, finest first.
    pub fn iter(&self) -> impl Iterator<Item = (usize, (usize, usize))> + '_ {
        self.levels.iter().copied().enumerate()
    }
}

/// One pyramid level of a reference/distorted pair.
#[derive(Debug, Clone)]
pub struct Level {
    pub index: usize,
    pub reference: ImageF,
    pub distorted: ImageF,
}

/// Lock-step pyramid over two images.
///
/// Call [`Pyramid::next_level`] repeatedly; each call releases the previous
/// level once the next one has been derived from it.
#[derive(Debug)]
pub struct Pyramid<'k> {
    plan: ScalePlan,
    kernel: &'k Kernel,
    produced: usize,
    base: Option<(ImageF, ImageF)>,
    current: Option<Level>,
}

impl<'k> Pyramid<'k> {
    /// # Panics
    /// Panics if the two images differ in size.
    #[must_use]
    pub fn new(reference: ImageF, distorted: ImageF, kernel: &'k Kernel, plan: ScalePlan) -> Self {
        assert!(reference.same_size(&distorted), "pyramid inputs must match");
        Self {
            plan,
            kernel,
            produced: 0,
            base: Some((reference, distorted)),
            current: None,
        }
    }

    #[must_use]
    pub fn plan(&self) -> &ScalePlan {
        &self.plan
    }

    /// Advances to the next level, or returns `None` when the plan is done.
    pub fn next_level(&mut self) -> Option<&Level> {
        if self.produced >= self.plan.len() {
            self.current = None;
            self.base = None;
            return None;
        }
        let level = match self.current.take() {
            Some(prev) => Level {
                index: prev.index + 1,
                reference: decimate(&prev.reference, self.plan.factor, self.kernel),
                distorted: decimate(&prev.distorted, self.plan.factor, self.kernel),
            },
            None => {
                let (reference, distorted) = self.base.take()?;
                Level {
                    index: 0,
                    reference,
                    distorted,
                }
            }
        };
        self.produced += 1;
        self.current = Some(level);
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_factor_panics() {
        let _ = decimate(&ImageF::new(4, 4), 0, &Kernel::box_filter(2));
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_plan_zero_factor_panics() {
        let _ = ScalePlan::new(64, 64, 0, 8, 5);
    }

    const IMG_5X5: [f32; 25] = [
        0.0, 1.0, 2.0, 3.0, 5.0, //
        73.0, 79.0, 83.0, 89.0, 97.0, //
        127.0, 131.0, 137.0, 139.0, 149.0, //
        179.0, 181.0, 191.0, 193.0, 197.0, //
        233.0, 239.0, 241.0, 251.0, 255.0,
    ];

    #[rustfmt::skip]
    const GAUSS_3X3: [f32; 9] = [
        0.075110, 0.123840, 0.075110,
        0.123840, 0.204180, 0.123840,
        0.075110, 0.123840, 0.075110,
    ];

    fn gauss3() -> Kernel {
        Kernel::new(GAUSS_3X3.to_vec(), 3, 3).unwrap()
    }

    fn assert_close(img: &ImageF, expected: &[f32]) {
        let w = img.width();
        assert_eq!(w * img.height(), expected.len());
        for (i, &e) in expected.iter().enumerate() {
            let got = img.get(i % w, i / w);
            assert!((got - e).abs() < 1e-3, "pixel {i}: got {got}, expected {e}");
        }
    }

    #[test]
    fn test_decimate_4x4_box() {
        let img = ImageF::from_vec(
            vec![
                255.0, 128.0, 64.0, 0.0, 128.0, 64.0, 0.0, 255.0, 64.0, 0.0, 255.0, 128.0, 0.0,
                255.0, 128.0, 64.0,
            ],
            4,
            4,
        );
        let out = decimate(&img, 2, &Kernel::box_filter(2));
        assert_close(&out, &[255.0, 96.0, 96.0, 79.75]);

        let out = decimate(&img, 2, &gauss3());
        assert_close(&out, &[190.116, 70.419, 70.419, 131.689]);
    }

    #[test]
    fn test_decimate_odd_size_rounds_up() {
        let img = ImageF::from_vec(IMG_5X5.to_vec(), 5, 5);
        let out = decimate(&img, 2, &Kernel::box_filter(2));
        assert_eq!((out.width(), out.height()), (3, 3));
        assert_close(
            &out,
            &[0.0, 1.5, 4.0, 100.0, 107.5, 118.5, 206.0, 213.0, 224.0],
        );
    }

    #[test]
    fn test_decimate_odd_size_gaussian() {
        let img = ImageF::from_vec(IMG_5X5.to_vec(), 5, 5);
        let out = decimate(&img, 2, &gauss3());
        assert_close(
            &out,
            &[
                20.656, 24.349, 29.215, 127.546, 136.051, 145.761, 219.540, 228.283, 238.003,
            ],
        );
    }

    #[test]
    fn test_decimate_factor_3() {
        let img = ImageF::from_vec(IMG_5X5.to_vec(), 5, 5);
        let out = decimate(&img, 3, &gauss3());
        assert_close(&out, &[20.656, 26.918, 180.543, 194.490]);
    }

    #[test]
    fn test_scale_plan_stops_before_window() {
        let plan = ScalePlan::new(176, 144, 2, 11, 5);
        let dims: Vec<_> = plan.iter().map(|(_, d)| d).collect();
        assert_eq!(dims, vec![(176, 144), (88, 72), (44, 36), (22, 18)]);
        assert_eq!(plan.coarsest(), Some(3));

        let plan = ScalePlan::new(22, 16, 2, 11, 5);
        assert_eq!(plan.len(), 1);

        let plan = ScalePlan::new(10, 400, 2, 11, 5);
        assert!(plan.is_empty());
        assert_eq!(plan.coarsest(), None);
    }

    #[test]
    fn test_scale_plan_is_transpose_invariant() {
        let a = ScalePlan::new(300, 90, 2, 11, 5);
        let b = ScalePlan::new(90, 300, 2, 11, 5);
        assert_eq!(a.len(), b.len());
        for ((_, (w1, h1)), (_, (w2, h2))) in a.iter().zip(b.iter()) {
            assert_eq!((w1, h1), (h2, w2));
        }
    }

    #[test]
    fn test_pyramid_walks_plan() {
        let img = ImageF::from_vec((0..64 * 48).map(|i| (i % 251) as f32).collect(), 64, 48);
        let kernel = Kernel::lowpass_97();
        let plan = ScalePlan::new(64, 48, 2, 11, 5);
        let mut pyramid = Pyramid::new(img.clone(), img, &kernel, plan.clone());

        let mut seen = Vec::new();
        while let Some(level) = pyramid.next_level() {
            seen.push((level.index, (level.reference.width(), level.reference.height())));
            assert!(level.reference.same_size(&level.distorted));
        }
        let expected: Vec<_> = plan.iter().collect();
        assert_eq!(seen, expected);
        assert!(pyramid.next_level().is_none());
    }
}
