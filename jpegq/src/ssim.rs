//! Structural similarity (SSIM).
//!
//! Local means, variances and covariance are taken over a sliding window
//! (valid positions only) and compared per pixel. The per-pixel map is then
//! averaged into one score, 1.0 for identical images.
//!
//! Two formulas are available. The classic one folds contrast and structure
//! together and is used unless exponents or constants are customized. The
//! component formula computes luminance, contrast and structure separately
//! and raises each to its exponent. MS-SSIM reuses these building blocks.

use imgref::ImgRef;
use tracing::debug;

use crate::consts::{
    GAUSSIAN_WINDOW_SIGMA, GAUSSIAN_WINDOW_SIZE, LINEAR_WINDOW_SIZE, SSIM_DYNAMIC_RANGE, SSIM_K1,
    SSIM_K2, SSIM_SCALE_REFERENCE,
};
use crate::decimate::decimate;
use crate::image::ImageF;
use crate::kernel::Kernel;
use crate::{check_same_size, Error};

/// Sliding window shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Window {
    /// 11x11 circular-symmetric Gaussian, sigma 1.5.
    #[default]
    Gaussian,
    /// 8x8 flat window.
    Linear,
}

impl Window {
    /// Builds the window's kernel.
    #[must_use]
    pub fn kernel(self) -> Kernel {
        match self {
            Self::Gaussian => Kernel::gaussian(GAUSSIAN_WINDOW_SIZE, GAUSSIAN_WINDOW_SIGMA),
            Self::Linear => Kernel::box_filter(LINEAR_WINDOW_SIZE),
        }
    }

    /// Side length in pixels.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::Gaussian => GAUSSIAN_WINDOW_SIZE,
            Self::Linear => LINEAR_WINDOW_SIZE,
        }
    }
}

/// Which SSIM expression is evaluated per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SsimFormula {
    /// `((2μxμy + C1)(2σxy + C2)) / ((μx² + μy² + C1)(σx² + σy² + C2))`.
    #[default]
    Classic,
    /// `l^α · c^β · s^γ` with C3 = C2/2.
    Components,
}

/// SSIM comparison parameters.
///
/// ```rust
/// use jpegq::{SsimParams, Window};
///
/// let params = SsimParams::new()
///     .with_window(Window::Linear)
///     .with_scale(1);
/// assert_eq!(params.window(), Window::Linear);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SsimParams {
    window: Window,
    alpha: f32,
    beta: f32,
    gamma: f32,
    k1: f32,
    k2: f32,
    dynamic_range: u32,
    scale: Option<usize>,
    formula: SsimFormula,
}

impl Default for SsimParams {
    fn default() -> Self {
        Self {
            window: Window::Gaussian,
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
            k1: SSIM_K1,
            k2: SSIM_K2,
            dynamic_range: SSIM_DYNAMIC_RANGE,
            scale: None,
            formula: SsimFormula::Classic,
        }
    }
}

impl SsimParams {
    /// Creates parameters with the standard defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    /// Sets the luminance, contrast and structure exponents.
    /// Switches to [`SsimFormula::Components`].
    #[must_use]
    pub fn with_exponents(mut self, alpha: f32, beta: f32, gamma: f32) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self.gamma = gamma;
        self.formula = SsimFormula::Components;
        self
    }

    /// Sets the stabilization constants K1 and K2.
    /// Switches to [`SsimFormula::Components`].
    #[must_use]
    pub fn with_constants(mut self, k1: f32, k2: f32) -> Self {
        self.k1 = k1;
        self.k2 = k2;
        self.formula = SsimFormula::Components;
        self
    }

    /// Sets the dynamic range `L` used by the stabilization constants.
    #[must_use]
    pub fn with_dynamic_range(mut self, dynamic_range: u32) -> Self {
        self.dynamic_range = dynamic_range;
        self
    }

    /// Fixes the pre-scaling factor instead of deriving it from image size.
    #[must_use]
    pub fn with_scale(mut self, scale: usize) -> Self {
        self.scale = Some(scale.max(1));
        self
    }

    #[must_use]
    pub fn with_formula(mut self, formula: SsimFormula) -> Self {
        self.formula = formula;
        self
    }

    #[must_use]
    pub fn window(&self) -> Window {
        self.window
    }

    /// Returns `(alpha, beta, gamma)`.
    #[must_use]
    pub fn exponents(&self) -> (f32, f32, f32) {
        (self.alpha, self.beta, self.gamma)
    }

    /// Returns `(K1, K2)`.
    #[must_use]
    pub fn constants(&self) -> (f32, f32) {
        (self.k1, self.k2)
    }

    #[must_use]
    pub fn dynamic_range(&self) -> u32 {
        self.dynamic_range
    }

    /// Returns the fixed pre-scaling factor, if any.
    #[must_use]
    pub fn scale(&self) -> Option<usize> {
        self.scale
    }

    #[must_use]
    pub fn formula(&self) -> SsimFormula {
        self.formula
    }
}

/// Pre-scaling factor for images of this size: `max(1, round(min(w, h) / 256))`.
#[must_use]
pub(crate) fn auto_scale(width: usize, height: usize) -> usize {
    let short = width.min(height) as f32;
    ((short / SSIM_SCALE_REFERENCE).round() as usize).max(1)
}

/// Computes SSIM between two luma images.
///
/// Images whose short side is around 512 pixels or more are first box-filtered
/// and decimated (see [`SsimParams::with_scale`]).
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if the images differ in size and
/// [`Error::ImageTooSmall`] if the (scaled) images are smaller than the window.
pub fn ssim(
    reference: ImgRef<'_, u8>,
    distorted: ImgRef<'_, u8>,
    params: &SsimParams,
) -> Result<f64, Error> {
    check_same_size(reference, distorted)?;
    let (width, height) = (reference.width(), reference.height());

    let mut ref_f = ImageF::from_luma(reference);
    let mut dist_f = ImageF::from_luma(distorted);

    let scale = params.scale.unwrap_or_else(|| auto_scale(width, height));
    if scale > 1 {
        let low_pass = Kernel::box_filter(scale);
        ref_f = decimate(&ref_f, scale, &low_pass);
        dist_f = decimate(&dist_f, scale, &low_pass);
        debug!(scale, width = ref_f.width(), height = ref_f.height(), "ssim pre-scaled");
    }

    let window = params.window.kernel();
    let stats = LocalStats::compute(&ref_f, &dist_f, &window)?;
    let constants = Constants::new(params.k1, params.k2, params.dynamic_range);

    let score = match params.formula {
        SsimFormula::Classic => stats.classic_mean(constants),
        SsimFormula::Components => {
            let exps = Exponents {
                alpha: params.alpha,
                beta: params.beta,
                gamma: params.gamma,
            };
            let mut sum = 0.0f64;
            stats.for_each_component(constants, exps, |c| sum += c.l * c.c * c.s);
            sum / stats.len() as f64
        }
    };
    Ok(score)
}

/// Stabilization constants derived from K1, K2 and L.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Constants {
    pub c1: f32,
    pub c2: f32,
    pub c3: f32,
}

impl Constants {
    pub(crate) fn new(k1: f32, k2: f32, dynamic_range: u32) -> Self {
        let l = dynamic_range as f32;
        let c1 = (k1 * l) * (k1 * l);
        let c2 = (k2 * l) * (k2 * l);
        Self {
            c1,
            c2,
            c3: c2 / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Exponents {
    pub alpha: f32,
    pub beta: f32,
    pub gamma: f32,
}

impl Exponents {
    pub(crate) const ONE: Self = Self {
        alpha: 1.0,
        beta: 1.0,
        gamma: 1.0,
    };
}

/// Luminance, contrast and structure at one window position.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Components {
    pub l: f64,
    pub c: f64,
    pub s: f64,
}

/// Windowed first and second moments of an image pair.
#[derive(Debug)]
pub(crate) struct LocalStats {
    mu_ref: ImageF,
    mu_dist: ImageF,
    var_ref: ImageF,
    var_dist: ImageF,
    covar: ImageF,
}

impl LocalStats {
    pub(crate) fn compute(
        reference: &ImageF,
        distorted: &ImageF,
        window: &Kernel,
    ) -> Result<Self, Error> {
        let mu_ref = window.convolve_valid(reference)?;
        let mu_dist = window.convolve_valid(distorted)?;
        let mut var_ref = window.convolve_valid(&reference.zip_map(reference, |a, b| a * b))?;
        let mut var_dist = window.convolve_valid(&distorted.zip_map(distorted, |a, b| a * b))?;
        let mut covar = window.convolve_valid(&reference.zip_map(distorted, |a, b| a * b))?;

        for y in 0..mu_ref.height() {
            let (mr, md) = (mu_ref.row(y), mu_dist.row(y));
            for (x, (&r, &d)) in mr.iter().zip(md).enumerate() {
                var_ref[(x, y)] -= r * r;
                var_dist[(x, y)] -= d * d;
                covar[(x, y)] -= r * d;
            }
        }

        Ok(Self {
            mu_ref,
            mu_dist,
            var_ref,
            var_dist,
            covar,
        })
    }

    /// Number of valid window positions.
    pub(crate) fn len(&self) -> usize {
        self.mu_ref.width() * self.mu_ref.height()
    }

    /// Mean of the classic SSIM map.
    pub(crate) fn classic_mean(&self, k: Constants) -> f64 {
        let mut sum = 0.0f64;
        for y in 0..self.mu_ref.height() {
            let rows = (
                self.mu_ref.row(y),
                self.mu_dist.row(y),
                self.var_ref.row(y),
                self.var_dist.row(y),
                self.covar.row(y),
            );
            for x in 0..rows.0.len() {
                let (mr, md) = (rows.0[x], rows.1[x]);
                let (vr, vd, cv) = (rows.2[x], rows.3[x], rows.4[x]);
                let numerator = (2.0 * f64::from(mr) * f64::from(md) + f64::from(k.c1))
                    * (2.0 * f64::from(cv) + f64::from(k.c2));
                let denominator = (mr * mr + md * md + k.c1) * (vr + vd + k.c2);
                sum += numerator / f64::from(denominator);
            }
        }
        sum / self.len() as f64
    }

    /// Visits the weighted components at every valid position.
    ///
    /// Negative variances from rounding are clamped to zero first.
    pub(crate) fn for_each_component(
        &self,
        k: Constants,
        exps: Exponents,
        mut f: impl FnMut(Components),
    ) {
        for y in 0..self.mu_ref.height() {
            for x in 0..self.mu_ref.width() {
                let (mr, md) = (self.mu_ref[(x, y)], self.mu_dist[(x, y)]);
                let vr = self.var_ref[(x, y)].max(0.0);
                let vd = self.var_dist[(x, y)].max(0.0);
                let cv = self.covar[(x, y)];
                let sigma_root = f64::from(vr * vd).sqrt();

                f(Components {
                    l: luminance(mr, md, k.c1, exps.alpha),
                    c: contrast(sigma_root, vr, vd, k.c2, exps.beta),
                    s: structure(cv, sigma_root, vr, vd, k.c3, exps.gamma),
                });
            }
        }
    }
}

/// `sign(r) · |r|^e`, skipped for `e == 1`.
#[inline]
fn weighted(result: f64, exponent: f32) -> f64 {
    if exponent == 1.0 {
        return result;
    }
    let sign = if result < 0.0 { -1.0 } else { 1.0 };
    sign * result.abs().powf(f64::from(exponent))
}

#[inline]
fn luminance(mu1: f32, mu2: f32, c1: f32, alpha: f32) -> f64 {
    if c1 == 0.0 && mu1 * mu1 == 0.0 && mu2 * mu2 == 0.0 {
        return 1.0;
    }
    let result = (2.0 * f64::from(mu1) * f64::from(mu2) + f64::from(c1))
        / f64::from(mu1 * mu1 + mu2 * mu2 + c1);
    weighted(result, alpha)
}

#[inline]
fn contrast(sigma_root: f64, var1: f32, var2: f32, c2: f32, beta: f32) -> f64 {
    if c2 == 0.0 && var1 + var2 == 0.0 {
        return 1.0;
    }
    let result = (2.0 * sigma_root + f64::from(c2)) / f64::from(var1 + var2 + c2);
    weighted(result, beta)
}

#[inline]
fn structure(covar: f32, sigma_root: f64, var1: f32, var2: f32, c3: f32, gamma: f32) -> f64 {
    if c3 == 0.0 && sigma_root == 0.0 {
        if var1 == 0.0 && var2 == 0.0 {
            return 1.0;
        }
        if var1 == 0.0 || var2 == 0.0 {
            return 0.0;
        }
    }
    let result = f64::from(covar + c3) / (sigma_root + f64::from(c3));
    weighted(result, gamma)
}
