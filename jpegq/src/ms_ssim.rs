//! Multi-scale SSIM.
//!
//! Both images are walked down a 9/7 low-pass pyramid in lock-step. Finer
//! levels contribute contrast and structure only; the coarsest level adds
//! luminance. Per-level scores are raised to their weights and multiplied.

use imgref::ImgRef;
use tracing::debug;

use crate::consts::{
    MS_SSIM_ALPHA, MS_SSIM_BETAS, MS_SSIM_DECIMATION, MS_SSIM_GAMMAS, MS_SSIM_SCALES,
    SSIM_DYNAMIC_RANGE, SSIM_K1, SSIM_K2,
};
use crate::decimate::{Pyramid, ScalePlan};
use crate::image::ImageF;
use crate::kernel::Kernel;
use crate::ssim::{Constants, Exponents, LocalStats, Window};
use crate::{check_same_size, Error};

/// How per-level component maps are reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MsSsimVariant {
    /// K1 = K2 = 0. Luminance, contrast and structure are averaged
    /// separately and the averages are weighted.
    #[default]
    RouseHemami,
    /// K1 = 0.01, K2 = 0.03. Components are weighted per pixel and the
    /// product is averaged.
    Wang,
}

/// MS-SSIM parameters.
///
/// ```rust
/// use jpegq::{MsSsimParams, Window};
///
/// let params = MsSsimParams::wang().with_window(Window::Linear);
/// assert_eq!(params.scales(), 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MsSsimParams {
    variant: MsSsimVariant,
    window: Window,
    scales: usize,
    alpha: f32,
    betas: Vec<f32>,
    gammas: Vec<f32>,
}

impl Default for MsSsimParams {
    fn default() -> Self {
        Self::rouse_hemami()
    }
}

impl MsSsimParams {
    /// Rouse/Hemami variant with the standard five-scale weights.
    #[must_use]
    pub fn rouse_hemami() -> Self {
        Self {
            variant: MsSsimVariant::RouseHemami,
            window: Window::Gaussian,
            scales: MS_SSIM_SCALES,
            alpha: MS_SSIM_ALPHA,
            betas: MS_SSIM_BETAS.to_vec(),
            gammas: MS_SSIM_GAMMAS.to_vec(),
        }
    }

    /// Wang variant with the standard five-scale weights.
    #[must_use]
    pub fn wang() -> Self {
        Self {
            variant: MsSsimVariant::Wang,
            ..Self::rouse_hemami()
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    /// Sets the maximum number of pyramid levels.
    #[must_use]
    pub fn with_scales(mut self, scales: usize) -> Self {
        self.scales = scales;
        self
    }

    /// Sets per-level contrast (`betas`) and structure (`gammas`) weights and
    /// the luminance weight `alpha` applied at the coarsest level.
    ///
    /// Both slices need at least [`scales`](Self::scales) entries.
    #[must_use]
    pub fn with_weights(mut self, betas: &[f32], gammas: &[f32], alpha: f32) -> Self {
        self.betas = betas.to_vec();
        self.gammas = gammas.to_vec();
        self.alpha = alpha;
        self
    }

    #[must_use]
    pub fn variant(&self) -> MsSsimVariant {
        self.variant
    }

    #[must_use]
    pub fn window(&self) -> Window {
        self.window
    }

    #[must_use]
    pub fn scales(&self) -> usize {
        self.scales
    }

    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[must_use]
    pub fn betas(&self) -> &[f32] {
        &self.betas
    }

    #[must_use]
    pub fn gammas(&self) -> &[f32] {
        &self.gammas
    }

    fn constants(&self) -> Constants {
        match self.variant {
            MsSsimVariant::RouseHemami => Constants::new(0.0, 0.0, SSIM_DYNAMIC_RANGE),
            MsSsimVariant::Wang => Constants::new(SSIM_K1, SSIM_K2, SSIM_DYNAMIC_RANGE),
        }
    }
}

/// Computes MS-SSIM between two luma images.
///
/// Descending stops before any level whose short side is smaller than the
/// window, and the last level reached is scored as the coarsest. If not even
/// the full-size images fit one window, returns `f64::INFINITY`.
///
/// # Errors
/// Returns [`Error::DimensionMismatch`] if the images differ in size and
/// [`Error::InvalidWeights`] if fewer weights than scales were supplied.
pub fn ms_ssim(
    reference: ImgRef<'_, u8>,
    distorted: ImgRef<'_, u8>,
    params: &MsSsimParams,
) -> Result<f64, Error> {
    check_same_size(reference, distorted)?;
    if params.betas.len() < params.scales || params.gammas.len() < params.scales {
        return Err(Error::InvalidWeights {
            scales: params.scales,
            betas: params.betas.len(),
            gammas: params.gammas.len(),
        });
    }

    let plan = ScalePlan::new(
        reference.width(),
        reference.height(),
        MS_SSIM_DECIMATION,
        params.window.size(),
        params.scales,
    );
    let Some(coarsest) = plan.coarsest() else {
        debug!(
            width = reference.width(),
            height = reference.height(),
            "ms-ssim: image smaller than one window"
        );
        return Ok(f64::INFINITY);
    };

    let low_pass = Kernel::lowpass_97();
    let window = params.window.kernel();
    let constants = params.constants();

    let mut pyramid = Pyramid::new(
        ImageF::from_luma(reference),
        ImageF::from_luma(distorted),
        &low_pass,
        plan,
    );

    let mut score = 1.0f64;
    while let Some(level) = pyramid.next_level() {
        let is_coarsest = level.index == coarsest;
        let weights = if is_coarsest { params.scales - 1 } else { level.index };
        let exps = Exponents {
            alpha: if is_coarsest { params.alpha } else { 0.0 },
            beta: params.betas[weights],
            gamma: params.gammas[weights],
        };

        let stats = LocalStats::compute(&level.reference, &level.distorted, &window)?;
        let value = match params.variant {
            MsSsimVariant::RouseHemami => rouse_hemami_level(&stats, constants, exps),
            MsSsimVariant::Wang => wang_level(&stats, constants, exps),
        };
        debug!(
            level = level.index,
            width = level.reference.width(),
            height = level.reference.height(),
            value,
            "ms-ssim level"
        );
        score *= value;
    }
    Ok(score)
}

fn rouse_hemami_level(stats: &LocalStats, k: Constants, exps: Exponents) -> f64 {
    let (mut l, mut c, mut s) = (0.0f64, 0.0f64, 0.0f64);
    stats.for_each_component(k, Exponents::ONE, |comp| {
        l += comp.l;
        c += comp.c;
        s += comp.s;
    });
    let n = stats.len() as f64;
    let (l, c, s) = (l / n, c / n, s / n);

    let luminance = if exps.alpha == 0.0 {
        1.0
    } else {
        l.powf(f64::from(exps.alpha))
    };
    luminance * c.powf(f64::from(exps.beta)) * s.abs().powf(f64::from(exps.gamma))
}

fn wang_level(stats: &LocalStats, k: Constants, exps: Exponents) -> f64 {
    let skip_luminance = exps.alpha == 0.0;
    let mut sum = 0.0f64;
    stats.for_each_component(k, exps, |comp| {
        let l = if skip_luminance { 1.0 } else { comp.l };
        sum += l * comp.c * comp.s;
    });
    sum / stats.len() as f64
}
