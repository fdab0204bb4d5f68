//! Quality-targeted JPEG recompression.
//!
//! [`recompress`] bisects the encoder quality range, scoring each candidate
//! against the original with one of the similarity metrics, and keeps the
//! lowest quality whose score still meets the target. The result carries a
//! comment marker so later runs recognize it and skip re-encoding.

use std::fmt;

use imgref::ImgRef;
use tracing::{debug, info, warn};

use crate::codec::{Codec, ColorFormat, EncodeSettings, Subsampling};
use crate::consts::{COMMENT, DEFAULT_ATTEMPTS, DEFAULT_QUALITY_MAX, DEFAULT_QUALITY_MIN};
use crate::filetype::{FileType, InputType};
use crate::metadata::{scan_metadata, Metadata};
use crate::metrics::mean_pixel_error;
use crate::ms_ssim::{ms_ssim, MsSsimParams};
use crate::prep::{defish, grayscale};
use crate::smallfry::smallfry;
use crate::ssim::{ssim, SsimParams, Window};
use crate::Error;

/// Logs at info level unless the run is quiet.
macro_rules! progress {
    ($options:expr, $($arg:tt)+) => {
        if !$options.quiet {
            info!($($arg)+);
        }
    };
}

/// Metric driving the quality search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Ssim,
    MsSsim,
    Smallfry,
    /// Mean pixel error. Lower is better.
    Mpe,
}

impl Method {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ssim => "ssim",
            Self::MsSsim => "ms-ssim",
            Self::Smallfry => "smallfry",
            Self::Mpe => "mpe",
        }
    }

    /// Whether larger scores mean more similar images.
    #[must_use]
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Self::Mpe)
    }

    /// Scores a candidate against the reference luma.
    ///
    /// # Errors
    /// Passes through metric errors.
    pub fn score(self, reference: ImgRef<'_, u8>, candidate: ImgRef<'_, u8>) -> Result<f64, Error> {
        match self {
            Self::Ssim => ssim(
                reference,
                candidate,
                &SsimParams::new().with_window(Window::Linear),
            ),
            Self::MsSsim => ms_ssim(reference, candidate, &MsSsimParams::default()),
            Self::Smallfry => smallfry(reference, candidate),
            Self::Mpe => mean_pixel_error(reference, candidate),
        }
    }
}

/// Named target levels, mapped to a score per method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl QualityPreset {
    /// Target score for `method` at this preset.
    #[must_use]
    pub fn target(self, method: Method) -> f64 {
        let table: [f64; 4] = match method {
            Method::Ssim => [0.999, 0.9999, 0.99995, 0.99999],
            Method::MsSsim => [0.85, 0.94, 0.96, 0.98],
            Method::Smallfry => [100.75, 102.25, 103.8, 105.5],
            Method::Mpe => [1.5, 1.0, 0.8, 0.6],
        };
        table[self as usize]
    }
}

/// Recompression settings.
///
/// ```rust
/// use jpegq::{Method, QualityPreset, RecompressOptions};
///
/// let options = RecompressOptions::new()
///     .with_method(Method::Smallfry)
///     .with_preset(QualityPreset::High)
///     .with_quality_range(50, 90);
/// assert_eq!(options.target(), 103.8);
/// assert_eq!(options.quality_range(), (50, 90));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RecompressOptions {
    method: Method,
    preset: QualityPreset,
    target: Option<f64>,
    quality_min: u8,
    quality_max: u8,
    attempts: u32,
    strip: bool,
    progressive: bool,
    accurate: bool,
    defish: Option<(f32, f32)>,
    input_type: InputType,
    copy_on_failure: bool,
    subsampling: Subsampling,
    quiet: bool,
}

impl Default for RecompressOptions {
    fn default() -> Self {
        Self {
            method: Method::Ssim,
            preset: QualityPreset::Medium,
            target: None,
            quality_min: DEFAULT_QUALITY_MIN,
            quality_max: DEFAULT_QUALITY_MAX,
            attempts: DEFAULT_ATTEMPTS,
            strip: false,
            progressive: true,
            accurate: false,
            defish: None,
            input_type: InputType::Auto,
            copy_on_failure: true,
            subsampling: Subsampling::Default,
            quiet: false,
        }
    }
}

impl RecompressOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_preset(mut self, preset: QualityPreset) -> Self {
        self.preset = preset;
        self
    }

    /// Sets an explicit target score, overriding the preset.
    #[must_use]
    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    /// Sets the quality search bounds, clamped to `1..=100` with `min <= max`.
    #[must_use]
    pub fn with_quality_range(mut self, min: u8, max: u8) -> Self {
        self.quality_min = min.clamp(1, 100);
        self.quality_max = max.clamp(self.quality_min, 100);
        self
    }

    /// Sets the probe budget (at least 1).
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Drops EXIF/IPTC/XMP and comments from the output.
    #[must_use]
    pub fn with_strip(mut self, strip: bool) -> Self {
        self.strip = strip;
        self
    }

    /// Requests progressive encoding for the final probe.
    #[must_use]
    pub fn with_progressive(mut self, progressive: bool) -> Self {
        self.progressive = progressive;
        self
    }

    /// Requests encoder optimization on every probe, not just the last.
    #[must_use]
    pub fn with_accurate(mut self, accurate: bool) -> Self {
        self.accurate = accurate;
        self
    }

    /// Corrects fisheye distortion before encoding.
    #[must_use]
    pub fn with_defish(mut self, strength: f32, zoom: f32) -> Self {
        self.defish = Some((strength, zoom));
        self
    }

    #[must_use]
    pub fn with_input_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    /// Emits the original bytes instead of failing when the input was
    /// already processed or cannot be made smaller.
    #[must_use]
    pub fn with_copy_on_failure(mut self, copy: bool) -> Self {
        self.copy_on_failure = copy;
        self
    }

    #[must_use]
    pub fn with_subsampling(mut self, subsampling: Subsampling) -> Self {
        self.subsampling = subsampling;
        self
    }

    /// Silences progress logging.
    #[must_use]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn preset(&self) -> QualityPreset {
        self.preset
    }

    /// Effective target: the explicit one, or the preset's.
    #[must_use]
    pub fn target(&self) -> f64 {
        self.target.unwrap_or_else(|| self.preset.target(self.method))
    }

    /// `(min, max)` quality bounds.
    #[must_use]
    pub fn quality_range(&self) -> (u8, u8) {
        (self.quality_min, self.quality_max)
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn strip(&self) -> bool {
        self.strip
    }

    #[must_use]
    pub fn progressive(&self) -> bool {
        self.progressive
    }

    #[must_use]
    pub fn accurate(&self) -> bool {
        self.accurate
    }

    #[must_use]
    pub fn defish(&self) -> Option<(f32, f32)> {
        self.defish
    }

    #[must_use]
    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    #[must_use]
    pub fn copy_on_failure(&self) -> bool {
        self.copy_on_failure
    }

    #[must_use]
    pub fn subsampling(&self) -> Subsampling {
        self.subsampling
    }

    #[must_use]
    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Why the original bytes were emitted unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyReason {
    /// The input already carries the recompression comment.
    AlreadyProcessed,
    /// The candidate at `quality` was not smaller than the input.
    Oversized { quality: u8 },
}

/// Successful recompression.
#[derive(Debug, Clone, PartialEq)]
pub struct Recompressed {
    /// Output file bytes.
    pub data: Vec<u8>,
    /// Quality of the emitted encoding, `None` when copied.
    pub quality: Option<u8>,
    /// Score of the emitted encoding, `None` when copied.
    pub score: Option<f64>,
    /// New size as a percentage of the input size.
    pub percent: u64,
    /// Set when the input was passed through unchanged.
    pub copied: Option<CopyReason>,
}

impl Recompressed {
    fn copy_of(input: &[u8], reason: CopyReason) -> Self {
        Self {
            data: input.to_vec(),
            quality: None,
            score: None,
            percent: 100,
            copied: Some(reason),
        }
    }
}

/// Recompression failure.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RecompressError {
    /// The input could not be read, decoded or measured.
    InvalidInput(Error),
    /// The input carries the recompression comment and copying is off.
    AlreadyProcessed,
    /// Encoding at `quality` failed.
    Encode { quality: u8, source: Error },
    /// The encoder's own output at `quality` failed to decode.
    RoundTrip { quality: u8, source: Error },
    /// The output would not be smaller than the input.
    SizeRegression { original: usize, compressed: usize },
    /// The encoded stream lacks the SOI/APP0 prefix needed for the comment.
    Structural { reason: &'static str },
}

impl RecompressError {
    /// Process status: 2 for already-processed input, 1 otherwise.
    #[must_use]
    pub fn status_code(&self) -> u8 {
        match self {
            Self::AlreadyProcessed => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for RecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "invalid input file: {err}"),
            Self::AlreadyProcessed => write!(f, "file already processed by jpeg-recompress"),
            Self::Encode { quality, source } => {
                write!(f, "encoding at q={quality} failed: {source}")
            }
            Self::RoundTrip { quality, source } => {
                write!(f, "unable to decode file that was just encoded at q={quality}: {source}")
            }
            Self::SizeRegression {
                original,
                compressed,
            } => write!(
                f,
                "output file would be larger than input ({compressed} >= {original} bytes)"
            ),
            Self::Structural { reason } => write!(f, "{reason}, aborting"),
        }
    }
}

impl std::error::Error for RecompressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidInput(err)
            | Self::Encode { source: err, .. }
            | Self::RoundTrip { source: err, .. } => Some(err),
            _ => None,
        }
    }
}

/// Recompresses `input` (JPEG or PPM) to the smallest quality that meets the
/// target score.
///
/// Bounds narrow by bisection for at most `attempts` probes. The last probe
/// (or any probe with `min >= max`) is encoded with progressive and
/// optimization requests and becomes the output.
///
/// Any candidate encoding that is not smaller than `input` ends the search,
/// even one that already meets the target. The input is then copied or
/// rejected without trying further qualities.
///
/// # Errors
/// See [`RecompressError`]. With copy-on-failure enabled, already processed
/// and oversized inputs return `Ok` with [`Recompressed::copied`] set.
pub fn recompress<C: Codec + ?Sized>(
    input: &[u8],
    options: &RecompressOptions,
    codec: &C,
) -> Result<Recompressed, RecompressError> {
    let file_type = options
        .input_type
        .resolve(input)
        .map_err(RecompressError::InvalidInput)?;
    let target = options.target();

    let metadata = match file_type {
        FileType::Jpeg => scan_metadata(input, COMMENT.as_bytes()),
        FileType::Ppm => Metadata::Markers(Vec::new()),
    };
    if metadata == Metadata::AlreadyProcessed {
        if options.copy_on_failure {
            warn!("file already processed by jpeg-recompress, copying input");
            return Ok(Recompressed::copy_of(input, CopyReason::AlreadyProcessed));
        }
        return Err(RecompressError::AlreadyProcessed);
    }
    let meta = if options.strip {
        &[][..]
    } else {
        progress!(options, "metadata size is {}kb", metadata.bytes().len() / 1024);
        metadata.bytes()
    };

    let mut original = codec
        .decode(input, file_type, ColorFormat::Rgb)
        .map_err(RecompressError::InvalidInput)?;
    if let Some((strength, zoom)) = options.defish {
        progress!(options, "defishing");
        original = defish(&original, strength, zoom);
    }
    let original_gray = grayscale(&original).map_err(RecompressError::InvalidInput)?;
    let reference = original_gray
        .as_luma()
        .map_err(RecompressError::InvalidInput)?;

    debug!(
        codec = codec.name(),
        method = options.method.name(),
        target,
        width = original.width(),
        height = original.height(),
        "starting quality search"
    );

    let (lowest, highest) = options.quality_range();
    let (mut min, mut max) = (lowest, highest);
    let mut attempt = options.attempts.saturating_sub(1);
    let (quality, score, compressed) = loop {
        let midpoint = if min >= max { min } else { min + (max - min) / 2 };
        let quality = midpoint.clamp(lowest, highest);
        let is_final = attempt == 0 || min >= max;
        let settings = EncodeSettings {
            quality,
            progressive: is_final && options.progressive,
            optimize: options.accurate || is_final,
            subsampling: options.subsampling,
        };

        let compressed = codec
            .encode(&original, &settings)
            .map_err(|source| RecompressError::Encode { quality, source })?;
        let candidate = codec
            .decode(&compressed, FileType::Jpeg, ColorFormat::Luma)
            .map_err(|source| RecompressError::RoundTrip { quality, source })?;
        let candidate = candidate
            .as_luma()
            .map_err(|source| RecompressError::RoundTrip { quality, source })?;
        let score = options
            .method
            .score(reference, candidate)
            .map_err(RecompressError::InvalidInput)?;

        if is_final {
            progress!(
                options,
                "final optimized {} at q={}: {:.6}",
                options.method.name(),
                quality,
                score
            );
        } else {
            progress!(
                options,
                "{} at q={} ({} - {}): {:.6}",
                options.method.name(),
                quality,
                min,
                max,
                score
            );
        }

        if compressed.len() >= input.len() {
            if options.copy_on_failure {
                warn!(quality, "output file would be larger than input, copying input");
                return Ok(Recompressed::copy_of(input, CopyReason::Oversized { quality }));
            }
            return Err(RecompressError::SizeRegression {
                original: input.len(),
                compressed: compressed.len(),
            });
        }

        let acceptable = if options.method.higher_is_better() {
            score >= target
        } else {
            score < target
        };
        if acceptable {
            max = quality.saturating_sub(1);
        } else {
            min = quality.saturating_add(1);
        }

        if is_final {
            break (quality, score, compressed);
        }
        attempt -= 1;
    };

    let total = compressed.len() + meta.len();
    let percent = (total * 100 / input.len()) as u64;
    let saved = input.len().saturating_sub(total);
    progress!(
        options,
        "new size is {}% of original (saved {} kb)",
        percent,
        saved / 1024
    );

    let data = insert_comment(&compressed, meta)?;
    Ok(Recompressed {
        data,
        quality: Some(quality),
        score: Some(score),
        percent,
        copied: None,
    })
}

/// Splices the recompression comment and preserved metadata in right after
/// the encoder's APP0 segment.
fn insert_comment(compressed: &[u8], meta: &[u8]) -> Result<Vec<u8>, RecompressError> {
    if !compressed.starts_with(&[0xFF, 0xD8]) {
        return Err(RecompressError::Structural {
            reason: "missing SOI marker",
        });
    }
    if compressed.get(2..4) != Some(&[0xFF, 0xE0][..]) {
        return Err(RecompressError::Structural {
            reason: "missing APP0 marker",
        });
    }
    let truncated = RecompressError::Structural {
        reason: "truncated APP0 segment",
    };
    let Some(&[hi, lo]) = compressed.get(4..6) else {
        return Err(truncated);
    };
    let app0_end = 4 + usize::from(u16::from_be_bytes([hi, lo]));
    if app0_end > compressed.len() {
        return Err(truncated);
    }

    let comment = COMMENT.as_bytes();
    let comment_len = (comment.len() + 2) as u16;
    let mut out = Vec::with_capacity(compressed.len() + comment.len() + 4 + meta.len());
    out.extend_from_slice(&compressed[..app0_end]);
    out.extend_from_slice(&[0xFF, 0xFE]);
    out.extend_from_slice(&comment_len.to_be_bytes());
    out.extend_from_slice(comment);
    out.extend_from_slice(meta);
    out.extend_from_slice(&compressed[app0_end..]);
    Ok(out)
}
