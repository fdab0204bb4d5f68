//! jpegq CLI - image comparison, perceptual hashing and JPEG recompression
//!
//! Compares two images with a similarity metric, prints perceptual hashes,
//! or recompresses a JPEG to the lowest quality that still meets a target.

use std::fs;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, ColorChoice, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use jpegq::{
    compare, recompress, Codec, ColorFormat, CompareMethod, CopyReason, Error, ImageCodec,
    InputType, Method, PerceptualHash, PixelBuffer, QualityPreset, RecompressError,
    RecompressOptions, Recompressed, Subsampling,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Perceptual image comparison and quality-targeted JPEG recompression
#[derive(Parser, Debug)]
#[command(name = "jpegq")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    Compare two images with a perceptual hash (0 = same image):
        jpegq compare original.jpg resized.jpg

    Score a recompressed image with SSIM:
        jpegq compare -m ssim original.jpg compressed.jpg

    Print the perceptual hash of an image:
        jpegq hash photo.jpg

    Recompress to the lowest quality meeting the high SSIM target:
        jpegq recompress -q high photo.jpg photo-small.jpg

    Use smallfry and a fixed quality window, reading stdin:
        cat photo.jpg | jpegq recompress -m smallfry -n 60 -x 90 - out.jpg

    Encode a PPM produced by another tool:
        jpegq recompress --ppm frame.ppm frame.jpg

EXIT CODES:
    0 - Success
    1 - Error (unreadable input, size regression, encoder failure, ...)
    2 - Input was already recompressed (recompress with --no-copy)")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorChoice,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare two images and print a similarity score
    Compare(CompareArgs),
    /// Print the perceptual hash of an image
    Hash(HashArgs),
    /// Recompress a JPEG or PPM to the lowest acceptable quality
    Recompress(RecompressArgs),
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// First image (JPEG or PPM)
    #[arg(value_name = "IMAGE1")]
    image1: PathBuf,

    /// Second image (JPEG or PPM)
    #[arg(value_name = "IMAGE2")]
    image2: PathBuf,

    /// Comparison method
    #[arg(short, long, value_enum, default_value = "fast")]
    method: CompareMethodArg,

    /// Hash size for the fast method
    #[arg(short, long, default_value_t = jpegq::consts::DEFAULT_HASH_SIZE, value_name = "N")]
    size: usize,

    /// First image is a PPM (shorthand for --input-type1 ppm)
    #[arg(short = 'r', long, conflicts_with = "input_type1")]
    ppm: bool,

    /// Type of the first image
    #[arg(short = 'T', long = "input-type1", value_enum, default_value = "auto")]
    input_type1: InputTypeArg,

    /// Type of the second image
    #[arg(short = 'U', long = "input-type2", value_enum, default_value = "auto")]
    input_type2: InputTypeArg,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct HashArgs {
    /// Image to hash (JPEG or PPM)
    #[arg(value_name = "IMAGE")]
    image: PathBuf,

    /// Hash size; the hash has size x size bits
    #[arg(short, long, default_value_t = jpegq::consts::DEFAULT_HASH_SIZE, value_name = "N")]
    size: usize,

    /// Input type
    #[arg(short = 'T', long, value_enum, default_value = "auto")]
    input_type: InputTypeArg,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RecompressArgs {
    /// Input file, or - for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output file, or - for stdout
    #[arg(value_name = "OUTPUT")]
    output: String,

    /// Metric used to score each candidate
    #[arg(short, long, value_enum, default_value = "ssim")]
    method: MethodArg,

    /// Quality preset selecting the target score
    #[arg(short, long, value_enum, default_value = "medium")]
    quality: PresetArg,

    /// Explicit target score (overrides --quality)
    #[arg(short, long, value_name = "SCORE")]
    target: Option<f64>,

    /// Minimum JPEG quality
    #[arg(short = 'n', long, default_value_t = jpegq::consts::DEFAULT_QUALITY_MIN, value_name = "Q")]
    min: u8,

    /// Maximum JPEG quality
    #[arg(short = 'x', long, default_value_t = jpegq::consts::DEFAULT_QUALITY_MAX, value_name = "Q")]
    max: u8,

    /// Number of bisection steps
    #[arg(short, long, default_value_t = jpegq::consts::DEFAULT_ATTEMPTS, value_name = "N")]
    loops: u32,

    /// Request optimized encoding on every probe
    #[arg(short, long)]
    accurate: bool,

    /// Disable progressive output
    #[arg(short = 'p', long)]
    no_progressive: bool,

    /// Strip metadata
    #[arg(short, long)]
    strip: bool,

    /// Remove fisheye distortion with this strength
    #[arg(short, long, value_name = "STRENGTH")]
    defish: Option<f32>,

    /// Zoom applied while defishing
    #[arg(short, long, default_value = "1.0", value_name = "FACTOR")]
    zoom: f32,

    /// Input is a PPM (shorthand for --input-type ppm)
    #[arg(short = 'r', long, conflicts_with = "input_type")]
    ppm: bool,

    /// Input type
    #[arg(short = 'T', long, value_enum, default_value = "auto")]
    input_type: InputTypeArg,

    /// Fail instead of copying the input when recompression can't help
    #[arg(short = 'c', long)]
    no_copy: bool,

    /// Chroma subsampling
    #[arg(short = 'S', long, value_enum, default_value = "default")]
    subsample: SubsampleArg,

    /// Only print warnings and errors
    #[arg(short = 'Q', long)]
    quiet: bool,

    /// Print a JSON summary to stdout (needs an output file)
    #[arg(long)]
    json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum CompareMethodArg {
    /// Perceptual hash difference (works across sizes)
    Fast,
    /// Peak signal-to-noise ratio
    Psnr,
    /// Structural similarity
    Ssim,
    /// Multi-scale structural similarity
    MsSsim,
    /// PSNR blended with a JPEG artifact penalty
    Smallfry,
    /// Mean pixel error
    Mpe,
}

impl From<CompareMethodArg> for CompareMethod {
    fn from(arg: CompareMethodArg) -> Self {
        match arg {
            CompareMethodArg::Fast => Self::Fast,
            CompareMethodArg::Psnr => Self::Psnr,
            CompareMethodArg::Ssim => Self::Ssim,
            CompareMethodArg::MsSsim => Self::MsSsim,
            CompareMethodArg::Smallfry => Self::Smallfry,
            CompareMethodArg::Mpe => Self::Mpe,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Ssim,
    MsSsim,
    Smallfry,
    Mpe,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Ssim => Self::Ssim,
            MethodArg::MsSsim => Self::MsSsim,
            MethodArg::Smallfry => Self::Smallfry,
            MethodArg::Mpe => Self::Mpe,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PresetArg {
    Low,
    Medium,
    High,
    #[value(name = "veryhigh", alias = "very-high")]
    VeryHigh,
}

impl From<PresetArg> for QualityPreset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Low => Self::Low,
            PresetArg::Medium => Self::Medium,
            PresetArg::High => Self::High,
            PresetArg::VeryHigh => Self::VeryHigh,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum InputTypeArg {
    /// Detect from the file contents
    Auto,
    Jpeg,
    Ppm,
}

impl From<InputTypeArg> for InputType {
    fn from(arg: InputTypeArg) -> Self {
        match arg {
            InputTypeArg::Auto => Self::Auto,
            InputTypeArg::Jpeg => Self::Jpeg,
            InputTypeArg::Ppm => Self::Ppm,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SubsampleArg {
    /// Encoder default (usually 4:2:0)
    Default,
    /// Full-resolution chroma (4:4:4)
    Disable,
}

impl From<SubsampleArg> for Subsampling {
    fn from(arg: SubsampleArg) -> Self {
        match arg {
            SubsampleArg::Default => Self::Default,
            SubsampleArg::Disable => Self::Disable,
        }
    }
}

#[derive(Serialize)]
struct CompareJson {
    method: &'static str,
    /// `null` when the score is infinite (identical images under PSNR)
    value: f64,
    image1: String,
    image2: String,
}

#[derive(Serialize)]
struct HashJson {
    image: String,
    size: usize,
    hash: String,
}

#[derive(Serialize)]
struct RecompressJson {
    input: String,
    output: String,
    method: &'static str,
    target: f64,
    quality: Option<u8>,
    score: Option<f64>,
    input_size: usize,
    output_size: usize,
    percent: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    copied: Option<&'static str>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_colors(cli.color);
    let quiet = matches!(&cli.command, Command::Recompress(args) if args.quiet);
    init_tracing(quiet);

    let result = match &cli.command {
        Command::Compare(args) => run_compare(args),
        Command::Hash(args) => run_hash(args),
        Command::Recompress(args) => run_recompress(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "error".red().bold(), e);
            let code = e
                .downcast_ref::<RecompressError>()
                .map_or(1, RecompressError::status_code);
            ExitCode::from(code)
        }
    }
}

fn setup_colors(color: ColorChoice) {
    match color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {
            if !io::stderr().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

/// Logs go to stderr so stdout stays clean for scores and image data.
fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn read_input(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut data = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut data)
            .context("failed to read stdin")?;
        return Ok(data);
    }
    fs::read(path).with_context(|| format!("failed to read '{path}'"))
}

fn write_output(path: &str, data: &[u8]) -> Result<()> {
    if path == "-" {
        let mut stdout = io::stdout().lock();
        stdout.write_all(data).context("failed to write stdout")?;
        return stdout.flush().context("failed to write stdout");
    }
    fs::write(path, data).with_context(|| format!("failed to write '{path}'"))
}

fn decode_file(path: &Path, input_type: InputType, color: ColorFormat) -> Result<PixelBuffer> {
    let data = fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let file_type = input_type
        .resolve(&data)
        .with_context(|| format!("invalid input file '{}'", path.display()))?;
    ImageCodec
        .decode(&data, file_type, color)
        .with_context(|| format!("failed to decode '{}'", path.display()))
}

fn run_compare(args: &CompareArgs) -> Result<()> {
    let method = CompareMethod::from(args.method);
    let color = method.color_format();
    let input_type1 = if args.ppm {
        InputType::Ppm
    } else {
        args.input_type1.into()
    };
    let a = decode_file(&args.image1, input_type1, color)?;
    let b = decode_file(&args.image2, args.input_type2.into(), color)?;

    let comparison = compare(method, &a, &b, args.size).map_err(|e| match e {
        Error::DimensionMismatch { .. } => {
            anyhow!("images must be identical sizes for selected method: {e}")
        }
        e => e.into(),
    })?;

    if args.json {
        let json = CompareJson {
            method: method.label(),
            value: comparison.value,
            image1: args.image1.display().to_string(),
            image2: args.image2.display().to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{comparison}");
    }
    Ok(())
}

fn run_hash(args: &HashArgs) -> Result<()> {
    let img = decode_file(&args.image, args.input_type.into(), ColorFormat::Luma)?;
    let hash = PerceptualHash::from_luma(img.as_luma()?, args.size)?;

    if args.json {
        let json = HashJson {
            image: args.image.display().to_string(),
            size: hash.size(),
            hash: hash.to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{hash}");
    }
    Ok(())
}

fn recompress_options(args: &RecompressArgs) -> RecompressOptions {
    let input_type = if args.ppm {
        InputType::Ppm
    } else {
        args.input_type.into()
    };
    let mut options = RecompressOptions::new()
        .with_method(args.method.into())
        .with_preset(args.quality.into())
        .with_quality_range(args.min, args.max)
        .with_attempts(args.loops)
        .with_accurate(args.accurate)
        .with_progressive(!args.no_progressive)
        .with_strip(args.strip)
        .with_input_type(input_type)
        .with_copy_on_failure(!args.no_copy)
        .with_subsampling(args.subsample.into())
        .with_quiet(args.quiet);
    if let Some(target) = args.target {
        options = options.with_target(target);
    }
    if let Some(strength) = args.defish.filter(|&s| s != 0.0) {
        options = options.with_defish(strength, args.zoom);
    }
    options
}

fn run_recompress(args: &RecompressArgs) -> Result<()> {
    if args.json && args.output == "-" {
        bail!("--json writes to stdout and can't be combined with output '-'");
    }
    let options = recompress_options(args);
    let input = read_input(&args.input)?;

    let result = recompress(&input, &options, &ImageCodec)?;
    write_output(&args.output, &result.data)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&recompress_json(args, &options, &input, &result))?
        );
    }
    Ok(())
}

fn recompress_json(
    args: &RecompressArgs,
    options: &RecompressOptions,
    input: &[u8],
    result: &Recompressed,
) -> RecompressJson {
    RecompressJson {
        input: args.input.clone(),
        output: args.output.clone(),
        method: options.method().name(),
        target: options.target(),
        quality: result.quality,
        score: result.score,
        input_size: input.len(),
        output_size: result.data.len(),
        percent: result.percent,
        copied: result.copied.map(|reason| match reason {
            CopyReason::AlreadyProcessed => "already-processed",
            CopyReason::Oversized { .. } => "oversized",
        }),
    }
}
