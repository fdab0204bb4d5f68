//! Image codec seam used by the comparator and the recompressor.

use crate::filetype::FileType;
use crate::image::PixelBuffer;
use crate::Error;

/// Pixel layout requested from a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorFormat {
    /// Interleaved 8-bit RGB.
    #[default]
    Rgb,
    /// 8-bit luma, `Y = 0.299R + 0.587G + 0.114B`.
    Luma,
}

/// Chroma subsampling for colour JPEG output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subsampling {
    /// Whatever the encoder does by default (4:2:0 for most).
    #[default]
    Default,
    /// Full-resolution chroma (4:4:4).
    Disable,
}

/// Per-call JPEG encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub quality: u8,
    pub progressive: bool,
    pub optimize: bool,
    pub subsampling: Subsampling,
}

impl EncodeSettings {
    /// Baseline, non-optimized settings at `quality`.
    #[must_use]
    pub fn new(quality: u8) -> Self {
        Self {
            quality,
            progressive: false,
            optimize: false,
            subsampling: Subsampling::Default,
        }
    }
}

/// Decoder and JPEG encoder backend.
///
/// JPEG output must start with SOI immediately followed by an APP0 segment.
pub trait Codec {
    /// Decodes `data` of the given container into `color` pixels.
    ///
    /// # Errors
    /// Returns [`Error::Codec`] if the data cannot be decoded.
    fn decode(&self, data: &[u8], file_type: FileType, color: ColorFormat)
        -> Result<PixelBuffer, Error>;

    /// Encodes luma or RGB pixels as JPEG.
    ///
    /// # Errors
    /// Returns [`Error::Codec`] if encoding fails.
    fn encode(&self, img: &PixelBuffer, settings: &EncodeSettings) -> Result<Vec<u8>, Error>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

#[cfg(feature = "codec")]
pub use backend::ImageCodec;

#[cfg(feature = "codec")]
mod backend {
    use image::codecs::jpeg::JpegEncoder;
    use image::{DynamicImage, ExtendedColorType, ImageFormat};
    use tracing::debug;

    use super::{Codec, ColorFormat, EncodeSettings, Subsampling};
    use crate::filetype::FileType;
    use crate::image::PixelBuffer;
    use crate::prep::grayscale;
    use crate::Error;

    /// [`Codec`] backed by the `image` crate.
    ///
    /// Decodes JPEG and 8-bit binary PPM. Encodes baseline JFIF; progressive,
    /// optimized and 4:4:4 output are not available from this backend and
    /// those requests are ignored.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ImageCodec;

    impl ImageCodec {
        #[must_use]
        pub fn new() -> Self {
            Self
        }
    }

    fn codec_error(err: impl std::fmt::Display) -> Error {
        Error::Codec {
            message: err.to_string(),
        }
    }

    impl Codec for ImageCodec {
        fn decode(
            &self,
            data: &[u8],
            file_type: FileType,
            color: ColorFormat,
        ) -> Result<PixelBuffer, Error> {
            let format = match file_type {
                FileType::Jpeg => ImageFormat::Jpeg,
                FileType::Ppm => ImageFormat::Pnm,
            };
            let decoded = image::load_from_memory_with_format(data, format).map_err(codec_error)?;
            if file_type == FileType::Ppm && !matches!(decoded, DynamicImage::ImageRgb8(_)) {
                return Err(codec_error("only 8-bit RGB PPM (P6, maxval 255) is supported"));
            }

            // Grayscale JPEGs skip the RGB detour when luma is requested
            let rgb = match decoded {
                DynamicImage::ImageLuma8(luma) if color == ColorFormat::Luma => {
                    let (w, h) = luma.dimensions();
                    return Ok(PixelBuffer::packed(luma.into_raw(), w as usize, h as usize, 1));
                }
                other => other.into_rgb8(),
            };
            let (w, h) = rgb.dimensions();
            let rgb = PixelBuffer::packed(rgb.into_raw(), w as usize, h as usize, 3);
            debug!(width = w, height = h, ?file_type, "decoded");
            match color {
                ColorFormat::Rgb => Ok(rgb),
                ColorFormat::Luma => grayscale(&rgb),
            }
        }

        fn encode(&self, img: &PixelBuffer, settings: &EncodeSettings) -> Result<Vec<u8>, Error> {
            if settings.progressive || settings.optimize {
                debug!(
                    progressive = settings.progressive,
                    optimize = settings.optimize,
                    "baseline encoder ignores progressive/optimize"
                );
            }
            if settings.subsampling == Subsampling::Disable {
                debug!("baseline encoder ignores 4:4:4 request");
            }
            let color = match img.components() {
                1 => ExtendedColorType::L8,
                3 => ExtendedColorType::Rgb8,
                components => return Err(Error::UnsupportedComponents { components }),
            };

            let width = u32::try_from(img.width()).map_err(codec_error)?;
            let height = u32::try_from(img.height()).map_err(codec_error)?;
            let pixels = img.to_packed();
            let mut out = Vec::new();
            let mut encoder =
                JpegEncoder::new_with_quality(&mut out, settings.quality.clamp(1, 100));
            encoder
                .encode(&pixels, width, height, color)
                .map_err(codec_error)?;
            Ok(out)
        }

        fn name(&self) -> &str {
            "image"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn ppm(width: usize, height: usize, pixels: &[u8]) -> Vec<u8> {
            let mut out = format!("P6\n{width} {height}\n255\n").into_bytes();
            out.extend_from_slice(pixels);
            out
        }

        #[test]
        fn test_decode_ppm() {
            let pixels: Vec<u8> = (1..=12).collect();
            let img = ImageCodec
                .decode(&ppm(2, 2, &pixels), FileType::Ppm, ColorFormat::Rgb)
                .unwrap();
            assert_eq!((img.width(), img.height(), img.components()), (2, 2, 3));
            assert_eq!(img.data()[0], 1);
            assert_eq!(img.data()[11], 12);
        }

        #[test]
        fn test_decode_ppm_with_comment_to_luma() {
            let mut data = b"P6\n# made by hand\n1 1\n255\n".to_vec();
            data.extend_from_slice(&[255, 255, 255]);
            let img = ImageCodec
                .decode(&data, FileType::Ppm, ColorFormat::Luma)
                .unwrap();
            assert!(img.is_luma());
            assert_eq!(img.data(), &[255]);
        }

        #[test]
        fn test_round_trip_jpeg() {
            let (w, h) = (16, 16);
            let pixels: Vec<u8> = (0..w * h * 3).map(|i| ((i / 3) * 4 % 256) as u8).collect();
            let src = PixelBuffer::new(pixels, w, h, 3).unwrap();
            let jpeg = ImageCodec.encode(&src, &EncodeSettings::new(90)).unwrap();
            assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
            assert_eq!(&jpeg[2..4], &[0xFF, 0xE0]);

            let back = ImageCodec
                .decode(&jpeg, FileType::Jpeg, ColorFormat::Luma)
                .unwrap();
            assert_eq!((back.width(), back.height(), back.components()), (w, h, 1));
        }

        #[test]
        fn test_encode_luma_and_rejects_rgba() {
            let src = PixelBuffer::new(vec![128u8; 8 * 8], 8, 8, 1).unwrap();
            let jpeg = ImageCodec.encode(&src, &EncodeSettings::new(75)).unwrap();
            assert_eq!(&jpeg[..4], &[0xFF, 0xD8, 0xFF, 0xE0]);

            let rgba = PixelBuffer::packed(vec![0u8; 4 * 4 * 4], 4, 4, 4);
            assert!(matches!(
                ImageCodec.encode(&rgba, &EncodeSettings::new(75)),
                Err(Error::UnsupportedComponents { components: 4 })
            ));
        }

        #[test]
        fn test_decode_garbage_fails() {
            let err = ImageCodec
                .decode(&[0xFF, 0xD8, 0x00], FileType::Jpeg, ColorFormat::Rgb)
                .unwrap_err();
            assert!(matches!(err, Error::Codec { .. }));
        }
    }
}
