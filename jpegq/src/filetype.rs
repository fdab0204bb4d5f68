//! Input container detection.

use crate::Error;

/// A supported input container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// JPEG/JFIF, starting with `FF D8`.
    Jpeg,
    /// Binary 8-bit PPM, starting with `P6`.
    Ppm,
}

impl FileType {
    /// Detects the container from its magic bytes.
    #[must_use]
    pub fn detect(data: &[u8]) -> Option<Self> {
        match data {
            [0xFF, 0xD8, ..] => Some(Self::Jpeg),
            [b'P', b'6', ..] => Some(Self::Ppm),
            _ => None,
        }
    }

    /// Lowercase name, as used on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Ppm => "ppm",
        }
    }
}

/// Requested input type: explicit, or detected from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputType {
    #[default]
    Auto,
    Jpeg,
    Ppm,
}

impl InputType {
    /// Resolves to a concrete file type, sniffing `data` for [`InputType::Auto`].
    ///
    /// # Errors
    /// Returns [`Error::UnknownFileType`] if auto-detection fails.
    pub fn resolve(self, data: &[u8]) -> Result<FileType, Error> {
        match self {
            Self::Auto => FileType::detect(data).ok_or(Error::UnknownFileType),
            Self::Jpeg => Ok(FileType::Jpeg),
            Self::Ppm => Ok(FileType::Ppm),
        }
    }
}

impl From<FileType> for InputType {
    fn from(ft: FileType) -> Self {
        match ft {
            FileType::Jpeg => Self::Jpeg,
            FileType::Ppm => Self::Ppm,
        }
    }
}
