use std::error::Error;
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum SlimeError {
    /// The stream does not start with the Slime magic number.
    UnknownFileType,
    /// Slime format version below the supported minimum.
    UnsupportedFormatVersion(u8),
    /// Engine (world data) version below the supported minimum.
    UnsupportedEngineVersion(u8),
    CorruptedSegment(String),
    CorruptedSection(String),
    MetadataDecodeFailure(String),
    Compression(String),
    InvalidBounds(String),
    IoError(io::Error),
}

impl fmt::Display for SlimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlimeError::UnknownFileType => {
                write!(f, "File loaded is of an unknown/unsupported type")
            }
            SlimeError::UnsupportedFormatVersion(version) => {
                write!(f, "Unsupported slime format version: {}", version)
            }
            SlimeError::UnsupportedEngineVersion(version) => {
                write!(f, "Unsupported engine version: {}", version)
            }
            SlimeError::CorruptedSegment(msg) => write!(f, "Corrupted segment: {}", msg),
            SlimeError::CorruptedSection(msg) => write!(f, "Corrupted section: {}", msg),
            SlimeError::MetadataDecodeFailure(msg) => {
                write!(f, "Metadata decode failure: {}", msg)
            }
            SlimeError::Compression(msg) => write!(f, "Compression error: {}", msg),
            SlimeError::InvalidBounds(msg) => write!(f, "Invalid world bounds: {}", msg),
            SlimeError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl Error for SlimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SlimeError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for SlimeError {
    fn from(err: io::Error) -> Self {
        SlimeError::IoError(err)
    }
}
