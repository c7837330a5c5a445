use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

/// Compression primitive used for every segment of a slime stream.
pub trait Compressor: Send + Sync {
    fn name(&self) -> &'static str;

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Returns a reader yielding the decompressed bytes of `data`.
    fn decoder<'a>(&self, data: &'a [u8]) -> io::Result<Box<dyn Read + 'a>>;
}

/// Zstandard, the algorithm real slime files are written with.
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    pub const DEFAULT_LEVEL: i32 = 3;

    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

impl Compressor for Zstd {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        zstd::encode_all(data, self.level)
    }

    fn decoder<'a>(&self, data: &'a [u8]) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(zstd::stream::read::Decoder::new(data)?))
    }
}

/// Zlib via flate2, for streams exchanged with tools that lack zstd.
#[derive(Debug, Clone, Copy)]
pub struct Zlib {
    level: flate2::Compression,
}

impl Zlib {
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level),
        }
    }
}

impl Default for Zlib {
    fn default() -> Self {
        Self {
            level: flate2::Compression::default(),
        }
    }
}

impl Compressor for Zlib {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decoder<'a>(&self, data: &'a [u8]) -> io::Result<Box<dyn Read + 'a>> {
        Ok(Box::new(ZlibDecoder::new(data)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionKind {
    #[default]
    Zstd,
    Zlib,
}

impl CompressionKind {
    pub fn compressor(self) -> Box<dyn Compressor> {
        match self {
            CompressionKind::Zstd => Box::new(Zstd::default()),
            CompressionKind::Zlib => Box::new(Zlib::default()),
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionKind::Zstd => write!(f, "zstd"),
            CompressionKind::Zlib => write!(f, "zlib"),
        }
    }
}

impl FromStr for CompressionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zstd" => Ok(CompressionKind::Zstd),
            "zlib" => Ok(CompressionKind::Zlib),
            other => Err(format!("Unknown compression: {}", other)),
        }
    }
}
