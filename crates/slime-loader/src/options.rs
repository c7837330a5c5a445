use slime_format::{CompressionKind, DecodeOptions, EncodeOptions};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Saves succeed without touching the source.
    pub read_only: bool,
    pub compression: CompressionKind,
    pub decode: DecodeOptions,
    pub encode: EncodeOptions,
}

impl LoaderOptions {
    pub fn read_only() -> Self {
        LoaderOptions {
            read_only: true,
            ..Default::default()
        }
    }
}
