/// Knobs for reading slime streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Keep an unknown-block placeholder where a palette entry fails to decode,
    /// instead of removing it. Later indices then keep pointing at the entries
    /// they were written for. Off by default, matching what existing readers do.
    pub stable_palette_indices: bool,
}

/// Knobs for writing slime streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Write empty placeholders for the tile-entity, entity and extra segments.
    pub minimal: bool,
}
