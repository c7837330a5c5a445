//! Length-prefixed compressed segments.
//!
//! A segment is `compressed_len: i32`, `uncompressed_len: i32`, then
//! `compressed_len` bytes of compressed payload.

use crate::buffer::SlimeBuffer;
use crate::compression::Compressor;
use slime_common::{Result, SlimeError};
use std::io::Read;

/// Most bytes reserved up front for a payload; the declared length is untrusted.
const MAX_PREALLOCATION: usize = 1 << 20;

/// Reads one segment and decompresses it into exactly `uncompressed_len` bytes.
pub fn read_segment(
    buffer: &mut SlimeBuffer,
    compressor: &dyn Compressor,
    name: &str,
) -> Result<Vec<u8>> {
    let corrupted = |msg: String| SlimeError::CorruptedSegment(format!("{}: {}", name, msg));

    let compressed_len = buffer.read_i32().map_err(|e| corrupted(e.to_string()))?;
    let uncompressed_len = buffer.read_i32().map_err(|e| corrupted(e.to_string()))?;
    if compressed_len < 0 || uncompressed_len < 0 {
        return Err(corrupted(format!(
            "negative length (compressed {}, uncompressed {})",
            compressed_len, uncompressed_len
        )));
    }

    let compressed = buffer
        .read_bytes(compressed_len as usize)
        .map_err(|e| corrupted(e.to_string()))?;

    let expected = uncompressed_len as usize;
    let mut payload = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
    compressor
        .decoder(compressed)
        .and_then(|decoder| decoder.take(expected as u64 + 1).read_to_end(&mut payload))
        .map_err(|e| corrupted(format!("{} decompression failed: {}", compressor.name(), e)))?;

    if payload.len() != expected {
        return Err(corrupted(format!(
            "expected {} bytes after decompression, got {}{}",
            expected,
            payload.len().min(expected),
            if payload.len() > expected { "+" } else { "" }
        )));
    }
    Ok(payload)
}

/// Compresses `payload` and appends it as a segment. Empty payloads are still
/// compressed and framed.
pub fn write_segment(
    buffer: &mut SlimeBuffer,
    compressor: &dyn Compressor,
    payload: &[u8],
) -> Result<()> {
    let compressed = compressor
        .compress(payload)
        .map_err(|e| SlimeError::Compression(e.to_string()))?;
    let compressed_len = i32::try_from(compressed.len())
        .map_err(|_| SlimeError::Compression("compressed segment exceeds i32".to_string()))?;
    let uncompressed_len = i32::try_from(payload.len())
        .map_err(|_| SlimeError::Compression("segment payload exceeds i32".to_string()))?;

    buffer.write_i32(compressed_len);
    buffer.write_i32(uncompressed_len);
    buffer.write_bytes_raw(&compressed);
    Ok(())
}
