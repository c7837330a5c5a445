use crate::block::BlockResolver;
use crate::buffer::SlimeBuffer;
use crate::mask::SectionMask;
use crate::options::DecodeOptions;
use crate::section::{read_section, write_section};
use crate::voxel::{ChunkColumn, VoxelGrid};
use slime_common::{Result, SlimeError};
use slime_logger::log::log;
use slime_logger::severity::LogSeverity::Debug;
use slime_nbt::Tag;
use std::io;

fn corrupted_chunk(chunk_x: i32, chunk_z: i32, e: io::Error) -> SlimeError {
    SlimeError::CorruptedSection(format!("chunk ({}, {}): {}", chunk_x, chunk_z, e))
}

/// Reads one chunk column: heightmaps, biomes, section mask, then each flagged section.
pub fn read_chunk(
    buffer: &mut SlimeBuffer,
    chunk_x: i32,
    chunk_z: i32,
    options: &DecodeOptions,
    resolver: &dyn BlockResolver,
) -> Result<ChunkColumn> {
    let mut chunk = ChunkColumn::new(chunk_x, chunk_z);

    let heightmap_len = buffer
        .read_length(1)
        .map_err(|e| corrupted_chunk(chunk_x, chunk_z, e))?;
    let heightmap = buffer
        .read_bytes(heightmap_len)
        .map_err(|e| corrupted_chunk(chunk_x, chunk_z, e))?;
    chunk.set_heightmaps(Tag::from_bytes(heightmap));

    let biome_count = buffer
        .read_length(4)
        .map_err(|e| corrupted_chunk(chunk_x, chunk_z, e))?;
    let mut biomes = Vec::with_capacity(biome_count);
    for _ in 0..biome_count {
        biomes.push(
            buffer
                .read_i32()
                .map_err(|e| corrupted_chunk(chunk_x, chunk_z, e))?,
        );
    }
    chunk.set_raw_biomes(biomes);

    let mask_bytes = buffer
        .read_bytes(SectionMask::BYTE_LEN)
        .map_err(|e| corrupted_chunk(chunk_x, chunk_z, e))?;
    let sections = SectionMask::from_bytes([mask_bytes[0], mask_bytes[1]]);

    for section_y in sections.iter() {
        read_section(buffer, &mut chunk, section_y, options, resolver)?;
    }

    log(
        format!(
            "Read chunk ({}, {}) with {} sections",
            chunk_x,
            chunk_z,
            sections.iter().count()
        ),
        Debug,
    );
    Ok(chunk)
}

/// Writes one chunk column. Only sections holding blocks are flagged and written.
pub fn write_chunk(buffer: &mut SlimeBuffer, chunk: &ChunkColumn) -> Result<()> {
    match chunk.heightmaps() {
        Some(heightmaps) => buffer.write_sized_bytes(&heightmaps.to_bytes()?)?,
        None => buffer.write_i32(0),
    }

    let biomes = chunk.raw_biomes();
    buffer.write_i32(biomes.len() as i32);
    for &biome in biomes {
        buffer.write_i32(biome);
    }

    let sections = chunk.non_empty_sections();
    buffer.write_bytes_raw(&sections.to_bytes());
    for section_y in sections.iter() {
        write_section(buffer, chunk, section_y)?;
    }
    Ok(())
}
