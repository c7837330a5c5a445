//! One 16x16x16 section on the wire:
//! `hasBlockLight [2048] paletteLen (entryLen entry)* longCount longs hasSkyLight [2048]`.

use crate::bitpack::{self, MAX_BITS_PER_ENTRY, SECTION_VOLUME};
use crate::block::{BlockResolver, BlockState};
use crate::buffer::SlimeBuffer;
use crate::options::DecodeOptions;
use crate::voxel::{VoxelGrid, LIGHT_LEN, SECTION_SIZE};
use slime_common::{Result, SlimeError};
use slime_logger::log::log;
use slime_logger::severity::LogSeverity::Debug;
use slime_nbt::Tag;
use std::io;

/// Decodes the section at `section_y` into `grid`.
pub fn read_section<G: VoxelGrid>(
    buffer: &mut SlimeBuffer,
    grid: &mut G,
    section_y: usize,
    options: &DecodeOptions,
    resolver: &dyn BlockResolver,
) -> Result<()> {
    read_section_inner(buffer, grid, section_y, options, resolver)
        .map_err(|e| SlimeError::CorruptedSection(format!("section {}: {}", section_y, e)))
}

fn read_section_inner<G: VoxelGrid>(
    buffer: &mut SlimeBuffer,
    grid: &mut G,
    section_y: usize,
    options: &DecodeOptions,
    resolver: &dyn BlockResolver,
) -> io::Result<()> {
    let block_light = read_light(buffer)?;
    let palette = read_palette(buffer, section_y, options)?;

    let long_count = buffer.read_length(8)?;
    let longs = buffer.read_long_array(long_count)?;
    let bits = bitpack::bits_from_long_count(long_count);
    if bits > MAX_BITS_PER_ENTRY as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} longs imply {} bits per entry", long_count, bits),
        ));
    }
    let indices = bitpack::unpack(&longs, bits as u8, SECTION_VOLUME);

    // Resolve each palette entry once; indices share the result.
    let resolved: Vec<Option<BlockState>> = palette
        .iter()
        .map(|entry| {
            entry
                .as_ref()
                .and_then(|state| resolver.resolve(state))
                .filter(|state| !state.is_air())
        })
        .collect();

    let y_offset = section_y * SECTION_SIZE;
    for y in 0..SECTION_SIZE {
        for z in 0..SECTION_SIZE {
            for x in 0..SECTION_SIZE {
                let index = indices[crate::voxel::section_index(x, y, z)] as usize;
                if let Some(Some(state)) = resolved.get(index) {
                    grid.set_block(x, y_offset + y, z, Some(state.clone()));
                }
            }
        }
    }

    let sky_light = read_light(buffer)?;
    grid.set_section_light(section_y, block_light, sky_light);
    Ok(())
}

fn read_light(buffer: &mut SlimeBuffer) -> io::Result<Option<Vec<u8>>> {
    if buffer.read_bool()? {
        Ok(Some(buffer.read_bytes(LIGHT_LEN)?.to_vec()))
    } else {
        Ok(None)
    }
}

/// Entries that do not decode to a block compound are dropped, or kept as `None`
/// placeholders when `stable_palette_indices` is set.
fn read_palette(
    buffer: &mut SlimeBuffer,
    section_y: usize,
    options: &DecodeOptions,
) -> io::Result<Vec<Option<BlockState>>> {
    let palette_len = buffer.read_length(4)?;
    let mut palette = Vec::with_capacity(palette_len.min(SECTION_VOLUME));
    for entry_index in 0..palette_len {
        let entry_len = buffer.read_length(1)?;
        let entry = buffer.read_bytes(entry_len)?;
        match Tag::from_bytes(entry).as_ref().and_then(BlockState::from_tag) {
            Some(state) => palette.push(Some(state)),
            None => {
                let err = SlimeError::MetadataDecodeFailure(format!(
                    "palette entry {} of section {}",
                    entry_index, section_y
                ));
                log(format!("{}, skipping", err), Debug);
                if options.stable_palette_indices {
                    palette.push(None);
                }
            }
        }
    }
    Ok(palette)
}

/// Encodes the section at `section_y` from the grid's current contents.
pub fn write_section<G: VoxelGrid>(
    buffer: &mut SlimeBuffer,
    grid: &G,
    section_y: usize,
) -> Result<()> {
    let corrupted =
        |msg: String| SlimeError::CorruptedSection(format!("section {}: {}", section_y, msg));

    write_light(buffer, grid.block_light(section_y))
        .map_err(|e| corrupted(format!("block light {}", e)))?;

    let packed = grid.packed_section(section_y);
    buffer.write_i32(packed.palette.len() as i32);
    for state in &packed.palette {
        let entry = state.to_tag().to_bytes()?;
        buffer.write_sized_bytes(&entry)?;
    }

    buffer.write_i32(packed.longs.len() as i32);
    for &long in &packed.longs {
        buffer.write_i64(long);
    }

    write_light(buffer, grid.sky_light(section_y))
        .map_err(|e| corrupted(format!("sky light {}", e)))?;
    Ok(())
}

fn write_light(buffer: &mut SlimeBuffer, light: Option<&[u8]>) -> std::result::Result<(), String> {
    match light {
        Some(light) if light.len() != LIGHT_LEN => Err(format!(
            "must be {} bytes, got {}",
            LIGHT_LEN,
            light.len()
        )),
        Some(light) => {
            buffer.write_bool(true);
            buffer.write_bytes_raw(light);
            Ok(())
        }
        None => {
            buffer.write_bool(false);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{AcceptAll, KnownBlocks};
    use crate::voxel::ChunkColumn;
    use assert_matches::assert_matches;

    fn stone() -> BlockState {
        BlockState::new("minecraft:stone")
    }

    fn write_palette_entry(buffer: &mut SlimeBuffer, bytes: &[u8]) {
        buffer.write_sized_bytes(bytes).unwrap();
    }

    /// Hand-assembles a section with the given raw palette entries and indices.
    fn raw_section(entries: &[Vec<u8>], indices: &[u32], bits: u8) -> SlimeBuffer {
        let mut buffer = SlimeBuffer::new();
        buffer.write_bool(false);
        buffer.write_i32(entries.len() as i32);
        for entry in entries {
            write_palette_entry(&mut buffer, entry);
        }
        let longs = bitpack::pack(indices, bits);
        buffer.write_i32(longs.len() as i32);
        for long in longs {
            buffer.write_i64(long);
        }
        buffer.write_bool(false);
        SlimeBuffer::from_bytes(buffer.into_inner())
    }

    fn entry(state: &BlockState) -> Vec<u8> {
        state.to_tag().to_bytes().unwrap()
    }

    #[test]
    fn test_section_round_trip_with_light() {
        let mut source = ChunkColumn::new(0, 0);
        for i in 0..16 {
            source.set_block(i, 32 + i, 15 - i, Some(stone().with_property("n", i.to_string())));
        }
        source.set_section_light(2, Some(vec![0x12; LIGHT_LEN]), Some(vec![0xF0; LIGHT_LEN]));

        let mut buffer = SlimeBuffer::new();
        write_section(&mut buffer, &source, 2).unwrap();
        let mut reader = SlimeBuffer::from_bytes(buffer.into_inner());

        let mut decoded = ChunkColumn::new(0, 0);
        read_section(&mut reader, &mut decoded, 2, &DecodeOptions::default(), &AcceptAll).unwrap();
        assert_eq!(reader.remaining(), 0);

        for i in 0..16 {
            assert_eq!(decoded.block(i, 32 + i, 15 - i), source.block(i, 32 + i, 15 - i));
        }
        assert_eq!(decoded.get_section(2).unwrap().block_count(), 16);
        assert_eq!(decoded.block_light(2), Some(&[0x12; LIGHT_LEN][..]));
        assert_eq!(decoded.sky_light(2), Some(&[0xF0; LIGHT_LEN][..]));
    }

    #[test]
    fn test_air_by_name_not_position() {
        // Air sits at index 1 here; index 0 is a real block.
        let entries = vec![entry(&stone()), entry(&BlockState::air())];
        let mut indices = vec![1u32; SECTION_VOLUME];
        indices[0] = 0;
        let mut reader = raw_section(&entries, &indices, 4);

        let mut chunk = ChunkColumn::new(0, 0);
        read_section(&mut reader, &mut chunk, 0, &DecodeOptions::default(), &AcceptAll).unwrap();
        assert_eq!(chunk.block(0, 0, 0), Some(&stone()));
        assert_eq!(chunk.get_section(0).unwrap().block_count(), 1);
    }

    #[test]
    fn test_undecodable_palette_entry_is_skipped() {
        let dirt = BlockState::new("minecraft:dirt");
        let entries = vec![
            entry(&BlockState::air()),
            vec![0xDE, 0xAD],
            entry(&stone()),
            entry(&dirt),
        ];
        // Indices are relative to the retained list [air, stone, dirt].
        let mut indices = vec![0u32; SECTION_VOLUME];
        indices[1] = 1;
        indices[2] = 2;
        let mut reader = raw_section(&entries, &indices, 4);

        let mut chunk = ChunkColumn::new(0, 0);
        read_section(&mut reader, &mut chunk, 0, &DecodeOptions::default(), &AcceptAll).unwrap();
        assert_eq!(chunk.block(1, 0, 0), Some(&stone()));
        assert_eq!(chunk.block(2, 0, 0), Some(&dirt));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_stable_palette_indices_keep_positions() {
        let dirt = BlockState::new("minecraft:dirt");
        let entries = vec![entry(&BlockState::air()), vec![0xDE, 0xAD], entry(&dirt)];
        let mut indices = vec![0u32; SECTION_VOLUME];
        indices[0] = 1;
        indices[1] = 2;
        let mut reader = raw_section(&entries, &indices, 4);

        let options = DecodeOptions {
            stable_palette_indices: true,
        };
        let mut chunk = ChunkColumn::new(0, 0);
        read_section(&mut reader, &mut chunk, 0, &options, &AcceptAll).unwrap();
        assert_eq!(chunk.block(0, 0, 0), None);
        assert_eq!(chunk.block(1, 0, 0), Some(&dirt));
    }

    #[test]
    fn test_unresolvable_and_out_of_range_indices_stay_air() {
        let entries = vec![entry(&BlockState::new("mod:gizmo")), entry(&stone())];
        let mut indices = vec![0u32; SECTION_VOLUME];
        indices[5] = 1;
        indices[6] = 9;
        let mut reader = raw_section(&entries, &indices, 4);

        let mut chunk = ChunkColumn::new(0, 0);
        let resolver = KnownBlocks::new(["minecraft:stone"]);
        read_section(&mut reader, &mut chunk, 0, &DecodeOptions::default(), &resolver).unwrap();
        assert_eq!(chunk.block(0, 0, 0), None);
        assert_eq!(chunk.block(5, 0, 0), Some(&stone()));
        assert_eq!(chunk.block(6, 0, 0), None);
        assert_eq!(chunk.get_section(0).unwrap().block_count(), 1);
    }

    #[test]
    fn test_truncated_section_is_corrupted() {
        let entries = vec![entry(&stone())];
        let mut bytes = raw_section(&entries, &vec![0; SECTION_VOLUME], 1).into_inner();
        bytes.truncate(bytes.len() - 100);
        let mut reader = SlimeBuffer::from_bytes(bytes);

        let mut chunk = ChunkColumn::new(0, 0);
        assert_matches!(
            read_section(&mut reader, &mut chunk, 3, &DecodeOptions::default(), &AcceptAll),
            Err(SlimeError::CorruptedSection(msg)) if msg.starts_with("section 3")
        );
    }

    #[test]
    fn test_negative_palette_length_is_corrupted() {
        let mut buffer = SlimeBuffer::new();
        buffer.write_bool(false);
        buffer.write_i32(-1);
        let mut reader = SlimeBuffer::from_bytes(buffer.into_inner());
        let mut chunk = ChunkColumn::new(0, 0);
        assert_matches!(
            read_section(&mut reader, &mut chunk, 0, &DecodeOptions::default(), &AcceptAll),
            Err(SlimeError::CorruptedSection(_))
        );
    }

    #[test]
    fn test_bad_light_length_fails_write() {
        let mut chunk = ChunkColumn::new(0, 0);
        chunk.set_block(0, 0, 0, Some(stone()));
        chunk.set_section_light(0, Some(vec![0; 10]), None);
        let mut buffer = SlimeBuffer::new();
        assert_matches!(
            write_section(&mut buffer, &chunk, 0),
            Err(SlimeError::CorruptedSection(_))
        );
    }
}
