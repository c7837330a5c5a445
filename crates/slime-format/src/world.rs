use crate::block::{AcceptAll, BlockResolver};
use crate::buffer::SlimeBuffer;
use crate::chunk::{read_chunk, write_chunk};
use crate::compression::{CompressionKind, Compressor, Zstd};
use crate::entity::{encode_entities, parse_entities, EntityRecord, EntitySpawn, PendingEntities};
use crate::mask::ChunkMask;
use crate::options::{DecodeOptions, EncodeOptions};
use crate::segment::{read_segment, write_segment};
use crate::tile_entity::{apply_tile_entities, collect_tile_entities, parse_tile_entities};
use crate::voxel::ChunkColumn;
use serde::{Deserialize, Serialize};
use slime_common::{Result, SlimeError};
use slime_logger::log::log;
use slime_logger::severity::LogSeverity::{Debug, Info, Warning};
use slime_nbt::Tag;
use std::collections::HashMap;
use std::io::{Read, Write};

pub const SLIME_MAGIC: u16 = 0xB10B;
/// Lowest format version that can be read; also the version written.
pub const MIN_FORMAT_VERSION: u8 = 9;
/// Lowest engine (world data) version that can be read; also the version written.
pub const MIN_ENGINE_VERSION: u8 = 7;

/// The rectangle of chunk coordinates covered by the chunk mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldBounds {
    pub min_chunk_x: i16,
    pub min_chunk_z: i16,
    pub width: u16,
    pub depth: u16,
}

impl WorldBounds {
    /// Smallest bounds holding every coordinate. No coordinates gives `{0, 0, 0, 0}`.
    pub fn enclosing<I>(coords: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i32, i32)>,
    {
        let mut coords = coords.into_iter();
        let (first_x, first_z) = match coords.next() {
            Some(first) => first,
            None => return Ok(WorldBounds::default()),
        };
        let (mut min_x, mut max_x, mut min_z, mut max_z) = (first_x, first_x, first_z, first_z);
        for (x, z) in coords {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_z = min_z.min(z);
            max_z = max_z.max(z);
        }

        let out_of_range = |what: &str, value: i64| {
            SlimeError::InvalidBounds(format!("{} {} does not fit the header", what, value))
        };
        let min_chunk_x =
            i16::try_from(min_x).map_err(|_| out_of_range("min chunk x", min_x as i64))?;
        let min_chunk_z =
            i16::try_from(min_z).map_err(|_| out_of_range("min chunk z", min_z as i64))?;
        let width = max_x as i64 - min_x as i64 + 1;
        let depth = max_z as i64 - min_z as i64 + 1;
        Ok(WorldBounds {
            min_chunk_x,
            min_chunk_z,
            width: u16::try_from(width).map_err(|_| out_of_range("width", width))?,
            depth: u16::try_from(depth).map_err(|_| out_of_range("depth", depth))?,
        })
    }

    /// Absolute chunk coordinates of a mask cell.
    pub fn chunk_at(&self, grid_x: u16, grid_z: u16) -> (i32, i32) {
        (
            grid_x as i32 + self.min_chunk_x as i32,
            grid_z as i32 + self.min_chunk_z as i32,
        )
    }

    /// Mask cell of an absolute chunk, if it lies inside the bounds.
    pub fn grid_cell(&self, chunk_x: i32, chunk_z: i32) -> Option<(u16, u16)> {
        let grid_x = chunk_x - self.min_chunk_x as i32;
        let grid_z = chunk_z - self.min_chunk_z as i32;
        if grid_x < 0 || grid_z < 0 || grid_x >= self.width as i32 || grid_z >= self.depth as i32 {
            return None;
        }
        Some((grid_x as u16, grid_z as u16))
    }

    fn read(buffer: &mut SlimeBuffer) -> std::io::Result<Self> {
        Ok(WorldBounds {
            min_chunk_x: buffer.read_i16()?,
            min_chunk_z: buffer.read_i16()?,
            width: buffer.read_u16()?,
            depth: buffer.read_u16()?,
        })
    }

    fn write(&self, buffer: &mut SlimeBuffer) {
        buffer.write_i16(self.min_chunk_x);
        buffer.write_i16(self.min_chunk_z);
        buffer.write_u16(self.width);
        buffer.write_u16(self.depth);
    }
}

/// A decoded world snapshot.
#[derive(Debug, Clone, Default)]
pub struct SlimeWorld {
    chunks: HashMap<(i32, i32), ChunkColumn>,
    entities: PendingEntities,
    extra: Option<Tag>,
}

impl SlimeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(&self, x: i32, z: i32) -> Option<&ChunkColumn> {
        self.chunks.get(&(x, z))
    }

    pub fn chunk_mut(&mut self, x: i32, z: i32) -> Option<&mut ChunkColumn> {
        self.chunks.get_mut(&(x, z))
    }

    /// Stores the chunk under its own coordinates, returning any chunk it replaces.
    pub fn insert_chunk(&mut self, chunk: ChunkColumn) -> Option<ChunkColumn> {
        self.chunks.insert(chunk.coords(), chunk)
    }

    pub fn remove_chunk(&mut self, x: i32, z: i32) -> Option<ChunkColumn> {
        self.chunks.remove(&(x, z))
    }

    pub fn chunks(&self) -> impl Iterator<Item = &ChunkColumn> {
        self.chunks.values()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn tile_entity_count(&self) -> usize {
        self.chunks.values().map(|c| c.block_entities().count()).sum()
    }

    /// Entities not yet released into a chunk.
    pub fn pending_entities(&self) -> &PendingEntities {
        &self.entities
    }

    pub fn add_entity(&mut self, entity: EntityRecord) {
        self.entities.insert(entity);
    }

    /// Pending plus activated entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len() + self.chunks.values().map(|c| c.entities().len()).sum::<usize>()
    }

    pub fn extra(&self) -> Option<&Tag> {
        self.extra.as_ref()
    }

    pub fn set_extra(&mut self, extra: Option<Tag>) {
        self.extra = extra;
    }

    /// Releases the pending entities of a loaded chunk into it.
    ///
    /// Returns one event per released entity. Entities of chunks that are not in
    /// the world stay pending.
    pub fn activate_chunk(&mut self, x: i32, z: i32) -> Vec<EntitySpawn> {
        let chunk = match self.chunks.get_mut(&(x, z)) {
            Some(chunk) => chunk,
            None => return Vec::new(),
        };
        let spawns = self.entities.activate(x, z);
        for spawn in &spawns {
            chunk.add_entity(spawn.entity.clone());
        }
        if !spawns.is_empty() {
            log(
                format!("Activated {} entities in chunk ({}, {})", spawns.len(), x, z),
                Debug,
            );
        }
        spawns
    }

    /// Bounds the next encode would write.
    pub fn bounds(&self) -> Result<WorldBounds> {
        WorldBounds::enclosing(
            self.chunks
                .values()
                .filter(|c| c.has_blocks())
                .map(ChunkColumn::coords),
        )
    }
}

/// Reads and writes whole slime streams.
pub struct SlimeCodec {
    compressor: Box<dyn Compressor>,
    decode_options: DecodeOptions,
    encode_options: EncodeOptions,
    resolver: Box<dyn BlockResolver>,
}

impl Default for SlimeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl SlimeCodec {
    pub fn new() -> Self {
        SlimeCodec {
            compressor: Box::new(Zstd::default()),
            decode_options: DecodeOptions::default(),
            encode_options: EncodeOptions::default(),
            resolver: Box::new(AcceptAll),
        }
    }

    pub fn with_compressor(mut self, compressor: Box<dyn Compressor>) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_compression(self, kind: CompressionKind) -> Self {
        self.with_compressor(kind.compressor())
    }

    pub fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode_options = options;
        self
    }

    pub fn with_encode_options(mut self, options: EncodeOptions) -> Self {
        self.encode_options = options;
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn BlockResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn compressor(&self) -> &dyn Compressor {
        self.compressor.as_ref()
    }

    pub fn read_from<R: Read>(&self, mut reader: R) -> Result<SlimeWorld> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        self.decode_buffer(SlimeBuffer::from_bytes(bytes))
    }

    pub fn write_to<W: Write>(&self, world: &SlimeWorld, mut writer: W) -> Result<()> {
        let bytes = self.encode(world)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<SlimeWorld> {
        self.decode_buffer(SlimeBuffer::from_bytes(bytes.to_vec()))
    }

    fn decode_buffer(&self, mut buffer: SlimeBuffer) -> Result<SlimeWorld> {
        let magic = buffer.read_u16().map_err(|_| SlimeError::UnknownFileType)?;
        if magic != SLIME_MAGIC {
            return Err(SlimeError::UnknownFileType);
        }
        let format_version = buffer.read_u8()?;
        if format_version < MIN_FORMAT_VERSION {
            return Err(SlimeError::UnsupportedFormatVersion(format_version));
        }
        let engine_version = buffer.read_u8()?;
        if engine_version < MIN_ENGINE_VERSION {
            return Err(SlimeError::UnsupportedEngineVersion(engine_version));
        }

        let bounds = WorldBounds::read(&mut buffer)
            .map_err(|e| SlimeError::InvalidBounds(e.to_string()))?;
        let mask_len = ChunkMask::byte_len(bounds.width, bounds.depth);
        let mask_bytes = buffer
            .read_bytes(mask_len)
            .map_err(|e| SlimeError::InvalidBounds(format!("chunk mask: {}", e)))?
            .to_vec();
        let mask = ChunkMask::from_bytes(bounds.width, bounds.depth, mask_bytes);
        log(
            format!(
                "Slime v{} (engine {}), {}x{} chunks from ({}, {}), {} present",
                format_version,
                engine_version,
                bounds.width,
                bounds.depth,
                bounds.min_chunk_x,
                bounds.min_chunk_z,
                mask.count()
            ),
            Debug,
        );

        let compressor = self.compressor.as_ref();
        let chunk_data = read_segment(&mut buffer, compressor, "chunk data")?;
        let tile_data = read_segment(&mut buffer, compressor, "tile entities")?;
        let has_entities = buffer
            .read_bool()
            .map_err(|e| SlimeError::CorruptedSegment(format!("entity flag: {}", e)))?;
        let entity_data = if has_entities {
            Some(read_segment(&mut buffer, compressor, "entities")?)
        } else {
            None
        };
        let extra_data = read_segment(&mut buffer, compressor, "extra")?;
        if buffer.remaining() > 0 {
            log(
                format!("Ignoring {} bytes after the extra segment", buffer.remaining()),
                Warning,
            );
        }

        let mut chunk_buffer = SlimeBuffer::from_bytes(chunk_data);
        let mut chunks = HashMap::with_capacity(mask.count());
        for (grid_x, grid_z) in mask.iter_present() {
            let (chunk_x, chunk_z) = bounds.chunk_at(grid_x, grid_z);
            let chunk = read_chunk(
                &mut chunk_buffer,
                chunk_x,
                chunk_z,
                &self.decode_options,
                self.resolver.as_ref(),
            )?;
            chunks.insert((chunk_x, chunk_z), chunk);
        }
        if chunk_buffer.remaining() > 0 {
            log(
                format!(
                    "Ignoring {} bytes after the last chunk",
                    chunk_buffer.remaining()
                ),
                Warning,
            );
        }

        let tiles = apply_tile_entities(parse_tile_entities(&tile_data), &mut chunks);
        let entities = entity_data
            .map(|data| parse_entities(&data))
            .unwrap_or_default();
        let extra = Tag::from_bytes(&extra_data);

        log(
            format!(
                "Decoded {} chunks, {} tile entities, {} entities",
                chunks.len(),
                tiles,
                entities.len()
            ),
            Info,
        );
        Ok(SlimeWorld {
            chunks,
            entities,
            extra,
        })
    }

    pub fn encode(&self, world: &SlimeWorld) -> Result<Vec<u8>> {
        let (chunks, _) = writable_chunks(world.chunks.values());

        let bounds = WorldBounds::enclosing(chunks.iter().map(ChunkColumn::coords))?;
        let mut mask = ChunkMask::new(bounds.width, bounds.depth);
        let mut chunk_buffer = SlimeBuffer::new();
        for chunk in &chunks {
            if let Some((grid_x, grid_z)) = bounds.grid_cell(chunk.x(), chunk.z()) {
                mask.set(grid_x, grid_z);
            }
            write_chunk(&mut chunk_buffer, chunk)?;
        }

        let mut buffer = SlimeBuffer::new();
        buffer.write_u16(SLIME_MAGIC);
        buffer.write_u8(MIN_FORMAT_VERSION);
        buffer.write_u8(MIN_ENGINE_VERSION);
        bounds.write(&mut buffer);
        buffer.write_bytes_raw(mask.as_bytes());

        let compressor = self.compressor.as_ref();
        write_segment(&mut buffer, compressor, chunk_buffer.get_buffer())?;

        if self.encode_options.minimal {
            write_segment(&mut buffer, compressor, &[])?;
            buffer.write_bool(false);
            write_segment(&mut buffer, compressor, &[])?;
        } else {
            let tiles = collect_tile_entities(chunks.iter());
            write_segment(&mut buffer, compressor, &tiles.to_bytes()?)?;

            let entities: Vec<&EntityRecord> = world
                .entities
                .iter()
                .chain(world.chunks.values().flat_map(|c| c.entities().iter()))
                .collect();
            buffer.write_bool(!entities.is_empty());
            if !entities.is_empty() {
                write_segment(&mut buffer, compressor, &encode_entities(entities).to_bytes()?)?;
            }

            let extra = world.extra.clone().unwrap_or_else(Tag::empty_compound);
            write_segment(&mut buffer, compressor, &extra.to_bytes()?)?;
        }

        log(
            format!(
                "Encoded {} chunks into {} bytes ({})",
                chunks.len(),
                buffer.get_buffer().len(),
                compressor.name()
            ),
            Info,
        );
        Ok(buffer.into_inner())
    }
}

/// Normalized chunks that hold blocks, in mask order (z outer, x inner), plus
/// how many block entities were left behind on air-only chunks.
fn writable_chunks<'a, I>(chunks: I) -> (Vec<ChunkColumn>, usize)
where
    I: IntoIterator<Item = &'a ChunkColumn>,
{
    let mut writable = Vec::new();
    let mut dropped = 0;
    for chunk in chunks.into_iter().map(ChunkColumn::normalized) {
        if chunk.has_blocks() {
            writable.push(chunk);
            continue;
        }
        for (pos, entity) in chunk.block_entities() {
            log(
                format!(
                    "Dropping block entity {} at ({}, {}, {}) in air-only chunk ({}, {})",
                    entity.id.as_deref().unwrap_or("<no id>"),
                    pos.x,
                    pos.y,
                    pos.z,
                    chunk.x(),
                    chunk.z()
                ),
                Debug,
            );
            dropped += 1;
        }
    }
    writable.sort_by_key(|c| (c.z(), c.x()));
    (writable, dropped)
}
