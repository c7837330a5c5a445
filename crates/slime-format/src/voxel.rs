use crate::bitpack::{self, SECTION_VOLUME};
use crate::block::BlockState;
use crate::entity::EntityRecord;
use crate::mask::SectionMask;
use slime_nbt::Tag;
use std::collections::HashMap;

pub const SECTION_COUNT: usize = 16;
pub const SECTION_SIZE: usize = 16;
pub const CHUNK_HEIGHT: usize = SECTION_COUNT * SECTION_SIZE;
/// Nibble-packed light for one section.
pub const LIGHT_LEN: usize = 2048;
pub const BIOME_COUNT: usize = 1024;
/// Biome id every decoded chunk is filled with.
pub const DEFAULT_BIOME_ID: i32 = 1;

/// `y * 256 + z * 16 + x` within a section.
pub fn section_index(x: usize, y: usize, z: usize) -> usize {
    (y * SECTION_SIZE * SECTION_SIZE) + (z * SECTION_SIZE) + x
}

/// A section's palette together with its packed index array.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedSection {
    pub palette: Vec<BlockState>,
    pub bits_per_entry: u8,
    pub longs: Vec<i64>,
}

/// The block storage a host engine exposes to the codec. Coordinates are local to
/// the chunk column: `x, z` in `0..16`, `y` in `0..256`.
pub trait VoxelGrid {
    /// `None` means air.
    fn block(&self, x: usize, y: usize, z: usize) -> Option<&BlockState>;

    fn set_block(&mut self, x: usize, y: usize, z: usize, state: Option<BlockState>);

    fn block_light(&self, section: usize) -> Option<&[u8]>;

    fn sky_light(&self, section: usize) -> Option<&[u8]>;

    fn set_section_light(
        &mut self,
        section: usize,
        block_light: Option<Vec<u8>>,
        sky_light: Option<Vec<u8>>,
    );

    /// Sections holding at least one non-air block.
    fn non_empty_sections(&self) -> SectionMask;

    /// Distinct block states of a section: air first, then first-seen order
    /// walking y, z, x.
    fn section_palette(&self, section: usize) -> Vec<BlockState> {
        self.packed_section(section).palette
    }

    /// Palette plus freshly packed indices built from the current contents.
    fn packed_section(&self, section: usize) -> PackedSection {
        let y_offset = section * SECTION_SIZE;
        let mut palette = vec![BlockState::air()];
        let mut lookup: HashMap<&BlockState, u32> = HashMap::new();
        let mut indices = Vec::with_capacity(SECTION_VOLUME);

        for y in 0..SECTION_SIZE {
            for z in 0..SECTION_SIZE {
                for x in 0..SECTION_SIZE {
                    let index = match self.block(x, y_offset + y, z) {
                        Some(state) if !state.is_air() => match lookup.get(state) {
                            Some(&index) => index,
                            None => {
                                let index = palette.len() as u32;
                                palette.push(state.clone());
                                lookup.insert(state, index);
                                index
                            }
                        },
                        _ => 0,
                    };
                    indices.push(index);
                }
            }
        }

        let bits_per_entry = bitpack::bits_for_palette(palette.len());
        PackedSection {
            longs: bitpack::pack(&indices, bits_per_entry),
            bits_per_entry,
            palette,
        }
    }
}

/// Block-entity payload attached to one block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockEntity {
    /// Host-side behaviour selector, e.g. `minecraft:chest`.
    pub id: Option<String>,
    pub data: HashMap<String, Tag>,
}

/// Block position local to a chunk column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalPos {
    pub x: u8,
    pub y: i32,
    pub z: u8,
}

#[derive(Debug, Clone)]
pub struct ChunkSection {
    block_count: u16,
    /// Index 0 is always air.
    palette: Vec<BlockState>,
    blocks: Vec<u16>,
    block_light: Option<Vec<u8>>,
    sky_light: Option<Vec<u8>>,
}

impl Default for ChunkSection {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkSection {
    pub fn new() -> Self {
        ChunkSection {
            block_count: 0,
            palette: vec![BlockState::air()],
            blocks: vec![0; SECTION_VOLUME],
            block_light: None,
            sky_light: None,
        }
    }

    pub fn block_count(&self) -> u16 {
        self.block_count
    }

    pub fn is_empty(&self) -> bool {
        self.block_count == 0
    }

    pub fn get_block_state_at(&self, x: usize, y: usize, z: usize) -> Option<&BlockState> {
        match self.blocks[section_index(x, y, z)] {
            0 => None,
            index => self.palette.get(index as usize),
        }
    }

    pub fn set_block_state_at(&mut self, x: usize, y: usize, z: usize, state: Option<BlockState>) {
        let new_index = match state {
            Some(state) if !state.is_air() => self.id_for_state(state),
            _ => 0,
        };
        let slot = &mut self.blocks[section_index(x, y, z)];
        match (*slot == 0, new_index == 0) {
            (true, false) => self.block_count += 1,
            (false, true) => self.block_count -= 1,
            _ => {}
        }
        *slot = new_index;
    }

    fn id_for_state(&mut self, state: BlockState) -> u16 {
        if let Some(index) = self.palette.iter().position(|s| *s == state) {
            return index as u16;
        }
        if self.palette.len() > SECTION_VOLUME {
            self.compact();
        }
        self.palette.push(state);
        (self.palette.len() - 1) as u16
    }

    /// Drops palette entries no block refers to any more.
    pub fn compact(&mut self) {
        let mut remap = vec![None; self.palette.len()];
        remap[0] = Some(0u16);
        let mut palette = vec![BlockState::air()];
        for slot in self.blocks.iter_mut() {
            let old = *slot as usize;
            let new = *remap[old].get_or_insert_with(|| {
                palette.push(self.palette[old].clone());
                (palette.len() - 1) as u16
            });
            *slot = new;
        }
        self.palette = palette;
    }

    pub fn palette_len(&self) -> usize {
        self.palette.len()
    }

    pub fn block_light(&self) -> Option<&[u8]> {
        self.block_light.as_deref()
    }

    pub fn sky_light(&self) -> Option<&[u8]> {
        self.sky_light.as_deref()
    }
}

/// An in-memory chunk column: 16 optional sections plus column-level metadata.
#[derive(Debug, Clone)]
pub struct ChunkColumn {
    x: i32,
    z: i32,
    sections: [Option<ChunkSection>; SECTION_COUNT],
    biomes: Vec<i32>,
    /// Biome ids exactly as they were read from the stream.
    raw_biomes: Vec<i32>,
    heightmaps: Option<Tag>,
    block_entities: HashMap<LocalPos, BlockEntity>,
    /// Entities released into this chunk by activation.
    entities: Vec<EntityRecord>,
}

impl ChunkColumn {
    pub fn new(x: i32, z: i32) -> Self {
        ChunkColumn {
            x,
            z,
            sections: Default::default(),
            biomes: vec![DEFAULT_BIOME_ID; BIOME_COUNT],
            raw_biomes: Vec::new(),
            heightmaps: None,
            block_entities: HashMap::new(),
            entities: Vec::new(),
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn z(&self) -> i32 {
        self.z
    }

    pub fn coords(&self) -> (i32, i32) {
        (self.x, self.z)
    }

    pub fn get_section(&self, section_y: usize) -> Option<&ChunkSection> {
        self.sections.get(section_y)?.as_ref()
    }

    /// Returns the section, creating an empty one if needed.
    pub fn get_section_mut(&mut self, section_y: usize) -> Option<&mut ChunkSection> {
        let slot = self.sections.get_mut(section_y)?;
        Some(slot.get_or_insert_with(ChunkSection::new))
    }

    pub fn has_blocks(&self) -> bool {
        !self.non_empty_sections().is_empty()
    }

    pub fn biomes(&self) -> &[i32] {
        &self.biomes
    }

    pub fn raw_biomes(&self) -> &[i32] {
        &self.raw_biomes
    }

    pub fn set_raw_biomes(&mut self, biomes: Vec<i32>) {
        self.raw_biomes = biomes;
    }

    pub fn heightmaps(&self) -> Option<&Tag> {
        self.heightmaps.as_ref()
    }

    pub fn set_heightmaps(&mut self, heightmaps: Option<Tag>) {
        self.heightmaps = heightmaps;
    }

    pub fn block_entity(&self, pos: LocalPos) -> Option<&BlockEntity> {
        self.block_entities.get(&pos)
    }

    pub fn set_block_entity(&mut self, pos: LocalPos, entity: BlockEntity) {
        self.block_entities.insert(pos, entity);
    }

    pub fn remove_block_entity(&mut self, pos: LocalPos) -> Option<BlockEntity> {
        self.block_entities.remove(&pos)
    }

    pub fn block_entities(&self) -> impl Iterator<Item = (&LocalPos, &BlockEntity)> {
        self.block_entities.iter()
    }

    pub fn entities(&self) -> &[EntityRecord] {
        &self.entities
    }

    pub fn add_entity(&mut self, entity: EntityRecord) {
        self.entities.push(entity);
    }

    /// A copy ready for serialization: palettes compacted and air-only sections
    /// dropped. Light is kept only on sections that still hold blocks.
    pub fn normalized(&self) -> ChunkColumn {
        let mut copy = self.clone();
        for slot in copy.sections.iter_mut() {
            if slot.as_ref().map_or(true, ChunkSection::is_empty) {
                *slot = None;
            } else if let Some(section) = slot {
                section.compact();
            }
        }
        copy
    }
}

impl VoxelGrid for ChunkColumn {
    fn block(&self, x: usize, y: usize, z: usize) -> Option<&BlockState> {
        if x >= SECTION_SIZE || z >= SECTION_SIZE {
            return None;
        }
        self.get_section(y / SECTION_SIZE)?
            .get_block_state_at(x, y % SECTION_SIZE, z)
    }

    fn set_block(&mut self, x: usize, y: usize, z: usize, state: Option<BlockState>) {
        if x >= SECTION_SIZE || z >= SECTION_SIZE || y >= CHUNK_HEIGHT {
            return;
        }
        let section_y = y / SECTION_SIZE;
        if state.is_none() && self.get_section(section_y).is_none() {
            return;
        }
        if let Some(section) = self.get_section_mut(section_y) {
            section.set_block_state_at(x, y % SECTION_SIZE, z, state);
        }
    }

    fn block_light(&self, section: usize) -> Option<&[u8]> {
        self.get_section(section)?.block_light()
    }

    fn sky_light(&self, section: usize) -> Option<&[u8]> {
        self.get_section(section)?.sky_light()
    }

    fn set_section_light(
        &mut self,
        section: usize,
        block_light: Option<Vec<u8>>,
        sky_light: Option<Vec<u8>>,
    ) {
        if block_light.is_none() && sky_light.is_none() && self.get_section(section).is_none() {
            return;
        }
        if let Some(section) = self.get_section_mut(section) {
            section.block_light = block_light;
            section.sky_light = sky_light;
        }
    }

    fn non_empty_sections(&self) -> SectionMask {
        let mut mask = SectionMask::default();
        for (index, section) in self.sections.iter().enumerate() {
            if section.as_ref().map_or(false, |s| !s.is_empty()) {
                mask.set(index);
            }
        }
        mask
    }
}
