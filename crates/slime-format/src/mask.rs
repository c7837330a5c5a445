//! Presence bitmaps. Bit `i` lives in byte `i / 8` at position `i % 8`.

use crate::voxel::SECTION_COUNT;

/// Which cells of the `width x depth` chunk grid carry chunk data, row-major
/// with z outer and x inner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMask {
    width: u16,
    depth: u16,
    bits: Vec<u8>,
}

impl ChunkMask {
    pub fn new(width: u16, depth: u16) -> Self {
        Self {
            width,
            depth,
            bits: vec![0; Self::byte_len(width, depth)],
        }
    }

    /// Wraps mask bytes read from a stream; `bytes` must be `byte_len` long.
    pub fn from_bytes(width: u16, depth: u16, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), Self::byte_len(width, depth));
        Self { width, depth, bits: bytes }
    }

    /// `ceil(width * depth / 8)`
    pub fn byte_len(width: u16, depth: u16) -> usize {
        (width as usize * depth as usize + 7) / 8
    }

    fn bit_index(&self, x: u16, z: u16) -> Option<usize> {
        if x >= self.width || z >= self.depth {
            return None;
        }
        Some(z as usize * self.width as usize + x as usize)
    }

    pub fn present(&self, x: u16, z: u16) -> bool {
        self.bit_index(x, z)
            .map_or(false, |i| self.bits[i / 8] & (1 << (i % 8)) != 0)
    }

    /// Marks grid cell `(x, z)`. Cells outside the grid are ignored and reported.
    pub fn set(&mut self, x: u16, z: u16) -> bool {
        match self.bit_index(x, z) {
            Some(i) => {
                self.bits[i / 8] |= 1 << (i % 8);
                true
            }
            None => false,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Present cells in stream order.
    pub fn iter_present(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        (0..self.depth)
            .flat_map(move |z| (0..self.width).map(move |x| (x, z)))
            .filter(move |&(x, z)| self.present(x, z))
    }
}

/// One bit per vertical section of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionMask(u16);

impl SectionMask {
    pub const BYTE_LEN: usize = 2;

    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        SectionMask(u16::from_le_bytes(bytes))
    }

    pub fn to_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub fn is_set(self, section: usize) -> bool {
        section < SECTION_COUNT && self.0 & (1 << section) != 0
    }

    pub fn set(&mut self, section: usize) {
        if section < SECTION_COUNT {
            self.0 |= 1 << section;
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..SECTION_COUNT).filter(move |&section| self.is_set(section))
    }
}
