pub mod bitpack;
pub mod block;
pub mod buffer;
pub mod chunk;
pub mod compression;
pub mod entity;
pub mod mask;
pub mod options;
pub mod section;
pub mod segment;
pub mod source;
pub mod tile_entity;
pub mod voxel;
pub mod world;

// Re-export commonly used items
pub use block::{AcceptAll, BlockResolver, BlockState, KnownBlocks};
pub use compression::{CompressionKind, Compressor, Zlib, Zstd};
pub use entity::{EntityRecord, EntitySpawn, PendingEntities};
pub use options::{DecodeOptions, EncodeOptions};
pub use source::{FileSlimeSource, MemorySlimeSource, SlimeSource};
pub use voxel::{BlockEntity, ChunkColumn, LocalPos, VoxelGrid};
pub use world::{SlimeCodec, SlimeWorld, WorldBounds};
