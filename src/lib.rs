pub mod args;
pub mod report;

// Re-export commonly used items
pub use slime_common::{Result, SlimeError};
pub use slime_format::{
    ChunkColumn, CompressionKind, FileSlimeSource, MemorySlimeSource, SlimeCodec, SlimeSource,
    SlimeWorld,
};
pub use slime_loader::{ChunkLoader, LoaderOptions, SlimeLoader};
pub use slime_logger::{log, LogSeverity};
