pub mod loader;
pub mod options;

pub use loader::{ChunkLoader, SlimeLoader};
pub use options::LoaderOptions;
