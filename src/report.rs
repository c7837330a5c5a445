use serde::Serialize;
use slime_common::Result;
use slime_format::{SlimeWorld, VoxelGrid, WorldBounds};
use std::fmt;
use std::time::Duration;

/// What `info` prints about a world.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSummary {
    pub bounds: WorldBounds,
    pub chunks: usize,
    pub sections: usize,
    pub tile_entities: usize,
    pub entities: usize,
    pub has_extra: bool,
    pub load_millis: u128,
}

impl WorldSummary {
    pub fn new(world: &SlimeWorld, load_time: Duration) -> Result<Self> {
        Ok(WorldSummary {
            bounds: world.bounds()?,
            chunks: world.chunk_count(),
            sections: world
                .chunks()
                .map(|c| c.non_empty_sections().iter().count())
                .sum(),
            tile_entities: world.tile_entity_count(),
            entities: world.entity_count(),
            has_extra: world.extra().is_some(),
            load_millis: load_time.as_millis(),
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "bounds:        {}x{} chunks from ({}, {})",
            self.bounds.width, self.bounds.depth, self.bounds.min_chunk_x, self.bounds.min_chunk_z
        )?;
        writeln!(f, "chunks:        {}", self.chunks)?;
        writeln!(f, "sections:      {}", self.sections)?;
        writeln!(f, "tile entities: {}", self.tile_entities)?;
        writeln!(f, "entities:      {}", self.entities)?;
        writeln!(f, "extra:         {}", if self.has_extra { "yes" } else { "no" })?;
        write!(f, "took {}ms to load", self.load_millis)
    }
}
