use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, crate::error::SlimeError>;

/// Width of a chunk column along X and Z, in blocks.
pub const CHUNK_WIDTH: i32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Coordinates of the chunk column containing this position.
    pub fn chunk_coords(&self) -> (i32, i32) {
        (
            (self.x.floor() as i32).div_euclid(CHUNK_WIDTH),
            (self.z.floor() as i32).div_euclid(CHUNK_WIDTH),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotation {
    pub yaw: f32,
    pub pitch: f32,
}

/// Splits an absolute block coordinate into (chunk coordinate, local offset).
pub fn split_block_coord(value: i32) -> (i32, u8) {
    (
        value.div_euclid(CHUNK_WIDTH),
        value.rem_euclid(CHUNK_WIDTH) as u8,
    )
}
