//! The tile-entity segment: `{tiles: [{x, y, z, id, ...payload}]}` with absolute
//! block coordinates.

use crate::voxel::{BlockEntity, ChunkColumn, LocalPos, CHUNK_HEIGHT};
use slime_common::types::split_block_coord;
use slime_common::SlimeError;
use slime_logger::log::log;
use slime_logger::severity::LogSeverity::{Debug, Warning};
use slime_nbt::Tag;
use std::collections::HashMap;

const TILES_KEY: &str = "tiles";
/// Keys consumed by the record itself and never copied into the payload.
const STRIPPED_KEYS: [&str; 5] = ["x", "y", "z", "id", "keepPacked"];

#[derive(Debug, Clone, PartialEq)]
pub struct TileEntityRecord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub id: Option<String>,
    /// Everything except the coordinates, `id` and `keepPacked`.
    pub payload: HashMap<String, Tag>,
}

impl TileEntityRecord {
    /// `None` unless the tag is a compound with int `x`, `y` and `z`.
    pub fn from_tag(tag: &Tag) -> Option<Self> {
        let fields = tag.as_compound()?;
        let x = fields.get("x")?.as_i32()?;
        let y = fields.get("y")?.as_i32()?;
        let z = fields.get("z")?.as_i32()?;
        let id = fields.get("id").and_then(Tag::as_string).cloned();
        let payload = fields
            .iter()
            .filter(|(key, _)| !STRIPPED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(TileEntityRecord {
            x,
            y,
            z,
            id,
            payload,
        })
    }

    pub fn to_tag(&self) -> Tag {
        let mut fields = self.payload.clone();
        fields.insert("x".to_string(), Tag::Int(self.x));
        fields.insert("y".to_string(), Tag::Int(self.y));
        fields.insert("z".to_string(), Tag::Int(self.z));
        if let Some(id) = &self.id {
            fields.insert("id".to_string(), Tag::String(id.clone()));
        }
        Tag::Compound(fields)
    }

    /// The chunk holding this block and the block's position inside it.
    pub fn chunk_and_local(&self) -> ((i32, i32), LocalPos) {
        let (chunk_x, local_x) = split_block_coord(self.x);
        let (chunk_z, local_z) = split_block_coord(self.z);
        (
            (chunk_x, chunk_z),
            LocalPos {
                x: local_x,
                y: self.y,
                z: local_z,
            },
        )
    }
}

/// Parses the segment leniently: an undecodable root or missing `tiles` list
/// yields nothing, and malformed records are skipped.
pub fn parse_tile_entities(bytes: &[u8]) -> Vec<TileEntityRecord> {
    let root = match Tag::from_bytes(bytes) {
        Some(root) => root,
        None => {
            if !bytes.is_empty() {
                log("Tile entity segment is not a valid tag tree".to_string(), Warning);
            }
            return Vec::new();
        }
    };
    let tiles = match root.get(TILES_KEY).and_then(Tag::as_list) {
        Some(tiles) => tiles,
        None => return Vec::new(),
    };

    tiles
        .iter()
        .enumerate()
        .filter_map(|(index, tag)| {
            let record = TileEntityRecord::from_tag(tag);
            if record.is_none() {
                let err = SlimeError::MetadataDecodeFailure(format!("tile entity {}", index));
                log(format!("{}, skipping", err), Debug);
            }
            record
        })
        .collect()
}

/// Attaches records to the chunks that contain them. Records pointing at missing
/// chunks or outside the world height are skipped. Returns how many were attached.
pub fn apply_tile_entities(
    records: Vec<TileEntityRecord>,
    chunks: &mut HashMap<(i32, i32), ChunkColumn>,
) -> usize {
    let mut applied = 0;
    for record in records {
        if record.y < 0 || record.y >= CHUNK_HEIGHT as i32 {
            log(
                format!(
                    "Skipping tile entity at ({}, {}, {}): y out of range",
                    record.x, record.y, record.z
                ),
                Warning,
            );
            continue;
        }
        let (coords, local) = record.chunk_and_local();
        let chunk = match chunks.get_mut(&coords) {
            Some(chunk) => chunk,
            None => {
                log(
                    format!(
                        "Skipping tile entity at ({}, {}, {}): chunk ({}, {}) not loaded",
                        record.x, record.y, record.z, coords.0, coords.1
                    ),
                    Debug,
                );
                continue;
            }
        };
        chunk.set_block_entity(
            local,
            BlockEntity {
                id: record.id,
                data: record.payload,
            },
        );
        applied += 1;
    }
    applied
}

/// Builds the segment from every block entity, restoring absolute coordinates.
pub fn collect_tile_entities<'a, I>(chunks: I) -> Tag
where
    I: IntoIterator<Item = &'a ChunkColumn>,
{
    let mut tiles = Vec::new();
    for chunk in chunks {
        let mut entities: Vec<_> = chunk.block_entities().collect();
        entities.sort_by_key(|(pos, _)| **pos);
        for (pos, entity) in entities {
            let record = TileEntityRecord {
                x: chunk.x() * 16 + pos.x as i32,
                y: pos.y,
                z: chunk.z() * 16 + pos.z as i32,
                id: entity.id.clone(),
                payload: entity.data.clone(),
            };
            tiles.push(record.to_tag());
        }
    }
    Tag::compound([(TILES_KEY, Tag::List(tiles))])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: i32, y: i32, z: i32) -> Tag {
        Tag::compound([
            ("x", Tag::Int(x)),
            ("y", Tag::Int(y)),
            ("z", Tag::Int(z)),
            ("id", Tag::String("minecraft:sign".to_string())),
            ("keepPacked", Tag::Byte(0)),
            ("Text1", Tag::String("hello".to_string())),
        ])
    }

    fn segment(tiles: Vec<Tag>) -> Vec<u8> {
        Tag::compound([(TILES_KEY, Tag::List(tiles))]).to_bytes().unwrap()
    }

    #[test]
    fn test_negative_coordinates_map_to_last_local_block() {
        let records = parse_tile_entities(&segment(vec![tile(-1, 70, -1)]));
        assert_eq!(records.len(), 1);
        let (coords, local) = records[0].chunk_and_local();
        assert_eq!(coords, (-1, -1));
        assert_eq!(local, LocalPos { x: 15, y: 70, z: 15 });

        let mut chunks = HashMap::new();
        chunks.insert((-1, -1), ChunkColumn::new(-1, -1));
        assert_eq!(apply_tile_entities(records, &mut chunks), 1);

        let entity = chunks[&(-1, -1)].block_entity(local).unwrap();
        assert_eq!(entity.id.as_deref(), Some("minecraft:sign"));
        assert_eq!(entity.data.len(), 1);
        assert_eq!(entity.data["Text1"], Tag::String("hello".to_string()));
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let bad = Tag::compound([("x", Tag::String("nope".to_string()))]);
        let no_y = Tag::compound([("x", Tag::Int(1)), ("z", Tag::Int(1))]);
        let records = parse_tile_entities(&segment(vec![bad, tile(3, 1, 4), no_y]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].x, 3);
    }

    #[test]
    fn test_unreadable_segment_yields_nothing() {
        assert!(parse_tile_entities(&[]).is_empty());
        assert!(parse_tile_entities(&[0xFF, 0x00]).is_empty());
        let no_list = Tag::empty_compound().to_bytes().unwrap();
        assert!(parse_tile_entities(&no_list).is_empty());
    }

    #[test]
    fn test_deeply_nested_segment_yields_nothing() {
        // {tiles: [[[...]]]} nested far past what the tag reader accepts.
        let mut bytes = vec![10, 0, 0, 9, 0, 5];
        bytes.extend_from_slice(TILES_KEY.as_bytes());
        for _ in 0..100_000 {
            bytes.extend_from_slice(&[9, 0, 0, 0, 1]);
        }
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
        assert!(parse_tile_entities(&bytes).is_empty());
    }

    #[test]
    fn test_missing_chunk_and_bad_height_are_skipped() {
        let records = parse_tile_entities(&segment(vec![tile(40, 5, 0), tile(0, 300, 0)]));
        let mut chunks = HashMap::new();
        chunks.insert((0, 0), ChunkColumn::new(0, 0));
        assert_eq!(apply_tile_entities(records, &mut chunks), 0);
        assert_eq!(chunks[&(0, 0)].block_entities().count(), 0);
    }

    #[test]
    fn test_collect_restores_absolute_coordinates() {
        let mut chunk = ChunkColumn::new(-2, 3);
        chunk.set_block_entity(
            LocalPos { x: 4, y: 10, z: 15 },
            BlockEntity {
                id: Some("minecraft:chest".to_string()),
                data: HashMap::new(),
            },
        );
        let tag = collect_tile_entities([&chunk]);
        let records = parse_tile_entities(&tag.to_bytes().unwrap());
        assert_eq!(
            records,
            vec![TileEntityRecord {
                x: -28,
                y: 10,
                z: 63,
                id: Some("minecraft:chest".to_string()),
                payload: HashMap::new(),
            }]
        );
    }
}
