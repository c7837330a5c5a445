//! The entity segment: `{entities: [{id, Pos: [x, y, z], Rotation: [pitch, yaw]}]}`.
//!
//! Entities are not placed into chunk storage while decoding. They wait in
//! [`PendingEntities`] until the host activates the chunk that contains them.

use slime_common::types::{Position, Rotation};
use slime_common::SlimeError;
use slime_logger::log::log;
use slime_logger::severity::LogSeverity::{Debug, Warning};
use slime_nbt::Tag;
use std::collections::HashMap;

const ENTITIES_KEY: &str = "entities";

#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: String,
    pub position: Position,
    pub rotation: Rotation,
}

impl EntityRecord {
    pub fn new(id: impl Into<String>, position: Position, rotation: Rotation) -> Self {
        Self {
            id: id.into(),
            position,
            rotation,
        }
    }

    /// Needs a string `id`, three doubles in `Pos` and two floats in `Rotation`.
    pub fn from_tag(tag: &Tag) -> Option<Self> {
        let id = tag.get("id")?.as_string()?.clone();

        let pos = tag.get("Pos")?.as_list()?;
        let (x, y, z) = match pos.as_slice() {
            [x, y, z, ..] => (x.as_f64()?, y.as_f64()?, z.as_f64()?),
            _ => return None,
        };

        // Slime files store [pitch, yaw], the reverse of vanilla entity NBT.
        let rotation = tag.get("Rotation")?.as_list()?;
        let (pitch, yaw) = match rotation.as_slice() {
            [pitch, yaw, ..] => (pitch.as_f32()?, yaw.as_f32()?),
            _ => return None,
        };

        Some(EntityRecord {
            id,
            position: Position::new(x, y, z),
            rotation: Rotation { yaw, pitch },
        })
    }

    pub fn to_tag(&self) -> Tag {
        Tag::compound([
            ("id", Tag::String(self.id.clone())),
            (
                "Pos",
                Tag::List(vec![
                    Tag::Double(self.position.x),
                    Tag::Double(self.position.y),
                    Tag::Double(self.position.z),
                ]),
            ),
            // [pitch, yaw] as slime files have it, not vanilla's [yaw, pitch].
            (
                "Rotation",
                Tag::List(vec![
                    Tag::Float(self.rotation.pitch),
                    Tag::Float(self.rotation.yaw),
                ]),
            ),
        ])
    }

    fn same_spot(&self, other: &EntityRecord) -> bool {
        self.position == other.position && self.rotation == other.rotation
    }
}

/// Emitted when an activated chunk releases a pending entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpawn {
    pub chunk_x: i32,
    pub chunk_z: i32,
    pub entity: EntityRecord,
}

/// Decoded entities grouped by the chunk their position falls in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingEntities {
    by_chunk: HashMap<(i32, i32), Vec<EntityRecord>>,
}

impl PendingEntities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records are keyed by position; a later record at the same position and
    /// rotation replaces the earlier one.
    pub fn insert(&mut self, entity: EntityRecord) {
        let entries = self
            .by_chunk
            .entry(entity.position.chunk_coords())
            .or_default();
        match entries.iter_mut().find(|e| e.same_spot(&entity)) {
            Some(existing) => *existing = entity,
            None => entries.push(entity),
        }
    }

    pub fn len(&self) -> usize {
        self.by_chunk.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_chunk.is_empty()
    }

    pub fn pending_in(&self, chunk_x: i32, chunk_z: i32) -> &[EntityRecord] {
        self.by_chunk
            .get(&(chunk_x, chunk_z))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Drains the chunk's entities. A second activation yields nothing.
    pub fn activate(&mut self, chunk_x: i32, chunk_z: i32) -> Vec<EntitySpawn> {
        self.by_chunk
            .remove(&(chunk_x, chunk_z))
            .unwrap_or_default()
            .into_iter()
            .map(|entity| EntitySpawn {
                chunk_x,
                chunk_z,
                entity,
            })
            .collect()
    }

    /// All pending entities, ordered by chunk then insertion.
    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        let mut keys: Vec<_> = self.by_chunk.keys().collect();
        keys.sort();
        keys.into_iter().flat_map(move |key| self.by_chunk[key].iter())
    }
}

impl FromIterator<EntityRecord> for PendingEntities {
    fn from_iter<I: IntoIterator<Item = EntityRecord>>(iter: I) -> Self {
        let mut pending = PendingEntities::new();
        for entity in iter {
            pending.insert(entity);
        }
        pending
    }
}

/// Parses the segment leniently. Records missing a field are skipped.
pub fn parse_entities(bytes: &[u8]) -> PendingEntities {
    let root = match Tag::from_bytes(bytes) {
        Some(root) => root,
        None => {
            if !bytes.is_empty() {
                log("Entity segment is not a valid tag tree".to_string(), Warning);
            }
            return PendingEntities::new();
        }
    };
    let entities = match root.get(ENTITIES_KEY).and_then(Tag::as_list) {
        Some(entities) => entities,
        None => return PendingEntities::new(),
    };

    entities
        .iter()
        .enumerate()
        .filter_map(|(index, tag)| {
            let record = EntityRecord::from_tag(tag);
            if record.is_none() {
                let err = SlimeError::MetadataDecodeFailure(format!("entity {}", index));
                log(format!("{}, skipping", err), Debug);
            }
            record
        })
        .collect()
}

pub fn encode_entities<'a, I>(entities: I) -> Tag
where
    I: IntoIterator<Item = &'a EntityRecord>,
{
    Tag::compound([(
        ENTITIES_KEY,
        Tag::List(entities.into_iter().map(EntityRecord::to_tag).collect()),
    )])
}
