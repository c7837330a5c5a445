use slime_nbt::Tag;
use std::collections::BTreeMap;

pub const AIR_NAME: &str = "minecraft:air";

/// A block identified by its namespaced name and string properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockState {
    pub name: String,
    pub properties: BTreeMap<String, String>,
}

impl BlockState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn air() -> Self {
        Self::new(AIR_NAME)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn is_air(&self) -> bool {
        self.name == AIR_NAME
    }

    /// Reads a palette compound `{Name: string, Properties: {k: string}}`.
    /// Non-string property values are dropped.
    pub fn from_tag(tag: &Tag) -> Option<Self> {
        let name = tag.get("Name")?.as_string()?;
        let properties: BTreeMap<String, String> = tag
            .get("Properties")
            .and_then(Tag::as_compound)
            .map(|props| {
                props
                    .iter()
                    .filter_map(|(k, v)| Some((k.clone(), v.as_string()?.clone())))
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            name: name.clone(),
            properties,
        })
    }

    pub fn to_tag(&self) -> Tag {
        let mut entries = vec![("Name", Tag::String(self.name.clone()))];
        if !self.properties.is_empty() {
            entries.push((
                "Properties",
                Tag::compound(
                    self.properties
                        .iter()
                        .map(|(k, v)| (k.clone(), Tag::String(v.clone()))),
                ),
            ));
        }
        Tag::compound(entries)
    }
}

/// Maps a decoded palette entry onto a block the host knows about.
pub trait BlockResolver: Send + Sync {
    /// `None` leaves the voxel empty.
    fn resolve(&self, state: &BlockState) -> Option<BlockState>;
}

/// Accepts every descriptor as-is.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl BlockResolver for AcceptAll {
    fn resolve(&self, state: &BlockState) -> Option<BlockState> {
        Some(state.clone())
    }
}

/// Accepts only names from a fixed set.
#[derive(Debug, Default, Clone)]
pub struct KnownBlocks {
    names: std::collections::HashSet<String>,
}

impl KnownBlocks {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl BlockResolver for KnownBlocks {
    fn resolve(&self, state: &BlockState) -> Option<BlockState> {
        self.names.contains(&state.name).then(|| state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_round_trip_keeps_properties() {
        let state = BlockState::new("minecraft:oak_stairs")
            .with_property("facing", "north")
            .with_property("half", "top");
        assert_eq!(BlockState::from_tag(&state.to_tag()), Some(state));
    }

    #[test]
    fn test_from_tag_requires_string_name() {
        assert_eq!(BlockState::from_tag(&Tag::compound([("Name", Tag::Int(1))])), None);
        assert_eq!(BlockState::from_tag(&Tag::Int(1)), None);
    }

    #[test]
    fn test_non_string_properties_are_dropped() {
        let tag = Tag::compound([
            ("Name", Tag::String("minecraft:snow".to_string())),
            (
                "Properties",
                Tag::compound([
                    ("layers", Tag::Int(3)),
                    ("snowy", Tag::String("true".to_string())),
                ]),
            ),
        ]);
        let state = BlockState::from_tag(&tag).unwrap();
        assert_eq!(state, BlockState::new("minecraft:snow").with_property("snowy", "true"));
    }

    #[test]
    fn test_known_blocks_resolver() {
        let resolver = KnownBlocks::new(["minecraft:stone"]);
        assert!(resolver.resolve(&BlockState::new("minecraft:stone")).is_some());
        assert!(resolver.resolve(&BlockState::new("mod:widget")).is_none());
        assert!(AcceptAll.resolve(&BlockState::new("mod:widget")).is_some());
    }
}
