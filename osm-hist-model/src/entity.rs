use serde::{Deserialize, Serialize};

/// spec.md §3: "Entity kinds. Node, Way, Relation." Order matters: the
/// discriminant doubles as the leading byte of an index key (§3's
/// `(kind, id, timestamp)` lexicographic ordering), so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    Node = 0,
    Way = 1,
    Relation = 2,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Node, EntityKind::Way, EntityKind::Relation];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Way => "way",
            EntityKind::Relation => "relation",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Node => "nodes",
            EntityKind::Way => "ways",
            EntityKind::Relation => "relations",
        }
    }

    pub fn key_tag(&self) -> u8 {
        *self as u8
    }

    pub fn from_key_tag(tag: u8) -> Option<EntityKind> {
        match tag {
            0 => Some(EntityKind::Node),
            1 => Some(EntityKind::Way),
            2 => Some(EntityKind::Relation),
            _ => None,
        }
    }
}
