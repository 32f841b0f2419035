use crate::entity::EntityKind;
use serde::{Deserialize, Serialize};

/// Fields common to every version, regardless of entity kind (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMeta {
    pub id: u64,
    pub version: u32,
    pub timestamp: i64,
    pub visible: bool,
    pub tags: Vec<(String, String)>,
    pub user: String,
    pub uid: u64,
    pub changeset: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVersion {
    pub meta: VersionMeta,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
}

impl NodeVersion {
    /// §4.2: "none if ... the row represents a deleted (invisible) version
    /// with no geometry payload." A node only has a usable location when
    /// visible and both coordinates are present.
    pub fn has_location(&self) -> bool {
        self.meta.visible && self.lon.is_some() && self.lat.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WayVersion {
    pub meta: VersionMeta,
    pub nodes: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

impl MemberKind {
    pub fn as_entity_kind(&self) -> EntityKind {
        match self {
            MemberKind::Node => EntityKind::Node,
            MemberKind::Way => EntityKind::Way,
            MemberKind::Relation => EntityKind::Relation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationMember {
    pub kind: MemberKind,
    pub id: u64,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationVersion {
    pub meta: VersionMeta,
    pub members: Vec<RelationMember>,
}

impl RelationVersion {
    /// §4.6's legacy batching filter: "A relation is only enqueued for
    /// geometry building if it contains at least one Relation member."
    pub fn has_relation_member(&self) -> bool {
        self.members
            .iter()
            .any(|m| matches!(m.kind, MemberKind::Relation))
    }
}

/// One version of one entity, tagged by kind. This is the unit the
/// `SourceStream` trait yields (spec.md §6's "source stream").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsmRecord {
    Node(NodeVersion),
    Way(WayVersion),
    Relation(RelationVersion),
}

impl OsmRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            OsmRecord::Node(_) => EntityKind::Node,
            OsmRecord::Way(_) => EntityKind::Way,
            OsmRecord::Relation(_) => EntityKind::Relation,
        }
    }

    pub fn meta(&self) -> &VersionMeta {
        match self {
            OsmRecord::Node(n) => &n.meta,
            OsmRecord::Way(w) => &w.meta,
            OsmRecord::Relation(r) => &r.meta,
        }
    }

    pub fn id(&self) -> u64 {
        self.meta().id
    }

    pub fn timestamp(&self) -> i64 {
        self.meta().timestamp
    }
}
