pub mod entity;
pub mod jsonl;
pub mod record;
pub mod stream;

pub use entity::EntityKind;
pub use jsonl::JsonlSourceStream;
pub use record::{
    MemberKind, NodeVersion, OsmRecord, RelationMember, RelationVersion, VersionMeta, WayVersion,
};
pub use stream::{SourceStream, SourceStreamFactory};
