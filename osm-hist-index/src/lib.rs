//! The versioned index store (spec.md §4.2): a sharded, on-disk,
//! get-as-of key/value index keyed by `(kind, id, timestamp)`.

pub mod key;
pub mod memory;
pub mod merge;
pub mod store;

pub use key::{decode_key, encode_key, encode_prefix, KEY_LEN};
pub use memory::InMemoryStore;
pub use merge::merge_into;
pub use store::{FjallShardStore, StoredVersion, TemporalStore};
