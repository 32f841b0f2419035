// spec.md §4.2: the versioned index store contract. `TemporalStore` is the
// seam (mirroring the `Store` trait in the teacher codebase's transaction
// layer — get/put/abort — adapted here to get-as-of/put/commit/close); tests
// exercise an in-memory implementation (`memory::InMemoryStore`) without
// touching disk, while `FjallShardStore` is the real, persistent one,
// backed by `fjall`, an LSM-tree embedded KV engine — the class of "local
// sorted-string or B-tree-style engine" spec.md calls for.

use crate::key::{encode_key, encode_prefix, encode_ts, KEY_LEN};
use osm_hist_base::{Error, Result};
use osm_hist_model::EntityKind;
use std::path::{Path, PathBuf};

/// One stored version: its timestamp (echoed back so callers don't have to
/// re-derive it) and the opaque, already-encoded blob.
pub type StoredVersion = (i64, Vec<u8>);

pub trait TemporalStore: Send {
    /// §4.2: "idempotent on equal key." Implementations may assume I1 (the
    /// key is unique across all shards) but must tolerate being called twice
    /// with the same key and payload.
    fn put(&self, kind: EntityKind, id: u64, timestamp: i64, blob: &[u8]) -> Result<()>;

    /// §4.2 / I3: greatest stored timestamp `<= ts` for `(kind, id)`.
    fn get_as_of(&self, kind: EntityKind, id: u64, ts: i64) -> Result<Option<StoredVersion>>;

    /// §4.2: "durably flushes buffered writes."
    fn commit(&self) -> Result<()>;

    /// §4.2: "flushes and releases resources." Safe to call more than once.
    fn close(&self) -> Result<()>;

    /// Iterates every stored `(kind, id, timestamp, blob)` row in key order;
    /// used only by `merge::merge_into` (§4.2's `Merge`).
    fn iter_all(&self) -> Result<Vec<(EntityKind, u64, i64, Vec<u8>)>>;
}

pub struct FjallShardStore {
    keyspace: fjall::Keyspace,
    partition: fjall::PartitionHandle,
    path: PathBuf,
    shard_index: usize,
}

impl FjallShardStore {
    /// Opens (creating if absent) the fjall-backed store for one shard.
    /// spec.md §6: "One file per shard, named `<stem>_<shard_index>.<ext>`."
    pub fn open(path: impl AsRef<Path>, shard_index: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let keyspace = fjall::Config::new(&path)
            .open()
            .map_err(|e| Error::store_write(shard_index, e))?;
        let partition = keyspace
            .open_partition("versions", fjall::PartitionCreateOptions::default())
            .map_err(|e| Error::store_write(shard_index, e))?;
        Ok(FjallShardStore {
            keyspace,
            partition,
            path,
            shard_index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TemporalStore for FjallShardStore {
    fn put(&self, kind: EntityKind, id: u64, timestamp: i64, blob: &[u8]) -> Result<()> {
        let key = encode_key(kind, id, timestamp);
        self.partition
            .insert(key, blob)
            .map_err(|e| Error::store_write(self.shard_index, e))
    }

    fn get_as_of(&self, kind: EntityKind, id: u64, ts: i64) -> Result<Option<StoredVersion>> {
        let prefix = encode_prefix(kind, id);
        let lower = {
            let mut buf = prefix.to_vec();
            buf.extend_from_slice(&encode_ts(i64::MIN));
            buf
        };
        let upper = encode_key(kind, id, ts).to_vec();

        // Greatest stored timestamp <= ts is the last key in the range, not
        // the result of scanning and overwriting — `range` is a
        // `DoubleEndedIterator`, so `next_back` is a point/range-floor query
        // rather than an O(n) scan of every version <= ts.
        let found = match self.partition.range(lower..=upper).next_back() {
            Some(entry) => {
                let (key, value) = entry.map_err(|e| Error::store_write(self.shard_index, e))?;
                let (_, _, found_ts) = crate::key::decode_key(&key);
                Some((found_ts, value.to_vec()))
            }
            None => None,
        };
        Ok(found)
    }

    fn commit(&self) -> Result<()> {
        self.keyspace
            .persist(fjall::PersistMode::SyncAll)
            .map_err(|e| Error::store_write(self.shard_index, e))
    }

    fn close(&self) -> Result<()> {
        self.commit()
    }

    fn iter_all(&self) -> Result<Vec<(EntityKind, u64, i64, Vec<u8>)>> {
        let mut out = Vec::new();
        for entry in self.partition.range::<Vec<u8>, _>(..) {
            let (key, value) = entry.map_err(|e| Error::store_write(self.shard_index, e))?;
            if key.len() != KEY_LEN {
                return Err(Error::invariant(format!(
                    "corrupt index key of length {} (expected {KEY_LEN})",
                    key.len()
                )));
            }
            let (kind, id, ts) = crate::key::decode_key(&key);
            out.push((kind, id, ts, value.to_vec()));
        }
        Ok(out)
    }
}
