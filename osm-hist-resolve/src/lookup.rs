// The resolution pass reads from whatever the indexing pass produced: either
// one merged store, or the original per-shard stores plus the same router
// that placed records into them (spec.md §4.1: "Workers must agree on the
// mode, since the resolution pass uses the same function").

use osm_hist_base::Result;
use osm_hist_index::{StoredVersion, TemporalStore};
use osm_hist_model::EntityKind;
use osm_hist_shard::ShardRouter;

pub trait Lookup: Send + Sync {
    fn get_as_of(&self, kind: EntityKind, id: u64, ts: i64) -> Result<Option<StoredVersion>>;
}

pub struct MergedLookup<S: TemporalStore> {
    store: S,
}

impl<S: TemporalStore> MergedLookup<S> {
    pub fn new(store: S) -> Self {
        MergedLookup { store }
    }
}

impl<S: TemporalStore> Lookup for MergedLookup<S> {
    fn get_as_of(&self, kind: EntityKind, id: u64, ts: i64) -> Result<Option<StoredVersion>> {
        self.store.get_as_of(kind, id, ts)
    }
}

pub struct ShardedLookup<S: TemporalStore> {
    router: ShardRouter,
    shards: Vec<S>,
}

impl<S: TemporalStore> ShardedLookup<S> {
    /// `shards[i]` must be the store owning shard index `i`.
    pub fn new(router: ShardRouter, shards: Vec<S>) -> Self {
        ShardedLookup { router, shards }
    }
}

impl<S: TemporalStore> Lookup for ShardedLookup<S> {
    fn get_as_of(&self, kind: EntityKind, id: u64, ts: i64) -> Result<Option<StoredVersion>> {
        let shard = self.router.shard_for(kind, id);
        self.shards[shard].get_as_of(kind, id, ts)
    }
}
