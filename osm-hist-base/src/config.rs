// Every tunable named in spec.md §6's CLI surface, plus the commit/batch
// thresholds from §4.3/§4.5. Defaults mirror the CLI defaults verbatim.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardMode {
    /// `shard = stable_hash_u64(id) mod S`. Deterministic across processes.
    Hash,
    /// `shard = per_kind_counter mod S`. Deterministic for any `num_workers`
    /// as long as each worker owns an independent counter and replays the
    /// same stream in the same order (Open Question 2, SPEC_FULL.md §9);
    /// callers that instead share one counter across workers lose that
    /// guarantee.
    Counter,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub num_workers: usize,
    pub num_shards: usize,
    pub merge_shards: bool,
    pub shard_mode: ShardMode,

    /// §4.3: commit every this-many processed records, per owned shard set.
    pub commit_batch_size: u64,
    /// §4.5: flush a batch once this many main ways have accumulated.
    pub ways_batch_size: usize,
    /// §4.5: flush a batch once this many main relations have accumulated.
    pub relations_batch_size: usize,
    /// §9: progress log cadence, in processed records per kind.
    pub logging_range_count: u64,
    /// Open Question 1: mirror the legacy relation-of-relation quirk (false,
    /// the default) or fully recurse through relation members (true).
    pub recursive_relations: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            num_workers: 3,
            num_shards: 3,
            merge_shards: true,
            shard_mode: ShardMode::Hash,
            commit_batch_size: 1_000_000,
            ways_batch_size: 5_000,
            relations_batch_size: 5_000,
            logging_range_count: 1_000_000,
            recursive_relations: false,
        }
    }
}

impl RunConfig {
    /// I6: `num_shards` must be a multiple of `num_workers`. If it is lower,
    /// it is raised to `num_workers` first (matching the CLI default note
    /// in spec.md §6: "raised to num_workers if lower").
    pub fn normalize_shards(&mut self) {
        if self.num_shards < self.num_workers {
            self.num_shards = self.num_workers;
        }
    }

    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.num_shards % self.num_workers != 0 {
            return Err(crate::error::Error::ShardConfig {
                num_shards: self.num_shards,
                num_workers: self.num_workers,
            });
        }
        Ok(())
    }
}
