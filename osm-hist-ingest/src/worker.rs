// spec.md §4.3: indexer worker. "Each worker reads the whole file; it is not
// a range split" — every worker iterates the complete source stream and
// simply discards records whose shard it does not own.

use osm_hist_base::{Error, Progress, ProgressKind, Result, RunConfig};
use osm_hist_index::{FjallShardStore, TemporalStore};
use osm_hist_model::{OsmRecord, SourceStreamFactory};
use osm_hist_shard::{owned_shard_range, ShardRouter};
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Names the on-disk file for one shard (spec.md §6: `<stem>_<shard_index>.<ext>`).
pub fn shard_store_path(base_dir: &Path, stem: &str, shard_index: usize) -> PathBuf {
    base_dir.join(format!("{stem}_{shard_index}.fjall"))
}

/// What a worker reports back to the supervisor on a clean finish (§4.3.3).
pub struct WorkerReport {
    pub worker_index: usize,
    pub shard_paths: Vec<(usize, PathBuf)>,
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
}

fn progress_kind(record: &OsmRecord) -> ProgressKind {
    match record {
        OsmRecord::Node(_) => ProgressKind::Node,
        OsmRecord::Way(_) => ProgressKind::Way,
        OsmRecord::Relation(_) => ProgressKind::Relation,
    }
}

pub struct IndexerWorker {
    pub worker_index: usize,
    pub base_dir: PathBuf,
    pub stem: String,
    pub config: RunConfig,
    pub router: Arc<ShardRouter>,
    pub stream_factory: Arc<SourceStreamFactory>,
}

impl IndexerWorker {
    /// Runs to completion: streams the whole source once, writes owned
    /// shards, commits every `commit_batch_size` records, then closes.
    pub fn run(self) -> Result<WorkerReport> {
        let owned: Range<usize> = owned_shard_range(
            self.router.num_shards(),
            self.config.num_workers,
            self.worker_index,
        );

        let mut stores: HashMap<usize, FjallShardStore> = HashMap::new();
        for shard in owned.clone() {
            let path = shard_store_path(&self.base_dir, &self.stem, shard);
            stores.insert(shard, FjallShardStore::open(&path, shard)?);
        }

        let progress = Progress::new(self.config.logging_range_count);
        let mut processed_since_commit: u64 = 0;
        let mut consecutive_read_failures: u64 = 0;
        const MAX_CONSECUTIVE_READ_FAILURES: u64 = 1_000;

        let stream = (self.stream_factory)()?;
        for item in stream {
            let record = match item {
                Ok(record) => {
                    consecutive_read_failures = 0;
                    record
                }
                Err(e) => {
                    consecutive_read_failures += 1;
                    tracing::warn!(target: "osm_hist", worker = self.worker_index, "skipping malformed record: {e}");
                    if consecutive_read_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                        return Err(Error::source_read(
                            "stream",
                            std::io::Error::other(format!(
                                "{MAX_CONSECUTIVE_READ_FAILURES} consecutive malformed records"
                            )),
                        ));
                    }
                    continue;
                }
            };

            let kind = record.kind();
            let id = record.id();
            let shard = self.router.shard_for(kind, id);
            progress.record(progress_kind(&record), self.worker_index, self.config.num_workers);

            let Some(store) = stores.get(&shard) else {
                continue; // not owned by this worker
            };
            let blob = rmp_serde::to_vec(&record).map_err(Error::codec)?;
            store.put(kind, id, record.timestamp(), &blob)?;

            processed_since_commit += 1;
            if processed_since_commit >= self.config.commit_batch_size {
                for store in stores.values() {
                    store.commit()?;
                }
                processed_since_commit = 0;
            }
        }

        let mut shard_paths = Vec::with_capacity(stores.len());
        for (shard, store) in stores {
            store.commit()?;
            store.close()?;
            shard_paths.push((shard, shard_store_path(&self.base_dir, &self.stem, shard)));
        }
        shard_paths.sort_by_key(|(shard, _)| *shard);

        Ok(WorkerReport {
            worker_index: self.worker_index,
            shard_paths,
            nodes: progress.get(ProgressKind::Node),
            ways: progress.get(ProgressKind::Way),
            relations: progress.get(ProgressKind::Relation),
        })
    }
}
