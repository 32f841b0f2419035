//! The indexing pass (spec.md §4.3/§4.4): parallel indexer workers plus the
//! supervisor that spawns, joins, and optionally merges their shards.

mod supervisor;
mod worker;

pub use supervisor::{shard_path, IndexPoolSupervisor, IndexRunReport};
pub use worker::{shard_store_path, IndexerWorker, WorkerReport};
