pub mod router;

pub use router::{owned_shard_range, ShardRouter};
