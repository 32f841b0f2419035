pub mod config;
mod error;
pub mod progress;

pub use config::{RunConfig, ShardMode};
pub use error::{dependency_missing, Error, Result};
pub use progress::{Kind as ProgressKind, Progress};
