// The error taxonomy from the design doc (§7): each variant is one of the
// named error kinds, so callers and tests can match on *kind*, not just a
// formatted string. `DependencyMissing` is deliberately not a variant here:
// spec.md classifies it as non-fatal, so it is logged through
// `dependency_missing` below rather than propagated as a `Result::Err`.

use std::fmt;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("malformed source record ({kind}): {source}")]
    SourceRead {
        kind: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("num_shards ({num_shards}) is not a multiple of num_workers ({num_workers})")]
    ShardConfig {
        num_shards: usize,
        num_workers: usize,
    },

    #[error("store write failed for shard {shard}: {source}")]
    StoreWrite {
        shard: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("geometry builder invocation failed ({kind}): {reason}")]
    BuilderInvocation { kind: &'static str, reason: String },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encode/decode error: {0}")]
    Codec(String),
}

impl Error {
    pub fn source_read<E>(kind: &'static str, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let err = Error::SourceRead {
            kind,
            source: Box::new(source),
        };
        tracing::error!(target: "osm_hist", "{err}");
        err
    }

    pub fn store_write<E>(shard: usize, source: E) -> Error
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let err = Error::StoreWrite {
            shard,
            source: Box::new(source),
        };
        tracing::error!(target: "osm_hist", "{err}");
        err
    }

    pub fn builder_invocation(kind: &'static str, reason: impl fmt::Display) -> Error {
        let err = Error::BuilderInvocation {
            kind,
            reason: reason.to_string(),
        };
        tracing::error!(target: "osm_hist", "{err}");
        err
    }

    pub fn invariant(msg: impl Into<String>) -> Error {
        let err = Error::InvariantViolation(msg.into());
        tracing::error!(target: "osm_hist", "{err}");
        err
    }

    pub fn codec(msg: impl fmt::Display) -> Error {
        Error::Codec(msg.to_string())
    }
}

/// Non-fatal: a dependency lookup came back empty. Spec.md §7 says this is
/// "logged and continues" rather than propagated.
pub fn dependency_missing(dep_kind: &'static str, dep_id: u64, at_timestamp: i64) {
    tracing::warn!(
        target: "osm_hist",
        dep_kind,
        dep_id,
        at_timestamp,
        "dependency missing at resolution time"
    );
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn invariant_error_displays_message() {
        let e = Error::invariant("duplicate key with differing payload");
        assert!(e.to_string().contains("duplicate key"));
    }
}
