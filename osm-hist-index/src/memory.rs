// An in-memory `TemporalStore`, used by resolver/emitter tests elsewhere in
// the workspace so they can exercise GetAsOf semantics without touching
// disk. Not used by the production pipeline (see `FjallShardStore`).

use crate::store::{StoredVersion, TemporalStore};
use osm_hist_base::Result;
use osm_hist_model::EntityKind;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<(u8, u64, i64), Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemporalStore for InMemoryStore {
    fn put(&self, kind: EntityKind, id: u64, timestamp: i64, blob: &[u8]) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .insert((kind.key_tag(), id, timestamp), blob.to_vec());
        Ok(())
    }

    fn get_as_of(&self, kind: EntityKind, id: u64, ts: i64) -> Result<Option<StoredVersion>> {
        let rows = self.rows.lock().unwrap();
        let found = rows
            .range((kind.key_tag(), id, i64::MIN)..=(kind.key_tag(), id, ts))
            .next_back()
            .map(|(&(_, _, ts), blob)| (ts, blob.clone()));
        Ok(found)
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }

    fn iter_all(&self) -> Result<Vec<(EntityKind, u64, i64, Vec<u8>)>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|(&(kind, id, ts), blob)| {
                (EntityKind::from_key_tag(kind).expect("valid tag"), id, ts, blob.clone())
            })
            .collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn get_as_of_returns_greatest_leq() {
        let store = InMemoryStore::new();
        store.put(EntityKind::Node, 1, 10, b"v1").unwrap();
        store.put(EntityKind::Node, 1, 30, b"v2").unwrap();

        assert_eq!(store.get_as_of(EntityKind::Node, 1, 5).unwrap(), None);
        assert_eq!(
            store.get_as_of(EntityKind::Node, 1, 10).unwrap(),
            Some((10, b"v1".to_vec()))
        );
        assert_eq!(
            store.get_as_of(EntityKind::Node, 1, 20).unwrap(),
            Some((10, b"v1".to_vec()))
        );
        assert_eq!(
            store.get_as_of(EntityKind::Node, 1, 30).unwrap(),
            Some((30, b"v2".to_vec()))
        );
        assert_eq!(
            store.get_as_of(EntityKind::Node, 1, 1000).unwrap(),
            Some((30, b"v2".to_vec()))
        );
    }
}
