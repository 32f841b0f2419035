// spec.md §5: the resolution pass. Single-threaded over the source stream;
// the batch buffer and its surrogate-ID allocator are sequentially
// consistent by construction, and the geometry builder is invoked
// synchronously per flush.

use crate::batch::BatchBuffer;
use crate::emitter::Emitter;
use crate::lookup::Lookup;
use crate::resolver::DependencyResolver;
use osm_hist_base::{Progress, ProgressKind, Result, RunConfig};
use osm_hist_builder::GeometryBuilder;
use osm_hist_model::{EntityKind, OsmRecord, SourceStream};
use std::path::Path;

pub struct ResolutionPass<'a> {
    lookup: &'a dyn Lookup,
    builder: &'a dyn GeometryBuilder,
    config: &'a RunConfig,
    work_dir: std::path::PathBuf,
}

impl<'a> ResolutionPass<'a> {
    pub fn new(
        lookup: &'a dyn Lookup,
        builder: &'a dyn GeometryBuilder,
        config: &'a RunConfig,
        work_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        ResolutionPass {
            lookup,
            builder,
            config,
            work_dir: work_dir.into(),
        }
    }

    /// Runs the full resolution pass, writing `nodes.jsonl`, `ways.jsonl`,
    /// `relations.jsonl` under `output_dir`.
    pub fn run(&self, stream: Box<dyn SourceStream>, output_dir: &Path) -> Result<Progress> {
        let resolver = DependencyResolver::new(self.lookup, self.config.recursive_relations);
        let mut batch = BatchBuffer::new(
            self.config.ways_batch_size,
            self.config.relations_batch_size,
            self.config.ways_batch_size.max(self.config.relations_batch_size) * 8,
        );
        let mut emitter = Emitter::create(output_dir)?;
        let progress = Progress::new(self.config.logging_range_count);

        for item in stream {
            let record = item?;
            match record {
                OsmRecord::Node(node) => {
                    progress.record(ProgressKind::Node, 0, 1);
                    emitter.emit_node(&node)?;
                }
                OsmRecord::Way(way) => {
                    progress.record(ProgressKind::Way, 0, 1);
                    let deps = resolver.resolve_way(&way);
                    batch.add_main_way(way, &deps.valid_nodes);
                    if batch.is_full(false) {
                        self.flush(&mut batch, &mut emitter)?;
                    }
                }
                OsmRecord::Relation(relation) => {
                    progress.record(ProgressKind::Relation, 0, 1);
                    if relation.has_relation_member() {
                        let deps = resolver.resolve_relation(&relation);
                        batch.add_main_relation(relation, &deps.valid_nodes, &deps.valid_ways);
                        if batch.is_full(false) {
                            self.flush(&mut batch, &mut emitter)?;
                        }
                    } else {
                        // §4.6: bypasses the batch entirely.
                        emitter.emit_relation(&relation, None)?;
                    }
                }
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, &mut emitter)?;
        }
        emitter.flush()?;
        Ok(progress)
    }

    fn flush(&self, batch: &mut BatchBuffer, emitter: &mut Emitter) -> Result<()> {
        let osm_file = self.work_dir.join(format!("batch-{}.jsonl", batch_nonce()));
        batch.write_sorted_osm_file(&osm_file)?;

        let way_targets = batch.target_way_ids();
        let relation_targets = batch.target_relation_ids();

        let way_geoms = if way_targets.is_empty() {
            Default::default()
        } else {
            self.builder
                .build(&osm_file, EntityKind::Way, &way_targets)?
        };
        let relation_geoms = if relation_targets.is_empty() {
            Default::default()
        } else {
            self.builder
                .build(&osm_file, EntityKind::Relation, &relation_targets)?
        };

        for (simplified_id, way, _) in batch.main_ways() {
            let geometry = way_geoms.get(simplified_id).cloned();
            emitter.emit_way(way, geometry)?;
        }
        for (simplified_id, relation, _) in batch.main_relations() {
            let geometry = relation_geoms.get(simplified_id).cloned();
            emitter.emit_relation(relation, geometry)?;
        }

        let _ = std::fs::remove_file(&osm_file);
        batch.reset();
        Ok(())
    }
}

// A process-local monotonic counter is enough to keep successive batch
// file names from colliding within one pass.
fn batch_nonce() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lookup::MergedLookup;
    use osm_hist_index::{FjallShardStore, TemporalStore};
    use osm_hist_model::{MemberKind, NodeVersion, RelationMember, RelationVersion, VersionMeta, WayVersion};
    use std::collections::HashMap;

    /// Reads the batch file back and builds a LineString for each requested
    /// way from its (already-resolved, in-file) node coordinates. Stands in
    /// for the real external geometry builder in these pipeline tests.
    struct FakeGeometryBuilder;

    impl GeometryBuilder for FakeGeometryBuilder {
        fn build(
            &self,
            osm_file: &Path,
            kind: EntityKind,
            target_ids: &[u64],
        ) -> Result<HashMap<u64, String>> {
            let contents = std::fs::read_to_string(osm_file).unwrap();
            let mut nodes: HashMap<u64, (f64, f64)> = HashMap::new();
            let mut ways: HashMap<u64, Vec<u64>> = HashMap::new();
            for line in contents.lines() {
                match serde_json::from_str::<OsmRecord>(line).unwrap() {
                    OsmRecord::Node(n) => {
                        if let (Some(lon), Some(lat)) = (n.lon, n.lat) {
                            nodes.insert(n.meta.id, (lon, lat));
                        }
                    }
                    OsmRecord::Way(w) => {
                        ways.insert(w.meta.id, w.nodes.clone());
                    }
                    OsmRecord::Relation(_) => {}
                }
            }

            let mut out = HashMap::new();
            if kind != EntityKind::Way {
                return Ok(out);
            }
            for &id in target_ids {
                let Some(node_ids) = ways.get(&id) else { continue };
                let coords: Vec<(f64, f64)> = node_ids
                    .iter()
                    .filter_map(|nid| nodes.get(nid).copied())
                    .collect();
                if coords.len() < 2 {
                    continue; // single-node LineStrings excluded
                }
                let coord_str = coords
                    .iter()
                    .map(|(x, y)| format!("[{x},{y}]"))
                    .collect::<Vec<_>>()
                    .join(",");
                out.insert(id, format!("{{\"type\":\"LineString\",\"coordinates\":[{coord_str}]}}"));
            }
            Ok(out)
        }
    }

    fn meta(id: u64, ts: i64) -> VersionMeta {
        VersionMeta {
            id,
            version: 1,
            timestamp: ts,
            visible: true,
            tags: vec![],
            user: "a".into(),
            uid: 1,
            changeset: 1,
        }
    }

    fn setup() -> (tempfile::TempDir, FjallShardStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FjallShardStore::open(dir.path().join("store"), 0).unwrap();
        (dir, store)
    }

    fn put_node(store: &FjallShardStore, id: u64, ts: i64, visible: bool, loc: Option<(f64, f64)>) {
        let record = OsmRecord::Node(NodeVersion {
            meta: VersionMeta {
                visible,
                ..meta(id, ts)
            },
            lon: loc.map(|(x, _)| x),
            lat: loc.map(|(_, y)| y),
        });
        let blob = rmp_serde::to_vec(&record).unwrap();
        store.put(EntityKind::Node, id, ts, &blob).unwrap();
    }

    #[test]
    fn scenario_two_node_way_emits_linestring() {
        let (_dir, store) = setup();
        put_node(&store, 1, 10, true, Some((0.0, 0.0)));
        put_node(&store, 2, 10, true, Some((1.0, 0.0)));
        store.commit().unwrap();

        let lookup = MergedLookup::new(store);
        let builder = FakeGeometryBuilder;
        let config = RunConfig::default();
        let work_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let pass = ResolutionPass::new(&lookup, &builder, &config, work_dir.path());

        let way = OsmRecord::Way(WayVersion {
            meta: meta(9, 20),
            nodes: vec![1, 2],
        });
        let stream: Box<dyn SourceStream> = Box::new(vec![Ok(way)].into_iter());
        pass.run(stream, out_dir.path()).unwrap();

        let contents = std::fs::read_to_string(out_dir.path().join("ways.jsonl")).unwrap();
        assert!(contents.contains("LineString"));
        assert!(contents.contains("[0,0]") || contents.contains("[0.0,0.0]"));
    }

    #[test]
    fn scenario_deleted_node_excludes_single_point_linestring() {
        let (_dir, store) = setup();
        put_node(&store, 1, 10, true, Some((0.0, 0.0)));
        put_node(&store, 1, 15, false, None);
        put_node(&store, 2, 10, true, Some((1.0, 0.0)));
        store.commit().unwrap();

        let lookup = MergedLookup::new(store);
        let builder = FakeGeometryBuilder;
        let config = RunConfig::default();
        let work_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let pass = ResolutionPass::new(&lookup, &builder, &config, work_dir.path());

        let way = OsmRecord::Way(WayVersion {
            meta: meta(9, 20),
            nodes: vec![1, 2],
        });
        let stream: Box<dyn SourceStream> = Box::new(vec![Ok(way)].into_iter());
        pass.run(stream, out_dir.path()).unwrap();

        let contents = std::fs::read_to_string(out_dir.path().join("ways.jsonl")).unwrap();
        assert!(contents.contains("\"geometry\":null"));
    }

    #[test]
    fn scenario_relation_without_relation_member_bypasses_batch() {
        let (_dir, store) = setup();
        put_node(&store, 1, 10, true, Some((0.0, 0.0)));
        put_node(&store, 2, 10, true, Some((1.0, 0.0)));
        let way = OsmRecord::Way(WayVersion {
            meta: meta(9, 20),
            nodes: vec![1, 2],
        });
        let blob = rmp_serde::to_vec(&way).unwrap();
        store.put(EntityKind::Way, 9, 20, &blob).unwrap();
        store.commit().unwrap();

        let lookup = MergedLookup::new(store);
        let builder = FakeGeometryBuilder;
        let config = RunConfig::default();
        let work_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let pass = ResolutionPass::new(&lookup, &builder, &config, work_dir.path());

        let relation = OsmRecord::Relation(RelationVersion {
            meta: meta(100, 25),
            members: vec![RelationMember {
                kind: MemberKind::Way,
                id: 9,
                role: "outer".into(),
            }],
        });
        let stream: Box<dyn SourceStream> = Box::new(vec![Ok(relation)].into_iter());
        pass.run(stream, out_dir.path()).unwrap();

        let contents = std::fs::read_to_string(out_dir.path().join("relations.jsonl")).unwrap();
        assert!(contents.contains("\"geometry\":null"));
    }

    #[test]
    fn scenario_way_outlives_node_revision_uses_node_as_of_way_timestamp() {
        let (_dir, store) = setup();
        // Node 1 moves at ts=10 and again at ts=30; the way is timestamped
        // ts=20, so it must resolve node 1's *ts=10* position, not ts=30's.
        put_node(&store, 1, 10, true, Some((0.0, 0.0)));
        put_node(&store, 1, 30, true, Some((99.0, 99.0)));
        put_node(&store, 2, 10, true, Some((1.0, 0.0)));
        store.commit().unwrap();

        let lookup = MergedLookup::new(store);
        let builder = FakeGeometryBuilder;
        let config = RunConfig::default();
        let work_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let pass = ResolutionPass::new(&lookup, &builder, &config, work_dir.path());

        let way = OsmRecord::Way(WayVersion {
            meta: meta(9, 20),
            nodes: vec![1, 2],
        });
        let stream: Box<dyn SourceStream> = Box::new(vec![Ok(way)].into_iter());
        pass.run(stream, out_dir.path()).unwrap();

        let contents = std::fs::read_to_string(out_dir.path().join("ways.jsonl")).unwrap();
        assert!(contents.contains("[0,0]") || contents.contains("[0.0,0.0]"));
        assert!(!contents.contains("99"));
    }

    #[test]
    fn scenario_relation_with_way_member_resolves_geometry() {
        let (_dir, store) = setup();
        put_node(&store, 1, 10, true, Some((0.0, 0.0)));
        put_node(&store, 2, 10, true, Some((1.0, 0.0)));
        let way = OsmRecord::Way(WayVersion {
            meta: meta(9, 20),
            nodes: vec![1, 2],
        });
        let blob = rmp_serde::to_vec(&way).unwrap();
        store.put(EntityKind::Way, 9, 20, &blob).unwrap();
        store.commit().unwrap();

        struct FakeRelationBuilder;
        impl GeometryBuilder for FakeRelationBuilder {
            fn build(
                &self,
                _osm_file: &Path,
                kind: EntityKind,
                target_ids: &[u64],
            ) -> Result<HashMap<u64, String>> {
                let mut out = HashMap::new();
                if kind == EntityKind::Relation {
                    for &id in target_ids {
                        out.insert(id, "{\"type\":\"MultiLineString\"}".to_string());
                    }
                }
                Ok(out)
            }
        }

        let lookup = MergedLookup::new(store);
        let builder = FakeRelationBuilder;
        let config = RunConfig::default();
        let work_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();
        let pass = ResolutionPass::new(&lookup, &builder, &config, work_dir.path());

        // Has no Relation member, so on its own it would bypass the batch
        // (§4.6); a second relation-of-relation below is what actually
        // drives it into the batch in the recursive-relations scenario.
        let relation = OsmRecord::Relation(RelationVersion {
            meta: meta(100, 25),
            members: vec![RelationMember {
                kind: MemberKind::Way,
                id: 9,
                role: "outer".into(),
            }],
        });
        let outer = OsmRecord::Relation(RelationVersion {
            meta: meta(200, 30),
            members: vec![RelationMember {
                kind: MemberKind::Relation,
                id: 100,
                role: "".into(),
            }],
        });
        let stream: Box<dyn SourceStream> = Box::new(vec![Ok(relation), Ok(outer)].into_iter());
        pass.run(stream, out_dir.path()).unwrap();

        let contents = std::fs::read_to_string(out_dir.path().join("relations.jsonl")).unwrap();
        assert!(contents.contains("MultiLineString"));
    }

    #[test]
    fn scenario_relation_of_relation_is_not_recursed_by_default() {
        let (_dir, store) = setup();
        let inner = OsmRecord::Relation(RelationVersion {
            meta: meta(100, 25),
            members: vec![],
        });
        let blob = rmp_serde::to_vec(&inner).unwrap();
        store.put(EntityKind::Relation, 100, 25, &blob).unwrap();
        store.commit().unwrap();

        let lookup = MergedLookup::new(store);
        // Default config: recursive_relations = false. The resolver must not
        // attempt to expand relation 100's own members (it has none, but the
        // point is it never descends at all into a Relation member).
        let config = RunConfig::default();
        assert!(!config.recursive_relations);
        let resolver = DependencyResolver::new(&lookup, config.recursive_relations);

        let outer = RelationVersion {
            meta: meta(200, 30),
            members: vec![RelationMember {
                kind: MemberKind::Relation,
                id: 100,
                role: "".into(),
            }],
        };
        let deps = resolver.resolve_relation(&outer);
        assert!(deps.valid_nodes.is_empty());
        assert!(deps.valid_ways.is_empty());
    }
}
