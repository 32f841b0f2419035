// spec.md §4.5: batch buffer. Main entities keep their original payload for
// emission; everything written to the temp OSM file for the external
// geometry builder uses *simplified* surrogate IDs (I5: never persisted,
// local to one batch).

use osm_hist_base::{Error, Result};
use osm_hist_model::{MemberKind, NodeVersion, OsmRecord, RelationVersion, VersionMeta, WayVersion};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;

/// A relation member rewritten for the intra-file OSM record: only `Node`
/// and `Way` members survive (I4 self-containment; unexpanded `Relation`
/// members would otherwise be dangling external references).
#[derive(Debug, Clone)]
pub struct RewrittenMember {
    pub kind: MemberKind,
    pub simplified_id: u64,
}

#[derive(Default)]
struct KindAllocator {
    next: u64,
    // (original_id, version_timestamp_returned) -> simplified id. Distinct
    // payloads for the same original ID (different GetAsOf results within
    // the same batch) get distinct simplified IDs, per §4.5's tie-break.
    dedup: HashMap<(u64, i64), u64>,
    simplified_to_original: HashMap<u64, u64>,
}

impl KindAllocator {
    fn alloc_or_reuse(&mut self, original_id: u64, found_ts: i64) -> (u64, bool) {
        if let Some(&existing) = self.dedup.get(&(original_id, found_ts)) {
            return (existing, false);
        }
        let id = self.next;
        self.next += 1;
        self.dedup.insert((original_id, found_ts), id);
        self.simplified_to_original.insert(id, original_id);
        (id, true)
    }
}

pub struct BatchBuffer {
    ways_batch_size: usize,
    relations_batch_size: usize,
    max_batch_records: usize,

    alloc_nodes: KindAllocator,
    alloc_ways: KindAllocator,

    dep_nodes: BTreeMap<u64, NodeVersion>,
    dep_ways: BTreeMap<u64, (WayVersion, Vec<u64>)>,

    main_ways: Vec<(u64, WayVersion, Vec<u64>)>,
    main_relations: Vec<(u64, RelationVersion, Vec<RewrittenMember>)>,

    ways_since_flush: usize,
    relations_since_flush: usize,
    records_since_flush: usize,
}

impl BatchBuffer {
    pub fn new(ways_batch_size: usize, relations_batch_size: usize, max_batch_records: usize) -> Self {
        BatchBuffer {
            ways_batch_size,
            relations_batch_size,
            max_batch_records,
            alloc_nodes: KindAllocator::default(),
            alloc_ways: KindAllocator::default(),
            dep_nodes: BTreeMap::new(),
            dep_ways: BTreeMap::new(),
            main_ways: Vec::new(),
            main_relations: Vec::new(),
            ways_since_flush: 0,
            relations_since_flush: 0,
            records_since_flush: 0,
        }
    }

    fn intern_node(&mut self, original_id: u64, found_ts: i64, node: &NodeVersion) -> u64 {
        let (id, is_new) = self.alloc_nodes.alloc_or_reuse(original_id, found_ts);
        if is_new {
            self.dep_nodes.insert(id, node.clone());
            self.records_since_flush += 1;
        }
        id
    }

    fn intern_way(
        &mut self,
        original_id: u64,
        found_ts: i64,
        way: &WayVersion,
        resolved_node_ids: &[(u64, NodeVersion)],
    ) -> u64 {
        let simplified_node_ids: Vec<u64> = resolved_node_ids
            .iter()
            .map(|(nid, n)| self.intern_node(*nid, n.meta.timestamp, n))
            .collect();
        let (id, is_new) = self.alloc_ways.alloc_or_reuse(original_id, found_ts);
        if is_new {
            self.dep_ways.insert(id, (way.clone(), simplified_node_ids));
            self.records_since_flush += 1;
        }
        id
    }

    /// `AddMainWay(way, deps_nodes)`.
    pub fn add_main_way(&mut self, way: WayVersion, resolved_nodes: &[(u64, NodeVersion)]) {
        let simplified_node_ids: Vec<u64> = resolved_nodes
            .iter()
            .map(|(nid, n)| self.intern_node(*nid, n.meta.timestamp, n))
            .collect();
        let (simplified_id, _) = self.alloc_ways.alloc_or_reuse(way.meta.id, way.meta.timestamp);
        self.main_ways.push((simplified_id, way, simplified_node_ids));
        self.ways_since_flush += 1;
        self.records_since_flush += 1;
    }

    /// `AddMainRelation(rel, deps_nodes, deps_ways)`.
    pub fn add_main_relation(
        &mut self,
        relation: RelationVersion,
        resolved_nodes: &[(u64, NodeVersion)],
        resolved_ways: &[(u64, WayVersion, Vec<(u64, NodeVersion)>)],
    ) {
        let mut rewritten = Vec::new();
        for (nid, n) in resolved_nodes {
            let simplified = self.intern_node(*nid, n.meta.timestamp, n);
            rewritten.push(RewrittenMember {
                kind: MemberKind::Node,
                simplified_id: simplified,
            });
        }
        for (wid, w, way_nodes) in resolved_ways {
            let simplified = self.intern_way(*wid, w.meta.timestamp, w, way_nodes);
            rewritten.push(RewrittenMember {
                kind: MemberKind::Way,
                simplified_id: simplified,
            });
        }
        // Relation members that were not expanded contribute neither a
        // dependency record nor a rewritten member (I4): the file the
        // builder sees must be self-contained.

        // Relations share no allocator with ways/nodes: each main relation
        // just gets the next slot in `main_relations` as its simplified id.
        let rel_simplified_id = self.next_relation_id();
        self.main_relations
            .push((rel_simplified_id, relation, rewritten));
        self.relations_since_flush += 1;
        self.records_since_flush += 1;
    }

    fn next_relation_id(&mut self) -> u64 {
        self.main_relations.len() as u64
    }

    /// `IsFull(kind, counter)`.
    pub fn is_full(&self, end_of_stream: bool) -> bool {
        end_of_stream
            || self.ways_since_flush >= self.ways_batch_size
            || self.relations_since_flush >= self.relations_batch_size
            || self.records_since_flush >= self.max_batch_records
    }

    pub fn is_empty(&self) -> bool {
        self.main_ways.is_empty() && self.main_relations.is_empty()
    }

    /// `GetTargetSimplifiedIds(kind)`.
    pub fn target_way_ids(&self) -> Vec<u64> {
        self.main_ways.iter().map(|(id, _, _)| *id).collect()
    }

    pub fn target_relation_ids(&self) -> Vec<u64> {
        self.main_relations.iter().map(|(id, _, _)| *id).collect()
    }

    pub fn main_ways(&self) -> &[(u64, WayVersion, Vec<u64>)] {
        &self.main_ways
    }

    pub fn main_relations(&self) -> &[(u64, RelationVersion, Vec<RewrittenMember>)] {
        &self.main_relations
    }

    /// `WriteSortedOsmFile(path)`: ways, then nodes, then relations, all
    /// keyed by simplified ID so the builder can resolve references without
    /// leaving the file (I4).
    pub fn write_sorted_osm_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(Error::Io)?;
        let mut writer = std::io::BufWriter::new(file);

        // Dep ways first (by simplified id), then main ways.
        for (&id, (way, node_ids)) in self.dep_ways.iter() {
            write_way_line(&mut writer, id, way, node_ids)?;
        }
        for (id, way, node_ids) in self.main_ways.iter() {
            write_way_line(&mut writer, *id, way, node_ids)?;
        }

        for (&id, node) in self.dep_nodes.iter() {
            write_node_line(&mut writer, id, node)?;
        }

        for (id, relation, members) in self.main_relations.iter() {
            write_relation_line(&mut writer, *id, relation, members)?;
        }

        writer.flush().map_err(Error::Io)
    }

    pub fn reset(&mut self) {
        self.alloc_nodes = KindAllocator::default();
        self.alloc_ways = KindAllocator::default();
        self.dep_nodes.clear();
        self.dep_ways.clear();
        self.main_ways.clear();
        self.main_relations.clear();
        self.ways_since_flush = 0;
        self.relations_since_flush = 0;
        self.records_since_flush = 0;
    }
}

fn write_way_line(
    writer: &mut impl Write,
    simplified_id: u64,
    way: &WayVersion,
    simplified_node_ids: &[u64],
) -> Result<()> {
    let record = OsmRecord::Way(WayVersion {
        meta: VersionMeta {
            id: simplified_id,
            ..way.meta.clone()
        },
        nodes: simplified_node_ids.to_vec(),
    });
    serde_json::to_writer(&mut *writer, &record).map_err(Error::codec)?;
    writeln!(writer).map_err(Error::Io)
}

fn write_node_line(writer: &mut impl Write, simplified_id: u64, node: &NodeVersion) -> Result<()> {
    let record = OsmRecord::Node(NodeVersion {
        meta: VersionMeta {
            id: simplified_id,
            ..node.meta.clone()
        },
        ..node.clone()
    });
    serde_json::to_writer(&mut *writer, &record).map_err(Error::codec)?;
    writeln!(writer).map_err(Error::Io)
}

fn write_relation_line(
    writer: &mut impl Write,
    simplified_id: u64,
    relation: &RelationVersion,
    members: &[RewrittenMember],
) -> Result<()> {
    let record = OsmRecord::Relation(RelationVersion {
        meta: VersionMeta {
            id: simplified_id,
            ..relation.meta.clone()
        },
        members: members
            .iter()
            .map(|m| osm_hist_model::RelationMember {
                kind: m.kind,
                id: m.simplified_id,
                role: String::new(),
            })
            .collect(),
    });
    serde_json::to_writer(&mut *writer, &record).map_err(Error::codec)?;
    writeln!(writer).map_err(Error::Io)
}
