// spec.md §4.7 / §6: the emitter writes one JSON object per line per entity
// kind. Nodes are emitted directly as they're read; ways and relations are
// emitted only once their batch flush resolves (or fails to resolve) a
// geometry.

use chrono::{TimeZone, Utc};
use osm_hist_base::{Error, Result};
use osm_hist_model::{NodeVersion, RelationVersion, VersionMeta, WayVersion};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Serialize)]
struct TagPair<'a> {
    key: &'a str,
    value: &'a str,
}

fn all_tags(meta: &VersionMeta) -> BTreeMap<&str, &str> {
    meta.tags
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

fn iso8601(timestamp: i64) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| format!("invalid-timestamp:{timestamp}"))
}

#[derive(Serialize)]
struct NodeOutput<'a> {
    id: u64,
    version: u32,
    timestamp: String,
    tags: Vec<TagPair<'a>>,
    all_tags: BTreeMap<&'a str, &'a str>,
    geometry: Option<String>,
    visible: bool,
    user: &'a str,
    uid: u64,
    changeset: u64,
}

#[derive(Serialize)]
struct WayOutput<'a> {
    id: u64,
    version: u32,
    timestamp: String,
    tags: Vec<TagPair<'a>>,
    all_tags: BTreeMap<&'a str, &'a str>,
    geometry: Option<String>,
    visible: bool,
    user: &'a str,
    uid: u64,
    changeset: u64,
    nodes: &'a [u64],
}

#[derive(Serialize)]
struct MemberOutput<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    id: u64,
    role: &'a str,
}

#[derive(Serialize)]
struct RelationOutput<'a> {
    id: u64,
    version: u32,
    timestamp: String,
    tags: Vec<TagPair<'a>>,
    all_tags: BTreeMap<&'a str, &'a str>,
    geometry: Option<String>,
    visible: bool,
    user: &'a str,
    uid: u64,
    changeset: u64,
    members: Vec<MemberOutput<'a>>,
}

fn tag_pairs(meta: &VersionMeta) -> Vec<TagPair<'_>> {
    meta.tags
        .iter()
        .map(|(k, v)| TagPair { key: k, value: v })
        .collect()
}

pub struct Emitter {
    nodes: BufWriter<File>,
    ways: BufWriter<File>,
    relations: BufWriter<File>,
}

impl Emitter {
    /// Opens `nodes.jsonl`, `ways.jsonl`, `relations.jsonl` under `dir` (§6).
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(Error::Io)?;
        Ok(Emitter {
            nodes: BufWriter::new(File::create(dir.join("nodes.jsonl")).map_err(Error::Io)?),
            ways: BufWriter::new(File::create(dir.join("ways.jsonl")).map_err(Error::Io)?),
            relations: BufWriter::new(
                File::create(dir.join("relations.jsonl")).map_err(Error::Io)?,
            ),
        })
    }

    /// §4.7: "every node version is emitted directly... geometry taken from
    /// the node itself (Point if location valid, else null)."
    pub fn emit_node(&mut self, node: &NodeVersion) -> Result<()> {
        let geometry = if node.has_location() {
            Some(format!(
                "{{\"type\":\"Point\",\"coordinates\":[{},{}]}}",
                node.lon.unwrap(),
                node.lat.unwrap()
            ))
        } else {
            None
        };
        let out = NodeOutput {
            id: node.meta.id,
            version: node.meta.version,
            timestamp: iso8601(node.meta.timestamp),
            tags: tag_pairs(&node.meta),
            all_tags: all_tags(&node.meta),
            geometry,
            visible: node.meta.visible,
            user: &node.meta.user,
            uid: node.meta.uid,
            changeset: node.meta.changeset,
        };
        write_line(&mut self.nodes, &out)
    }

    pub fn emit_way(&mut self, way: &WayVersion, geometry: Option<String>) -> Result<()> {
        let out = WayOutput {
            id: way.meta.id,
            version: way.meta.version,
            timestamp: iso8601(way.meta.timestamp),
            tags: tag_pairs(&way.meta),
            all_tags: all_tags(&way.meta),
            geometry,
            visible: way.meta.visible,
            user: &way.meta.user,
            uid: way.meta.uid,
            changeset: way.meta.changeset,
            nodes: &way.nodes,
        };
        write_line(&mut self.ways, &out)
    }

    pub fn emit_relation(&mut self, relation: &RelationVersion, geometry: Option<String>) -> Result<()> {
        let members = relation
            .members
            .iter()
            .map(|m| MemberOutput {
                kind: match m.kind {
                    osm_hist_model::MemberKind::Node => "node",
                    osm_hist_model::MemberKind::Way => "way",
                    osm_hist_model::MemberKind::Relation => "relation",
                },
                id: m.id,
                role: &m.role,
            })
            .collect();
        let out = RelationOutput {
            id: relation.meta.id,
            version: relation.meta.version,
            timestamp: iso8601(relation.meta.timestamp),
            tags: tag_pairs(&relation.meta),
            all_tags: all_tags(&relation.meta),
            geometry,
            visible: relation.meta.visible,
            user: &relation.meta.user,
            uid: relation.meta.uid,
            changeset: relation.meta.changeset,
            members,
        };
        write_line(&mut self.relations, &out)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.nodes.flush().map_err(Error::Io)?;
        self.ways.flush().map_err(Error::Io)?;
        self.relations.flush().map_err(Error::Io)
    }
}

fn write_line(writer: &mut impl Write, value: &impl Serialize) -> Result<()> {
    serde_json::to_writer(&mut *writer, value).map_err(Error::codec)?;
    writeln!(writer).map_err(Error::Io)
}

#[cfg(test)]
mod test {
    use super::*;
    use osm_hist_model::VersionMeta;

    fn meta(id: u64, ts: i64) -> VersionMeta {
        VersionMeta {
            id,
            version: 1,
            timestamp: ts,
            visible: true,
            tags: vec![("highway".into(), "residential".into())],
            user: "alice".into(),
            uid: 7,
            changeset: 99,
        }
    }

    #[test]
    fn emits_node_point_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter = Emitter::create(dir.path()).unwrap();
        let node = NodeVersion {
            meta: meta(1, 1_700_000_000),
            lon: Some(1.5),
            lat: Some(2.5),
        };
        emitter.emit_node(&node).unwrap();
        emitter.flush().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("nodes.jsonl")).unwrap();
        assert!(contents.contains("\"type\":\"Point\""));
        assert!(contents.contains("\"coordinates\":[1.5,2.5]"));
    }

    #[test]
    fn invisible_node_has_null_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let mut emitter = Emitter::create(dir.path()).unwrap();
        let node = NodeVersion {
            meta: VersionMeta {
                visible: false,
                ..meta(1, 10)
            },
            lon: None,
            lat: None,
        };
        emitter.emit_node(&node).unwrap();
        emitter.flush().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("nodes.jsonl")).unwrap();
        assert!(contents.contains("\"geometry\":null"));
    }
}
