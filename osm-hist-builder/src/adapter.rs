// spec.md §4.8 / §6: the external geometry builder adapter. The builder
// itself is out of scope (treated as an opaque process); this is only the
// plumbing that invokes it and parses its reply.

use osm_hist_base::{Error, Result};
use osm_hist_model::EntityKind;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

/// Contract from §4.8: given an OSM file and a kind-homogeneous set of
/// simplified IDs, return whatever geometries the builder could produce.
/// Missing IDs are simply absent from the map, not an error.
pub trait GeometryBuilder: Send + Sync {
    fn build(
        &self,
        osm_file: &Path,
        kind: EntityKind,
        target_ids: &[u64],
    ) -> Result<HashMap<u64, String>>;
}

/// Invokes an external program as a subprocess: `<program> <osm_file> <kind>
/// <comma-separated ids> <output_path>`. Exit code 0 and a well-formed
/// output file is success; anything else is a `BuilderInvocationError`.
pub struct ProcessGeometryBuilder {
    program: std::ffi::OsString,
}

impl ProcessGeometryBuilder {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        ProcessGeometryBuilder {
            program: program.as_ref().to_os_string(),
        }
    }

    fn kind_arg(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Way => "way",
            EntityKind::Relation => "relation",
            EntityKind::Node => {
                // Nodes never enter the batch buffer (§4.7); reaching here is
                // a caller bug, not a runtime condition to recover from.
                unreachable!("nodes are never routed through the geometry builder")
            }
        }
    }
}

impl GeometryBuilder for ProcessGeometryBuilder {
    fn build(
        &self,
        osm_file: &Path,
        kind: EntityKind,
        target_ids: &[u64],
    ) -> Result<HashMap<u64, String>> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let out_dir = tempfile::tempdir().map_err(Error::Io)?;
        let out_path = out_dir.path().join("geometries.tsv");
        let ids_arg = target_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let kind_arg = Self::kind_arg(kind);

        tracing::debug!(
            target: "osm_hist",
            program = ?self.program,
            kind = kind_arg,
            num_ids = target_ids.len(),
            "invoking geometry builder"
        );

        let status = Command::new(&self.program)
            .arg(osm_file)
            .arg(kind_arg)
            .arg(&ids_arg)
            .arg(&out_path)
            .status()
            .map_err(|e| Error::builder_invocation(kind_arg, format!("failed to spawn: {e}")))?;

        if !status.success() {
            return Err(Error::builder_invocation(
                kind_arg,
                format!("exited with status {status}"),
            ));
        }

        parse_builder_output(kind_arg, &out_path)
    }
}

/// Parses `simplified_id<TAB>geojson` lines (§6) into the ID→geometry map.
fn parse_builder_output(kind: &'static str, out_path: &Path) -> Result<HashMap<u64, String>> {
    let contents = std::fs::read_to_string(out_path).map_err(Error::Io)?;
    let mut map = HashMap::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let (id_str, geojson) = line.split_once('\t').ok_or_else(|| {
            Error::builder_invocation(kind, format!("malformed output line {line_no}: {line:?}"))
        })?;
        let id: u64 = id_str.parse().map_err(|_| {
            Error::builder_invocation(
                kind,
                format!("non-numeric simplified id on line {line_no}: {id_str:?}"),
            )
        })?;
        map.insert(id, geojson.to_string());
    }
    Ok(map)
}
