use crate::record::OsmRecord;
use osm_hist_base::Result;

/// spec.md §6: "Source stream (input). An iterator yielding records tagged
/// by kind..." This is the boundary the real PBF/XML parser implements; the
/// core never constructs one itself, only consumes it (see §9's "no
/// event-loop abstraction is required" — plain iteration is enough).
///
/// Each indexing worker needs its *own* stream instance (spec.md §4.3: "each
/// worker reads the whole file; it is not a range split"), so callers own a
/// factory (`Fn() -> Result<Box<dyn SourceStream>>`) rather than a single
/// stream value.
pub trait SourceStream: Iterator<Item = Result<OsmRecord>> + Send {}
impl<T> SourceStream for T where T: Iterator<Item = Result<OsmRecord>> + Send {}

pub type SourceStreamFactory = dyn Fn() -> Result<Box<dyn SourceStream>> + Send + Sync;
