//! Adapter around the external geometry builder (spec.md §4.8): an opaque
//! subprocess that takes an OSM file and a set of simplified IDs and returns
//! GeoJSON geometries by ID.

mod adapter;

pub use adapter::{GeometryBuilder, ProcessGeometryBuilder};
