//! The resolution pass (spec.md §4.5–§4.8): batch buffer, dependency
//! resolver, JSON-lines emitter, and the single-threaded pass that ties
//! them to the external geometry builder.

mod batch;
mod emitter;
mod lookup;
mod pass;
mod resolver;

pub use batch::{BatchBuffer, RewrittenMember};
pub use emitter::Emitter;
pub use lookup::{Lookup, MergedLookup, ShardedLookup};
pub use pass::ResolutionPass;
pub use resolver::{DependencyResolver, ResolvedRelationDeps, ResolvedWayDeps};
