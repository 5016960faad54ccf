//! Variant graph storage and structural operations.
//!
//! The graph is a DAG in which every version traces exactly one path from
//! the start node to the end node. Text shared between versions is held
//! once, on an arc whose version set names all the versions that carry it.
//! Transposed text is held once on a parent arc and referenced by child
//! arcs elsewhere in the graph. Unmerged text rides on special arcs until
//! the merge engine aligns it or the caller adopts it as unique.
//!
//! All structures are arena-backed: nodes and arcs are `u32` indices into
//! flat vectors, never pointers.

mod arena;
mod errors;
mod subgraph;

pub use arena::{ArcId, GraphArena, NodeId};
pub use errors::{GraphError, GraphResult};
pub use subgraph::Subgraph;
