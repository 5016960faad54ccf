//! varigraph - A strict, deterministic variant-graph engine for
//! multi-version texts
//!
//! Versions of one work are merged into a directed acyclic graph in which
//! shared text is stored once; the flat pairs form of that graph is the
//! document's canonical representation.

pub mod align;
pub mod diff;
pub mod graph;
pub mod mvd;
pub mod observability;
pub mod pairs;
pub mod version_set;

pub use mvd::{DocumentError, DocumentResult, MultiVersionDocument, VersionEntry};
pub use version_set::VersionSet;
