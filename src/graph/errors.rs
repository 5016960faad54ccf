//! # Graph Errors
//!
//! Error types for the variant-graph module.
//!
//! All graph errors are fatal for the operation that raised them: a
//! corruption means a structural invariant was already violated, and an
//! invalid offset means the caller asked for a split outside any arc.
//! The "no valid match" condition during alignment is NOT an error; it is
//! represented as `Option<Mum>` by the alignment module.

use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Structural errors raised by variant-graph mutation and traversal
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    /// No outgoing arc exists for a version where one is structurally
    /// required. Indicates a prior invariant violation; never recovered from.
    #[error("graph corruption: {0}")]
    Corruption(String),

    /// A requested split offset lies beyond every arc of the version's path.
    #[error("no arc spans offset {offset} in version {version}")]
    InvalidOffset { offset: usize, version: u16 },
}

impl GraphError {
    /// Convenience constructor for corruption reports.
    pub fn corruption(msg: impl Into<String>) -> Self {
        GraphError::Corruption(msg.into())
    }
}
