//! Error types for document-level operations.

use thiserror::Error;

use crate::graph::GraphError;
use crate::pairs::PairError;

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Failures surfaced by `MultiVersionDocument` operations. A failed call
/// leaves the in-memory document untouched; the caller may retry or reload.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Pair(#[from] PairError),

    /// The version id names no row of the version table.
    #[error("version {version} does not exist")]
    InvalidVersion { version: u16 },
}
