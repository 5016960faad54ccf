//! Pairs: the flat, serializable form of the variant graph.
//!
//! A pair is a version set plus its text. Filtering the ordered list for one
//! version and concatenating the texts reconstructs that version exactly.
//! Transposed text appears once, on a parent pair carrying an id; child
//! pairs reference the parent id instead of holding text. The pairs list is
//! the document's canonical representation between operations.

mod converter;
pub mod encode;

pub use converter::PairGraphConverter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version_set::VersionSet;

pub type PairResult<T> = Result<T, PairError>;

#[derive(Debug, Error)]
pub enum PairError {
    /// A child pair references a parent id that no pair in the list carries.
    #[error("transposition child references unknown parent {id}")]
    OrphanedTransposition { id: u32 },

    /// The pair list violates a structural invariant.
    #[error("pair list is corrupt: {0}")]
    Corrupt(String),
}

impl PairError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        PairError::Corrupt(msg.into())
    }
}

/// What a pair carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairKind {
    /// Plain text owned by this pair. Zero-length texts are legal; they
    /// mark join points in the graph.
    Ordinary { data: Vec<u8> },
    /// Transposition parent: owns the text, referenced by children via `id`.
    Parent { data: Vec<u8>, id: u32 },
    /// Transposition child: borrows its text from the parent with this id.
    Child { parent: u32 },
}

/// One flat segment of the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    versions: VersionSet,
    kind: PairKind,
}

impl Pair {
    pub fn new(versions: VersionSet, kind: PairKind) -> Self {
        Pair { versions, kind }
    }

    pub fn ordinary(versions: VersionSet, data: Vec<u8>) -> Self {
        Pair::new(versions, PairKind::Ordinary { data })
    }

    #[inline]
    pub fn versions(&self) -> &VersionSet {
        &self.versions
    }

    /// Rewrites the version set in place, for renumbering after a removal.
    pub(crate) fn set_versions(&mut self, versions: VersionSet) {
        self.versions = versions;
    }

    #[inline]
    pub fn kind(&self) -> &PairKind {
        &self.kind
    }

    /// The text this pair owns; `None` for children, whose text lives on
    /// their parent.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.kind {
            PairKind::Ordinary { data } | PairKind::Parent { data, .. } => Some(data),
            PairKind::Child { .. } => None,
        }
    }

    #[inline]
    pub fn is_parent(&self) -> bool {
        matches!(self.kind, PairKind::Parent { .. })
    }

    #[inline]
    pub fn is_child(&self) -> bool {
        matches!(self.kind, PairKind::Child { .. })
    }

    /// The parent id a child references.
    pub fn parent_id(&self) -> Option<u32> {
        match self.kind {
            PairKind::Child { parent } => Some(parent),
            _ => None,
        }
    }

    /// The id a parent is registered under.
    pub fn id(&self) -> Option<u32> {
        match self.kind {
            PairKind::Parent { id, .. } => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_accessors() {
        let p = Pair::ordinary(VersionSet::single(1), b"abc".to_vec());
        assert_eq!(p.data(), Some(&b"abc"[..]));
        assert!(!p.is_parent());
        assert!(!p.is_child());
        assert_eq!(p.id(), None);

        let parent = Pair::new(
            VersionSet::single(1),
            PairKind::Parent {
                data: b"moved".to_vec(),
                id: 7,
            },
        );
        assert!(parent.is_parent());
        assert_eq!(parent.id(), Some(7));

        let child = Pair::new(VersionSet::single(2), PairKind::Child { parent: 7 });
        assert!(child.is_child());
        assert_eq!(child.data(), None);
        assert_eq!(child.parent_id(), Some(7));
    }
}
