//! Edit-distance alignment between two whole version texts.
//!
//! Used to localize the changed ranges of a revised version before the graph
//! merge runs; each changed range becomes a mini-subgraph with its own
//! special arc. The engine is independent of the graph.

mod engine;

pub use engine::DiffMatrix;

use serde::{Deserialize, Serialize};

/// Kinds of difference between the base (old) and new text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    /// Text present only in the new version.
    Inserted,
    /// Text present only in the old version.
    Deleted,
    /// Equal-length substitution.
    Exchanged,
    /// Coalesced changed range (basic mode: inserts, deletes and exchanges
    /// folded into one maximal range per side).
    Changed,
}

/// One difference between an old (base) text and a new text.
///
/// Offsets and lengths address bytes; `old_*` refers to the base text,
/// `new_*` to the incoming text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    old_offset: usize,
    new_offset: usize,
    old_len: usize,
    new_len: usize,
    kind: DiffKind,
}

impl Diff {
    pub(crate) fn new(
        old_offset: usize,
        new_offset: usize,
        old_len: usize,
        new_len: usize,
        kind: DiffKind,
    ) -> Self {
        Diff {
            old_offset,
            new_offset,
            old_len,
            new_len,
            kind,
        }
    }

    /// A coalesced changed range; the only kind the merge driver consumes.
    pub fn changed(old_offset: usize, new_offset: usize, old_len: usize, new_len: usize) -> Self {
        Diff::new(old_offset, new_offset, old_len, new_len, DiffKind::Changed)
    }

    #[inline]
    pub fn old_off(&self) -> usize {
        self.old_offset
    }

    #[inline]
    pub fn new_off(&self) -> usize {
        self.new_offset
    }

    #[inline]
    pub fn old_len(&self) -> usize {
        self.old_len
    }

    #[inline]
    pub fn new_len(&self) -> usize {
        self.new_len
    }

    /// End of the range in the old text.
    #[inline]
    pub fn old_end(&self) -> usize {
        self.old_offset + self.old_len
    }

    /// End of the range in the new text.
    #[inline]
    pub fn new_end(&self) -> usize {
        self.new_offset + self.new_len
    }

    #[inline]
    pub fn kind(&self) -> DiffKind {
        self.kind
    }
}
