//! VersionSet - Bitmap membership over version identifiers
//!
//! Every arc, pair and subgraph constraint is owned by a set of versions.
//! Version identifiers are 1-based; bit 0 is reserved as the "hint / no
//! version" marker and is never set by the engine itself.
//!
//! This is a pure data container with set algebra only. No graph logic.

use serde::{Deserialize, Serialize};

/// A set of version identifiers backed by 64-bit blocks.
///
/// The set grows on demand up to the document's version count; callers treat
/// it as immutable once attached to a serialized pair.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSet {
    blocks: Vec<u64>,
}

impl VersionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Creates a set containing exactly one version.
    pub fn single(version: u16) -> Self {
        let mut set = Self::new();
        set.insert(version);
        set
    }

    /// Adds a version to the set.
    pub fn insert(&mut self, version: u16) {
        let block = (version / 64) as usize;
        if block >= self.blocks.len() {
            self.blocks.resize(block + 1, 0);
        }
        self.blocks[block] |= 1u64 << (version % 64);
    }

    /// Removes a version from the set.
    pub fn remove(&mut self, version: u16) {
        let block = (version / 64) as usize;
        if block < self.blocks.len() {
            self.blocks[block] &= !(1u64 << (version % 64));
        }
    }

    /// Returns true if the set contains the given version.
    #[inline]
    pub fn contains(&self, version: u16) -> bool {
        let block = (version / 64) as usize;
        block < self.blocks.len() && self.blocks[block] & (1u64 << (version % 64)) != 0
    }

    /// Returns true if no version is present.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| *b == 0)
    }

    /// Returns the number of versions in the set.
    pub fn cardinality(&self) -> usize {
        self.blocks.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Returns true if the set is the reserved hint marker (bit 0 only).
    pub fn is_hint(&self) -> bool {
        self.contains(0) && self.cardinality() == 1
    }

    /// Returns the lowest version in the set, if any.
    pub fn first(&self) -> Option<u16> {
        self.iter().next()
    }

    /// In-place union with another set.
    pub fn union_with(&mut self, other: &VersionSet) {
        if other.blocks.len() > self.blocks.len() {
            self.blocks.resize(other.blocks.len(), 0);
        }
        for (i, b) in other.blocks.iter().enumerate() {
            self.blocks[i] |= b;
        }
    }

    /// In-place intersection with another set.
    pub fn intersect_with(&mut self, other: &VersionSet) {
        for (i, b) in self.blocks.iter_mut().enumerate() {
            *b &= other.blocks.get(i).copied().unwrap_or(0);
        }
    }

    /// In-place subtraction: removes every version present in `other`.
    pub fn subtract(&mut self, other: &VersionSet) {
        for (i, b) in self.blocks.iter_mut().enumerate() {
            *b &= !other.blocks.get(i).copied().unwrap_or(0);
        }
    }

    /// Returns true if every version in `self` is also in `other`.
    pub fn is_subset_of(&self, other: &VersionSet) -> bool {
        self.iter().all(|v| other.contains(v))
    }

    /// Returns true if the two sets share at least one version.
    pub fn intersects(&self, other: &VersionSet) -> bool {
        self.blocks
            .iter()
            .zip(other.blocks.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Iterates the versions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.blocks.iter().enumerate().flat_map(|(i, block)| {
            (0..64u16)
                .filter(move |bit| block & (1u64 << bit) != 0)
                .map(move |bit| i as u16 * 64 + bit)
        })
    }

    /// Rewrites the set after a version removal: `version` is dropped and
    /// every higher identifier shifts down by one.
    pub fn renumber_after_removal(&self, version: u16) -> VersionSet {
        let mut out = VersionSet::new();
        for v in self.iter() {
            if v < version {
                out.insert(v);
            } else if v > version {
                out.insert(v - 1);
            }
        }
        out
    }

    /// Serializes the set into `set_size` bytes, MSB-justified, matching the
    /// fixed pairs-table wire shape: version v sets bit `v % 8` of byte
    /// `((set_size * 8 - 1) - v) / 8`.
    pub fn to_wire_bytes(&self, set_size: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; set_size];
        for v in self.iter() {
            let index = ((set_size * 8 - 1) - v as usize) / 8;
            bytes[index] |= 1 << (v % 8);
        }
        bytes
    }
}

impl std::fmt::Debug for VersionSet {
    /// Rendered as `{1,3,7}`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, v) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "}}")
    }
}
