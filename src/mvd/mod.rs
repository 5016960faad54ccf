//! The multi-version document façade.
//!
//! Owns the pairs list and the version and group tables, and drives the
//! converter, diff engine and merger. All graph work is transient: each
//! operation rebuilds a graph from the pairs, mutates it, verifies it and
//! serializes it back, so the pairs list is the only durable state and a
//! failed operation leaves the document exactly as it was.

mod errors;

pub use errors::{DocumentError, DocumentResult};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::align::Merger;
use crate::diff::DiffMatrix;
use crate::graph::Subgraph;
use crate::observability::{Event, Logger};
use crate::pairs::{encode, Pair, PairError, PairGraphConverter};
use crate::version_set::VersionSet;

/// One row of the version table. Version ids are 1-based row positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Short identifier, e.g. a siglum.
    pub short_name: String,
    /// Human-readable description of the witness.
    pub long_name: String,
    /// Owning group id; 0 is the top level.
    pub group: u16,
}

impl VersionEntry {
    pub fn new(short_name: impl Into<String>, long_name: impl Into<String>) -> Self {
        VersionEntry {
            short_name: short_name.into(),
            long_name: long_name.into(),
            group: 0,
        }
    }
}

/// One row of the group table; groups nest via `parent` (0 = top level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    pub parent: u16,
}

/// A set of merged versions of one work, stored as an ordered pairs list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiVersionDocument {
    description: String,
    encoding: String,
    versions: Vec<VersionEntry>,
    groups: Vec<GroupEntry>,
    pairs: Vec<Pair>,
    /// When set, the merger never looks for transpositions.
    direct_align_only: bool,
    /// When set, revising a version also revises versions whose text is
    /// identical to it across each changed range.
    merge_shared_versions: bool,
}

impl MultiVersionDocument {
    pub fn new(description: impl Into<String>) -> Self {
        MultiVersionDocument {
            description: description.into(),
            encoding: "UTF-8".into(),
            versions: Vec::new(),
            groups: Vec::new(),
            pairs: Vec::new(),
            direct_align_only: false,
            merge_shared_versions: false,
        }
    }

    // ----- metadata -----

    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    #[inline]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = encoding.into();
    }

    pub fn set_direct_align_only(&mut self, value: bool) {
        self.direct_align_only = value;
    }

    pub fn set_merge_shared_versions(&mut self, value: bool) {
        self.merge_shared_versions = value;
    }

    /// Number of versions; valid ids are `1..=version_count()`.
    #[inline]
    pub fn version_count(&self) -> u16 {
        self.versions.len() as u16
    }

    #[inline]
    pub fn versions(&self) -> &[VersionEntry] {
        &self.versions
    }

    /// Adds a group row and returns its 1-based id.
    pub fn add_group(&mut self, name: impl Into<String>, parent: u16) -> u16 {
        self.groups.push(GroupEntry {
            name: name.into(),
            parent,
        });
        self.groups.len() as u16
    }

    #[inline]
    pub fn groups(&self) -> &[GroupEntry] {
        &self.groups
    }

    /// The serialized state, consumed by rendering and persistence layers.
    #[inline]
    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    /// CRC32 over all pair texts, for the persistence layer's data table.
    pub fn data_checksum(&self) -> u32 {
        encode::data_table_checksum(&self.pairs)
    }

    // ----- content operations -----

    /// Appends a new version with the given text. Returns the fraction of
    /// the new version's text that merged with nothing (0.0 for the first
    /// version, which has nothing to merge against).
    pub fn add_version(&mut self, entry: VersionEntry, text: &[u8]) -> DocumentResult<f32> {
        self.versions.push(entry);
        let id = self.versions.len() as u16;
        match self.update(id, text) {
            Ok(fraction) => Ok(fraction),
            Err(e) => {
                self.versions.pop();
                Err(e)
            }
        }
    }

    /// Sets the full text of a version, merging it against the rest of the
    /// document. A version that appears in no pair yet is merged whole; an
    /// existing version is diffed against its current text and only the
    /// changed ranges are re-merged.
    pub fn update(&mut self, version: u16, text: &[u8]) -> DocumentResult<f32> {
        self.check_version(version)?;
        let is_new = !self.pairs.iter().any(|p| p.versions().contains(version));
        let pairs = if is_new {
            self.merge_new(version, text)?
        } else {
            self.merge_revision(version, text)?
        };
        self.pairs = pairs;
        let fraction = if self.versions.len() <= 1 {
            0.0
        } else {
            self.fraction_unique(version)?
        };
        Logger::info(
            if is_new {
                Event::VersionAdded.as_str()
            } else {
                Event::VersionRevised.as_str()
            },
            &[
                ("bytes", &text.len().to_string()),
                ("unique", &format!("{:.3}", fraction)),
                ("version", &version.to_string()),
            ],
        );
        Ok(fraction)
    }

    /// Merges a brand-new version over the whole graph.
    fn merge_new(&self, version: u16, text: &[u8]) -> DocumentResult<Vec<Pair>> {
        let mut g = PairGraphConverter::create(&self.pairs)?;
        let mut sub = Subgraph::whole(&g, self.all_versions());
        let special = sub.add_special_arc(&mut g, text.to_vec(), VersionSet::single(version), 0);
        Merger::new(self.direct_align_only).merge_special(&mut g, &sub, special)?;
        sub.adopt(&mut g, version)?;
        Logger::trace(
            Event::SpecialAdopted.as_str(),
            &[("version", &version.to_string())],
        );
        sub.verify(&g)?;
        Ok(PairGraphConverter::serialise(&g)?)
    }

    /// Re-merges only the changed ranges of an existing version.
    fn merge_revision(&self, version: u16, text: &[u8]) -> DocumentResult<Vec<Pair>> {
        let base = self.get_version(version)?;
        if base == text {
            return Ok(self.pairs.clone());
        }
        let diffs = DiffMatrix::basic_diffs(text, &base);
        let mut g = PairGraphConverter::create(&self.pairs)?;
        let sub = Subgraph::whole(&g, self.all_versions());
        let merger = Merger::new(self.direct_align_only);

        // walk the version's path once; each changed range is carved where
        // the previous one ended
        let mut node = sub.start;
        let mut pos = 0usize;
        for diff in &diffs {
            let mut mini = sub.mini_graph(&mut g, diff, version, pos, node)?;
            pos = diff.old_end();
            node = mini.end;

            let movers = if self.merge_shared_versions {
                mini.shared_versions(&g, version)?
            } else {
                VersionSet::single(version)
            };
            mini.remove_versions(&mut g, &movers)?;
            let special = mini.add_special_arc(
                &mut g,
                text[diff.new_off()..diff.new_end()].to_vec(),
                movers.clone(),
                diff.new_off(),
            );
            merger.merge_special(&mut g, &mini, special)?;
            for v in movers.iter() {
                mini.adopt(&mut g, v)?;
            }
        }
        sub.verify(&g)?;
        Ok(PairGraphConverter::serialise(&g)?)
    }

    /// Removes a version entirely; higher ids shift down by one everywhere.
    pub fn remove_version(&mut self, version: u16) -> DocumentResult<()> {
        self.check_version(version)?;
        let mut g = PairGraphConverter::create(&self.pairs)?;
        let mut sub = Subgraph::whole(&g, self.all_versions());
        if self.pairs.iter().any(|p| p.versions().contains(version)) {
            sub.remove_version(&mut g, version)?;
        }
        sub.verify(&g)?;
        let mut pairs = PairGraphConverter::serialise(&g)?;
        for pair in pairs.iter_mut() {
            let renumbered = pair.versions().renumber_after_removal(version);
            pair.set_versions(renumbered);
        }
        self.pairs = pairs;
        self.versions.remove(version as usize - 1);
        Logger::info(
            Event::VersionRemoved.as_str(),
            &[("version", &version.to_string())],
        );
        Ok(())
    }

    /// Reconstructs one version's full text from the pairs list.
    pub fn get_version(&self, version: u16) -> DocumentResult<Vec<u8>> {
        self.check_version(version)?;
        let parents = self.parent_texts();
        let mut out = Vec::new();
        for pair in &self.pairs {
            if !pair.versions().contains(version) {
                continue;
            }
            match pair.data() {
                Some(data) => out.extend_from_slice(data),
                None => {
                    let id = pair.parent_id().unwrap_or(0);
                    let data = parents
                        .get(&id)
                        .ok_or(PairError::OrphanedTransposition { id })?;
                    out.extend_from_slice(data);
                }
            }
        }
        Ok(out)
    }

    /// Text length of every version, in id order.
    pub fn version_lengths(&self) -> Vec<usize> {
        let parents = self.parent_texts();
        let mut lengths = vec![0usize; self.versions.len()];
        for pair in &self.pairs {
            let len = match pair.data() {
                Some(data) => data.len(),
                None => pair
                    .parent_id()
                    .and_then(|id| parents.get(&id))
                    .map_or(0, |d| d.len()),
            };
            for v in pair.versions().iter() {
                if let Some(slot) = lengths.get_mut(v as usize - 1) {
                    *slot += len;
                }
            }
        }
        lengths
    }

    /// Fraction of a version's text carried by pairs no other version
    /// shares.
    pub fn fraction_unique(&self, version: u16) -> DocumentResult<f32> {
        self.check_version(version)?;
        let parents = self.parent_texts();
        let mut unique = 0usize;
        let mut total = 0usize;
        for pair in &self.pairs {
            if !pair.versions().contains(version) {
                continue;
            }
            let len = match pair.data() {
                Some(data) => data.len(),
                None => pair
                    .parent_id()
                    .and_then(|id| parents.get(&id))
                    .map_or(0, |d| d.len()),
            };
            total += len;
            if pair.versions().cardinality() == 1 {
                unique += len;
            }
        }
        if total == 0 {
            Ok(0.0)
        } else {
            Ok(unique as f32 / total as f32)
        }
    }

    // ----- internals -----

    fn check_version(&self, version: u16) -> DocumentResult<()> {
        if version == 0 || version as usize > self.versions.len() {
            return Err(DocumentError::InvalidVersion { version });
        }
        Ok(())
    }

    /// All version ids currently in the table.
    fn all_versions(&self) -> VersionSet {
        let mut set = VersionSet::new();
        for v in 1..=self.versions.len() as u16 {
            set.insert(v);
        }
        set
    }

    /// Parent id to text, for resolving child pairs.
    fn parent_texts(&self) -> HashMap<u32, &[u8]> {
        let mut map = HashMap::new();
        for pair in &self.pairs {
            if let (Some(id), Some(data)) = (pair.id(), pair.data()) {
                map.insert(id, data);
            }
        }
        map
    }

    /// Debug guard: rebuilds the graph and checks every invariant.
    pub fn verify(&self) -> DocumentResult<()> {
        let g = PairGraphConverter::create(&self.pairs)?;
        Subgraph::whole(&g, self.all_versions()).verify(&g)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> MultiVersionDocument {
        MultiVersionDocument::new("test document")
    }

    #[test]
    fn test_first_version_is_fully_unique_but_reports_zero() {
        let mut mvd = doc();
        let fraction = mvd
            .add_version(VersionEntry::new("A", "first witness"), b"THEQUICKFOX")
            .unwrap();
        assert_eq!(fraction, 0.0);
        assert_eq!(mvd.version_count(), 1);
        assert_eq!(mvd.get_version(1).unwrap(), b"THEQUICKFOX");
    }

    #[test]
    fn test_identical_second_version_shares_everything() {
        let mut mvd = doc();
        mvd.add_version(VersionEntry::new("A", "a"), b"THEQUICKFOX")
            .unwrap();
        let fraction = mvd
            .add_version(VersionEntry::new("B", "b"), b"THEQUICKFOX")
            .unwrap();
        assert_eq!(fraction, 0.0);
        assert_eq!(mvd.get_version(2).unwrap(), b"THEQUICKFOX");
        assert_eq!(mvd.fraction_unique(1).unwrap(), 0.0);
    }

    #[test]
    fn test_divergent_versions_round_trip() {
        let mut mvd = doc();
        mvd.add_version(VersionEntry::new("A", "a"), b"ABCDE").unwrap();
        let fraction = mvd.add_version(VersionEntry::new("B", "b"), b"ABXDE").unwrap();
        assert_eq!(mvd.get_version(1).unwrap(), b"ABCDE");
        assert_eq!(mvd.get_version(2).unwrap(), b"ABXDE");
        assert!(fraction > 0.0 && fraction < 1.0);
        mvd.verify().unwrap();
    }

    #[test]
    fn test_revision_changes_only_the_target_version() {
        let mut mvd = doc();
        mvd.add_version(VersionEntry::new("A", "a"), b"ABCDE").unwrap();
        mvd.add_version(VersionEntry::new("B", "b"), b"ABCDE").unwrap();
        mvd.update(2, b"ABXDE").unwrap();
        assert_eq!(mvd.get_version(1).unwrap(), b"ABCDE");
        assert_eq!(mvd.get_version(2).unwrap(), b"ABXDE");
        mvd.verify().unwrap();
    }

    #[test]
    fn test_revision_with_merge_shared_moves_identical_versions() {
        let mut mvd = doc();
        mvd.add_version(VersionEntry::new("A", "a"), b"ABCDE").unwrap();
        mvd.add_version(VersionEntry::new("B", "b"), b"ABCDE").unwrap();
        mvd.set_merge_shared_versions(true);
        mvd.update(2, b"ABXDE").unwrap();
        // version 1 was identical across the changed range, so it moved too
        assert_eq!(mvd.get_version(1).unwrap(), b"ABXDE");
        assert_eq!(mvd.get_version(2).unwrap(), b"ABXDE");
        mvd.verify().unwrap();
    }

    #[test]
    fn test_remove_version_renumbers() {
        let mut mvd = doc();
        mvd.add_version(VersionEntry::new("A", "a"), b"ABCDE").unwrap();
        mvd.add_version(VersionEntry::new("B", "b"), b"ABXDE").unwrap();
        mvd.add_version(VersionEntry::new("C", "c"), b"ABYDE").unwrap();
        mvd.remove_version(2).unwrap();
        assert_eq!(mvd.version_count(), 2);
        assert_eq!(mvd.versions()[1].short_name, "C");
        assert_eq!(mvd.get_version(1).unwrap(), b"ABCDE");
        assert_eq!(mvd.get_version(2).unwrap(), b"ABYDE");
        mvd.verify().unwrap();
    }

    #[test]
    fn test_invalid_version_is_rejected() {
        let mut mvd = doc();
        mvd.add_version(VersionEntry::new("A", "a"), b"X").unwrap();
        assert!(matches!(
            mvd.update(5, b"Y").unwrap_err(),
            DocumentError::InvalidVersion { version: 5 }
        ));
        assert!(mvd.get_version(0).is_err());
        assert!(mvd.remove_version(2).is_err());
    }

    #[test]
    fn test_version_lengths() {
        let mut mvd = doc();
        mvd.add_version(VersionEntry::new("A", "a"), b"ABCDE").unwrap();
        mvd.add_version(VersionEntry::new("B", "b"), b"ABXXDE").unwrap();
        assert_eq!(mvd.version_lengths(), vec![5, 6]);
    }

    #[test]
    fn test_failed_update_leaves_document_unchanged() {
        let mut mvd = doc();
        mvd.add_version(VersionEntry::new("A", "a"), b"ABCDE").unwrap();
        let before = mvd.pairs().to_vec();
        assert!(mvd.update(9, b"zzz").is_err());
        assert_eq!(mvd.pairs(), &before[..]);
        assert_eq!(mvd.version_count(), 1);
    }

    #[test]
    fn test_groups_and_metadata() {
        let mut mvd = doc();
        assert_eq!(mvd.description(), "test document");
        assert_eq!(mvd.encoding(), "UTF-8");
        let group = mvd.add_group("manuscripts", 0);
        assert_eq!(group, 1);
        let mut entry = VersionEntry::new("A", "a");
        entry.group = group;
        mvd.add_version(entry, b"text").unwrap();
        assert_eq!(mvd.versions()[0].group, 1);
    }
}
