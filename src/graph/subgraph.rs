//! Subgraph views and the variant-graph operations.
//!
//! A `Subgraph` is a bounded window over the arena: a start node, an end
//! node, the constraint set of versions the window concerns, and the offset
//! of the window from the start of the incoming version. The whole document
//! is itself a subgraph whose boundaries are the arena sentinels; revisions
//! carve mini-subgraphs around each changed range.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::diff::Diff;
use crate::version_set::VersionSet;

use super::arena::{ArcId, GraphArena, NodeId};
use super::errors::{GraphError, GraphResult};

/// A bounded view over the variant graph.
#[derive(Debug, Clone)]
pub struct Subgraph {
    pub start: NodeId,
    pub end: NodeId,
    /// Versions this window concerns; unmerged versions are excluded.
    pub constraint: VersionSet,
    /// Offset of the window from the start of the new version's text.
    pub position: usize,
}

impl Subgraph {
    pub fn new(start: NodeId, end: NodeId, constraint: VersionSet, position: usize) -> Self {
        Subgraph {
            start,
            end,
            constraint,
            position,
        }
    }

    /// The whole-document view: arena sentinels plus the given constraint.
    pub fn whole(g: &GraphArena, constraint: VersionSet) -> Self {
        Subgraph::new(g.start(), g.end(), constraint, 0)
    }

    /// Walks `version`'s path from `from` (at path offset `pos`) until the
    /// arc spanning `offset` is found, splitting it if the offset falls
    /// inside. `at_start` selects which node an exact boundary hit resolves
    /// to, so that a carved range includes the boundary text on the correct
    /// side. Returns the node at the split point.
    pub fn split_arc_at(
        &self,
        g: &mut GraphArena,
        from: NodeId,
        version: u16,
        mut pos: usize,
        offset: usize,
        at_start: bool,
    ) -> GraphResult<NodeId> {
        let orig = from;
        let mut n = from;
        let mut spanning: Option<ArcId> = None;
        let mut steps = 0usize;
        while n != self.end {
            let a = g.pick_outgoing(n, version).ok_or_else(|| {
                GraphError::corruption(format!(
                    "version {} has no outgoing arc while seeking offset {}",
                    version, offset
                ))
            })?;
            let len = g.arc_len(a);
            if pos + len < offset || (!at_start && pos + len == offset) {
                pos += len;
                n = g
                    .arc_to(a)
                    .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
            } else {
                spanning = Some(a);
                break;
            }
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle while seeking split offset"));
            }
        }

        if offset == pos {
            // exact hit on a node boundary
            if at_start || n != orig {
                Ok(n)
            } else {
                // the carved range starts and ends at the same node; split it
                // so the range gets distinct boundary nodes
                Ok(g.split_node_after(n))
            }
        } else if let Some(a) = spanning {
            let len = g.arc_len(a);
            if pos + len == offset {
                g.arc_to(a)
                    .ok_or_else(|| GraphError::corruption("attached arc without destination"))
            } else if offset > pos && offset < pos + len {
                let (left, _right) = g.split_arc(a, offset - pos)?;
                g.arc_to(left)
                    .ok_or_else(|| GraphError::corruption("split produced no mid node"))
            } else {
                Err(GraphError::InvalidOffset { offset, version })
            }
        } else {
            Err(GraphError::InvalidOffset { offset, version })
        }
    }

    /// Carves the node range spanning one changed region out of this
    /// subgraph. `pos` is the path offset of `from` in `version`.
    pub fn mini_graph(
        &self,
        g: &mut GraphArena,
        diff: &Diff,
        version: u16,
        pos: usize,
        from: NodeId,
    ) -> GraphResult<Subgraph> {
        let start_node = self.split_arc_at(g, from, version, pos, diff.old_off(), true)?;
        let end_node = if diff.old_len() == 0 && g.outgoing(start_node).is_empty() {
            // insertion at the terminal boundary: grow a node backwards so
            // the carved range still has two distinct boundary nodes
            let fresh = g.split_node_before(start_node);
            let mut constraint = self.boundary_versions(g, fresh, start_node);
            constraint.intersect_with(&self.constraint);
            return Ok(Subgraph::new(fresh, start_node, constraint, diff.old_off()));
        } else {
            self.split_arc_at(
                g,
                start_node,
                version,
                diff.old_off(),
                diff.old_off() + diff.old_len(),
                false,
            )?
        };
        let mut constraint = self.boundary_versions(g, start_node, end_node);
        constraint.intersect_with(&self.constraint);
        Ok(Subgraph::new(start_node, end_node, constraint, diff.old_off()))
    }

    /// Versions that traverse both boundary nodes of a carved range.
    fn boundary_versions(&self, g: &GraphArena, start: NodeId, end: NodeId) -> VersionSet {
        let mut set = g.node_versions(start);
        set.intersect_with(&g.node_versions(end));
        set
    }

    /// The versions whose start-to-end paths are textually identical to
    /// `version`'s path: the step-wise intersection of arc version sets
    /// along that single path.
    pub fn shared_versions(&self, g: &GraphArena, version: u16) -> GraphResult<VersionSet> {
        let mut n = self.start;
        let mut shared: Option<VersionSet> = None;
        let mut steps = 0usize;
        while n != self.end {
            let a = g.pick_outgoing(n, version).ok_or_else(|| {
                GraphError::corruption(format!(
                    "version {} breaks off before the subgraph end",
                    version
                ))
            })?;
            match shared.as_mut() {
                Some(set) => set.intersect_with(g.arc_versions(a)),
                None => shared = Some(g.arc_versions(a).clone()),
            }
            n = g
                .arc_to(a)
                .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle on version path"));
            }
        }
        Ok(shared.unwrap_or_else(|| VersionSet::single(version)))
    }

    /// Attaches a new unaligned arc directly between start and end. Its
    /// versions leave the constraint set: they are not merged yet.
    pub fn add_special_arc(
        &mut self,
        g: &mut GraphArena,
        data: Vec<u8>,
        versions: VersionSet,
        position: usize,
    ) -> ArcId {
        let arc = g.add_special(versions.clone(), data, position);
        g.attach(arc, self.start, self.end);
        self.constraint.subtract(&versions);
        arc
    }

    /// Adopts a version: walks its path converting every special arc into an
    /// ordinary one and folds the arc versions into the constraint set. The
    /// terminal step of any merge; a second call is a no-op.
    pub fn adopt(&mut self, g: &mut GraphArena, version: u16) -> GraphResult<()> {
        self.constraint.insert(version);
        let mut n = self.start;
        let mut steps = 0usize;
        while n != self.end {
            let a = g.pick_outgoing(n, version).ok_or_else(|| {
                GraphError::corruption(format!("version {} has no path to adopt", version))
            })?;
            if g.is_special(a) {
                g.clear_special(a);
                let versions = g.arc_versions(a).clone();
                self.constraint.union_with(&versions);
            }
            n = g
                .arc_to(a)
                .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle while adopting version"));
            }
        }
        Ok(())
    }

    /// Removes one version's path from the subgraph. Arcs carried only by
    /// this version are unlinked (with transposition repair); shared arcs
    /// merely lose the version bit.
    pub fn remove_version(&mut self, g: &mut GraphArena, version: u16) -> GraphResult<()> {
        let mut n = self.start;
        let mut steps = 0usize;
        while n != self.end {
            let a = g.pick_outgoing(n, version).ok_or_else(|| {
                GraphError::corruption(format!("version {} has no path to remove", version))
            })?;
            // take the next node before the arc loses its endpoints
            n = g
                .arc_to(a)
                .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
            if g.arc_versions(a).cardinality() == 1 {
                g.unlink_arc(a);
            } else {
                g.arc_versions_mut(a).remove(version);
            }
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle while removing version"));
            }
        }
        self.constraint.remove(version);
        Ok(())
    }

    /// Removes a whole set of versions.
    pub fn remove_versions(&mut self, g: &mut GraphArena, versions: &VersionSet) -> GraphResult<()> {
        for v in versions.iter() {
            self.remove_version(g, v)?;
        }
        Ok(())
    }

    /// Reconstructs one version's text through this subgraph.
    pub fn version_text(&self, g: &GraphArena, version: u16) -> GraphResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut n = self.start;
        let mut steps = 0usize;
        while n != self.end {
            let a = g.pick_outgoing(n, version).ok_or_else(|| {
                GraphError::corruption(format!("version {} has a broken path", version))
            })?;
            out.extend_from_slice(g.arc_data(a));
            n = g
                .arc_to(a)
                .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle on version path"));
            }
        }
        Ok(out)
    }

    /// Breadth-first structural check of every reachable node and arc. A
    /// post-condition check after mutation, not a hot-path operation.
    pub fn verify(&self, g: &GraphArena) -> GraphResult<()> {
        let mut emitted: HashMap<NodeId, usize> = HashMap::new();
        let mut queued: HashSet<NodeId> = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(self.start);
        queued.insert(self.start);
        while let Some(node) = queue.pop_front() {
            self.verify_node(g, node)?;
            if node == self.end {
                continue;
            }
            for &a in g.outgoing(node) {
                self.verify_arc(g, a)?;
                let to = g
                    .arc_to(a)
                    .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
                let seen = emitted.entry(to).or_insert(0);
                *seen += 1;
                if to != self.end && *seen == g.incoming(to).len() && queued.insert(to) {
                    queue.push_back(to);
                }
            }
        }
        Ok(())
    }

    fn verify_node(&self, g: &GraphArena, node: NodeId) -> GraphResult<()> {
        // each version leaves a node through exactly one arc
        let mut seen = VersionSet::new();
        for &a in g.outgoing(node) {
            if g.arc_versions(a).intersects(&seen) {
                return Err(GraphError::corruption(format!(
                    "node {:?} has two outgoing arcs for one version",
                    node
                )));
            }
            seen.union_with(g.arc_versions(a));
        }
        if node != self.start && node != self.end {
            let incoming = g.in_versions(node);
            if incoming.is_empty() {
                return Err(GraphError::corruption(format!(
                    "interior node {:?} has no incoming versions",
                    node
                )));
            }
        }
        Ok(())
    }

    fn verify_arc(&self, g: &GraphArena, arc: ArcId) -> GraphResult<()> {
        if !g.arc_live(arc) {
            return Err(GraphError::corruption("dead arc still wired to a node"));
        }
        if g.arc_from(arc).is_none() || g.arc_to(arc).is_none() {
            return Err(GraphError::corruption("reachable arc with missing endpoint"));
        }
        if g.arc_versions(arc).is_empty() {
            return Err(GraphError::corruption("arc with an empty version set"));
        }
        if let Some(parent) = g.arc_parent(arc) {
            if !g.arc_live(parent) {
                return Err(GraphError::corruption(
                    "transposition child references a dead parent",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a two-version graph: AB -> (C | X) -> DE.
    fn forked() -> (GraphArena, Subgraph) {
        let mut g = GraphArena::new();
        let n1 = g.add_node();
        let n2 = g.add_node();
        let mut both = VersionSet::single(1);
        both.insert(2);
        let ab = g.add_arc(both.clone(), b"AB".to_vec());
        let c = g.add_arc(VersionSet::single(1), b"C".to_vec());
        let x = g.add_arc(VersionSet::single(2), b"X".to_vec());
        let de = g.add_arc(both.clone(), b"DE".to_vec());
        g.attach(ab, g.start(), n1);
        g.attach(c, n1, n2);
        g.attach(x, n1, n2);
        g.attach(de, n2, g.end());
        let sub = Subgraph::whole(&g, both);
        (g, sub)
    }

    #[test]
    fn test_version_text() {
        let (g, sub) = forked();
        assert_eq!(sub.version_text(&g, 1).unwrap(), b"ABCDE");
        assert_eq!(sub.version_text(&g, 2).unwrap(), b"ABXDE");
    }

    #[test]
    fn test_split_arc_at_interior() {
        let (mut g, sub) = forked();
        let n = sub.split_arc_at(&mut g, sub.start, 1, 0, 1, true).unwrap();
        // AB split into A | B
        let a = g.pick_incoming(n, 1).unwrap();
        assert_eq!(g.arc_data(a), b"A");
        let b = g.pick_outgoing(n, 2).unwrap();
        assert_eq!(g.arc_data(b), b"B");
        assert_eq!(sub.version_text(&g, 1).unwrap(), b"ABCDE");
    }

    #[test]
    fn test_split_arc_at_node_boundary() {
        let (mut g, sub) = forked();
        // offset 2 is exactly the AB|C boundary
        let n = sub.split_arc_at(&mut g, sub.start, 1, 0, 2, true).unwrap();
        assert_eq!(g.arc_data(g.pick_outgoing(n, 1).unwrap()), b"C");
        let m = sub.split_arc_at(&mut g, sub.start, 1, 0, 2, false).unwrap();
        assert_eq!(n, m);
    }

    #[test]
    fn test_split_arc_at_invalid_offset() {
        let (mut g, sub) = forked();
        let err = sub
            .split_arc_at(&mut g, sub.start, 1, 0, 99, true)
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidOffset { .. }));
    }

    #[test]
    fn test_shared_versions_on_identical_paths() {
        let (g, sub) = forked();
        // versions diverge on C/X, so only the version itself is shared
        let shared = sub.shared_versions(&g, 1).unwrap();
        assert!(shared.contains(1));
        assert!(!shared.contains(2));
        assert!(shared.is_subset_of(&sub.constraint));
    }

    #[test]
    fn test_mini_graph_carves_changed_range() {
        let (mut g, sub) = forked();
        let d = Diff::changed(2, 2, 1, 1);
        let mini = sub.mini_graph(&mut g, &d, 1, 0, sub.start).unwrap();
        assert_eq!(mini.version_text(&g, 1).unwrap(), b"C");
        assert_eq!(mini.version_text(&g, 2).unwrap(), b"X");
        assert!(mini.constraint.contains(1));
        assert!(mini.constraint.contains(2));
        assert_eq!(mini.position, 2);
    }

    #[test]
    fn test_adopt_converts_specials_and_is_idempotent() {
        let mut g = GraphArena::new();
        let mut sub = Subgraph::whole(&g, VersionSet::new());
        let arc = sub.add_special_arc(&mut g, b"THEQUICKFOX".to_vec(), VersionSet::single(1), 0);
        assert!(g.is_special(arc));
        sub.adopt(&mut g, 1).unwrap();
        assert!(!g.is_special(arc));
        assert!(sub.constraint.contains(1));
        // second adoption finds no special arcs and changes nothing
        sub.adopt(&mut g, 1).unwrap();
        assert_eq!(sub.version_text(&g, 1).unwrap(), b"THEQUICKFOX");
    }

    #[test]
    fn test_remove_version_keeps_shared_arcs() {
        let (mut g, mut sub) = forked();
        sub.remove_version(&mut g, 2).unwrap();
        assert_eq!(sub.version_text(&g, 1).unwrap(), b"ABCDE");
        // shared arcs kept the remaining version's bit
        let ab = g.pick_outgoing(sub.start, 1).unwrap();
        assert!(!g.arc_versions(ab).contains(2));
        assert!(g.arc_versions(ab).contains(1));
        sub.verify(&g).unwrap();
    }

    #[test]
    fn test_verify_accepts_wellformed_graph() {
        let (g, sub) = forked();
        sub.verify(&g).unwrap();
    }
}
