//! Arena storage for the variant graph.
//!
//! Nodes and arcs live in index-addressed slot vectors; `NodeId` / `ArcId`
//! replace the pointer web of a naive graph representation, and transposition
//! parent/child links are plain index fields. Slots are never reused within
//! one merge session; detached slots are marked dead and skipped.
//!
//! This module is structural only: path walking, splitting and traversal
//! primitives. Alignment and merge policy live in `crate::align`.

use crate::version_set::VersionSet;

use super::errors::{GraphError, GraphResult};

/// Index of a node slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// Index of an arc slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArcId(u32);

impl NodeId {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

impl ArcId {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// What an arc carries: its own text, or a reference to the parent arc of a
/// transposition (children have no data of their own).
#[derive(Debug, Clone)]
enum ArcBody {
    Data(Vec<u8>),
    Child(ArcId),
}

#[derive(Debug)]
struct NodeSlot {
    incoming: Vec<ArcId>,
    outgoing: Vec<ArcId>,
}

#[derive(Debug)]
struct ArcSlot {
    versions: VersionSet,
    from: Option<NodeId>,
    to: Option<NodeId>,
    body: ArcBody,
    children: Vec<ArcId>,
    /// Present while the arc is special (unmerged); holds the offset of the
    /// arc's text from the start of the incoming version.
    special: Option<usize>,
    live: bool,
}

/// Slot storage for one variant graph plus its document-level sentinels.
#[derive(Debug)]
pub struct GraphArena {
    nodes: Vec<NodeSlot>,
    arcs: Vec<ArcSlot>,
    start: NodeId,
    end: NodeId,
}

impl GraphArena {
    /// Creates an empty arena with fresh start and end sentinel nodes.
    pub fn new() -> Self {
        let mut arena = GraphArena {
            nodes: Vec::new(),
            arcs: Vec::new(),
            start: NodeId(0),
            end: NodeId(0),
        };
        arena.start = arena.add_node();
        arena.end = arena.add_node();
        arena
    }

    /// The document-level start sentinel.
    #[inline]
    pub fn start(&self) -> NodeId {
        self.start
    }

    /// The document-level end sentinel.
    #[inline]
    pub fn end(&self) -> NodeId {
        self.end
    }

    /// Number of arc slots ever allocated; used as a walk bound so that a
    /// corrupted graph surfaces as an error instead of a hang.
    #[inline]
    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    pub fn add_node(&mut self) -> NodeId {
        self.nodes.push(NodeSlot {
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        NodeId((self.nodes.len() - 1) as u32)
    }

    /// Allocates an ordinary data-carrying arc, unattached.
    pub fn add_arc(&mut self, versions: VersionSet, data: Vec<u8>) -> ArcId {
        self.push_arc(ArcSlot {
            versions,
            from: None,
            to: None,
            body: ArcBody::Data(data),
            children: Vec::new(),
            special: None,
            live: true,
        })
    }

    /// Allocates a transposition child referencing `parent` for its data and
    /// registers it in the parent's child list.
    pub fn add_child_arc(&mut self, versions: VersionSet, parent: ArcId) -> ArcId {
        let child = self.push_arc(ArcSlot {
            versions,
            from: None,
            to: None,
            body: ArcBody::Child(parent),
            children: Vec::new(),
            special: None,
            live: true,
        });
        self.arcs[parent.idx()].children.push(child);
        child
    }

    /// Allocates a special (unmerged) arc at `position` within its version.
    pub fn add_special(&mut self, versions: VersionSet, data: Vec<u8>, position: usize) -> ArcId {
        let arc = self.add_arc(versions, data);
        self.arcs[arc.idx()].special = Some(position);
        arc
    }

    fn push_arc(&mut self, slot: ArcSlot) -> ArcId {
        self.arcs.push(slot);
        ArcId((self.arcs.len() - 1) as u32)
    }

    /// Wires an arc between two nodes.
    pub fn attach(&mut self, arc: ArcId, from: NodeId, to: NodeId) {
        let slot = &mut self.arcs[arc.idx()];
        slot.from = Some(from);
        slot.to = Some(to);
        self.nodes[from.idx()].outgoing.push(arc);
        self.nodes[to.idx()].incoming.push(arc);
    }

    /// Unwires an arc from its endpoints and marks the slot dead.
    pub fn detach(&mut self, arc: ArcId) {
        let (from, to) = {
            let slot = &mut self.arcs[arc.idx()];
            let ends = (slot.from.take(), slot.to.take());
            slot.live = false;
            ends
        };
        if let Some(n) = from {
            self.nodes[n.idx()].outgoing.retain(|a| *a != arc);
        }
        if let Some(n) = to {
            self.nodes[n.idx()].incoming.retain(|a| *a != arc);
        }
    }

    // ----- arc accessors -----

    #[inline]
    pub fn arc_versions(&self, arc: ArcId) -> &VersionSet {
        &self.arcs[arc.idx()].versions
    }

    #[inline]
    pub fn arc_versions_mut(&mut self, arc: ArcId) -> &mut VersionSet {
        &mut self.arcs[arc.idx()].versions
    }

    #[inline]
    pub fn arc_from(&self, arc: ArcId) -> Option<NodeId> {
        self.arcs[arc.idx()].from
    }

    #[inline]
    pub fn arc_to(&self, arc: ArcId) -> Option<NodeId> {
        self.arcs[arc.idx()].to
    }

    #[inline]
    pub fn arc_live(&self, arc: ArcId) -> bool {
        self.arcs[arc.idx()].live
    }

    /// The arc's text, following the parent link for transposition children.
    pub fn arc_data(&self, arc: ArcId) -> &[u8] {
        match &self.arcs[arc.idx()].body {
            ArcBody::Data(data) => data,
            ArcBody::Child(parent) => match &self.arcs[parent.idx()].body {
                ArcBody::Data(data) => data,
                // children never nest; a child's parent always owns data
                ArcBody::Child(_) => &[],
            },
        }
    }

    #[inline]
    pub fn arc_len(&self, arc: ArcId) -> usize {
        self.arc_data(arc).len()
    }

    pub fn arc_parent(&self, arc: ArcId) -> Option<ArcId> {
        match self.arcs[arc.idx()].body {
            ArcBody::Child(parent) => Some(parent),
            ArcBody::Data(_) => None,
        }
    }

    #[inline]
    pub fn is_child(&self, arc: ArcId) -> bool {
        matches!(self.arcs[arc.idx()].body, ArcBody::Child(_))
    }

    #[inline]
    pub fn is_parent(&self, arc: ArcId) -> bool {
        !self.arcs[arc.idx()].children.is_empty()
    }

    #[inline]
    pub fn is_special(&self, arc: ArcId) -> bool {
        self.arcs[arc.idx()].special.is_some()
    }

    #[inline]
    pub fn special_position(&self, arc: ArcId) -> Option<usize> {
        self.arcs[arc.idx()].special
    }

    /// Converts a special arc into an ordinary one (adoption step).
    pub fn clear_special(&mut self, arc: ArcId) {
        self.arcs[arc.idx()].special = None;
    }

    // ----- node accessors -----

    #[inline]
    pub fn outgoing(&self, node: NodeId) -> &[ArcId] {
        &self.nodes[node.idx()].outgoing
    }

    #[inline]
    pub fn incoming(&self, node: NodeId) -> &[ArcId] {
        &self.nodes[node.idx()].incoming
    }

    /// The one outgoing arc of `node` carrying `version`, if any. The graph
    /// invariant guarantees at most one.
    pub fn pick_outgoing(&self, node: NodeId, version: u16) -> Option<ArcId> {
        self.nodes[node.idx()]
            .outgoing
            .iter()
            .copied()
            .find(|a| self.arcs[a.idx()].versions.contains(version))
    }

    /// The one incoming arc of `node` carrying `version`, if any.
    pub fn pick_incoming(&self, node: NodeId, version: u16) -> Option<ArcId> {
        self.nodes[node.idx()]
            .incoming
            .iter()
            .copied()
            .find(|a| self.arcs[a.idx()].versions.contains(version))
    }

    /// Union of version sets over the node's outgoing arcs.
    pub fn out_versions(&self, node: NodeId) -> VersionSet {
        let mut set = VersionSet::new();
        for a in &self.nodes[node.idx()].outgoing {
            set.union_with(&self.arcs[a.idx()].versions);
        }
        set
    }

    /// Union of version sets over the node's incoming arcs.
    pub fn in_versions(&self, node: NodeId) -> VersionSet {
        let mut set = VersionSet::new();
        for a in &self.nodes[node.idx()].incoming {
            set.union_with(&self.arcs[a.idx()].versions);
        }
        set
    }

    /// Union of versions passing through the node (incoming and outgoing).
    pub fn node_versions(&self, node: NodeId) -> VersionSet {
        let mut set = self.in_versions(node);
        set.union_with(&self.out_versions(node));
        set
    }

    // ----- structural mutation -----

    /// Splits an arc's text at `at`, allocating a mid node and a right-half
    /// arc. If the arc is part of a transposition, the owning parent and
    /// every sibling child are split at the same offset so that data and
    /// references stay aligned. Returns the two halves of `arc` itself.
    pub fn split_arc(&mut self, arc: ArcId, at: usize) -> GraphResult<(ArcId, ArcId)> {
        let owner = self.arc_parent(arc).unwrap_or(arc);
        let owner_len = self.arc_len(owner);
        if at == 0 || at >= owner_len {
            return Err(GraphError::corruption(format!(
                "split offset {} outside arc of length {}",
                at, owner_len
            )));
        }
        if self.arcs[owner.idx()].special.is_some() {
            return Err(GraphError::corruption("attempt to split a special arc"));
        }

        // split the data owner first
        let right_data = match &mut self.arcs[owner.idx()].body {
            ArcBody::Data(data) => data.split_off(at),
            ArcBody::Child(_) => unreachable!("owner resolved to a data arc"),
        };
        let owner_right = self.split_tail(owner, ArcBody::Data(right_data));

        // every child shares the owner's length, so each splits with it
        let children = self.arcs[owner.idx()].children.clone();
        let mut result = (owner, owner_right);
        for child in children {
            let child_right = self.split_tail(child, ArcBody::Child(owner_right));
            self.arcs[owner_right.idx()].children.push(child_right);
            if child == arc {
                result = (child, child_right);
            }
        }
        Ok(result)
    }

    /// Rewires `left` to stop at a fresh mid node and adds a new right-half
    /// arc from that node to the old destination.
    fn split_tail(&mut self, left: ArcId, right_body: ArcBody) -> ArcId {
        let mid = self.add_node();
        let to = self.arcs[left.idx()]
            .to
            .unwrap_or_else(|| unreachable!("split of unattached arc"));
        let right = self.push_arc(ArcSlot {
            versions: self.arcs[left.idx()].versions.clone(),
            from: Some(mid),
            to: Some(to),
            body: right_body,
            children: Vec::new(),
            special: None,
            live: true,
        });
        // left now ends at mid; right takes over left's slot in to.incoming
        self.arcs[left.idx()].to = Some(mid);
        for a in self.nodes[to.idx()].incoming.iter_mut() {
            if *a == left {
                *a = right;
            }
        }
        self.nodes[mid.idx()].incoming.push(left);
        self.nodes[mid.idx()].outgoing.push(right);
        right
    }

    /// Splits a node in two: a fresh node takes over all outgoing arcs and an
    /// empty carrier arc joins the pair, so every version's path is preserved
    /// while the original node becomes a clean boundary.
    pub fn split_node_after(&mut self, node: NodeId) -> NodeId {
        let fresh = self.add_node();
        let moved = std::mem::take(&mut self.nodes[node.idx()].outgoing);
        let mut carried = VersionSet::new();
        for a in &moved {
            carried.union_with(&self.arcs[a.idx()].versions);
            self.arcs[a.idx()].from = Some(fresh);
        }
        self.nodes[fresh.idx()].outgoing = moved;
        let carrier = self.add_arc(carried, Vec::new());
        self.attach(carrier, node, fresh);
        fresh
    }

    /// Mirror of `split_node_after`: a fresh node takes over the incoming
    /// arcs and the empty carrier leads into the original node.
    pub fn split_node_before(&mut self, node: NodeId) -> NodeId {
        let fresh = self.add_node();
        let moved = std::mem::take(&mut self.nodes[node.idx()].incoming);
        let mut carried = VersionSet::new();
        for a in &moved {
            carried.union_with(&self.arcs[a.idx()].versions);
            self.arcs[a.idx()].to = Some(fresh);
        }
        self.nodes[fresh.idx()].incoming = moved;
        let carrier = self.add_arc(carried, Vec::new());
        self.attach(carrier, fresh, node);
        fresh
    }

    /// Converts a data arc into a transposition child of `parent`. Used when
    /// rebuilding a graph from pairs, where a child can precede its parent
    /// in the flat list and is wired up once the parent is known.
    pub fn make_child(&mut self, arc: ArcId, parent: ArcId) {
        self.arcs[arc.idx()].body = ArcBody::Child(parent);
        self.arcs[parent.idx()].children.push(arc);
    }

    /// Folds `other` into `target`: all of `other`'s arcs re-end on
    /// `target` and `other` is left empty.
    pub fn merge_nodes(&mut self, target: NodeId, other: NodeId) {
        if target == other {
            return;
        }
        let incoming = std::mem::take(&mut self.nodes[other.idx()].incoming);
        for a in &incoming {
            self.arcs[a.idx()].to = Some(target);
        }
        self.nodes[target.idx()].incoming.extend(incoming);
        let outgoing = std::mem::take(&mut self.nodes[other.idx()].outgoing);
        for a in &outgoing {
            self.arcs[a.idx()].from = Some(target);
        }
        self.nodes[target.idx()].outgoing.extend(outgoing);
    }

    /// Removes an arc that carries its last version. Transposition links are
    /// repaired: a child leaves its parent's list; a parent hands its data to
    /// the first surviving child, which adopts the remaining siblings.
    pub fn unlink_arc(&mut self, arc: ArcId) {
        self.detach(arc);
        if let Some(parent) = self.arc_parent(arc) {
            self.arcs[parent.idx()].children.retain(|c| *c != arc);
            return;
        }
        let children = std::mem::take(&mut self.arcs[arc.idx()].children);
        if let Some((heir, rest)) = children.split_first() {
            let data = match std::mem::replace(&mut self.arcs[arc.idx()].body, ArcBody::Data(Vec::new())) {
                ArcBody::Data(data) => data,
                ArcBody::Child(_) => unreachable!("parent arc owns its data"),
            };
            self.arcs[heir.idx()].body = ArcBody::Data(data);
            for sibling in rest {
                self.arcs[sibling.idx()].body = ArcBody::Child(*heir);
            }
            self.arcs[heir.idx()].children = rest.to_vec();
        }
    }
}

impl Default for GraphArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(v: u16) -> VersionSet {
        VersionSet::single(v)
    }

    #[test]
    fn test_attach_and_pick() {
        let mut g = GraphArena::new();
        let a = g.add_arc(single(1), b"hello".to_vec());
        g.attach(a, g.start(), g.end());
        assert_eq!(g.pick_outgoing(g.start(), 1), Some(a));
        assert_eq!(g.pick_incoming(g.end(), 1), Some(a));
        assert_eq!(g.pick_outgoing(g.start(), 2), None);
        assert_eq!(g.arc_data(a), b"hello");
    }

    #[test]
    fn test_detach_clears_endpoints() {
        let mut g = GraphArena::new();
        let a = g.add_arc(single(1), b"x".to_vec());
        g.attach(a, g.start(), g.end());
        g.detach(a);
        assert!(g.outgoing(g.start()).is_empty());
        assert!(g.incoming(g.end()).is_empty());
        assert!(!g.arc_live(a));
    }

    #[test]
    fn test_split_arc_plain() {
        let mut g = GraphArena::new();
        let a = g.add_arc(single(1), b"abcdef".to_vec());
        g.attach(a, g.start(), g.end());
        let (left, right) = g.split_arc(a, 2).unwrap();
        assert_eq!(g.arc_data(left), b"ab");
        assert_eq!(g.arc_data(right), b"cdef");
        let mid = g.arc_to(left).unwrap();
        assert_eq!(g.arc_from(right), Some(mid));
        assert_eq!(g.arc_to(right), Some(g.end()));
        assert_eq!(g.pick_outgoing(mid, 1), Some(right));
    }

    #[test]
    fn test_split_arc_rejects_boundary_offsets() {
        let mut g = GraphArena::new();
        let a = g.add_arc(single(1), b"ab".to_vec());
        g.attach(a, g.start(), g.end());
        assert!(g.split_arc(a, 0).is_err());
        assert!(g.split_arc(a, 2).is_err());
    }

    #[test]
    fn test_split_child_splits_parent_too() {
        let mut g = GraphArena::new();
        let parent = g.add_arc(single(1), b"abcd".to_vec());
        let n1 = g.add_node();
        let n2 = g.add_node();
        g.attach(parent, g.start(), n1);
        let child = g.add_child_arc(single(2), parent);
        g.attach(child, n2, g.end());

        let (cl, cr) = g.split_arc(child, 3).unwrap();
        assert_eq!(g.arc_data(cl), b"abc");
        assert_eq!(g.arc_data(cr), b"d");
        // the parent was split at the same offset
        assert_eq!(g.arc_data(parent), b"abc");
        assert_eq!(g.arc_parent(cl), Some(parent));
        let pr = g.arc_parent(cr).unwrap();
        assert_eq!(g.arc_data(pr), b"d");
        assert!(g.is_parent(pr));
    }

    #[test]
    fn test_split_node_after_preserves_paths() {
        let mut g = GraphArena::new();
        let a = g.add_arc(single(1), b"one".to_vec());
        let b = g.add_arc(single(2), b"two".to_vec());
        g.attach(a, g.start(), g.end());
        g.attach(b, g.start(), g.end());
        let fresh = g.split_node_after(g.start());
        // both arcs now leave the fresh node; an empty carrier joins the pair
        assert_eq!(g.arc_from(a), Some(fresh));
        assert_eq!(g.arc_from(b), Some(fresh));
        let carrier = g.pick_outgoing(g.start(), 1).unwrap();
        assert_eq!(g.arc_len(carrier), 0);
        assert!(g.arc_versions(carrier).contains(2));
        assert_eq!(g.arc_to(carrier), Some(fresh));
    }

    #[test]
    fn test_unlink_parent_passes_data_on() {
        let mut g = GraphArena::new();
        let n1 = g.add_node();
        let n2 = g.add_node();
        let parent = g.add_arc(single(1), b"moved".to_vec());
        g.attach(parent, g.start(), n1);
        let c1 = g.add_child_arc(single(2), parent);
        g.attach(c1, n2, g.end());
        let c2 = g.add_child_arc(single(3), parent);
        g.attach(c2, n2, g.end());

        g.unlink_arc(parent);
        assert_eq!(g.arc_data(c1), b"moved");
        assert!(g.arc_parent(c1).is_none());
        assert_eq!(g.arc_parent(c2), Some(c1));
        assert!(g.is_parent(c1));
    }
}
