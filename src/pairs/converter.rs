//! Conversion between the pairs list and the variant graph.
//!
//! `create` replays the ordered pairs list into arena arcs, merging version
//! attach points into join nodes as version sets meet, and resolves
//! transposition ids once the whole list is read. `serialise` is the
//! inverse: a breadth-first walk that emits a node's outgoing arcs only
//! after every incoming arc has been emitted, which keeps the list
//! topologically ordered so `create` can replay it.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::graph::{ArcId, GraphArena, NodeId};
use crate::observability::{Event, Logger};
use crate::version_set::VersionSet;

use super::{Pair, PairError, PairKind, PairResult};

/// Bidirectional mapping between a graph and its flat pairs form.
pub struct PairGraphConverter;

impl PairGraphConverter {
    /// Rebuilds a graph from an ordered pairs list.
    pub fn create(pairs: &[Pair]) -> PairResult<GraphArena> {
        let mut g = GraphArena::new();
        let max_version = pairs
            .iter()
            .flat_map(|p| p.versions().iter())
            .max()
            .unwrap_or(0);
        // where each version's path currently ends
        let mut attach: Vec<NodeId> = vec![g.start(); max_version as usize + 1];
        let mut seen = VersionSet::new();
        let mut parents: HashMap<u32, ArcId> = HashMap::new();
        let mut fixups: Vec<(ArcId, u32)> = Vec::new();

        for pair in pairs {
            let versions = pair.versions();
            if versions.is_empty() {
                return Err(PairError::corrupt("pair with an empty version set"));
            }
            if versions.contains(0) {
                // bit 0 is the reserved hint marker
                return Err(PairError::corrupt("hint pairs are not supported"));
            }

            // all of this pair's versions join here; fold their attach
            // points into one node, never folding away the start sentinel
            let mut target: Option<NodeId> = None;
            for v in versions.iter() {
                let n = attach[v as usize];
                match target {
                    None => target = Some(n),
                    Some(t) if t == n => {}
                    Some(t) => {
                        let (keep, fold) = if n == g.start() { (n, t) } else { (t, n) };
                        g.merge_nodes(keep, fold);
                        for slot in attach.iter_mut() {
                            if *slot == fold {
                                *slot = keep;
                            }
                        }
                        target = Some(keep);
                    }
                }
            }
            let target = match target {
                Some(t) => t,
                None => return Err(PairError::corrupt("pair with an empty version set")),
            };

            let arc = match pair.kind() {
                PairKind::Ordinary { data } => g.add_arc(versions.clone(), data.clone()),
                PairKind::Parent { data, id } => {
                    let a = g.add_arc(versions.clone(), data.clone());
                    if parents.insert(*id, a).is_some() {
                        return Err(PairError::corrupt(format!("duplicate parent id {}", id)));
                    }
                    a
                }
                // the parent may appear later in the list; wire a data-less
                // placeholder now and resolve it after the loop
                PairKind::Child { parent } => {
                    let a = g.add_arc(versions.clone(), Vec::new());
                    fixups.push((a, *parent));
                    a
                }
            };
            let to = g.add_node();
            g.attach(arc, target, to);
            for v in versions.iter() {
                attach[v as usize] = to;
            }
            seen.union_with(versions);
        }

        for (arc, id) in fixups {
            let parent = *parents
                .get(&id)
                .ok_or(PairError::OrphanedTransposition { id })?;
            g.make_child(arc, parent);
        }

        // every version's final attach point is the end sentinel
        let end = g.end();
        for v in seen.iter() {
            let n = attach[v as usize];
            if n != end {
                g.merge_nodes(end, n);
                for slot in attach.iter_mut() {
                    if *slot == n {
                        *slot = end;
                    }
                }
            }
        }

        Logger::trace(
            Event::GraphCreated.as_str(),
            &[("pairs", &pairs.len().to_string())],
        );
        Ok(g)
    }

    /// Flattens a graph into an ordered pairs list. Fails if the graph still
    /// holds unaligned text or a transposition child whose parent the walk
    /// never reaches.
    pub fn serialise(g: &GraphArena) -> PairResult<Vec<Pair>> {
        let mut pairs = Vec::new();
        let mut ids: HashMap<ArcId, u32> = HashMap::new();
        let mut next_id = 0u32;
        let mut emitted_parents: HashSet<ArcId> = HashSet::new();
        let mut emitted_in: HashMap<NodeId, usize> = HashMap::new();
        let mut queued: HashSet<NodeId> = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(g.start());
        queued.insert(g.start());

        while let Some(node) = queue.pop_front() {
            for &a in g.outgoing(node) {
                if g.is_special(a) {
                    return Err(PairError::corrupt("unaligned text cannot be serialized"));
                }
                let pair = if g.is_parent(a) {
                    let id = assign_id(&mut ids, &mut next_id, a);
                    emitted_parents.insert(a);
                    Pair::new(
                        g.arc_versions(a).clone(),
                        PairKind::Parent {
                            data: g.arc_data(a).to_vec(),
                            id,
                        },
                    )
                } else if let Some(parent) = g.arc_parent(a) {
                    let id = assign_id(&mut ids, &mut next_id, parent);
                    Pair::new(g.arc_versions(a).clone(), PairKind::Child { parent: id })
                } else {
                    Pair::ordinary(g.arc_versions(a).clone(), g.arc_data(a).to_vec())
                };
                pairs.push(pair);

                let to = g
                    .arc_to(a)
                    .ok_or_else(|| PairError::corrupt("attached arc without destination"))?;
                let emitted = emitted_in.entry(to).or_insert(0);
                *emitted += 1;
                if *emitted == g.incoming(to).len() && queued.insert(to) {
                    queue.push_back(to);
                }
            }
        }

        for (arc, id) in &ids {
            if !emitted_parents.contains(arc) {
                return Err(PairError::OrphanedTransposition { id: *id });
            }
        }

        Logger::trace(
            Event::PairsSerialised.as_str(),
            &[("pairs", &pairs.len().to_string())],
        );
        Ok(pairs)
    }
}

fn assign_id(ids: &mut HashMap<ArcId, u32>, next: &mut u32, arc: ArcId) -> u32 {
    *ids.entry(arc).or_insert_with(|| {
        *next += 1;
        *next
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Subgraph;
    use crate::version_set::VersionSet;

    fn both() -> VersionSet {
        let mut set = VersionSet::single(1);
        set.insert(2);
        set
    }

    /// AB -> (C | X) -> DE over versions 1 and 2.
    fn forked() -> GraphArena {
        let mut g = GraphArena::new();
        let n1 = g.add_node();
        let n2 = g.add_node();
        let ab = g.add_arc(both(), b"AB".to_vec());
        let c = g.add_arc(VersionSet::single(1), b"C".to_vec());
        let x = g.add_arc(VersionSet::single(2), b"X".to_vec());
        let de = g.add_arc(both(), b"DE".to_vec());
        g.attach(ab, g.start(), n1);
        g.attach(c, n1, n2);
        g.attach(x, n1, n2);
        g.attach(de, n2, g.end());
        g
    }

    fn text(g: &GraphArena, v: u16) -> Vec<u8> {
        Subgraph::whole(g, VersionSet::new())
            .version_text(g, v)
            .unwrap()
    }

    #[test]
    fn test_serialise_is_topological() {
        let pairs = PairGraphConverter::serialise(&forked()).unwrap();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0].data(), Some(&b"AB"[..]));
        assert_eq!(pairs[3].data(), Some(&b"DE"[..]));
    }

    #[test]
    fn test_round_trip_preserves_version_texts() {
        let g = forked();
        let pairs = PairGraphConverter::serialise(&g).unwrap();
        let g2 = PairGraphConverter::create(&pairs).unwrap();
        assert_eq!(text(&g2, 1), b"ABCDE");
        assert_eq!(text(&g2, 2), b"ABXDE");
        Subgraph::whole(&g2, both()).verify(&g2).unwrap();
    }

    #[test]
    fn test_round_trip_preserves_transpositions() {
        // version 1: PREFIXTEXT zz; version 2 transposes PREFIXTEXT later
        let mut g = GraphArena::new();
        let mid = g.add_node();
        let parent = g.add_arc(VersionSet::single(1), b"PREFIXTEXT".to_vec());
        let lead = g.add_arc(VersionSet::single(2), Vec::new());
        let tail = g.add_arc(VersionSet::single(1), b"zz".to_vec());
        g.attach(parent, g.start(), mid);
        g.attach(lead, g.start(), mid);
        g.attach(tail, mid, g.end());
        let child = g.add_child_arc(VersionSet::single(2), parent);
        g.attach(child, mid, g.end());

        let pairs = PairGraphConverter::serialise(&g).unwrap();
        let parent_pair = pairs.iter().find(|p| p.is_parent()).unwrap();
        let child_pair = pairs.iter().find(|p| p.is_child()).unwrap();
        assert_eq!(child_pair.parent_id(), parent_pair.id());

        let g2 = PairGraphConverter::create(&pairs).unwrap();
        assert_eq!(text(&g2, 1), b"PREFIXTEXTzz");
        assert_eq!(text(&g2, 2), b"PREFIXTEXT");
    }

    #[test]
    fn test_create_rejects_orphaned_child() {
        let pairs = vec![
            Pair::ordinary(VersionSet::single(1), b"ab".to_vec()),
            Pair::new(VersionSet::single(2), PairKind::Child { parent: 9 }),
        ];
        let err = PairGraphConverter::create(&pairs).unwrap_err();
        assert!(matches!(err, PairError::OrphanedTransposition { id: 9 }));
    }

    #[test]
    fn test_create_rejects_hint_pairs() {
        let pairs = vec![Pair::ordinary(VersionSet::single(0), b"h".to_vec())];
        assert!(matches!(
            PairGraphConverter::create(&pairs).unwrap_err(),
            PairError::Corrupt(_)
        ));
    }

    #[test]
    fn test_serialise_rejects_unaligned_text() {
        let mut g = GraphArena::new();
        let mut sub = Subgraph::whole(&g, VersionSet::new());
        sub.add_special_arc(&mut g, b"pending".to_vec(), VersionSet::single(1), 0);
        assert!(PairGraphConverter::serialise(&g).is_err());
    }

    #[test]
    fn test_empty_round_trip() {
        let pairs = PairGraphConverter::serialise(&GraphArena::new()).unwrap();
        assert!(pairs.is_empty());
        PairGraphConverter::create(&pairs).unwrap();
    }
}
