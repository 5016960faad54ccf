//! Merge driver: queue, verify and apply matches.
//!
//! Matches are held in a priority queue ordered by length (then direct over
//! transposed, then first-found). Because applying one match mutates the
//! graph, a queued match may be stale by the time it surfaces; each popped
//! match is therefore re-verified byte-for-byte against the current graph
//! and recomputed from scratch if the check fails. Applying a match splits
//! the unaligned text in two residues, each of which is searched and queued
//! in turn, until no text aligns any more.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::{ArcId, GraphArena, GraphError, GraphResult, NodeId, Subgraph};
use crate::observability::{Event, Logger};
use crate::version_set::VersionSet;

use super::mum::{MatchFinder, Mum, Orientation};

/// One queued match, pinned to the subgraph it was found in.
struct Pending {
    mum: Mum,
    sub: Subgraph,
    serial: u64,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    /// Longest first; a direct match outranks a transposed one of the same
    /// length; earlier finds outrank later ones.
    fn cmp(&self, other: &Self) -> Ordering {
        self.mum
            .len
            .cmp(&other.mum.len)
            .then_with(|| self.mum.is_direct().cmp(&other.mum.is_direct()))
            .then_with(|| other.serial.cmp(&self.serial))
    }
}

/// Drives the merge of unaligned arcs into the variant graph.
pub struct Merger {
    direct_only: bool,
}

impl Merger {
    pub fn new(direct_only: bool) -> Self {
        Merger { direct_only }
    }

    /// Merges one unaligned arc into `sub` as far as matches allow. Text
    /// that aligns nowhere stays on special arcs; the caller adopts those
    /// as unique afterwards.
    pub fn merge_special(
        &self,
        g: &mut GraphArena,
        sub: &Subgraph,
        special: ArcId,
    ) -> GraphResult<()> {
        Logger::trace(
            Event::MergeStart.as_str(),
            &[("bytes", &g.arc_len(special).to_string())],
        );
        let mut heap = BinaryHeap::new();
        let mut serial = 0u64;
        if let Some(mum) = MatchFinder::best(g, sub, special, self.direct_only)? {
            heap.push(Pending {
                mum,
                sub: sub.clone(),
                serial,
            });
            serial += 1;
        }

        let mut applied = 0usize;
        while let Some(pending) = heap.pop() {
            if !self.still_valid(g, &pending)? {
                match MatchFinder::best(g, &pending.sub, pending.mum.special, self.direct_only)? {
                    Some(mum) => {
                        Logger::trace(
                            Event::MumRecomputed.as_str(),
                            &[("len", &mum.len.to_string())],
                        );
                        heap.push(Pending {
                            mum,
                            sub: pending.sub,
                            serial,
                        });
                        serial += 1;
                    }
                    None => Logger::trace(Event::MumDropped.as_str(), &[]),
                }
                continue;
            }

            Logger::trace(
                Event::MumApplied.as_str(),
                &[
                    ("len", &pending.mum.len.to_string()),
                    ("orientation", orientation_str(pending.mum.orientation)),
                    ("version", &pending.mum.version.to_string()),
                ],
            );
            applied += 1;
            let residues = match pending.mum.orientation {
                Orientation::Direct => self.apply_direct(g, &pending.mum, &pending.sub)?,
                Orientation::TransposedLeft | Orientation::TransposedRight => {
                    self.apply_transposed(g, &pending.mum, &pending.sub)?
                }
            };
            for (residue_sub, residue_arc) in residues {
                if let Some(mum) = MatchFinder::best(g, &residue_sub, residue_arc, self.direct_only)?
                {
                    heap.push(Pending {
                        mum,
                        sub: residue_sub,
                        serial,
                    });
                    serial += 1;
                }
            }
        }
        Logger::trace(
            Event::MergeComplete.as_str(),
            &[("applied", &applied.to_string())],
        );
        Ok(())
    }

    /// Re-extracts the matched graph bytes and compares them to the
    /// unaligned text. A mismatch is not an error; it means earlier merges
    /// invalidated this match.
    fn still_valid(&self, g: &GraphArena, pending: &Pending) -> GraphResult<bool> {
        let mum = &pending.mum;
        if !g.is_special(mum.special) {
            return Ok(false);
        }
        let stop = match mum.orientation {
            Orientation::Direct => pending.sub.end,
            Orientation::TransposedLeft => pending.sub.start,
            Orientation::TransposedRight => g.end(),
        };
        let extracted = match extract(g, mum.anchor, stop, mum.version, mum.graph_offset, mum.len)?
        {
            Some(bytes) => bytes,
            None => return Ok(false),
        };
        let data = g.arc_data(mum.special);
        if mum.data_offset + mum.len > data.len() {
            return Ok(false);
        }
        Ok(extracted == data[mum.data_offset..mum.data_offset + mum.len])
    }

    /// Writes a direct match into the graph: the matched arcs gain the
    /// unaligned versions; left and right residues become fresh special
    /// arcs bracketing the match. Returns the residues for re-queueing.
    fn apply_direct(
        &self,
        g: &mut GraphArena,
        mum: &Mum,
        sub: &Subgraph,
    ) -> GraphResult<Vec<(Subgraph, ArcId)>> {
        let spec_versions = g.arc_versions(mum.special).clone();
        let data = g.arc_data(mum.special).to_vec();
        let spec_pos = g
            .special_position(mum.special)
            .ok_or_else(|| GraphError::corruption("merge target is not a special arc"))?;
        let right_off = mum.data_offset + mum.len;
        g.detach(mum.special);

        let witness = mum.version;
        let mut n1 = sub.split_arc_at(g, sub.start, witness, 0, mum.graph_offset, true)?;
        if n1 == sub.start && mum.data_offset > 0 {
            // a left residue needs its own arc; give it a distinct far node
            n1 = g.split_node_after(sub.start);
        }
        let mut n2 = sub.split_arc_at(
            g,
            n1,
            witness,
            mum.graph_offset,
            mum.graph_offset + mum.len,
            false,
        )?;
        if n2 == sub.end && right_off < data.len() {
            n2 = g.split_node_before(sub.end);
        }

        // the matched span now adopts the unaligned versions
        let mut n = n1;
        let mut steps = 0usize;
        while n != n2 {
            let a = g.pick_outgoing(n, witness).ok_or_else(|| {
                GraphError::corruption(format!("witness {} lost its path mid-merge", witness))
            })?;
            g.arc_versions_mut(a).union_with(&spec_versions);
            n = g
                .arc_to(a)
                .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle on matched span"));
            }
        }

        let mut residues = Vec::new();
        if mum.data_offset > 0 {
            let constraint = boundary_constraint(g, sub, sub.start, n1);
            let mut left = Subgraph::new(sub.start, n1, constraint, sub.position);
            let arc = left.add_special_arc(
                g,
                data[..mum.data_offset].to_vec(),
                spec_versions.clone(),
                spec_pos,
            );
            residues.push((left, arc));
        } else if n1 != sub.start {
            // no left residue, but the merged path must reach the match
            let bridge = g.add_arc(spec_versions.clone(), Vec::new());
            g.attach(bridge, sub.start, n1);
        }
        if right_off < data.len() {
            let constraint = boundary_constraint(g, sub, n2, sub.end);
            let mut right = Subgraph::new(n2, sub.end, constraint, sub.position + right_off);
            let arc = right.add_special_arc(
                g,
                data[right_off..].to_vec(),
                spec_versions.clone(),
                spec_pos + right_off,
            );
            residues.push((right, arc));
        } else if n2 != sub.end {
            let bridge = g.add_arc(spec_versions, Vec::new());
            g.attach(bridge, n2, sub.end);
        }
        Ok(residues)
    }

    /// Writes a transposed match: the matched arcs stay where they are and
    /// become parents; a chain of child arcs inside the subgraph carries the
    /// unaligned versions over the shared text.
    fn apply_transposed(
        &self,
        g: &mut GraphArena,
        mum: &Mum,
        sub: &Subgraph,
    ) -> GraphResult<Vec<(Subgraph, ArcId)>> {
        let spec_versions = g.arc_versions(mum.special).clone();
        let data = g.arc_data(mum.special).to_vec();
        let spec_pos = g
            .special_position(mum.special)
            .ok_or_else(|| GraphError::corruption("merge target is not a special arc"))?;
        let right_off = mum.data_offset + mum.len;
        g.detach(mum.special);

        let witness = mum.version;
        let stop = match mum.orientation {
            Orientation::TransposedLeft => sub.start,
            Orientation::TransposedRight => g.end(),
            Orientation::Direct => {
                return Err(GraphError::corruption("direct match routed as transposed"))
            }
        };
        let region = Subgraph::new(mum.anchor, stop, VersionSet::new(), 0);
        let m1 = region.split_arc_at(g, region.start, witness, 0, mum.graph_offset, true)?;
        let m2 = region.split_arc_at(
            g,
            m1,
            witness,
            mum.graph_offset,
            mum.graph_offset + mum.len,
            false,
        )?;

        // collect the data-owning arcs of the matched span
        let mut parents = Vec::new();
        let mut n = m1;
        let mut steps = 0usize;
        while n != m2 {
            let a = g.pick_outgoing(n, witness).ok_or_else(|| {
                GraphError::corruption(format!("witness {} lost its path mid-merge", witness))
            })?;
            if g.arc_len(a) > 0 {
                // a matched child re-parents to its data owner; children
                // never nest
                parents.push(g.arc_parent(a).unwrap_or(a));
            }
            n = g
                .arc_to(a)
                .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle on matched span"));
            }
        }
        if parents.is_empty() {
            return Err(GraphError::corruption("transposed match spans no text"));
        }

        let p = if mum.data_offset == 0 {
            sub.start
        } else {
            g.add_node()
        };
        let q = if right_off == data.len() {
            sub.end
        } else {
            g.add_node()
        };
        let mut cur = p;
        for (i, parent) in parents.iter().enumerate() {
            let next = if i + 1 == parents.len() { q } else { g.add_node() };
            let child = g.add_child_arc(spec_versions.clone(), *parent);
            g.attach(child, cur, next);
            cur = next;
        }

        let mut residues = Vec::new();
        if mum.data_offset > 0 {
            let constraint = boundary_constraint(g, sub, sub.start, p);
            let mut left = Subgraph::new(sub.start, p, constraint, sub.position);
            let arc = left.add_special_arc(
                g,
                data[..mum.data_offset].to_vec(),
                spec_versions.clone(),
                spec_pos,
            );
            residues.push((left, arc));
        }
        if right_off < data.len() {
            let constraint = boundary_constraint(g, sub, q, sub.end);
            let mut right = Subgraph::new(q, sub.end, constraint, sub.position + right_off);
            let arc = right.add_special_arc(
                g,
                data[right_off..].to_vec(),
                spec_versions,
                spec_pos + right_off,
            );
            residues.push((right, arc));
        }
        Ok(residues)
    }
}

/// Merged versions that traverse both boundary nodes of a residue window.
fn boundary_constraint(g: &GraphArena, sub: &Subgraph, start: NodeId, end: NodeId) -> VersionSet {
    let mut constraint = sub.constraint.clone();
    constraint.intersect_with(&g.out_versions(start));
    constraint.intersect_with(&g.in_versions(end));
    constraint
}

/// Walks `version` from `from` toward `stop`, skips `skip` bytes and returns
/// the next `len`. `None` when the path runs out or crosses unaligned text.
fn extract(
    g: &GraphArena,
    from: NodeId,
    stop: NodeId,
    version: u16,
    skip: usize,
    len: usize,
) -> GraphResult<Option<Vec<u8>>> {
    let mut bytes = Vec::new();
    let mut n = from;
    let mut steps = 0usize;
    while bytes.len() < skip + len {
        if n == stop {
            return Ok(None);
        }
        let a = match g.pick_outgoing(n, version) {
            Some(a) => a,
            None => return Ok(None),
        };
        if g.is_special(a) {
            return Ok(None);
        }
        bytes.extend_from_slice(g.arc_data(a));
        n = g
            .arc_to(a)
            .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
        steps += 1;
        if steps > g.arc_count() {
            return Err(GraphError::corruption("cycle while checking a match"));
        }
    }
    Ok(Some(bytes[skip..skip + len].to_vec()))
}

fn orientation_str(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Direct => "direct",
        Orientation::TransposedLeft => "transposed-left",
        Orientation::TransposedRight => "transposed-right",
    }
}
