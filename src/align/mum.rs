//! Maximal unique match search.
//!
//! A match pairs a substring of an unaligned text with an equal substring on
//! some merged version's path, and is unique in the unaligned text. Three
//! regions are searched: the subgraph itself (direct), the stretch of merged
//! text just before it (left transposition) and just after it (right
//! transposition). The longest match wins; a direct match beats a transposed
//! one of equal length, so transpositions only arise when they align strictly
//! more text.

use crate::graph::{ArcId, GraphArena, GraphError, GraphResult, NodeId, Subgraph};

use super::index::AlignmentIndex;

/// Transposed matches must cover at least this many bytes.
const MIN_TRANSPOSE_LEN: usize = 10;

/// A transposed match may sit at most this many times its own length away
/// from the subgraph boundary.
const TRANSPOSE_DISTANCE_FACTOR: usize = 10;

/// Where a match was found relative to its subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Inside the subgraph; merging shares the matched arcs directly.
    Direct,
    /// In merged text before the subgraph start.
    TransposedLeft,
    /// In merged text after the subgraph end.
    TransposedRight,
}

/// One maximal unique match between an unaligned arc and the graph.
#[derive(Debug, Clone, Copy)]
pub struct Mum {
    pub orientation: Orientation,
    /// The merged version whose path carries the matched graph text.
    pub version: u16,
    /// Node the match walk starts from; offsets are relative to it.
    pub anchor: NodeId,
    /// Bytes from the anchor to the match start along the witness path.
    pub graph_offset: usize,
    /// Offset of the matched substring in the unaligned text.
    pub data_offset: usize,
    pub len: usize,
    /// The unaligned arc this match would merge.
    pub special: ArcId,
}

impl Mum {
    #[inline]
    pub fn is_direct(&self) -> bool {
        self.orientation == Orientation::Direct
    }
}

/// Searches the three candidate regions of one subgraph for the best match.
pub struct MatchFinder;

impl MatchFinder {
    /// The best maximal unique match for `special` within `sub`, or `None`
    /// when nothing aligns. The index over the unaligned text is rebuilt per
    /// call: the graph mutates between calls, the text does not, but the
    /// text is short-lived and indexing it is linear.
    pub fn best(
        g: &GraphArena,
        sub: &Subgraph,
        special: ArcId,
        direct_only: bool,
    ) -> GraphResult<Option<Mum>> {
        let data = g.arc_data(special);
        if data.is_empty() {
            return Ok(None);
        }
        let index = AlignmentIndex::new(data);

        let mut best = Self::direct(g, sub, &index, special)?;
        if !direct_only {
            for cand in [
                Self::transposed_left(g, sub, &index, special)?,
                Self::transposed_right(g, sub, &index, special)?,
            ]
            .into_iter()
            .flatten()
            {
                if best.as_ref().map_or(true, |b| cand.len > b.len) {
                    best = Some(cand);
                }
            }
        }
        Ok(best)
    }

    /// Scans every merged version's path through the subgraph. Versions are
    /// visited in ascending order and only a strictly longer match replaces
    /// the current best, so results are deterministic.
    fn direct(
        g: &GraphArena,
        sub: &Subgraph,
        index: &AlignmentIndex,
        special: ArcId,
    ) -> GraphResult<Option<Mum>> {
        let mut best: Option<Mum> = None;
        for v in sub.constraint.iter() {
            let text = sub.version_text(g, v)?;
            let mut cursor = index.cursor();
            for (p, &byte) in text.iter().enumerate() {
                if !index.advance(&mut cursor, byte) || !index.is_unique(&cursor) {
                    continue;
                }
                let len = cursor.len();
                if best.as_ref().map_or(true, |b| len > b.len) {
                    best = Some(Mum {
                        orientation: Orientation::Direct,
                        version: v,
                        anchor: sub.start,
                        graph_offset: p + 1 - len,
                        data_offset: index.data_offset(&cursor),
                        len,
                        special,
                    });
                }
            }
        }
        Ok(best)
    }

    /// Scans merged text leading into the subgraph start.
    fn transposed_left(
        g: &GraphArena,
        sub: &Subgraph,
        index: &AlignmentIndex,
        special: ArcId,
    ) -> GraphResult<Option<Mum>> {
        let mut witnesses = g.in_versions(sub.start);
        witnesses.subtract(g.arc_versions(special));
        let mut best: Option<Mum> = None;
        for v in witnesses.iter() {
            let (anchor, text) = Self::backward_text(g, sub.start, v)?;
            let total = text.len();
            let mut cursor = index.cursor();
            for (p, &byte) in text.iter().enumerate() {
                if !index.advance(&mut cursor, byte) || !index.is_unique(&cursor) {
                    continue;
                }
                let len = cursor.len();
                if len < MIN_TRANSPOSE_LEN {
                    continue;
                }
                // distance from the match end back to the subgraph start
                let distance = total - (p + 1);
                if distance > TRANSPOSE_DISTANCE_FACTOR * len {
                    continue;
                }
                if best.as_ref().map_or(true, |b| len > b.len) {
                    best = Some(Mum {
                        orientation: Orientation::TransposedLeft,
                        version: v,
                        anchor,
                        graph_offset: p + 1 - len,
                        data_offset: index.data_offset(&cursor),
                        len,
                        special,
                    });
                }
            }
        }
        Ok(best)
    }

    /// Scans merged text following the subgraph end.
    fn transposed_right(
        g: &GraphArena,
        sub: &Subgraph,
        index: &AlignmentIndex,
        special: ArcId,
    ) -> GraphResult<Option<Mum>> {
        let mut witnesses = g.out_versions(sub.end);
        witnesses.subtract(g.arc_versions(special));
        let mut best: Option<Mum> = None;
        for v in witnesses.iter() {
            let text = Self::forward_text(g, sub.end, v)?;
            let mut cursor = index.cursor();
            for (p, &byte) in text.iter().enumerate() {
                if !index.advance(&mut cursor, byte) || !index.is_unique(&cursor) {
                    continue;
                }
                let len = cursor.len();
                if len < MIN_TRANSPOSE_LEN {
                    continue;
                }
                // distance from the subgraph end forward to the match start
                let distance = p + 1 - len;
                if distance > TRANSPOSE_DISTANCE_FACTOR * len {
                    continue;
                }
                if best.as_ref().map_or(true, |b| len > b.len) {
                    best = Some(Mum {
                        orientation: Orientation::TransposedRight,
                        version: v,
                        anchor: sub.end,
                        graph_offset: distance,
                        data_offset: index.data_offset(&cursor),
                        len,
                        special,
                    });
                }
            }
        }
        Ok(best)
    }

    /// Walks `version` backward from `node` and returns the furthest-back
    /// node together with the text between it and `node`, in reading order.
    /// Unaligned arcs end the walk: transpositions only match merged text.
    fn backward_text(g: &GraphArena, node: NodeId, version: u16) -> GraphResult<(NodeId, Vec<u8>)> {
        let mut n = node;
        let mut arcs = Vec::new();
        let mut steps = 0usize;
        while let Some(a) = g.pick_incoming(n, version) {
            if g.is_special(a) {
                break;
            }
            arcs.push(a);
            n = g
                .arc_from(a)
                .ok_or_else(|| GraphError::corruption("attached arc without origin"))?;
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle on backward walk"));
            }
        }
        arcs.reverse();
        let mut text = Vec::new();
        for a in arcs {
            text.extend_from_slice(g.arc_data(a));
        }
        Ok((n, text))
    }

    /// Walks `version` forward from `node` to the end of its merged text.
    fn forward_text(g: &GraphArena, node: NodeId, version: u16) -> GraphResult<Vec<u8>> {
        let mut n = node;
        let mut text = Vec::new();
        let mut steps = 0usize;
        while let Some(a) = g.pick_outgoing(n, version) {
            if g.is_special(a) {
                break;
            }
            text.extend_from_slice(g.arc_data(a));
            n = g
                .arc_to(a)
                .ok_or_else(|| GraphError::corruption("attached arc without destination"))?;
            steps += 1;
            if steps > g.arc_count() {
                return Err(GraphError::corruption("cycle on forward walk"));
            }
        }
        Ok(text)
    }
}
