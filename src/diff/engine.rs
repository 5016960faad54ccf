//! Diagonal edit-distance search.
//!
//! The matrix of base text B (x axis) against new text A (y axis) is held
//! economically as a frontier of active diagonals: for each diagonal
//! k = x - y the furthest x reachable at the current edit distance. Each
//! round raises the distance bound by one, advances every diagonal through
//! an insertion, deletion or exchange step, then greedily extends along
//! matching runs. The search ends when the goal diagonal reaches the
//! bottom-right corner.
//!
//! Tie-breaking is fixed (exchange, then deletion, then insertion, each only
//! on a strict improvement), so identical inputs always yield identical
//! diffs.

use super::{Diff, DiffKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Match,
    Insert,
    Delete,
    Exchange,
}

#[derive(Debug, Clone, Copy)]
struct Step {
    op: Op,
    len: usize,
    prev: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Front {
    x: usize,
    step: Option<usize>,
}

/// Diagonal-frontier alignment of a new text against a base text.
pub struct DiffMatrix;

impl DiffMatrix {
    /// Maximal changed ranges only, inserts and deletes coalesced. This is
    /// the mode that drives revision merges.
    pub fn basic_diffs(new_text: &[u8], base: &[u8]) -> Vec<Diff> {
        let ops = Search::new(new_text, base).run();
        emit_basic(&ops)
    }

    /// Explicit insert, delete and exchange operations, for inspection.
    pub fn detailed_diffs(new_text: &[u8], base: &[u8]) -> Vec<Diff> {
        let ops = Search::new(new_text, base).run();
        emit_detailed(&ops)
    }
}

struct Search<'t> {
    a: &'t [u8],
    b: &'t [u8],
    steps: Vec<Step>,
}

impl<'t> Search<'t> {
    fn new(a: &'t [u8], b: &'t [u8]) -> Self {
        Search {
            a,
            b,
            steps: Vec::new(),
        }
    }

    /// Runs the search and returns the op sequence from source to sink.
    fn run(mut self) -> Vec<(Op, usize)> {
        let (al, bl) = (self.a.len(), self.b.len());
        let goal_k = bl as isize - al as isize;
        let width = al + bl + 1;
        let mut prev: Vec<Option<Front>> = vec![None; width];
        let mut cur: Vec<Option<Front>> = vec![None; width];

        // distance 0: slide from the origin
        let (x0, s0) = self.slide(0, 0, None);
        prev[al] = Some(Front { x: x0, step: s0 });
        if x0 == bl && goal_k == 0 {
            return self.backtrack(s0);
        }

        for d in 1..=(al + bl) as isize {
            let lo = (-(al as isize)).max(-d);
            let hi = (bl as isize).min(d);
            for slot in cur.iter_mut() {
                *slot = None;
            }
            for k in lo..=hi {
                let mut best: Option<(usize, Option<usize>, Op)> = None;

                // exchange: consume one byte on both sides
                if let Some(f) = self.front(&prev, k, al) {
                    let y = f.x as isize - k;
                    if f.x < bl && (y as usize) < al {
                        best = Some((f.x + 1, f.step, Op::Exchange));
                    }
                }
                // deletion: consume one byte of the base only
                if let Some(f) = self.front(&prev, k - 1, al) {
                    if f.x < bl {
                        let cand = f.x + 1;
                        if best.map_or(true, |(bx, _, _)| cand > bx) {
                            best = Some((cand, f.step, Op::Delete));
                        }
                    }
                }
                // insertion: consume one byte of the new text only
                if let Some(f) = self.front(&prev, k + 1, al) {
                    let y = f.x as isize - (k + 1);
                    if y >= 0 && (y as usize) < al {
                        let cand = f.x;
                        if best.map_or(true, |(bx, _, _)| cand > bx) {
                            best = Some((cand, f.step, Op::Insert));
                        }
                    }
                }

                if let Some((x, prev_step, op)) = best {
                    let y = x as isize - k;
                    debug_assert!(y >= 0 && y as usize <= al && x <= bl);
                    let step = self.push(op, 1, prev_step);
                    let (x, step) = self.slide(x, y as usize, Some(step));
                    cur[(k + al as isize) as usize] = Some(Front { x, step });
                }
            }
            if let Some(f) = self.front(&cur, goal_k, al) {
                if f.x == bl {
                    return self.backtrack(f.step);
                }
            }
            std::mem::swap(&mut prev, &mut cur);
        }
        unreachable!("edit distance cannot exceed |A| + |B|")
    }

    fn front(&self, row: &[Option<Front>], k: isize, al: usize) -> Option<Front> {
        let idx = k + al as isize;
        if idx < 0 || idx as usize >= row.len() {
            return None;
        }
        row[idx as usize]
    }

    /// Greedy extension along a matching run.
    fn slide(&mut self, mut x: usize, mut y: usize, prev: Option<usize>) -> (usize, Option<usize>) {
        let mut run = 0usize;
        while x < self.b.len() && y < self.a.len() && self.b[x] == self.a[y] {
            x += 1;
            y += 1;
            run += 1;
        }
        if run > 0 {
            let step = self.push(Op::Match, run, prev);
            (x, Some(step))
        } else {
            (x, prev)
        }
    }

    fn push(&mut self, op: Op, len: usize, prev: Option<usize>) -> usize {
        self.steps.push(Step { op, len, prev });
        self.steps.len() - 1
    }

    /// Unwinds the step chain into source-to-sink order, coalescing
    /// consecutive ops of the same kind.
    fn backtrack(&self, end: Option<usize>) -> Vec<(Op, usize)> {
        let mut ops = Vec::new();
        let mut cursor = end;
        while let Some(i) = cursor {
            let step = self.steps[i];
            ops.push((step.op, step.len));
            cursor = step.prev;
        }
        ops.reverse();
        let mut merged: Vec<(Op, usize)> = Vec::new();
        for (op, len) in ops {
            match merged.last_mut() {
                Some((last, run)) if *last == op => *run += len,
                _ => merged.push((op, len)),
            }
        }
        merged
    }
}

/// Basic mode: every maximal run of non-match ops becomes one changed range.
fn emit_basic(ops: &[(Op, usize)]) -> Vec<Diff> {
    let mut diffs = Vec::new();
    let (mut x, mut y) = (0usize, 0usize);
    let mut open: Option<(usize, usize)> = None;
    for &(op, len) in ops {
        match op {
            Op::Match => {
                if let Some((ro, rn)) = open.take() {
                    diffs.push(Diff::changed(ro, rn, x - ro, y - rn));
                }
                x += len;
                y += len;
            }
            Op::Delete => {
                open.get_or_insert((x, y));
                x += len;
            }
            Op::Insert => {
                open.get_or_insert((x, y));
                y += len;
            }
            Op::Exchange => {
                open.get_or_insert((x, y));
                x += len;
                y += len;
            }
        }
    }
    if let Some((ro, rn)) = open {
        diffs.push(Diff::changed(ro, rn, x - ro, y - rn));
    }
    diffs
}

/// Detailed mode: one diff per run, typed by operation.
fn emit_detailed(ops: &[(Op, usize)]) -> Vec<Diff> {
    let mut diffs = Vec::new();
    let (mut x, mut y) = (0usize, 0usize);
    for &(op, len) in ops {
        match op {
            Op::Match => {
                x += len;
                y += len;
            }
            Op::Delete => {
                diffs.push(Diff::new(x, y, len, 0, DiffKind::Deleted));
                x += len;
            }
            Op::Insert => {
                diffs.push(Diff::new(x, y, 0, len, DiffKind::Inserted));
                y += len;
            }
            Op::Exchange => {
                diffs.push(Diff::new(x, y, len, len, DiffKind::Exchanged));
                x += len;
                y += len;
            }
        }
    }
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays basic diffs against the base; must reconstruct the new text.
    fn replay(new_text: &[u8], base: &[u8]) -> Vec<u8> {
        let diffs = DiffMatrix::basic_diffs(new_text, base);
        let mut out = Vec::new();
        let mut pos = 0usize;
        for d in &diffs {
            out.extend_from_slice(&base[pos..d.old_off()]);
            out.extend_from_slice(&new_text[d.new_off()..d.new_end()]);
            pos = d.old_end();
        }
        out.extend_from_slice(&base[pos..]);
        out
    }

    #[test]
    fn test_identical_texts_have_no_diffs() {
        assert!(DiffMatrix::basic_diffs(b"ABCDE", b"ABCDE").is_empty());
        assert!(DiffMatrix::basic_diffs(b"", b"").is_empty());
    }

    #[test]
    fn test_single_exchange() {
        let diffs = DiffMatrix::basic_diffs(b"ABXDE", b"ABCDE");
        assert_eq!(diffs.len(), 1);
        let d = diffs[0];
        assert_eq!(d.old_off(), 2);
        assert_eq!(d.old_len(), 1);
        assert_eq!(d.new_off(), 2);
        assert_eq!(d.new_len(), 1);
        assert_eq!(d.kind(), DiffKind::Changed);
    }

    #[test]
    fn test_pure_insertion_and_deletion() {
        let ins = DiffMatrix::basic_diffs(b"ABXYCD", b"ABCD");
        assert_eq!(ins.len(), 1);
        assert_eq!(ins[0].old_len(), 0);
        assert_eq!(ins[0].new_len(), 2);

        let del = DiffMatrix::basic_diffs(b"ABCD", b"ABXYCD");
        assert_eq!(del.len(), 1);
        assert_eq!(del[0].old_len(), 2);
        assert_eq!(del[0].new_len(), 0);
    }

    #[test]
    fn test_replay_reconstructs_new_text() {
        let cases: &[(&[u8], &[u8])] = &[
            (b"ABXDE", b"ABCDE"),
            (b"", b"ABC"),
            (b"ABC", b""),
            (b"kitten", b"sitting"),
            (b"the quick brown fox", b"the quick red fox jumped"),
            (b"a\x00b\x01c", b"a\x00c"),
            (b"same", b"same"),
        ];
        for (new_text, base) in cases {
            assert_eq!(&replay(new_text, base), new_text, "case {:?}", new_text);
        }
    }

    #[test]
    fn test_detailed_kinds() {
        let diffs = DiffMatrix::detailed_diffs(b"AXC", b"ABC");
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind(), DiffKind::Exchanged);

        let diffs = DiffMatrix::detailed_diffs(b"AC", b"ABC");
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind(), DiffKind::Deleted);

        let diffs = DiffMatrix::detailed_diffs(b"ABXC", b"ABC");
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind(), DiffKind::Inserted);
    }

    #[test]
    fn test_deterministic_output() {
        let a = DiffMatrix::basic_diffs(b"abcdefghij", b"axcdyfghzj");
        let b = DiffMatrix::basic_diffs(b"abcdefghij", b"axcdyfghzj");
        assert_eq!(a, b);
    }
}
