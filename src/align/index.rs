//! Suffix index over one unaligned text.
//!
//! A suffix automaton of the special arc's bytes. Graph text is streamed
//! through a `Cursor`; at every step the cursor names the longest suffix of
//! the streamed text that occurs in the indexed text, and the automaton
//! answers whether that substring is unique (occurs exactly once) and where
//! its first occurrence starts. Unique hits are the raw material of maximal
//! unique matches.
//!
//! Construction is online and O(n) in states; transitions are per-state
//! byte maps since version texts are arbitrary bytes.

use std::collections::HashMap;

const NO_STATE: u32 = u32::MAX;

#[derive(Debug)]
struct State {
    /// Length of the longest substring this state represents.
    len: u32,
    /// Suffix link.
    link: u32,
    next: HashMap<u8, u32>,
    /// Number of occurrences of this state's substrings in the text.
    occ: u32,
    /// End position (0-based, inclusive) of the first occurrence.
    first_end: u32,
}

/// A streaming match position inside the index.
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    state: u32,
    len: u32,
}

impl Cursor {
    /// Length of the currently matched substring.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Suffix automaton over the bytes of one unaligned text.
#[derive(Debug)]
pub struct AlignmentIndex {
    states: Vec<State>,
}

impl AlignmentIndex {
    pub fn new(text: &[u8]) -> Self {
        let mut index = AlignmentIndex {
            states: vec![State {
                len: 0,
                link: NO_STATE,
                next: HashMap::new(),
                occ: 0,
                first_end: NO_STATE,
            }],
        };
        let mut last = 0u32;
        for (i, &byte) in text.iter().enumerate() {
            last = index.extend(last, byte, i as u32);
        }
        index.propagate();
        index
    }

    /// Appends one byte to the automaton (standard online construction).
    fn extend(&mut self, last: u32, byte: u8, pos: u32) -> u32 {
        let cur = self.push(State {
            len: self.states[last as usize].len + 1,
            link: NO_STATE,
            next: HashMap::new(),
            occ: 1,
            first_end: pos,
        });
        let mut p = last;
        while p != NO_STATE && !self.states[p as usize].next.contains_key(&byte) {
            self.states[p as usize].next.insert(byte, cur);
            p = self.states[p as usize].link;
        }
        if p == NO_STATE {
            self.states[cur as usize].link = 0;
            return cur;
        }
        let q = self.states[p as usize].next[&byte];
        if self.states[q as usize].len == self.states[p as usize].len + 1 {
            self.states[cur as usize].link = q;
            return cur;
        }
        // clone q for the shorter extension
        let clone = self.push(State {
            len: self.states[p as usize].len + 1,
            link: self.states[q as usize].link,
            next: self.states[q as usize].next.clone(),
            occ: 0,
            first_end: self.states[q as usize].first_end,
        });
        while p != NO_STATE && self.states[p as usize].next.get(&byte) == Some(&q) {
            self.states[p as usize].next.insert(byte, clone);
            p = self.states[p as usize].link;
        }
        self.states[q as usize].link = clone;
        self.states[cur as usize].link = clone;
        cur
    }

    /// Accumulates occurrence counts and first-occurrence positions up the
    /// suffix-link tree, longest states first.
    fn propagate(&mut self) {
        let mut order: Vec<u32> = (1..self.states.len() as u32).collect();
        order.sort_by(|a, b| {
            self.states[*b as usize]
                .len
                .cmp(&self.states[*a as usize].len)
        });
        for s in order {
            let link = self.states[s as usize].link;
            if link == NO_STATE || link == 0 {
                continue;
            }
            let occ = self.states[s as usize].occ;
            let first = self.states[s as usize].first_end;
            let parent = &mut self.states[link as usize];
            parent.occ += occ;
            if first < parent.first_end {
                parent.first_end = first;
            }
        }
    }

    fn push(&mut self, state: State) -> u32 {
        self.states.push(state);
        (self.states.len() - 1) as u32
    }

    /// A cursor at the empty match.
    pub fn cursor(&self) -> Cursor {
        Cursor { state: 0, len: 0 }
    }

    /// Feeds one byte, shrinking the match along suffix links as needed.
    /// Returns true if the match grew (the new byte is part of a match).
    pub fn advance(&self, cursor: &mut Cursor, byte: u8) -> bool {
        loop {
            if let Some(&to) = self.states[cursor.state as usize].next.get(&byte) {
                cursor.state = to;
                cursor.len += 1;
                return true;
            }
            if cursor.state == 0 {
                cursor.len = 0;
                return false;
            }
            cursor.state = self.states[cursor.state as usize].link;
            cursor.len = self.states[cursor.state as usize].len;
        }
    }

    /// True if the cursor's current substring occurs exactly once in the
    /// indexed text. Meaningless for the empty cursor.
    pub fn is_unique(&self, cursor: &Cursor) -> bool {
        cursor.len > 0 && self.states[cursor.state as usize].occ == 1
    }

    /// Start offset in the indexed text of the first occurrence of the
    /// cursor's current substring.
    pub fn data_offset(&self, cursor: &Cursor) -> usize {
        let end = self.states[cursor.state as usize].first_end as usize;
        end + 1 - cursor.len as usize
    }
}
