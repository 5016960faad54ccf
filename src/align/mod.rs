//! Alignment: finding and applying maximal unique matches.
//!
//! The pipeline for one unaligned arc is: index its text (`AlignmentIndex`),
//! scan candidate graph regions for the best maximal unique match
//! (`MatchFinder`), then queue, verify and apply matches until none remain
//! (`Merger`). Whatever text no match covers stays on special arcs for the
//! caller to adopt as unique.

mod index;
mod merger;
mod mum;

pub use index::{AlignmentIndex, Cursor};
pub use merger::Merger;
pub use mum::{MatchFinder, Mum, Orientation};
