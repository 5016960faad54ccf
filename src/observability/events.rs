//! Observable events in the merge engine.
//!
//! Events are explicit and typed; each maps to one log line. The string
//! forms are stable identifiers for downstream log consumers.

use std::fmt;

/// Observable events during document construction and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Document lifecycle
    /// A new version was added to the document
    VersionAdded,
    /// An existing version was revised in place
    VersionRevised,
    /// A version was removed and the rest renumbered
    VersionRemoved,

    // Merge engine
    /// A merge session over one unaligned arc began
    MergeStart,
    /// The merge session drained its queue
    MergeComplete,
    /// A verified match was written into the graph
    MumApplied,
    /// A stale match was recomputed against the mutated graph
    MumRecomputed,
    /// A stale match found no replacement and was dropped
    MumDropped,
    /// Leftover unaligned text was adopted as unique
    SpecialAdopted,

    // Serialization
    /// The graph was flattened into a pair list
    PairsSerialised,
    /// A pair list was expanded back into a graph
    GraphCreated,
    /// Structural verification failed (ERROR)
    GraphCorrupt,
}

impl Event {
    /// Returns the stable string identifier for this event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::VersionAdded => "VERSION_ADDED",
            Event::VersionRevised => "VERSION_REVISED",
            Event::VersionRemoved => "VERSION_REMOVED",
            Event::MergeStart => "MERGE_START",
            Event::MergeComplete => "MERGE_COMPLETE",
            Event::MumApplied => "MUM_APPLIED",
            Event::MumRecomputed => "MUM_RECOMPUTED",
            Event::MumDropped => "MUM_DROPPED",
            Event::SpecialAdopted => "SPECIAL_ADOPTED",
            Event::PairsSerialised => "PAIRS_SERIALISED",
            Event::GraphCreated => "GRAPH_CREATED",
            Event::GraphCorrupt => "GRAPH_CORRUPT",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
