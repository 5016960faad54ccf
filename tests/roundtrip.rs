//! Pairs round-trip invariant tests.
//!
//! The pairs list is the document's canonical form, so the conversion
//! graph -> pairs -> graph must preserve every version's text exactly,
//! transpositions included.
//!
//! Test Categories:
//! 1. Text preservation across conversion
//! 2. Transposition id stability
//! 3. Rejection of malformed pair lists

use varigraph::graph::Subgraph;
use varigraph::pairs::{Pair, PairError, PairGraphConverter, PairKind};
use varigraph::{MultiVersionDocument, VersionEntry, VersionSet};

fn witnesses(texts: &[&[u8]]) -> MultiVersionDocument {
    let mut mvd = MultiVersionDocument::new("round-trip fixture");
    for (i, text) in texts.iter().enumerate() {
        mvd.add_version(VersionEntry::new(format!("w{}", i + 1), "witness"), text)
            .unwrap();
    }
    mvd
}

// =============================================================================
// TEXT PRESERVATION
// =============================================================================

/// Test: every version's text survives graph -> pairs -> graph.
#[test]
fn test_round_trip_preserves_all_versions() {
    let mvd = witnesses(&[
        b"the quick brown fox jumps over the lazy dog",
        b"the quick red fox jumps over the lazy dog",
        b"a quick brown fox leaps over the lazy dog",
    ]);
    let g = PairGraphConverter::create(mvd.pairs()).unwrap();
    let pairs = PairGraphConverter::serialise(&g).unwrap();
    let g2 = PairGraphConverter::create(&pairs).unwrap();
    let sub = Subgraph::whole(&g2, VersionSet::new());
    for v in 1..=3u16 {
        assert_eq!(
            sub.version_text(&g2, v).unwrap(),
            mvd.get_version(v).unwrap(),
            "version {} changed across round trip",
            v
        );
    }
}

/// Test: a second serialization of the same graph is byte-for-byte stable.
#[test]
fn test_serialization_is_deterministic() {
    let mvd = witnesses(&[b"shared prefix ALPHA suffix", b"shared prefix BETA suffix"]);
    let g = PairGraphConverter::create(mvd.pairs()).unwrap();
    let once = PairGraphConverter::serialise(&g).unwrap();
    let twice = PairGraphConverter::serialise(&g).unwrap();
    assert_eq!(once, twice);
}

/// Test: pair order reconstructs texts by plain concatenation per version.
#[test]
fn test_pairs_concatenate_in_reading_order() {
    let mvd = witnesses(&[b"ABCDE", b"ABXDE"]);
    let mut v1 = Vec::new();
    for pair in mvd.pairs() {
        if pair.versions().contains(1) {
            v1.extend_from_slice(pair.data().unwrap());
        }
    }
    assert_eq!(v1, b"ABCDE");
}

// =============================================================================
// TRANSPOSITIONS
// =============================================================================

/// Test: parent/child links survive the round trip and children still
/// resolve to the parent's text.
#[test]
fn test_transposition_ids_round_trip() {
    let pairs = vec![
        Pair::new(
            VersionSet::single(1),
            PairKind::Parent {
                data: b"MOVEDTEXT!".to_vec(),
                id: 1,
            },
        ),
        Pair::ordinary(VersionSet::single(2), b"lead-in ".to_vec()),
        Pair::ordinary(VersionSet::single(1), b" tail".to_vec()),
        Pair::new(VersionSet::single(2), PairKind::Child { parent: 1 }),
    ];
    let g = PairGraphConverter::create(&pairs).unwrap();
    let sub = Subgraph::whole(&g, VersionSet::new());
    assert_eq!(sub.version_text(&g, 1).unwrap(), b"MOVEDTEXT! tail");
    assert_eq!(sub.version_text(&g, 2).unwrap(), b"lead-in MOVEDTEXT!");

    let again = PairGraphConverter::serialise(&g).unwrap();
    let child = again.iter().find(|p| p.is_child()).unwrap();
    let parent = again.iter().find(|p| p.is_parent()).unwrap();
    assert_eq!(child.parent_id(), parent.id());
}

// =============================================================================
// MALFORMED INPUT
// =============================================================================

/// Test: a child pair without its parent is an orphan error, not a panic.
#[test]
fn test_orphaned_child_is_an_error() {
    let pairs = vec![
        Pair::ordinary(VersionSet::single(1), b"ok".to_vec()),
        Pair::new(VersionSet::single(2), PairKind::Child { parent: 42 }),
    ];
    match PairGraphConverter::create(&pairs) {
        Err(PairError::OrphanedTransposition { id }) => assert_eq!(id, 42),
        other => panic!("expected orphan error, got {:?}", other.map(|_| ())),
    }
}

/// Test: duplicate parent ids are rejected as corruption.
#[test]
fn test_duplicate_parent_ids_rejected() {
    let parent = |v: u16| {
        Pair::new(
            VersionSet::single(v),
            PairKind::Parent {
                data: b"dup".to_vec(),
                id: 1,
            },
        )
    };
    let pairs = vec![parent(1), parent(2)];
    assert!(matches!(
        PairGraphConverter::create(&pairs),
        Err(PairError::Corrupt(_))
    ));
}
