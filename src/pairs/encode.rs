//! Binary shape of the pairs table.
//!
//! The persistence layer above this crate owns the full file format; this
//! module fixes the parts the core dictates. Each pairs-table row is the
//! version bitmap, a data-table offset, the data length packed with two
//! transposition flag bits, and a parent id when either flag is set. The
//! raw data table carries a CRC32 so load-time corruption surfaces before
//! any graph is built. All integers are big-endian.

use crc32fast::Hasher;

use super::{Pair, PairKind};

/// Length flag: this pair is a transposition parent.
pub const PARENT_FLAG: u32 = 0x8000_0000;
/// Length flag: this pair is a transposition child.
pub const CHILD_FLAG: u32 = 0x4000_0000;
/// Both transposition flag bits.
pub const TRANSPOSE_MASK: u32 = 0xC000_0000;
/// Mask recovering the plain length from a packed length word.
pub const INVERSE_MASK: u32 = 0x0FFF_FFFF;

/// Packs a data length with the pair's transposition flags.
pub fn packed_length(pair: &Pair, data_len: usize) -> u32 {
    let len = data_len as u32 & INVERSE_MASK;
    match pair.kind() {
        PairKind::Ordinary { .. } => len,
        PairKind::Parent { .. } => len | PARENT_FLAG,
        PairKind::Child { .. } => len | CHILD_FLAG,
    }
}

/// Unpacks a length word into (length, is_parent, is_child).
pub fn unpack_length(packed: u32) -> (u32, bool, bool) {
    (
        packed & INVERSE_MASK,
        packed & PARENT_FLAG != 0,
        packed & CHILD_FLAG != 0,
    )
}

/// Size in bytes of one pairs-table row for a document whose version
/// bitmaps occupy `set_size` bytes.
pub fn pair_size(pair: &Pair, set_size: usize) -> usize {
    // bitmap + offset + packed length, plus an id for either transposition end
    let base = set_size + 4 + 4;
    match pair.kind() {
        PairKind::Ordinary { .. } => base,
        PairKind::Parent { .. } | PairKind::Child { .. } => base + 4,
    }
}

/// Encodes one pairs-table row. `data_offset` is the pair's position in the
/// raw data table (children pass their parent's offset).
pub fn row_bytes(pair: &Pair, set_size: usize, data_offset: u32, data_len: usize) -> Vec<u8> {
    let mut row = pair.versions().to_wire_bytes(set_size);
    row.extend_from_slice(&data_offset.to_be_bytes());
    row.extend_from_slice(&packed_length(pair, data_len).to_be_bytes());
    match pair.kind() {
        PairKind::Parent { id, .. } => row.extend_from_slice(&id.to_be_bytes()),
        PairKind::Child { parent } => row.extend_from_slice(&parent.to_be_bytes()),
        PairKind::Ordinary { .. } => {}
    }
    row
}

/// CRC32 over the raw data table: every owned text, in pair order.
pub fn data_table_checksum(pairs: &[Pair]) -> u32 {
    let mut hasher = Hasher::new();
    for pair in pairs {
        if let Some(data) = pair.data() {
            hasher.update(data);
        }
    }
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version_set::VersionSet;

    #[test]
    fn test_packed_length_round_trip() {
        let parent = Pair::new(
            VersionSet::single(1),
            PairKind::Parent {
                data: b"abcde".to_vec(),
                id: 3,
            },
        );
        let packed = packed_length(&parent, 5);
        assert_eq!(packed & TRANSPOSE_MASK, PARENT_FLAG);
        let (len, is_parent, is_child) = unpack_length(packed);
        assert_eq!(len, 5);
        assert!(is_parent);
        assert!(!is_child);

        let child = Pair::new(VersionSet::single(2), PairKind::Child { parent: 3 });
        let (len, is_parent, is_child) = unpack_length(packed_length(&child, 5));
        assert_eq!(len, 5);
        assert!(!is_parent);
        assert!(is_child);
    }

    #[test]
    fn test_pair_size_accounts_for_ids() {
        let plain = Pair::ordinary(VersionSet::single(1), b"x".to_vec());
        let child = Pair::new(VersionSet::single(2), PairKind::Child { parent: 1 });
        assert_eq!(pair_size(&plain, 2), 10);
        assert_eq!(pair_size(&child, 2), 14);
    }

    #[test]
    fn test_row_bytes_layout() {
        let pair = Pair::ordinary(VersionSet::single(1), b"abc".to_vec());
        let row = row_bytes(&pair, 1, 0x1020, 3);
        assert_eq!(row.len(), 9);
        assert_eq!(row[0], 0b0000_0010);
        assert_eq!(&row[1..5], &0x1020u32.to_be_bytes());
        assert_eq!(&row[5..9], &3u32.to_be_bytes());
    }

    #[test]
    fn test_checksum_skips_child_pairs() {
        let parent = Pair::new(
            VersionSet::single(1),
            PairKind::Parent {
                data: b"shared".to_vec(),
                id: 1,
            },
        );
        let child = Pair::new(VersionSet::single(2), PairKind::Child { parent: 1 });
        let with_child = data_table_checksum(&[parent.clone(), child]);
        let without = data_table_checksum(&[parent]);
        assert_eq!(with_child, without);
    }
}
