//! WAL frame encoding and decoding
//!
//! Every entry is framed with a length prefix and a CRC32 checksum so a
//! torn write at the tail of the log is detectable:
//!
//! ```text
//! [length: u32 LE][type: u8][payload: bincode][crc32: u32 LE]
//! ```
//!
//! - **length**: size of type + payload + crc (NOT including length itself)
//! - **type**: entry type tag (enables skipping unknown types forward)
//! - **payload**: bincode-serialized `WalEntry`
//! - **crc32**: checksum over \[type\]\[payload\]

use crate::wal::WalEntry;
use crc32fast::Hasher;
use pulse_core::{PulseError, Result};

/// Entry type tags
const TYPE_BEGIN: u8 = 1;
const TYPE_WRITE: u8 = 2;
const TYPE_DELETE: u8 = 3;
const TYPE_COMMIT: u8 = 4;
const TYPE_CHECKPOINT: u8 = 5;

/// Sanity cap on a single frame; anything larger is a garbage length
/// field, not a real entry (content is capped at 100 KiB and embeddings
/// are a few KiB).
const MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

fn type_tag(entry: &WalEntry) -> u8 {
    match entry {
        WalEntry::Begin { .. } => TYPE_BEGIN,
        WalEntry::Write { .. } => TYPE_WRITE,
        WalEntry::Delete { .. } => TYPE_DELETE,
        WalEntry::Commit { .. } => TYPE_COMMIT,
        WalEntry::Checkpoint { .. } => TYPE_CHECKPOINT,
    }
}

/// Encode a WAL entry into a framed byte buffer ready for appending
pub fn encode_entry(entry: &WalEntry) -> Result<Vec<u8>> {
    let payload = bincode::serialize(entry)?;
    let tag = type_tag(entry);

    let mut hasher = Hasher::new();
    hasher.update(&[tag]);
    hasher.update(&payload);
    let crc = hasher.finalize();

    let length = (1 + payload.len() + 4) as u32;
    let mut frame = Vec::with_capacity(4 + length as usize);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(tag);
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Decode one frame from the front of `buf`
///
/// Returns the entry and the number of bytes consumed. Errors mean the
/// buffer holds an incomplete or damaged frame; the caller decides
/// whether that is a torn tail (expected) or corruption.
pub fn decode_entry(buf: &[u8]) -> Result<(WalEntry, usize)> {
    if buf.len() < 4 {
        return Err(PulseError::Serialization("incomplete frame header".into()));
    }
    let length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if length < 5 || length > MAX_FRAME_BYTES {
        return Err(PulseError::Serialization(format!(
            "implausible frame length {length}"
        )));
    }
    let total = 4 + length as usize;
    if buf.len() < total {
        return Err(PulseError::Serialization("incomplete frame body".into()));
    }

    let tag = buf[4];
    let payload = &buf[5..total - 4];
    let stored_crc = u32::from_le_bytes([
        buf[total - 4],
        buf[total - 3],
        buf[total - 2],
        buf[total - 1],
    ]);

    let mut hasher = Hasher::new();
    hasher.update(&[tag]);
    hasher.update(payload);
    if hasher.finalize() != stored_crc {
        return Err(PulseError::Serialization("frame checksum mismatch".into()));
    }

    let entry: WalEntry = bincode::deserialize(payload)?;
    if type_tag(&entry) != tag {
        return Err(PulseError::Serialization(format!(
            "frame tag {tag} does not match payload"
        )));
    }
    Ok((entry, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_storage::Table;

    #[test]
    fn test_roundtrip_all_entry_types() {
        let entries = vec![
            WalEntry::Begin { csn: 7 },
            WalEntry::Write {
                table: Table::Experiences,
                key: vec![1, 2, 3],
                value: vec![4, 5],
            },
            WalEntry::Delete {
                table: Table::Embeddings,
                key: vec![9],
            },
            WalEntry::Commit { csn: 7 },
            WalEntry::Checkpoint { csn: 7 },
        ];
        for entry in entries {
            let frame = encode_entry(&entry).unwrap();
            let (decoded, consumed) = decode_entry(&frame).unwrap();
            assert_eq!(decoded, entry);
            assert_eq!(consumed, frame.len());
        }
    }

    #[test]
    fn test_truncated_frame_is_rejected() {
        let frame = encode_entry(&WalEntry::Begin { csn: 1 }).unwrap();
        for cut in 0..frame.len() {
            assert!(decode_entry(&frame[..cut]).is_err());
        }
    }

    #[test]
    fn test_bit_flip_fails_checksum() {
        let mut frame = encode_entry(&WalEntry::Commit { csn: 3 }).unwrap();
        let mid = frame.len() / 2;
        frame[mid] ^= 0x40;
        assert!(decode_entry(&frame).is_err());
    }

    #[test]
    fn test_garbage_length_is_rejected_early() {
        let mut frame = encode_entry(&WalEntry::Begin { csn: 1 }).unwrap();
        frame[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(decode_entry(&frame).is_err());
    }

    #[test]
    fn test_back_to_back_frames_decode_in_sequence() {
        let mut buf = encode_entry(&WalEntry::Begin { csn: 2 }).unwrap();
        buf.extend(encode_entry(&WalEntry::Commit { csn: 2 }).unwrap());
        let (first, consumed) = decode_entry(&buf).unwrap();
        assert_eq!(first, WalEntry::Begin { csn: 2 });
        let (second, _) = decode_entry(&buf[consumed..]).unwrap();
        assert_eq!(second, WalEntry::Commit { csn: 2 });
    }
}
