//! Compound-key encodings
//!
//! Secondary-index keys are fixed-width byte strings so lexicographic
//! order over the raw bytes gives the scan order we need. Timestamps are
//! big-endian: lexicographic descent over `exp_by_collective` is
//! chronological descent. These layouts are part of the on-disk contract
//! and must stay bit-stable within a major version.
//!
//! | table                 | key layout                          | bytes |
//! |-----------------------|-------------------------------------|-------|
//! | exp_by_collective     | collective ‖ created_at BE ‖ exp id | 40    |
//! | exp_by_type           | collective ‖ type tag ‖ exp id      | 33    |
//! | relations_by_source   | source id ‖ relation id             | 32    |
//! | relations_by_target   | target id ‖ relation id             | 32    |
//! | activities            | collective ‖ agent utf-8            | 16+n  |
//! | changelog             | csn BE                              | 8     |

use crate::types::{AgentId, CollectiveId, Csn, ExperienceId, InsightId, RelationId, Timestamp};
use byteorder::{BigEndian, ByteOrder};

/// Metadata table key holding the schema version (u32 LE value)
pub const META_SCHEMA_VERSION: &[u8] = b"schema_version";

/// Metadata table key holding the latest committed CSN (u64 LE value)
pub const META_CSN: &[u8] = b"csn";

/// Primary key for a collective row
pub fn collective_key(id: CollectiveId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Primary key for an experience row
pub fn experience_key(id: ExperienceId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Key for an embedding blob (experiences and insights share the table;
/// uuid keys cannot collide across the two id spaces)
pub fn embedding_key(id: [u8; 16]) -> Vec<u8> {
    id.to_vec()
}

/// Primary key for a relation row
pub fn relation_key(id: RelationId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Primary key for an insight row
pub fn insight_key(id: InsightId) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// `exp_by_collective` index key: 16 ‖ 8 (BE millis) ‖ 16 = 40 bytes
pub fn exp_by_collective_key(
    collective: CollectiveId,
    created_at: Timestamp,
    id: ExperienceId,
) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(collective.as_bytes());
    let mut ts = [0u8; 8];
    BigEndian::write_u64(&mut ts, created_at);
    key.extend_from_slice(&ts);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Scan prefix covering every `exp_by_collective` entry of a collective
pub fn exp_by_collective_prefix(collective: CollectiveId) -> Vec<u8> {
    collective.as_bytes().to_vec()
}

/// Split an `exp_by_collective` key back into its parts
pub fn parse_exp_by_collective_key(key: &[u8]) -> Option<(CollectiveId, Timestamp, ExperienceId)> {
    if key.len() != 40 {
        return None;
    }
    let collective = CollectiveId::from_bytes(key[0..16].try_into().ok()?);
    let created_at = BigEndian::read_u64(&key[16..24]);
    let id = ExperienceId::from_bytes(key[24..40].try_into().ok()?);
    Some((collective, created_at, id))
}

/// `exp_by_type` index key: 16 ‖ 1 ‖ 16 = 33 bytes
pub fn exp_by_type_key(collective: CollectiveId, type_tag: u8, id: ExperienceId) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.extend_from_slice(collective.as_bytes());
    key.push(type_tag);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Scan prefix covering one experience type within a collective
pub fn exp_by_type_prefix(collective: CollectiveId, type_tag: u8) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(17);
    prefix.extend_from_slice(collective.as_bytes());
    prefix.push(type_tag);
    prefix
}

/// `relations_by_source` / `_by_target` key: 16 ‖ 16 = 32 bytes
pub fn relation_endpoint_key(endpoint: ExperienceId, relation: RelationId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(endpoint.as_bytes());
    key.extend_from_slice(relation.as_bytes());
    key
}

/// Scan prefix covering every relation touching an endpoint
pub fn relation_endpoint_prefix(endpoint: ExperienceId) -> Vec<u8> {
    endpoint.as_bytes().to_vec()
}

/// Extract the relation id from a `relations_by_*` key
pub fn parse_relation_endpoint_key(key: &[u8]) -> Option<RelationId> {
    if key.len() != 32 {
        return None;
    }
    Some(RelationId::from_bytes(key[16..32].try_into().ok()?))
}

/// Activity key: collective ‖ agent utf-8
pub fn activity_key(collective: CollectiveId, agent: &AgentId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16 + agent.as_str().len());
    key.extend_from_slice(collective.as_bytes());
    key.extend_from_slice(agent.as_str().as_bytes());
    key
}

/// Scan prefix covering every activity of a collective
pub fn activity_prefix(collective: CollectiveId) -> Vec<u8> {
    collective.as_bytes().to_vec()
}

/// Changelog ring key: 8-byte BE CSN
pub fn changelog_key(csn: Csn) -> Vec<u8> {
    let mut key = [0u8; 8];
    BigEndian::write_u64(&mut key, csn);
    key.to_vec()
}

/// Read the CSN back out of a changelog key
pub fn parse_changelog_key(key: &[u8]) -> Option<Csn> {
    if key.len() != 8 {
        return None;
    }
    Some(BigEndian::read_u64(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_widths() {
        let c = CollectiveId::new();
        let e = ExperienceId::new();
        let r = RelationId::new();
        assert_eq!(exp_by_collective_key(c, 12345, e).len(), 40);
        assert_eq!(exp_by_type_key(c, 8, e).len(), 33);
        assert_eq!(relation_endpoint_key(e, r).len(), 32);
        assert_eq!(changelog_key(7).len(), 8);
    }

    #[test]
    fn test_exp_by_collective_roundtrip() {
        let c = CollectiveId::new();
        let e = ExperienceId::new();
        let key = exp_by_collective_key(c, 1_700_000_000_123, e);
        let (pc, ts, pe) = parse_exp_by_collective_key(&key).unwrap();
        assert_eq!(pc, c);
        assert_eq!(ts, 1_700_000_000_123);
        assert_eq!(pe, e);
    }

    #[test]
    fn test_big_endian_timestamps_sort_chronologically() {
        let c = CollectiveId::new();
        let e = ExperienceId::new();
        let older = exp_by_collective_key(c, 1_000, e);
        let newer = exp_by_collective_key(c, 2_000, e);
        assert!(older < newer);
    }

    proptest! {
        #[test]
        fn prop_timestamp_order_matches_key_order(a in 0u64..u64::MAX / 2, b in 0u64..u64::MAX / 2) {
            let c = CollectiveId::new();
            let e = ExperienceId::new();
            let ka = exp_by_collective_key(c, a, e);
            let kb = exp_by_collective_key(c, b, e);
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }

        #[test]
        fn prop_changelog_key_roundtrip(csn in any::<u64>()) {
            prop_assert_eq!(parse_changelog_key(&changelog_key(csn)), Some(csn));
        }
    }
}
