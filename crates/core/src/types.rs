//! Core identifier and time types for PulseDB
//!
//! This module defines the foundational types:
//! - CollectiveId: isolation boundary owning experiences and a vector index
//! - ExperienceId / InsightId / RelationId: entity identifiers
//! - AgentId: validated agent name used for activity tracking
//! - Timestamp: 64-bit Unix milliseconds

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, OnceLock};
use uuid::timestamp::context::ContextV7;
use uuid::Uuid;

/// Shared v7 counter context: ids generated in the same millisecond stay
/// monotonic, so id order tracks creation order even under bursts.
fn next_v7() -> Uuid {
    static CONTEXT: OnceLock<Mutex<ContextV7>> = OnceLock::new();
    let context = CONTEXT.get_or_init(|| Mutex::new(ContextV7::new()));
    Uuid::new_v7(uuid::Timestamp::now(context))
}

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        ///
        /// A 128-bit UUID v7 wrapper. v7 ids are time-ordered, so id order
        /// approximates creation order — recency scans and id-based
        /// tie-breaks agree with `created_at`.
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new time-ordered id
            pub fn new() -> Self {
                Self(next_v7())
            }

            /// Create an id from raw bytes
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            /// Parse an id from its string representation
            ///
            /// Accepts standard UUID format. Returns None on malformed input.
            pub fn from_string(s: &str) -> Option<Self> {
                Uuid::parse_str(s).ok().map(Self)
            }

            /// Get the raw bytes of this id
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }

            /// Get the underlying UUID
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a collective
    CollectiveId
);
entity_id!(
    /// Unique identifier for an experience
    ExperienceId
);
entity_id!(
    /// Unique identifier for a derived insight
    InsightId
);
entity_id!(
    /// Unique identifier for an experience relation
    RelationId
);

/// Identifier of an agent participating in a collective
///
/// Agents are named by their callers; the name is validated (non-empty,
/// bounded length) but otherwise opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(String);

impl AgentId {
    /// Maximum agent id length in characters
    pub const MAX_LEN: usize = 100;

    /// Create an agent id, validating length bounds
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().count() > Self::MAX_LEN {
            None
        } else {
            Some(Self(name))
        }
    }

    /// The agent name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in time as Unix milliseconds
pub type Timestamp = u64;

/// Current wall-clock time in Unix milliseconds
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Change sequence number
///
/// Strictly monotone counter, incremented exactly once per committed
/// logical change. CSN order equals commit order.
pub type Csn = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = ExperienceId::new();
        let b = ExperienceId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ids_are_time_ordered() {
        // v7 ids generated in sequence sort in generation order
        let ids: Vec<ExperienceId> = (0..64).map(|_| ExperienceId::new()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_id_roundtrip_bytes() {
        let id = CollectiveId::new();
        let bytes = *id.as_bytes();
        assert_eq!(CollectiveId::from_bytes(bytes), id);
    }

    #[test]
    fn test_id_roundtrip_string() {
        let id = InsightId::new();
        let parsed = InsightId::from_string(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_agent_id_bounds() {
        assert!(AgentId::new("").is_none());
        assert!(AgentId::new("worker-1").is_some());
        assert!(AgentId::new("x".repeat(100)).is_some());
        assert!(AgentId::new("x".repeat(101)).is_none());
    }

    #[test]
    fn test_now_millis_is_sane() {
        // After 2020-01-01, before 2100-01-01
        let now = now_millis();
        assert!(now > 1_577_836_800_000);
        assert!(now < 4_102_444_800_000);
    }
}
