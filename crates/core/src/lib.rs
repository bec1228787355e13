//! Core types for PulseDB
//!
//! This crate defines the foundational types used throughout the system:
//! - Entity ids (CollectiveId, ExperienceId, InsightId, RelationId, AgentId)
//! - Entity rows (Collective, Experience, Relation, Insight, Activity)
//! - PulseError: the unified error taxonomy
//! - Limits and input validation
//! - Compound-key encodings for the secondary-index tables
//! - The raw embedding byte codec

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod embedding_bytes;
pub mod entities;
pub mod error;
pub mod keys;
pub mod limits;
pub mod types;
pub mod validate;

pub use embedding_bytes::{embedding_from_bytes, embedding_to_bytes};
pub use entities::{
    Activity, Collective, Experience, ExperienceKind, ExperiencePatch, Insight, NewExperience,
    NewInsight, Relation, RelationDirection, RelationKind, WatchEvent, WatchEventKind,
};
pub use error::{PulseError, Result};
pub use limits::Limits;
pub use types::{
    now_millis, AgentId, CollectiveId, Csn, ExperienceId, InsightId, RelationId, Timestamp,
};
