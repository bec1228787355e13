//! # PulseDB
//!
//! An embedded, single-file database for agentic AI systems: experiences
//! (text + embedding + metadata) grouped into isolated collectives, with
//! blended retrieval over vector similarity, recency, typed relations,
//! derived insights and live agent activity.
//!
//! Consumers link PulseDB into their own process; there is no server.
//! One process holds a database open at a time (advisory file lock);
//! within it, writes are single-writer and reads take MVCC snapshots
//! that never block anyone.
//!
//! # Quick start
//!
//! ```no_run
//! use pulsedb::{Database, NewExperience, ExperienceKind, PulseConfig, EmbeddingDimension};
//!
//! fn main() -> pulsedb::Result<()> {
//!     let config = PulseConfig {
//!         embedding_dimension: EmbeddingDimension::Custom(4),
//!         ..Default::default()
//!     };
//!     let db = Database::open("./pulse-data", config)?;
//!
//!     let collective = db.create_collective("assistant", None)?;
//!     let recorded = db.record_experience(
//!         NewExperience::new(collective, "cargo build caches by default", ExperienceKind::Fact)
//!             .with_embedding(vec![0.1, 0.9, 0.0, 0.3])
//!             .with_importance(0.8),
//!     )?;
//!
//!     let hits = db.search_similar(collective, &[0.1, 0.9, 0.0, 0.3], 10)?;
//!     assert_eq!(hits[0].0.id, recorded.id);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! | Layer | Crate | Role |
//! |-------|-------|------|
//! | KV store | `pulse-storage` | ordered tables, MVCC snapshots |
//! | Durability | `pulse-durability` | write-ahead log, crash recovery |
//! | Vector index | `pulse-engine` | per-collective HNSW, sidecar files |
//! | Query engine | `pulse-engine` | retrieval, relations, context blend |
//! | Watch fan-out | `pulse-engine` | bounded channels + changelog polling |
//!
//! Internal crates are not exposed; only the surface re-exported here is
//! stable.

pub use pulse_core::{
    now_millis, Activity, AgentId, Collective, CollectiveId, Csn, Experience, ExperienceId,
    ExperienceKind, ExperiencePatch, Insight, InsightId, Limits, NewExperience, NewInsight,
    PulseError, Relation, RelationDirection, RelationId, RelationKind, Result, Timestamp,
    WatchEvent, WatchEventKind,
};
pub use pulse_durability::SyncMode;
pub use pulse_engine::{
    CollectiveStats, ContextCandidates, ContextRequest, Database, DatabaseStats, DimensionPolicy,
    DistanceMetric, Embedder, EmbeddingDimension, EmbeddingProvider, ExperienceFilter, HnswParams,
    PollResult, PulseConfig, WatchConfig, WatchFilter, WatchSubscriber, SCHEMA_VERSION,
};
