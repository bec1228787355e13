//! PulseDB engine
//!
//! Orchestrates the storage, durability, vector-index and watch layers
//! behind the [`Database`] handle: the open pipeline, the single-writer
//! commit pipeline, the collective catalog, and every query operation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod database;
pub mod embedding;
pub mod lock;
pub mod ops;
pub mod vector;
pub mod watch;

pub use catalog::CollectiveHandle;
pub use config::{
    DimensionPolicy, EmbeddingDimension, EmbeddingProvider, PulseConfig, WatchConfig,
};
pub use database::{Database, SCHEMA_VERSION};
pub use embedding::Embedder;
pub use ops::{
    CollectiveStats, ContextCandidates, ContextRequest, DatabaseStats, ExperienceFilter,
};
pub use vector::{DistanceMetric, HnswParams};
pub use watch::{PollResult, WatchFilter, WatchSubscriber};
