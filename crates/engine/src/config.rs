//! Database configuration
//!
//! All knobs are set at open time; a `PulseConfig` travels with the
//! `Database` handle for its whole life. Defaults are production-safe:
//! fsync-per-commit durability, 384-dimension embeddings, in-process
//! watch enabled.

use pulse_core::Limits;
use pulse_durability::SyncMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where embeddings come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmbeddingProvider {
    /// The engine generates embeddings through an installed [`Embedder`]
    ///
    /// [`Embedder`]: crate::embedding::Embedder
    Builtin {
        /// Optional model path handed to the embedder implementation
        model_path: Option<PathBuf>,
    },
    /// The caller supplies every embedding; the engine only validates length
    External,
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        EmbeddingProvider::External
    }
}

/// Default embedding dimension for new collectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingDimension {
    /// 384 dimensions (MiniLM-class models)
    D384,
    /// 768 dimensions (BERT-class models)
    D768,
    /// Any other dimension
    Custom(usize),
}

impl EmbeddingDimension {
    /// The dimension as a plain length
    pub fn size(self) -> usize {
        match self {
            EmbeddingDimension::D384 => 384,
            EmbeddingDimension::D768 => 768,
            EmbeddingDimension::Custom(n) => n,
        }
    }
}

impl Default for EmbeddingDimension {
    fn default() -> Self {
        EmbeddingDimension::D384
    }
}

/// How strictly the configured dimension is enforced on open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DimensionPolicy {
    /// Every existing collective must match `embedding_dimension`
    #[default]
    Strict,
    /// Existing collectives keep their own frozen dimensions; the
    /// configured one applies to new collectives only
    InferPerCollective,
}

/// Watch fan-out settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Enable in-process subscriber delivery
    pub in_process: bool,
    /// Suggested cross-process poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Per-subscriber channel capacity
    pub buffer_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            in_process: true,
            poll_interval_ms: 100,
            buffer_size: 1000,
        }
    }
}

/// Configuration for an open database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PulseConfig {
    /// Embedding source
    pub embedding_provider: EmbeddingProvider,
    /// Default dimension frozen into new collectives
    pub embedding_dimension: EmbeddingDimension,
    /// Dimension compatibility policy for existing collectives
    pub dimension_policy: DimensionPolicy,
    /// Page/row cache budget in bytes (advisory)
    pub cache_size_bytes: Option<u64>,
    /// Commit durability mode
    pub sync_mode: SyncMode,
    /// Watch fan-out settings
    pub watch: WatchConfig,
    /// Resource limits
    pub limits: Limits,
    /// Persist vector-index sidecars every this many commits
    pub hnsw_persist_every: Option<u64>,
    /// Rewrite the log as a checkpoint when it exceeds this size at open
    pub compact_at_bytes: Option<u64>,
}

impl PulseConfig {
    /// Commits between sidecar persists (default 64)
    pub fn hnsw_persist_every(&self) -> u64 {
        self.hnsw_persist_every.unwrap_or(64)
    }

    /// Log size that triggers compaction at open (default 64 MiB)
    pub fn compact_at_bytes(&self) -> u64 {
        self.compact_at_bytes.unwrap_or(64 * 1024 * 1024)
    }
}
