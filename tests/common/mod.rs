//! Shared helpers for the integration suites

#![allow(dead_code)] // each test binary uses its own subset

use pulsedb::{
    CollectiveId, Database, EmbeddingDimension, ExperienceKind, NewExperience, PulseConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Test embedding dimension
pub const DIM: usize = 4;

/// Default config for test databases: 4-dim external embeddings
pub fn test_config() -> PulseConfig {
    PulseConfig {
        embedding_dimension: EmbeddingDimension::Custom(DIM),
        ..Default::default()
    }
}

/// Fresh database in a scratch directory
pub fn setup() -> (Arc<Database>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), test_config()).unwrap();
    (Arc::new(db), temp_dir)
}

/// Path helper for reopen scenarios
pub fn db_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().to_path_buf()
}

/// Deterministic unit-ish embedding derived from a seed
pub fn embed(seed: u64) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[(seed % DIM as u64) as usize] = 1.0;
    v[((seed / DIM as u64) % DIM as u64) as usize] += 0.25;
    v
}

/// Record a generic experience with the given content and embedding
pub fn record(
    db: &Database,
    collective: CollectiveId,
    content: &str,
    embedding: Vec<f32>,
) -> pulsedb::Experience {
    db.record_experience(
        NewExperience::new(collective, content, ExperienceKind::Generic { category: None })
            .with_embedding(embedding)
            .with_importance(0.5)
            .with_confidence(0.9),
    )
    .unwrap()
}
