//! Collective catalog
//!
//! In-memory handles for every collective of an open database: the
//! collective row (immutable after creation — the dimension freeze lives
//! here) plus the two vector indexes and a live experience counter.
//! Lookup is lock-free via `DashMap`; the indexes carry their own
//! reader-writer locks (search concurrent, mutation exclusive).

use crate::vector::{DistanceMetric, VectorIndex};
use dashmap::DashMap;
use parking_lot::RwLock;
use pulse_core::{Collective, CollectiveId, PulseError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-collective in-memory state
pub struct CollectiveHandle {
    /// The collective row (name, owner, frozen dimension, created_at)
    pub collective: Collective,
    /// Experience vector index
    pub experiences: RwLock<VectorIndex>,
    /// Insight vector index
    pub insights: RwLock<VectorIndex>,
    /// Live experience count (includes archived; drives quota checks)
    experience_count: AtomicU64,
}

impl CollectiveHandle {
    /// Fresh handle with empty indexes at the collective's dimension
    pub fn new(collective: Collective) -> Self {
        let dim = collective.embedding_dimension;
        Self {
            collective,
            experiences: RwLock::new(VectorIndex::with_scale(dim, DistanceMetric::Cosine, 0)),
            insights: RwLock::new(VectorIndex::with_scale(dim, DistanceMetric::Cosine, 0)),
            experience_count: AtomicU64::new(0),
        }
    }

    /// The frozen embedding dimension
    pub fn dimension(&self) -> usize {
        self.collective.embedding_dimension
    }

    /// Current experience count
    pub fn experience_count(&self) -> u64 {
        self.experience_count.load(Ordering::Relaxed)
    }

    pub(crate) fn set_experience_count(&self, count: u64) {
        self.experience_count.store(count, Ordering::Relaxed);
    }

    pub(crate) fn bump_experience_count(&self, delta: i64) {
        if delta >= 0 {
            self.experience_count
                .fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            self.experience_count
                .fetch_sub((-delta) as u64, Ordering::Relaxed);
        }
    }
}

/// The set of collectives of one open database
#[derive(Default)]
pub struct Catalog {
    handles: DashMap<CollectiveId, Arc<CollectiveHandle>>,
    names: DashMap<String, CollectiveId>,
}

impl Catalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handle (open replay or create_collective)
    pub fn insert(&self, handle: Arc<CollectiveHandle>) {
        self.names
            .insert(handle.collective.name.clone(), handle.collective.id);
        self.handles.insert(handle.collective.id, handle);
    }

    /// Look up by id
    pub fn get(&self, id: CollectiveId) -> Option<Arc<CollectiveHandle>> {
        self.handles.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Look up by id, failing with `NotFound`
    pub fn require(&self, id: CollectiveId) -> Result<Arc<CollectiveHandle>> {
        self.get(id)
            .ok_or_else(|| PulseError::not_found("collective", id))
    }

    /// Look up by name
    pub fn get_by_name(&self, name: &str) -> Option<Arc<CollectiveHandle>> {
        self.names
            .get(name)
            .and_then(|entry| self.get(*entry.value()))
    }

    /// True if the name is taken
    pub fn name_taken(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Remove a collective's handle
    pub fn remove(&self, id: CollectiveId) -> Option<Arc<CollectiveHandle>> {
        let handle = self.handles.remove(&id).map(|(_, handle)| handle)?;
        self.names.remove(&handle.collective.name);
        Some(handle)
    }

    /// Snapshot of every handle, unordered
    pub fn all(&self) -> Vec<Arc<CollectiveHandle>> {
        self.handles
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of collectives
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if no collectives exist
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
