//! HNSW (Hierarchical Navigable Small World) vector index
//!
//! O(log n) approximate nearest neighbor search built from scratch, one
//! instance per collective (and one more for its insights).
//!
//! ## Design
//! - Incremental inserts, tombstoned deletes (mark-and-skip)
//! - Deterministic results: fixed RNG seed + monotonic counter for level
//!   assignment, `BTreeMap`/`BTreeSet` storage, tie-break (score desc,
//!   id asc)
//! - Filtering happens *during traversal*: a candidate predicate decides
//!   result membership while filtered and tombstoned nodes remain graph
//!   waypoints, so aggressive filters still return k results
//! - The index owns `(id, vector)` copies; the KV embeddings table is the
//!   source of truth and the whole structure is a rebuildable cache

use crate::vector::distance::{compute_similarity, DistanceMetric};
use pulse_core::{PulseError, Result};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use uuid::Uuid;

/// Id of a vector in an index (experience or insight uuid)
pub type VectorId = Uuid;

/// Predicate deciding whether a vector may appear in search results
pub type SearchFilter<'a> = &'a dyn Fn(VectorId) -> bool;

/// Tombstone fraction that triggers an in-place rebuild
const TOMBSTONE_REBUILD_RATIO: f64 = 0.5;

/// HNSW tuning parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswParams {
    /// Max connections per layer above 0 (layer 0 allows 2*M)
    pub m: usize,
    /// Build-time beam width
    pub ef_construction: usize,
    /// Search-time beam width
    pub ef_search: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self::for_scale(0)
    }
}

impl HnswParams {
    /// Scale-tiered defaults
    ///
    /// | collective size | M  | ef_construction | ef_search |
    /// |-----------------|----|-----------------|-----------|
    /// | ≤ 10 K          | 16 | 100             | 50        |
    /// | 10 K – 100 K    | 16 | 200             | 100       |
    /// | 100 K – 1 M     | 24 | 200             | 150       |
    /// | > 1 M           | 32 | 400             | 200       |
    pub fn for_scale(count: usize) -> Self {
        if count <= 10_000 {
            Self {
                m: 16,
                ef_construction: 100,
                ef_search: 50,
            }
        } else if count <= 100_000 {
            Self {
                m: 16,
                ef_construction: 200,
                ef_search: 100,
            }
        } else if count <= 1_000_000 {
            Self {
                m: 24,
                ef_construction: 200,
                ef_search: 150,
            }
        } else {
            Self {
                m: 32,
                ef_construction: 400,
                ef_search: 200,
            }
        }
    }

    fn ml(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    fn max_connections_layer0(&self) -> usize {
        self.m * 2
    }

    fn max_connections(&self) -> usize {
        self.m
    }
}

/// A node in the graph
#[derive(Debug, Clone)]
pub(crate) struct Node {
    /// neighbors[layer] = sorted neighbor set
    pub(crate) neighbors: Vec<BTreeSet<VectorId>>,
    /// Highest layer this node appears in
    pub(crate) max_layer: usize,
    /// Tombstone flag: deleted nodes stay as waypoints until a rebuild
    pub(crate) deleted: bool,
}

impl Node {
    fn new(max_layer: usize) -> Self {
        Self {
            neighbors: (0..=max_layer).map(|_| BTreeSet::new()).collect(),
            max_layer,
            deleted: false,
        }
    }
}

/// Scored candidate (max-heap by score, tie-break id asc)
#[derive(Debug, Clone, PartialEq)]
struct ScoredId {
    score: f32,
    id: VectorId,
}

impl Eq for ScoredId {}

impl PartialOrd for ScoredId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            // lower id wins ties deterministically
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// One per-collective vector index
pub struct VectorIndex {
    pub(crate) dim: usize,
    pub(crate) metric: DistanceMetric,
    pub(crate) params: HnswParams,
    pub(crate) nodes: BTreeMap<VectorId, Node>,
    pub(crate) embeddings: BTreeMap<VectorId, Vec<f32>>,
    pub(crate) entry_point: Option<VectorId>,
    pub(crate) max_level: usize,
    pub(crate) rng_seed: u64,
    pub(crate) rng_counter: u64,
    /// Live (non-tombstoned) node count, kept in step with every
    /// mutation so tier checks stay O(1)
    pub(crate) live: usize,
}

impl VectorIndex {
    /// Create an empty index
    pub fn new(dim: usize, metric: DistanceMetric, params: HnswParams) -> Self {
        Self {
            dim,
            metric,
            params,
            nodes: BTreeMap::new(),
            embeddings: BTreeMap::new(),
            entry_point: None,
            max_level: 0,
            rng_seed: 42,
            rng_counter: 0,
            live: 0,
        }
    }

    /// Empty index with scale-tiered parameters for `expected_count`
    pub fn with_scale(dim: usize, metric: DistanceMetric, expected_count: usize) -> Self {
        Self::new(dim, metric, HnswParams::for_scale(expected_count))
    }

    /// The frozen dimension of this index
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The distance metric
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Current tuning parameters
    pub fn params(&self) -> HnswParams {
        self.params
    }

    /// Number of live (non-tombstoned) vectors
    pub fn len(&self) -> usize {
        self.live
    }

    /// True if no live vectors exist
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `id` is live in this index
    pub fn contains(&self, id: VectorId) -> bool {
        self.nodes.get(&id).is_some_and(|n| !n.deleted)
    }

    /// Live `(id, vector)` pairs in id order
    pub fn iter_live(&self) -> impl Iterator<Item = (VectorId, &Vec<f32>)> {
        self.nodes
            .iter()
            .filter(|(_, n)| !n.deleted)
            .filter_map(|(id, _)| self.embeddings.get(id).map(|e| (*id, e)))
    }

    // ========================================================================
    // Level assignment (deterministic)
    // ========================================================================

    fn assign_level(&mut self) -> usize {
        self.rng_counter += 1;
        let hash = splitmix64(self.rng_seed.wrapping_add(self.rng_counter));
        let uniform = ((hash as f64) / (u64::MAX as f64)).max(1e-15);
        (-uniform.ln() * self.params.ml()) as usize
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Insert a vector, replacing any previous entry for the same id
    pub fn insert(&mut self, id: VectorId, embedding: Vec<f32>) -> Result<()> {
        if embedding.len() != self.dim {
            return Err(PulseError::DimensionMismatch {
                expected: self.dim,
                actual: embedding.len(),
            });
        }
        if self.nodes.contains_key(&id) {
            self.remove_node(id);
        }
        self.embeddings.insert(id, embedding.clone());
        self.insert_into_graph(id, &embedding);
        self.live += 1;
        self.retune_for_scale();
        Ok(())
    }

    /// Tombstone a vector; returns true if it was live
    ///
    /// The node stays in the graph as a waypoint — its embedding is kept
    /// so traversal through it still scores correctly. Once tombstones
    /// exceed half the nodes the graph is rebuilt without them, which
    /// also drops their embeddings.
    pub fn delete(&mut self, id: VectorId) -> bool {
        let was_live = self.nodes.get(&id).is_some_and(|n| !n.deleted);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.deleted = true;
        }
        if was_live {
            self.live -= 1;
            if self.entry_point == Some(id) {
                self.repair_entry_point();
            }
            self.maybe_compact();
            self.retune_for_scale();
        }
        was_live
    }

    fn repair_entry_point(&mut self) {
        self.entry_point = self
            .nodes
            .iter()
            .find(|(_, n)| !n.deleted)
            .map(|(id, _)| *id);
        self.max_level = match self.entry_point {
            Some(ep) => self.nodes[&ep].max_layer,
            None => 0,
        };
    }

    fn maybe_compact(&mut self) {
        let total = self.nodes.len();
        if total == 0 {
            return;
        }
        let dead = total - self.len();
        if (dead as f64) / (total as f64) > TOMBSTONE_REBUILD_RATIO {
            tracing::debug!(total, dead, "rebuilding index to shed tombstones");
            let live: Vec<(VectorId, Vec<f32>)> = self
                .iter_live()
                .map(|(id, e)| (id, e.clone()))
                .collect();
            self.rebuild_from(live);
        }
    }

    /// Retune parameters to the tier for the current live count
    ///
    /// The beam widths (`ef_construction`, `ef_search`) only steer
    /// traversal, so a tier change applies to them in place. `M` is the
    /// connectivity contract of every existing edge list — crossing an
    /// `M` tier rebuilds the graph at the new connectivity.
    fn retune_for_scale(&mut self) {
        let tier = HnswParams::for_scale(self.live);
        if tier == self.params {
            return;
        }
        if tier.m == self.params.m {
            tracing::debug!(
                live = self.live,
                ef_construction = tier.ef_construction,
                ef_search = tier.ef_search,
                "retuning index beam widths for scale"
            );
            self.params.ef_construction = tier.ef_construction;
            self.params.ef_search = tier.ef_search;
        } else {
            tracing::debug!(live = self.live, m = tier.m, "rebuilding index at new connectivity tier");
            let entries: Vec<(VectorId, Vec<f32>)> = self
                .iter_live()
                .map(|(id, e)| (id, e.clone()))
                .collect();
            self.rebuild_from(entries);
        }
    }

    /// Reset and re-insert the given vectors in id order (deterministic)
    pub fn rebuild_from(&mut self, entries: Vec<(VectorId, Vec<f32>)>) {
        self.nodes.clear();
        self.embeddings.clear();
        self.entry_point = None;
        self.max_level = 0;
        self.rng_counter = 0;
        self.live = 0;
        self.params = HnswParams::for_scale(entries.len());

        let mut sorted = entries;
        sorted.sort_by_key(|(id, _)| *id);
        for (id, embedding) in sorted {
            if embedding.len() != self.dim {
                continue;
            }
            self.embeddings.insert(id, embedding.clone());
            self.insert_into_graph(id, &embedding);
            self.live += 1;
        }
    }

    /// Insert into the graph structure (paper Algorithm 1)
    fn insert_into_graph(&mut self, id: VectorId, embedding: &[f32]) {
        let level = self.assign_level();
        self.nodes.insert(id, Node::new(level));

        let Some(entry_id) = self.entry_point else {
            self.entry_point = Some(id);
            self.max_level = level;
            return;
        };

        // Greedy descent from the top to level+1
        let mut current_entry = entry_id;
        if self.max_level > level {
            current_entry = self.greedy_search_to_layer(embedding, entry_id, self.max_level, level + 1);
        }

        // At each layer at or below the node's level: beam search, connect
        let start_layer = level.min(self.max_level);
        for layer in (0..=start_layer).rev() {
            let candidates =
                self.search_layer(embedding, current_entry, self.params.ef_construction, layer, None);
            let selected: Vec<VectorId> = candidates
                .iter()
                .take(self.params.m)
                .map(|s| s.id)
                .collect();

            if let Some(new_node) = self.nodes.get_mut(&id) {
                if layer < new_node.neighbors.len() {
                    for &neighbor_id in &selected {
                        new_node.neighbors[layer].insert(neighbor_id);
                    }
                }
            }

            let max_conn = if layer == 0 {
                self.params.max_connections_layer0()
            } else {
                self.params.max_connections()
            };

            for &neighbor_id in &selected {
                let needs_prune = if let Some(neighbor) = self.nodes.get_mut(&neighbor_id) {
                    if layer < neighbor.neighbors.len() {
                        neighbor.neighbors[layer].insert(id);
                        neighbor.neighbors[layer].len() > max_conn
                    } else {
                        false
                    }
                } else {
                    false
                };
                if needs_prune {
                    self.prune_neighbors(neighbor_id, layer, max_conn);
                }
            }

            if let Some(closest) = candidates.first() {
                current_entry = closest.id;
            }
        }

        if level > self.max_level {
            self.entry_point = Some(id);
            self.max_level = level;
        }
    }

    fn prune_neighbors(&mut self, id: VectorId, layer: usize, max_connections: usize) {
        let Some(embedding) = self.embeddings.get(&id).cloned() else {
            return;
        };
        let neighbors: Vec<VectorId> = match self.nodes.get(&id) {
            Some(node) if layer < node.neighbors.len() => {
                node.neighbors[layer].iter().copied().collect()
            }
            _ => return,
        };

        let mut scored: Vec<ScoredId> = neighbors
            .iter()
            .filter_map(|&nid| {
                self.embeddings.get(&nid).map(|e| ScoredId {
                    score: compute_similarity(&embedding, e, self.metric),
                    id: nid,
                })
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let keep: BTreeSet<VectorId> = scored.iter().take(max_connections).map(|s| s.id).collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            if layer < node.neighbors.len() {
                node.neighbors[layer] = keep;
            }
        }
    }

    fn remove_node(&mut self, id: VectorId) {
        if let Some(node) = self.nodes.remove(&id) {
            if !node.deleted {
                self.live -= 1;
            }
            for (layer, neighbors) in node.neighbors.iter().enumerate() {
                for &neighbor_id in neighbors {
                    if let Some(n) = self.nodes.get_mut(&neighbor_id) {
                        if layer < n.neighbors.len() {
                            n.neighbors[layer].remove(&id);
                        }
                    }
                }
            }
            self.embeddings.remove(&id);
            if self.entry_point == Some(id) {
                self.entry_point = self.nodes.keys().next().copied();
                self.max_level = self.nodes.values().map(|n| n.max_layer).max().unwrap_or(0);
            }
        }
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Beam search at one layer (paper Algorithm 2)
    ///
    /// Tombstoned and filtered-out nodes are traversed as waypoints but
    /// excluded from results, so `ef` filtered results still come back.
    fn search_layer(
        &self,
        query: &[f32],
        entry_id: VectorId,
        ef: usize,
        layer: usize,
        filter: Option<SearchFilter<'_>>,
    ) -> Vec<ScoredId> {
        let admits = |id: VectorId| -> bool {
            self.nodes.get(&id).is_some_and(|n| !n.deleted)
                && filter.map_or(true, |f| f(id))
        };

        let Some(entry_embedding) = self.embeddings.get(&entry_id) else {
            return self.search_layer_from_any(query, ef, layer, filter);
        };
        let entry_score = compute_similarity(query, entry_embedding, self.metric);

        let mut visited = BTreeSet::new();
        visited.insert(entry_id);

        // C: candidates — max-heap, nearest popped first
        let mut candidates = BinaryHeap::new();
        candidates.push(ScoredId {
            score: entry_score,
            id: entry_id,
        });

        // W: results — min-heap via Reverse, worst on top for eviction
        let mut results: BinaryHeap<Reverse<ScoredId>> = BinaryHeap::new();
        if admits(entry_id) {
            results.push(Reverse(ScoredId {
                score: entry_score,
                id: entry_id,
            }));
        }

        while let Some(nearest) = candidates.pop() {
            let worst = results
                .peek()
                .map(|r| r.0.score)
                .unwrap_or(f32::NEG_INFINITY);
            if nearest.score < worst && results.len() >= ef {
                break;
            }

            if let Some(node) = self.nodes.get(&nearest.id) {
                if layer < node.neighbors.len() {
                    for &neighbor_id in &node.neighbors[layer] {
                        if !visited.insert(neighbor_id) {
                            continue;
                        }
                        let Some(neighbor_embedding) = self.embeddings.get(&neighbor_id) else {
                            continue;
                        };
                        let score = compute_similarity(query, neighbor_embedding, self.metric);
                        let worst = results
                            .peek()
                            .map(|r| r.0.score)
                            .unwrap_or(f32::NEG_INFINITY);

                        if results.len() < ef || score > worst {
                            candidates.push(ScoredId {
                                score,
                                id: neighbor_id,
                            });
                            if admits(neighbor_id) {
                                results.push(Reverse(ScoredId {
                                    score,
                                    id: neighbor_id,
                                }));
                                if results.len() > ef {
                                    results.pop();
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut out: Vec<ScoredId> = results.into_iter().map(|r| r.0).collect();
        out.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    /// Brute-force fallback for an entry point with no stored embedding.
    /// Unreachable through normal mutation; kept as a safety net for a
    /// sidecar loaded from a damaged file.
    fn search_layer_from_any(
        &self,
        query: &[f32],
        ef: usize,
        _layer: usize,
        filter: Option<SearchFilter<'_>>,
    ) -> Vec<ScoredId> {
        let mut scored: Vec<ScoredId> = self
            .embeddings
            .iter()
            .filter(|(id, _)| {
                self.nodes.get(*id).is_some_and(|n| !n.deleted)
                    && filter.map_or(true, |f| f(**id))
            })
            .map(|(id, e)| ScoredId {
                score: compute_similarity(query, e, self.metric),
                id: *id,
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(ef);
        scored
    }

    /// Greedy descent from `from_layer` to `to_layer` (ef = 1)
    fn greedy_search_to_layer(
        &self,
        query: &[f32],
        entry_id: VectorId,
        from_layer: usize,
        to_layer: usize,
    ) -> VectorId {
        let mut current = entry_id;
        for layer in (to_layer..=from_layer).rev() {
            let mut improved = true;
            while improved {
                improved = false;
                let Some(current_embedding) = self.embeddings.get(&current) else {
                    break;
                };
                let current_score = compute_similarity(query, current_embedding, self.metric);
                let mut best_score = current_score;
                let mut best_id = current;

                if let Some(node) = self.nodes.get(&current) {
                    if layer < node.neighbors.len() {
                        for &neighbor_id in &node.neighbors[layer] {
                            if let Some(e) = self.embeddings.get(&neighbor_id) {
                                let score = compute_similarity(query, e, self.metric);
                                if score > best_score
                                    || (score == best_score && neighbor_id < best_id)
                                {
                                    best_score = score;
                                    best_id = neighbor_id;
                                }
                            }
                        }
                    }
                }

                if best_id != current {
                    current = best_id;
                    improved = true;
                }
            }
        }
        current
    }

    /// k-nearest search with traversal-time filtering
    ///
    /// Returns up to `k` live, filter-passing `(id, score)` pairs, score
    /// descending with (created order ≈ id) ascending tie-break. The beam
    /// width is `max(ef, k)`.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        filter: Option<SearchFilter<'_>>,
    ) -> Result<Vec<(VectorId, f32)>> {
        if query.len() != self.dim {
            return Err(PulseError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if k == 0 || self.live == 0 {
            return Ok(Vec::new());
        }
        let Some(entry_id) = self.entry_point else {
            return Ok(Vec::new());
        };

        let mut current_entry = entry_id;
        if self.max_level > 0 {
            current_entry = self.greedy_search_to_layer(query, entry_id, self.max_level, 1);
        }

        let ef = ef.max(k);
        let candidates = self.search_layer(query, current_entry, ef, 0, filter);
        Ok(candidates
            .into_iter()
            .take(k)
            .map(|s| (s.id, s.score))
            .collect())
    }
}

/// SplitMix64 hash for the deterministic level PRNG
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}
