//! Database handle: open, commit pipeline, collective lifecycle
//!
//! A `Database` is a self-contained handle — multiple databases can
//! coexist in one process, each with its own writer serialization.
//!
//! ## Open pipeline
//!
//! validate directory → acquire `pulse.db.lock` → scan + replay the log →
//! schema version check / forward migrations → compact the log if
//! oversized → load the catalog and vector-index sidecars (reconciling or
//! rebuilding any that lag the database CSN).
//!
//! ## Commit pipeline
//!
//! One writer at a time, serialized by the WAL mutex. For every logical
//! change: build the batch under the writer lock → append to the log
//! (fsync per sync mode) → apply to the memtables → publish the CSN →
//! update the vector indexes → fan out watch events. Lock order is
//! strict: file lock → writer → index → watch registry.

use crate::catalog::{Catalog, CollectiveHandle};
use crate::config::{DimensionPolicy, EmbeddingProvider, PulseConfig};
use crate::embedding::Embedder;
use crate::lock::FileLock;
use crate::vector::{self, DistanceMetric, VectorId, VectorIndex};
use crate::watch::{EventAttributes, WatchRegistry};
use parking_lot::Mutex;
use pulse_core::{
    keys, now_millis, Collective, CollectiveId, Csn, Experience, ExperienceId, Insight, InsightId,
    PulseError, Result, Timestamp, WatchEvent,
};
use pulse_durability::{replay, rewrite_checkpoint, scan, Wal};
use pulse_storage::{MemTables, Snapshot, Table, WriteBatch};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Entries kept in the changelog ring
pub(crate) const CHANGELOG_RING: u64 = 1024;

const DB_FILE: &str = "pulse.db";
const LOCK_FILE: &str = "pulse.db.lock";
const HNSW_DIR: &str = "pulse.db.hnsw";

/// A forward migration: transforms on-disk state from `from` to `from + 1`
struct Migration {
    from: u32,
    #[allow(dead_code)]
    run: fn(&MemTables, &mut Wal) -> Result<()>,
}

/// Registry of forward migrations. Version 1 is the first schema; the
/// registry grows when the schema does.
const MIGRATIONS: &[Migration] = &[];

/// Vector-index side effect of a committed change, applied after the KV
/// commit (the index is a rebuildable cache of the committed state)
pub(crate) enum IndexOp {
    /// Insert or re-insert an experience vector
    UpsertExperience {
        collective_id: CollectiveId,
        id: ExperienceId,
        embedding: Vec<f32>,
    },
    /// Tombstone an experience vector (archive or delete)
    RemoveExperience {
        collective_id: CollectiveId,
        id: ExperienceId,
    },
    /// Insert an insight vector
    UpsertInsight {
        collective_id: CollectiveId,
        id: InsightId,
        embedding: Vec<f32>,
    },
    /// Tombstone an insight vector
    RemoveInsight {
        collective_id: CollectiveId,
        id: InsightId,
    },
}

/// Everything one logical change wants committed
pub(crate) struct Change {
    pub batch: WriteBatch,
    pub index_ops: Vec<IndexOp>,
    /// At most one experience event per logical change
    pub event: Option<(WatchEvent, EventAttributes)>,
}

impl Change {
    pub(crate) fn new() -> Self {
        Self {
            batch: WriteBatch::new(),
            index_ops: Vec::new(),
            event: None,
        }
    }
}

/// An open PulseDB database
pub struct Database {
    dir: PathBuf,
    config: PulseConfig,
    _file_lock: FileLock,
    pub(crate) tables: MemTables,
    /// The writer lock: holding the WAL is holding the write side
    wal: Mutex<Wal>,
    pub(crate) catalog: Catalog,
    pub(crate) watch: WatchRegistry,
    pub(crate) embedder: Option<Arc<dyn Embedder>>,
    read_only: AtomicBool,
    commits_since_persist: AtomicU64,
}

impl Database {
    /// Open (or create) a database directory
    ///
    /// Fails with `Embedding` if the config names a builtin provider —
    /// use [`Database::open_with_embedder`] to install one.
    pub fn open(dir: impl AsRef<Path>, config: PulseConfig) -> Result<Self> {
        Self::open_with_embedder(dir, config, None)
    }

    /// Open with an installed embedding service
    pub fn open_with_embedder(
        dir: impl AsRef<Path>,
        config: PulseConfig,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if matches!(config.embedding_provider, EmbeddingProvider::Builtin { .. })
            && embedder.is_none()
        {
            return Err(PulseError::Embedding(
                "builtin embedding provider configured but no embedder installed".into(),
            ));
        }

        std::fs::create_dir_all(&dir)?;
        let file_lock = FileLock::acquire(dir.join(LOCK_FILE), config.limits.file_lock_timeout)?;

        let db_path = dir.join(DB_FILE);
        let wal_scan = scan(&db_path)?;
        let good_offset = wal_scan.good_offset;
        let tables = MemTables::new(config.limits.max_read_snapshots);
        let report = replay(wal_scan, &tables)?;
        let mut wal = Wal::open(&db_path, config.sync_mode, Some(good_offset))?;

        Self::check_schema_version(&tables, &mut wal, report.last_csn)?;

        // Compact an oversized log into a checkpoint baseline
        if wal.size()? > config.compact_at_bytes() {
            let csn = tables.visible_csn();
            info!(csn, "compacting log into checkpoint");
            let snapshot = tables.snapshot_internal();
            let mut rows = Vec::new();
            for table in Table::ALL {
                for (key, value) in snapshot.scan_prefix(table, &[], None, None)? {
                    rows.push((table, key, value));
                }
            }
            drop(snapshot);
            drop(wal);
            rewrite_checkpoint(&db_path, csn, rows)?;
            wal = Wal::open(&db_path, config.sync_mode, None)?;
        }

        let watch = WatchRegistry::new(config.limits.watch_buffer_size, config.watch.in_process);
        let db = Self {
            dir,
            config,
            _file_lock: file_lock,
            tables,
            wal: Mutex::new(wal),
            catalog: Catalog::new(),
            watch,
            embedder,
            read_only: AtomicBool::new(false),
            commits_since_persist: AtomicU64::new(0),
        };

        db.load_catalog(report.last_csn)?;
        info!(
            path = %db.dir.display(),
            csn = report.last_csn,
            collectives = db.catalog.len(),
            "database open"
        );
        Ok(db)
    }

    fn check_schema_version(tables: &MemTables, wal: &mut Wal, last_csn: Csn) -> Result<()> {
        let snapshot = tables.snapshot_internal();
        let stored = snapshot
            .get(Table::Metadata, keys::META_SCHEMA_VERSION)
            .map(|bytes| {
                bytes
                    .try_into()
                    .map(u32::from_le_bytes)
                    .map_err(|_| PulseError::Corrupt("malformed schema version row".into()))
            })
            .transpose()?;
        drop(snapshot);

        match stored {
            None if last_csn == 0 => {
                // Fresh database: stamp the current schema as its first commit
                let mut batch = WriteBatch::new();
                batch.put(
                    Table::Metadata,
                    keys::META_SCHEMA_VERSION.to_vec(),
                    SCHEMA_VERSION.to_le_bytes().to_vec(),
                );
                batch.put(
                    Table::Metadata,
                    keys::META_CSN.to_vec(),
                    1u64.to_le_bytes().to_vec(),
                );
                wal.append_commit(&batch, 1)?;
                tables.apply(&batch, 1);
                Ok(())
            }
            None => Err(PulseError::Corrupt(
                "non-empty database without a schema version".into(),
            )),
            Some(stored) if stored > SCHEMA_VERSION => Err(PulseError::VersionMismatch {
                stored,
                supported: SCHEMA_VERSION,
            }),
            Some(mut stored) => {
                while stored < SCHEMA_VERSION {
                    let Some(migration) = MIGRATIONS.iter().find(|m| m.from == stored) else {
                        return Err(PulseError::VersionMismatch {
                            stored,
                            supported: SCHEMA_VERSION,
                        });
                    };
                    info!(from = stored, "running schema migration");
                    (migration.run)(tables, wal)?;
                    stored += 1;
                }
                Ok(())
            }
        }
    }

    fn load_catalog(&self, last_csn: Csn) -> Result<()> {
        let snapshot = self.tables.snapshot_internal();
        let rows = snapshot.scan_prefix(Table::Collectives, &[], None, None)?;
        for (_, value) in rows {
            let collective: Collective = decode_row(&value)?;
            if self.config.dimension_policy == DimensionPolicy::Strict {
                let configured = self.config.embedding_dimension.size();
                if collective.embedding_dimension != configured {
                    return Err(PulseError::DimensionMismatch {
                        expected: configured,
                        actual: collective.embedding_dimension,
                    });
                }
            }
            let handle = Arc::new(CollectiveHandle::new(collective));
            self.load_collective_indexes(&handle, &snapshot, last_csn)?;
            self.catalog.insert(handle);
        }
        Ok(())
    }

    /// Desired live experience vectors of a collective, from the KV truth
    fn desired_experience_vectors(
        &self,
        snapshot: &Snapshot,
        collective_id: CollectiveId,
    ) -> Result<(Vec<(VectorId, Vec<f32>)>, u64)> {
        let mut vectors = Vec::new();
        let mut total = 0u64;
        let prefix = keys::exp_by_collective_prefix(collective_id);
        for (key, _) in snapshot.scan_prefix(Table::ExpByCollective, &prefix, None, None)? {
            let Some((_, _, id)) = keys::parse_exp_by_collective_key(&key) else {
                return Err(PulseError::Corrupt("malformed exp_by_collective key".into()));
            };
            total += 1;
            let Some(row) = snapshot.get(Table::Experiences, &keys::experience_key(id)) else {
                return Err(PulseError::Corrupt(format!(
                    "index row for missing experience {id}"
                )));
            };
            let experience: Experience = decode_row(&row)?;
            if experience.archived {
                continue;
            }
            let Some(blob) = snapshot.get(Table::Embeddings, &keys::embedding_key(*id.as_bytes()))
            else {
                return Err(PulseError::Corrupt(format!(
                    "experience {id} has no stored embedding"
                )));
            };
            vectors.push((id.as_uuid(), pulse_core::embedding_from_bytes(&blob)?));
        }
        Ok((vectors, total))
    }

    /// Desired insight vectors of a collective
    fn desired_insight_vectors(
        &self,
        snapshot: &Snapshot,
        collective_id: CollectiveId,
    ) -> Result<Vec<(VectorId, Vec<f32>)>> {
        let mut vectors = Vec::new();
        for (_, value) in snapshot.scan_prefix(Table::Insights, &[], None, None)? {
            let insight: Insight = decode_row(&value)?;
            if insight.collective_id != collective_id {
                continue;
            }
            let Some(blob) = snapshot.get(
                Table::Embeddings,
                &keys::embedding_key(*insight.id.as_bytes()),
            ) else {
                return Err(PulseError::Corrupt(format!(
                    "insight {} has no stored embedding",
                    insight.id
                )));
            };
            vectors.push((insight.id.as_uuid(), pulse_core::embedding_from_bytes(&blob)?));
        }
        Ok(vectors)
    }

    fn load_collective_indexes(
        &self,
        handle: &CollectiveHandle,
        snapshot: &Snapshot,
        last_csn: Csn,
    ) -> Result<()> {
        let (experience_vectors, total) =
            self.desired_experience_vectors(snapshot, handle.collective.id)?;
        handle.set_experience_count(total);
        let insight_vectors = self.desired_insight_vectors(snapshot, handle.collective.id)?;

        let dim = handle.dimension();
        *handle.experiences.write() = self.load_or_rebuild_index(
            &self.experience_index_path(handle.collective.id),
            dim,
            last_csn,
            experience_vectors,
        );
        *handle.insights.write() = self.load_or_rebuild_index(
            &self.insight_index_path(handle.collective.id),
            dim,
            last_csn,
            insight_vectors,
        );
        Ok(())
    }

    /// Load a sidecar, reconcile it if it lags the database, or rebuild
    /// it from the desired vectors. The sidecar is never trusted over the
    /// KV store.
    fn load_or_rebuild_index(
        &self,
        path: &Path,
        dim: usize,
        last_csn: Csn,
        desired: Vec<(VectorId, Vec<f32>)>,
    ) -> VectorIndex {
        if path.exists() {
            match (vector::load(path, dim), vector::load_meta(path)) {
                (Ok(mut index), Ok(meta)) => {
                    if meta.built_at_csn < last_csn {
                        info!(
                            path = %path.display(),
                            built_at = meta.built_at_csn,
                            csn = last_csn,
                            "reconciling stale vector index"
                        );
                        sync_index(&mut index, &desired);
                    }
                    return index;
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(path = %path.display(), error = %e, "vector index unusable, rebuilding");
                }
            }
        }
        let mut index = VectorIndex::with_scale(dim, DistanceMetric::Cosine, desired.len());
        index.rebuild_from(desired);
        index
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// The database directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The open-time configuration
    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    fn hnsw_dir(&self) -> PathBuf {
        self.dir.join(HNSW_DIR)
    }

    fn experience_index_path(&self, id: CollectiveId) -> PathBuf {
        self.hnsw_dir().join(format!("{id}.hnsw"))
    }

    fn insight_index_path(&self, id: CollectiveId) -> PathBuf {
        self.hnsw_dir().join(format!("{id}_insights.hnsw"))
    }

    // ========================================================================
    // Commit pipeline
    // ========================================================================

    /// Open a read snapshot (counts against the reader quota)
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.tables.snapshot()
    }

    /// The latest committed CSN
    pub fn csn(&self) -> Csn {
        self.tables.visible_csn()
    }

    /// True once a detected invariant violation froze the database
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Acquire)
    }

    /// Run one logical change through the commit pipeline
    ///
    /// The builder runs under the writer lock with a consistent snapshot,
    /// the CSN the change will commit at, and the commit timestamp.
    pub(crate) fn commit_with<R>(
        &self,
        build: impl FnOnce(&Snapshot, Csn, Timestamp) -> Result<(Change, R)>,
    ) -> Result<R> {
        if self.is_read_only() {
            return Err(PulseError::ReadOnly);
        }

        let timeout = self.config.limits.writer_lock_timeout;
        let mut wal = self
            .wal
            .try_lock_for(timeout)
            .ok_or(PulseError::LockTimeout(timeout))?;

        if let Some(max_bytes) = self.config.limits.max_total_bytes {
            if wal.size()? >= max_bytes {
                return Err(PulseError::ResourceLimit(format!(
                    "database log reached {max_bytes} bytes"
                )));
            }
        }

        let snapshot = self.tables.snapshot_internal();
        let csn = self.tables.visible_csn() + 1;
        let now = now_millis();
        let (mut change, result) = build(&snapshot, csn, now)?;

        // A builder that queued nothing is a no-op (idempotent archive,
        // empty patch): no log append, no CSN
        if change.batch.is_empty() && change.index_ops.is_empty() && change.event.is_none() {
            return Ok(result);
        }

        // Changelog ring row for cross-process polling
        if let Some((event, _)) = &change.event {
            change.batch.put(
                Table::Changelog,
                keys::changelog_key(csn),
                bincode::serialize(event)?,
            );
            // Prune entries that fell off the ring
            for (key, _) in snapshot.scan_prefix(Table::Changelog, &[], Some(8), None)? {
                let expired = keys::parse_changelog_key(&key)
                    .map_or(true, |old| old + CHANGELOG_RING <= csn);
                if expired {
                    change.batch.delete(Table::Changelog, key);
                }
            }
        }
        change.batch.put(
            Table::Metadata,
            keys::META_CSN.to_vec(),
            csn.to_le_bytes().to_vec(),
        );
        drop(snapshot);

        // Log first; a failed append rolls the file back and aborts clean
        let offset = wal.size()?;
        if let Err(e) = wal.append_commit(&change.batch, csn) {
            let _ = wal.truncate_to(offset);
            return Err(PulseError::TxnAborted(format!("log append failed: {e}")));
        }

        // Apply and publish
        self.tables.apply(&change.batch, csn);

        // Vector-index updates (lock order: writer → index)
        for op in &change.index_ops {
            if let Err(e) = self.apply_index_op(op) {
                // KV committed but the cache update failed: freeze writes,
                // the index heals on reopen
                self.read_only.store(true, Ordering::Release);
                return Err(PulseError::Corrupt(format!(
                    "vector index update failed after commit: {e}"
                )));
            }
        }

        // Watch fan-out (lock order: index → watch registry)
        if let Some((event, attrs)) = &change.event {
            self.watch.publish(event, attrs);
        }

        // Sidecar persistence cadence
        let since = self.commits_since_persist.fetch_add(1, Ordering::Relaxed) + 1;
        if since >= self.config.hnsw_persist_every() {
            self.commits_since_persist.store(0, Ordering::Relaxed);
            if let Err(e) = self.persist_indexes() {
                warn!(error = %e, "vector index persist failed; will retry next cadence");
            }
        }

        Ok(result)
    }

    fn apply_index_op(&self, op: &IndexOp) -> Result<()> {
        match op {
            IndexOp::UpsertExperience {
                collective_id,
                id,
                embedding,
            } => {
                if let Some(handle) = self.catalog.get(*collective_id) {
                    handle.experiences.write().insert(id.as_uuid(), embedding.clone())?;
                }
            }
            IndexOp::RemoveExperience { collective_id, id } => {
                if let Some(handle) = self.catalog.get(*collective_id) {
                    handle.experiences.write().delete(id.as_uuid());
                }
            }
            IndexOp::UpsertInsight {
                collective_id,
                id,
                embedding,
            } => {
                if let Some(handle) = self.catalog.get(*collective_id) {
                    handle.insights.write().insert(id.as_uuid(), embedding.clone())?;
                }
            }
            IndexOp::RemoveInsight { collective_id, id } => {
                if let Some(handle) = self.catalog.get(*collective_id) {
                    handle.insights.write().delete(id.as_uuid());
                }
            }
        }
        Ok(())
    }

    /// Persist every collective's index sidecars at the current CSN
    pub fn persist_indexes(&self) -> Result<()> {
        let csn = self.tables.visible_csn();
        std::fs::create_dir_all(self.hnsw_dir())?;
        for handle in self.catalog.all() {
            let id = handle.collective.id;
            vector::save(&handle.experiences.read(), &self.experience_index_path(id), csn)?;
            vector::save(&handle.insights.read(), &self.insight_index_path(id), csn)?;
        }
        Ok(())
    }

    /// Persist sidecars and fsync the log
    pub fn flush(&self) -> Result<()> {
        self.persist_indexes()?;
        self.wal.lock().sync()
    }

    // ========================================================================
    // Collective lifecycle
    // ========================================================================

    /// Create a collective, freezing the configured default dimension
    pub fn create_collective(
        &self,
        name: impl Into<String>,
        owner: Option<pulse_core::AgentId>,
    ) -> Result<CollectiveId> {
        let name = name.into();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(PulseError::Validation(
                "collective name must be 1–100 characters".into(),
            ));
        }

        let collective = Collective {
            id: CollectiveId::new(),
            name: name.clone(),
            owner,
            embedding_dimension: self.config.embedding_dimension.size(),
            created_at: now_millis(),
        };
        let id = collective.id;
        let handle = Arc::new(CollectiveHandle::new(collective.clone()));

        let committed = self.commit_with(|_, _, _| {
            if self.catalog.name_taken(&name) {
                return Err(PulseError::Validation(format!(
                    "collective name already exists: {name:?}"
                )));
            }
            // Install under the writer lock so a racing create sees it
            self.catalog.insert(Arc::clone(&handle));
            let mut change = Change::new();
            change.batch.put(
                Table::Collectives,
                keys::collective_key(id),
                bincode::serialize(&collective)?,
            );
            Ok((change, id))
        });

        match committed {
            Ok(id) => Ok(id),
            Err(e) => {
                // Roll the catalog back if the commit itself failed after
                // the handle went in
                if !matches!(e, PulseError::Validation(_)) {
                    self.catalog.remove(id);
                }
                Err(e)
            }
        }
    }

    /// Delete a collective and everything it owns, in one change
    pub fn delete_collective(&self, id: CollectiveId) -> Result<()> {
        self.catalog.require(id)?;

        self.commit_with(|snapshot, _, _| {
            let mut change = Change::new();
            let batch = &mut change.batch;

            batch.delete(Table::Collectives, keys::collective_key(id));

            // Experiences, their embeddings and index rows
            let prefix = keys::exp_by_collective_prefix(id);
            for (key, _) in snapshot.scan_prefix(Table::ExpByCollective, &prefix, None, None)? {
                if let Some((_, _, exp_id)) = keys::parse_exp_by_collective_key(&key) {
                    if let Some(row) = snapshot.get(Table::Experiences, &keys::experience_key(exp_id))
                    {
                        let experience: Experience = decode_row(&row)?;
                        batch.delete(
                            Table::ExpByType,
                            keys::exp_by_type_key(id, experience.kind.type_tag(), exp_id),
                        );
                    }
                    batch.delete(Table::Experiences, keys::experience_key(exp_id));
                    batch.delete(Table::Embeddings, keys::embedding_key(*exp_id.as_bytes()));
                }
                batch.delete(Table::ExpByCollective, key);
            }

            // Relations of this collective
            for (key, value) in snapshot.scan_prefix(Table::Relations, &[], None, None)? {
                let relation: pulse_core::Relation = decode_row(&value)?;
                if relation.collective_id != id {
                    continue;
                }
                batch.delete(Table::Relations, key);
                batch.delete(
                    Table::RelationsBySource,
                    keys::relation_endpoint_key(relation.source_id, relation.id),
                );
                batch.delete(
                    Table::RelationsByTarget,
                    keys::relation_endpoint_key(relation.target_id, relation.id),
                );
            }

            // Insights and their embeddings
            for (key, value) in snapshot.scan_prefix(Table::Insights, &[], None, None)? {
                let insight: Insight = decode_row(&value)?;
                if insight.collective_id != id {
                    continue;
                }
                batch.delete(Table::Insights, key);
                batch.delete(
                    Table::Embeddings,
                    keys::embedding_key(*insight.id.as_bytes()),
                );
            }

            // Activities
            for (key, _) in
                snapshot.scan_prefix(Table::Activities, &keys::activity_prefix(id), None, None)?
            {
                batch.delete(Table::Activities, key);
            }

            Ok((change, ()))
        })?;

        // Tear down in-memory and on-disk derived state
        self.catalog.remove(id);
        self.watch.remove_collective(id);
        let _ = std::fs::remove_file(self.experience_index_path(id));
        let _ = std::fs::remove_file(vector::persist::meta_path(&self.experience_index_path(id)));
        let _ = std::fs::remove_file(self.insight_index_path(id));
        let _ = std::fs::remove_file(vector::persist::meta_path(&self.insight_index_path(id)));
        Ok(())
    }

    /// Get a collective row by id
    pub fn get_collective(&self, id: CollectiveId) -> Option<Collective> {
        self.catalog.get(id).map(|handle| handle.collective.clone())
    }

    /// Get a collective row by name
    pub fn get_collective_by_name(&self, name: &str) -> Option<Collective> {
        self.catalog
            .get_by_name(name)
            .map(|handle| handle.collective.clone())
    }

    /// All collectives, name-ordered
    pub fn list_collectives(&self) -> Vec<Collective> {
        let mut all: Vec<Collective> = self
            .catalog
            .all()
            .into_iter()
            .map(|handle| handle.collective.clone())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Best-effort final persist so reopen skips a rebuild
        if !self.is_read_only() {
            if let Err(e) = self.persist_indexes() {
                warn!(error = %e, "final vector index persist failed");
            }
        }
    }
}

/// Decode a stored row, reporting damage as corruption
pub(crate) fn decode_row<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| PulseError::Corrupt(format!("undecodable row: {e}")))
}

/// Reconcile a loaded index against the vectors the KV store says are
/// live: insert what is missing, tombstone what is gone.
fn sync_index(index: &mut VectorIndex, desired: &[(VectorId, Vec<f32>)]) {
    let desired_ids: std::collections::BTreeSet<VectorId> =
        desired.iter().map(|(id, _)| *id).collect();
    let extra: Vec<VectorId> = index
        .iter_live()
        .map(|(id, _)| id)
        .filter(|id| !desired_ids.contains(id))
        .collect();
    for id in extra {
        index.delete(id);
    }
    for (id, embedding) in desired {
        if !index.contains(*id) {
            let _ = index.insert(*id, embedding.clone());
        }
    }
}
