//! MVCC memtables
//!
//! One `BTreeMap` per logical table, all guarded by a single
//! `parking_lot::RwLock` so a committed batch is atomic across tables.
//! Each key holds a version chain (newest first); readers resolve chains
//! at their snapshot CSN, writers append new versions and the visible CSN
//! is published only after every row of the commit is in place — a
//! snapshot sees all of a commit or none of it.
//!
//! Version chains are pruned during commits: versions older than the
//! oldest pinned snapshot are unreachable and dropped.

use crate::batch::{WriteBatch, WriteOp};
use crate::snapshot::Snapshot;
use crate::table::Table;
use parking_lot::{Mutex, RwLock};
use pulse_core::{Csn, PulseError, Result};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// One version of a value; `None` is a tombstone
type Version = (Csn, Option<Vec<u8>>);

/// Version chain for MVCC, newest first
#[derive(Debug, Clone, Default)]
pub(crate) struct VersionChain {
    versions: VecDeque<Version>,
}

impl VersionChain {
    fn push(&mut self, csn: Csn, value: Option<Vec<u8>>) {
        self.versions.push_front((csn, value));
    }

    /// Resolve the chain at a snapshot CSN
    pub(crate) fn get_at(&self, csn: Csn) -> Option<&Vec<u8>> {
        self.versions
            .iter()
            .find(|(v, _)| *v <= csn)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Drop versions no snapshot can reach: everything older than the
    /// newest version at or below `floor`.
    fn prune(&mut self, floor: Csn) {
        if let Some(keep) = self.versions.iter().position(|(v, _)| *v <= floor) {
            self.versions.truncate(keep + 1);
        }
    }

    /// True once the chain is a single unreachable tombstone
    fn is_garbage(&self, floor: Csn) -> bool {
        self.versions.len() == 1 && self.versions[0].1.is_none() && self.versions[0].0 <= floor
    }
}

pub(crate) struct Shared {
    /// One ordered map per `Table`, indexed by `Table::index()`
    pub(crate) tables: RwLock<Vec<BTreeMap<Vec<u8>, VersionChain>>>,
    /// Highest CSN visible to new snapshots
    visible_csn: AtomicU64,
    /// CSN → number of snapshots pinned there
    pins: Mutex<BTreeMap<Csn, usize>>,
    /// Number of currently open snapshots
    open_snapshots: AtomicUsize,
    /// Cap on concurrently open snapshots
    max_snapshots: usize,
}

impl Shared {
    pub(crate) fn release_pin(&self, csn: Csn) {
        let mut pins = self.pins.lock();
        if let Some(count) = pins.get_mut(&csn) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&csn);
            }
        }
        self.open_snapshots.fetch_sub(1, Ordering::Relaxed);
    }

    fn min_pinned(&self) -> Option<Csn> {
        self.pins.lock().keys().next().copied()
    }
}

/// The in-memory table set of one database
///
/// Cheap to clone (shared interior); the engine owns one per open
/// database and hands out read snapshots.
#[derive(Clone)]
pub struct MemTables {
    shared: Arc<Shared>,
}

impl MemTables {
    /// Create an empty table set
    pub fn new(max_snapshots: usize) -> Self {
        let tables = (0..Table::ALL.len()).map(|_| BTreeMap::new()).collect();
        Self {
            shared: Arc::new(Shared {
                tables: RwLock::new(tables),
                visible_csn: AtomicU64::new(0),
                pins: Mutex::new(BTreeMap::new()),
                open_snapshots: AtomicUsize::new(0),
                max_snapshots,
            }),
        }
    }

    /// Highest committed CSN visible to new snapshots
    pub fn visible_csn(&self) -> Csn {
        self.shared.visible_csn.load(Ordering::Acquire)
    }

    /// Open a read snapshot pinned at the current visible CSN
    ///
    /// Never blocks writers. Fails with `ResourceLimit` once the
    /// configured number of snapshots is already open.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let open = self.shared.open_snapshots.fetch_add(1, Ordering::Relaxed);
        if open >= self.shared.max_snapshots {
            self.shared.open_snapshots.fetch_sub(1, Ordering::Relaxed);
            return Err(PulseError::ResourceLimit(format!(
                "{} read snapshots already open",
                self.shared.max_snapshots
            )));
        }
        let csn = self.visible_csn();
        *self.shared.pins.lock().entry(csn).or_insert(0) += 1;
        Ok(Snapshot::new(Arc::clone(&self.shared), csn))
    }

    /// Snapshot for the write path's own reads
    ///
    /// Not counted against the reader quota — the single writer must
    /// never be starved by open read snapshots. Still pins its CSN.
    pub fn snapshot_internal(&self) -> Snapshot {
        // Balance the release in Snapshot::drop, which always decrements
        self.shared.open_snapshots.fetch_add(1, Ordering::Relaxed);
        let csn = self.visible_csn();
        *self.shared.pins.lock().entry(csn).or_insert(0) += 1;
        Snapshot::new(Arc::clone(&self.shared), csn)
    }

    /// Apply a committed batch at `csn`, then publish it
    ///
    /// Every row is installed under one write lock; the visible CSN is
    /// stored only afterwards, so concurrent snapshots observe the commit
    /// atomically. Touched chains are pruned against the oldest pin.
    pub fn apply(&self, batch: &WriteBatch, csn: Csn) {
        debug_assert!(csn > self.visible_csn(), "CSN must be strictly monotone");
        let floor = self.shared.min_pinned().unwrap_or(csn).min(csn);
        {
            let mut tables = self.shared.tables.write();
            for op in batch.ops() {
                match op {
                    WriteOp::Put { table, key, value } => {
                        let chain = tables[table.index()].entry(key.clone()).or_default();
                        chain.push(csn, Some(value.clone()));
                        chain.prune(floor);
                    }
                    WriteOp::Delete { table, key } => {
                        let map = &mut tables[table.index()];
                        if let Some(chain) = map.get_mut(key) {
                            chain.push(csn, None);
                            chain.prune(floor);
                            if chain.is_garbage(floor) {
                                map.remove(key);
                            }
                        } else {
                            // Delete of an absent key still needs a tombstone:
                            // older snapshots must not resurrect it if a later
                            // commit re-inserts.
                            let chain = map.entry(key.clone()).or_default();
                            chain.push(csn, None);
                        }
                    }
                }
            }
        }
        self.shared.visible_csn.store(csn, Ordering::Release);
    }

    /// Number of live keys in a table at the current visible CSN
    pub fn len(&self, table: Table) -> usize {
        let csn = self.visible_csn();
        let tables = self.shared.tables.read();
        tables[table.index()]
            .values()
            .filter(|chain| chain.get_at(csn).is_some())
            .count()
    }

    /// True if the table holds no live keys
    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(tables: &MemTables, csn: Csn, key: &[u8], value: &[u8]) {
        let mut batch = WriteBatch::new();
        batch.put(Table::Experiences, key.to_vec(), value.to_vec());
        tables.apply(&batch, csn);
    }

    #[test]
    fn test_snapshot_sees_committed_state() {
        let tables = MemTables::new(100);
        put(&tables, 1, b"a", b"1");
        let snap = tables.snapshot().unwrap();
        assert_eq!(snap.get(Table::Experiences, b"a"), Some(b"1".to_vec()));
        assert_eq!(snap.csn(), 1);
    }

    #[test]
    fn test_snapshot_is_repeatable() {
        let tables = MemTables::new(100);
        put(&tables, 1, b"a", b"1");
        let snap = tables.snapshot().unwrap();
        put(&tables, 2, b"a", b"2");
        // The old snapshot keeps seeing the old value
        assert_eq!(snap.get(Table::Experiences, b"a"), Some(b"1".to_vec()));
        // A fresh snapshot sees the new one
        let fresh = tables.snapshot().unwrap();
        assert_eq!(fresh.get(Table::Experiences, b"a"), Some(b"2".to_vec()));
    }

    #[test]
    fn test_delete_is_tombstoned_not_resurrected() {
        let tables = MemTables::new(100);
        put(&tables, 1, b"a", b"1");
        let old = tables.snapshot().unwrap();

        let mut batch = WriteBatch::new();
        batch.delete(Table::Experiences, b"a".to_vec());
        tables.apply(&batch, 2);

        assert_eq!(old.get(Table::Experiences, b"a"), Some(b"1".to_vec()));
        let fresh = tables.snapshot().unwrap();
        assert_eq!(fresh.get(Table::Experiences, b"a"), None);
    }

    #[test]
    fn test_snapshot_limit() {
        let tables = MemTables::new(2);
        let _s1 = tables.snapshot().unwrap();
        let _s2 = tables.snapshot().unwrap();
        assert!(matches!(
            tables.snapshot(),
            Err(PulseError::ResourceLimit(_))
        ));
        drop(_s1);
        assert!(tables.snapshot().is_ok());
    }

    #[test]
    fn test_chain_pruning_keeps_pinned_versions() {
        let tables = MemTables::new(100);
        put(&tables, 1, b"a", b"1");
        let pinned = tables.snapshot().unwrap();
        put(&tables, 2, b"a", b"2");
        put(&tables, 3, b"a", b"3");
        // The pinned snapshot still resolves to its version
        assert_eq!(pinned.get(Table::Experiences, b"a"), Some(b"1".to_vec()));
        drop(pinned);
        // After release, later commits prune freely
        put(&tables, 4, b"a", b"4");
        let snap = tables.snapshot().unwrap();
        assert_eq!(snap.get(Table::Experiences, b"a"), Some(b"4".to_vec()));
    }

    #[test]
    fn test_len_counts_live_keys_only() {
        let tables = MemTables::new(100);
        put(&tables, 1, b"a", b"1");
        put(&tables, 2, b"b", b"2");
        let mut batch = WriteBatch::new();
        batch.delete(Table::Experiences, b"a".to_vec());
        tables.apply(&batch, 3);
        assert_eq!(tables.len(Table::Experiences), 1);
    }
}
