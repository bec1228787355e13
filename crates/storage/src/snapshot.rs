//! Read snapshots
//!
//! A snapshot is an immutable, repeatable view of the database pinned at
//! the CSN that was visible when it was opened. Snapshots never block
//! writers or other readers; they hold no locks between calls.

use crate::store::Shared;
use crate::table::Table;
use pulse_core::{Csn, PulseError, Result};
use std::ops::Bound;
use std::sync::Arc;
use std::time::Instant;

/// How often scan loops check their deadline
const DEADLINE_CHECK_INTERVAL: usize = 256;

/// The smallest byte string strictly greater than every string with this
/// prefix, or `None` if the prefix is all 0xFF (scan to the end).
fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(upper);
        }
        upper.pop();
    }
    None
}

/// An MVCC read snapshot
///
/// Dropping the snapshot releases its pin so version chains can be
/// pruned past it.
pub struct Snapshot {
    shared: Arc<Shared>,
    csn: Csn,
}

impl Snapshot {
    pub(crate) fn new(shared: Arc<Shared>, csn: Csn) -> Self {
        Self { shared, csn }
    }

    /// The CSN this snapshot is pinned at
    pub fn csn(&self) -> Csn {
        self.csn
    }

    /// Point lookup
    pub fn get(&self, table: Table, key: &[u8]) -> Option<Vec<u8>> {
        let tables = self.shared.tables.read();
        tables[table.index()]
            .get(key)
            .and_then(|chain| chain.get_at(self.csn))
            .cloned()
    }

    /// True if the key resolves to a live value
    pub fn contains(&self, table: Table, key: &[u8]) -> bool {
        let tables = self.shared.tables.read();
        tables[table.index()]
            .get(key)
            .and_then(|chain| chain.get_at(self.csn))
            .is_some()
    }

    /// Ascending scan of every live `(key, value)` with the given prefix
    pub fn scan_prefix(
        &self,
        table: Table,
        prefix: &[u8],
        limit: Option<usize>,
        deadline: Option<Instant>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.scan_prefix_inner(table, prefix, limit, deadline, false)
    }

    /// Descending scan of every live `(key, value)` with the given prefix
    ///
    /// With big-endian timestamp keys, descending key order is reverse
    /// chronological order.
    pub fn scan_prefix_rev(
        &self,
        table: Table,
        prefix: &[u8],
        limit: Option<usize>,
        deadline: Option<Instant>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.scan_prefix_inner(table, prefix, limit, deadline, true)
    }

    fn scan_prefix_inner(
        &self,
        table: Table,
        prefix: &[u8],
        limit: Option<usize>,
        deadline: Option<Instant>,
        rev: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let upper = match prefix_successor(prefix) {
            Some(upper) => Bound::Excluded(upper),
            None => Bound::Unbounded,
        };
        self.scan_bounds(table, Bound::Included(prefix.to_vec()), upper, limit, deadline, rev)
    }

    /// Ascending scan over a half-open key range `[start, end)`
    pub fn scan_range(
        &self,
        table: Table,
        start: &[u8],
        end: &[u8],
        limit: Option<usize>,
        deadline: Option<Instant>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.scan_bounds(
            table,
            Bound::Included(start.to_vec()),
            Bound::Excluded(end.to_vec()),
            limit,
            deadline,
            false,
        )
    }

    fn scan_bounds(
        &self,
        table: Table,
        start: Bound<Vec<u8>>,
        end: Bound<Vec<u8>>,
        limit: Option<usize>,
        deadline: Option<Instant>,
        rev: bool,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut results = Vec::new();
        let tables = self.shared.tables.read();
        let range = tables[table.index()].range((start, end));

        let mut visit = |visited: usize, key: &Vec<u8>, chain: &crate::store::VersionChain| -> Result<bool> {
            if visited % DEADLINE_CHECK_INTERVAL == 0 {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        return Err(PulseError::QueryTimeout);
                    }
                }
            }
            if let Some(value) = chain.get_at(self.csn) {
                results.push((key.clone(), value.clone()));
            }
            Ok(results.len() < limit)
        };

        if rev {
            for (visited, (key, chain)) in range.rev().enumerate() {
                if !visit(visited, key, chain)? {
                    break;
                }
            }
        } else {
            for (visited, (key, chain)) in range.enumerate() {
                if !visit(visited, key, chain)? {
                    break;
                }
            }
        }
        Ok(results)
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.shared.release_pin(self.csn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::WriteBatch;
    use crate::store::MemTables;
    use std::time::Duration;

    fn seeded() -> MemTables {
        let tables = MemTables::new(100);
        let mut batch = WriteBatch::new();
        for i in 0u8..10 {
            batch.put(Table::ExpByCollective, vec![1, i], vec![i]);
            batch.put(Table::ExpByCollective, vec![2, i], vec![100 + i]);
        }
        tables.apply(&batch, 1);
        tables
    }

    #[test]
    fn test_prefix_successor() {
        assert_eq!(prefix_successor(&[1, 2]), Some(vec![1, 3]));
        assert_eq!(prefix_successor(&[1, 0xFF]), Some(vec![2]));
        assert_eq!(prefix_successor(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn test_scan_prefix_is_isolated_to_prefix() {
        let tables = seeded();
        let snap = tables.snapshot().unwrap();
        let rows = snap
            .scan_prefix(Table::ExpByCollective, &[1], None, None)
            .unwrap();
        assert_eq!(rows.len(), 10);
        assert!(rows.iter().all(|(k, _)| k[0] == 1));
    }

    #[test]
    fn test_scan_prefix_rev_descends() {
        let tables = seeded();
        let snap = tables.snapshot().unwrap();
        let rows = snap
            .scan_prefix_rev(Table::ExpByCollective, &[1], Some(3), None)
            .unwrap();
        let keys: Vec<_> = rows.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec![vec![1, 9], vec![1, 8], vec![1, 7]]);
    }

    #[test]
    fn test_scan_limit() {
        let tables = seeded();
        let snap = tables.snapshot().unwrap();
        let rows = snap
            .scan_prefix(Table::ExpByCollective, &[2], Some(4), None)
            .unwrap();
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_expired_deadline_is_query_timeout() {
        let tables = seeded();
        let snap = tables.snapshot().unwrap();
        let past = Instant::now() - Duration::from_millis(1);
        assert!(matches!(
            snap.scan_prefix(Table::ExpByCollective, &[1], None, Some(past)),
            Err(PulseError::QueryTimeout)
        ));
    }

    #[test]
    fn test_scan_skips_tombstones() {
        let tables = seeded();
        let mut batch = WriteBatch::new();
        batch.delete(Table::ExpByCollective, vec![1, 5]);
        tables.apply(&batch, 2);
        let snap = tables.snapshot().unwrap();
        let rows = snap
            .scan_prefix(Table::ExpByCollective, &[1], None, None)
            .unwrap();
        assert_eq!(rows.len(), 9);
        assert!(!rows.iter().any(|(k, _)| k == &vec![1, 5]));
    }
}
