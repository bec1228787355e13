//! Write batches
//!
//! A `WriteBatch` accumulates the ordered puts and deletes of one logical
//! change. The engine appends the batch to the WAL first, then applies it
//! to the memtables under a single write lock, so a commit is atomic
//! across tables.

use crate::table::Table;
use serde::{Deserialize, Serialize};

/// One operation inside a write batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Insert or replace a key
    Put {
        /// Target table
        table: Table,
        /// Encoded key
        key: Vec<u8>,
        /// Encoded value (empty for index tables)
        value: Vec<u8>,
    },
    /// Remove a key
    Delete {
        /// Target table
        table: Table,
        /// Encoded key
        key: Vec<u8>,
    },
}

/// Ordered collection of writes committed as one logical change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put { table, key, value });
    }

    /// Queue a put with an empty value (index tables)
    pub fn put_index(&mut self, table: Table, key: Vec<u8>) {
        self.put(table, key, Vec::new());
    }

    /// Queue a delete
    pub fn delete(&mut self, table: Table, key: Vec<u8>) {
        self.ops.push(WriteOp::Delete { table, key });
    }

    /// True if nothing was queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// The queued operations, in order
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consume the batch, yielding its operations
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_preserves_order() {
        let mut batch = WriteBatch::new();
        batch.put(Table::Experiences, vec![1], vec![10]);
        batch.delete(Table::Embeddings, vec![2]);
        batch.put_index(Table::ExpByType, vec![3]);
        assert_eq!(batch.len(), 3);
        match &batch.ops()[2] {
            WriteOp::Put { table, value, .. } => {
                assert_eq!(*table, Table::ExpByType);
                assert!(value.is_empty());
            }
            other => panic!("unexpected op {other:?}"),
        }
    }
}
