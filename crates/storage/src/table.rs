//! Logical tables
//!
//! The KV layer is organized as a fixed set of ordered tables. Primary
//! tables hold bincode rows; index tables hold compound keys with empty
//! values; `Embeddings` holds raw little-endian f32 blobs.

use serde::{Deserialize, Serialize};

/// The logical tables of a PulseDB database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    /// Collective rows by collective id
    Collectives,
    /// Experience rows (minus embedding) by experience id
    Experiences,
    /// Raw f32 embedding blobs by entity id (experiences and insights)
    Embeddings,
    /// Relation rows by relation id
    Relations,
    /// Index: source id ‖ relation id → ()
    RelationsBySource,
    /// Index: target id ‖ relation id → ()
    RelationsByTarget,
    /// Insight rows by insight id
    Insights,
    /// Activity rows by collective id ‖ agent id
    Activities,
    /// Index: collective ‖ created_at BE ‖ experience id → ()
    ExpByCollective,
    /// Index: collective ‖ type tag ‖ experience id → ()
    ExpByType,
    /// Schema version, CSN and other database-level metadata
    Metadata,
    /// Ring of recent watch events by BE CSN, for cross-process polling
    Changelog,
}

impl Table {
    /// Every table, in storage order
    pub const ALL: [Table; 12] = [
        Table::Collectives,
        Table::Experiences,
        Table::Embeddings,
        Table::Relations,
        Table::RelationsBySource,
        Table::RelationsByTarget,
        Table::Insights,
        Table::Activities,
        Table::ExpByCollective,
        Table::ExpByType,
        Table::Metadata,
        Table::Changelog,
    ];

    /// Dense index used for in-memory table arrays
    pub fn index(self) -> usize {
        match self {
            Table::Collectives => 0,
            Table::Experiences => 1,
            Table::Embeddings => 2,
            Table::Relations => 3,
            Table::RelationsBySource => 4,
            Table::RelationsByTarget => 5,
            Table::Insights => 6,
            Table::Activities => 7,
            Table::ExpByCollective => 8,
            Table::ExpByType => 9,
            Table::Metadata => 10,
            Table::Changelog => 11,
        }
    }

    /// Table name for logs and errors
    pub fn name(self) -> &'static str {
        match self {
            Table::Collectives => "collectives",
            Table::Experiences => "experiences",
            Table::Embeddings => "embeddings",
            Table::Relations => "relations",
            Table::RelationsBySource => "relations_by_source",
            Table::RelationsByTarget => "relations_by_target",
            Table::Insights => "insights",
            Table::Activities => "activities",
            Table::ExpByCollective => "exp_by_collective",
            Table::ExpByType => "exp_by_type",
            Table::Metadata => "metadata",
            Table::Changelog => "changelog",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_dense() {
        for (i, table) in Table::ALL.iter().enumerate() {
            assert_eq!(table.index(), i);
        }
    }
}
