//! Database statistics

use crate::database::Database;
use pulse_core::{CollectiveId, Csn, Result};

/// Per-collective counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectiveStats {
    /// Collective id
    pub id: CollectiveId,
    /// Collective name
    pub name: String,
    /// Stored experiences, archived included
    pub experiences: u64,
    /// Live vectors in the experience index
    pub indexed_experiences: usize,
    /// Live vectors in the insight index
    pub indexed_insights: usize,
}

/// Whole-database counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Latest committed CSN
    pub csn: Csn,
    /// Per-collective breakdown, name-ordered
    pub collectives: Vec<CollectiveStats>,
}

impl Database {
    /// Counters for monitoring and tests
    pub fn stats(&self) -> Result<DatabaseStats> {
        let mut collectives: Vec<CollectiveStats> = self
            .catalog
            .all()
            .into_iter()
            .map(|handle| CollectiveStats {
                id: handle.collective.id,
                name: handle.collective.name.clone(),
                experiences: handle.experience_count(),
                indexed_experiences: handle.experiences.read().len(),
                indexed_insights: handle.insights.read().len(),
            })
            .collect();
        collectives.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(DatabaseStats {
            csn: self.csn(),
            collectives,
        })
    }
}
