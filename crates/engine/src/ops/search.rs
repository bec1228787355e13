//! Similarity search and recency scans

use crate::database::{decode_row, Database};
use crate::ops::filter::{self, ExperienceFilter};
use pulse_core::{keys, validate, CollectiveId, Experience, PulseError, Result};
use pulse_storage::{Snapshot, Table};
use std::cmp::Ordering;
use std::time::Instant;

impl Database {
    /// k-nearest experiences by embedding similarity
    ///
    /// Similarity is cosine (1 − cosine distance); results come back
    /// similarity-descending. Archived experiences never appear.
    pub fn search_similar(
        &self,
        collective_id: CollectiveId,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(Experience, f32)>> {
        self.search_similar_filtered(collective_id, query, k, None)
    }

    /// k-nearest with a post-filter evaluated during index traversal
    pub fn search_similar_filtered(
        &self,
        collective_id: CollectiveId,
        query: &[f32],
        k: usize,
        filter: Option<&ExperienceFilter>,
    ) -> Result<Vec<(Experience, f32)>> {
        let snapshot = self.snapshot()?;
        self.search_similar_in(&snapshot, collective_id, query, k, filter)
    }

    /// Similarity search against an existing snapshot
    pub(crate) fn search_similar_in(
        &self,
        snapshot: &Snapshot,
        collective_id: CollectiveId,
        query: &[f32],
        k: usize,
        filter: Option<&ExperienceFilter>,
    ) -> Result<Vec<(Experience, f32)>> {
        validate::validate_k(k)?;
        let handle = self.catalog.require(collective_id)?;
        validate::validate_embedding(query, handle.dimension())?;

        // The predicate sees vector ids during traversal; resolve each
        // against the snapshot so filtered-out and archived rows are
        // skipped without shrinking the result set below k.
        let admits = |id: crate::vector::VectorId| -> bool {
            let key = keys::experience_key(pulse_core::ExperienceId::from_bytes(*id.as_bytes()));
            match snapshot.get(Table::Experiences, &key) {
                Some(bytes) => match decode_row::<Experience>(&bytes) {
                    Ok(experience) => {
                        experience.collective_id == collective_id
                            && filter::passes(filter, &experience)
                    }
                    Err(_) => false,
                },
                None => false,
            }
        };

        let index = handle.experiences.read();
        let ef = index.params().ef_search.max(k);
        let hits = index.search(query, k, ef, Some(&admits))?;
        drop(index);

        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let id = pulse_core::ExperienceId::from_bytes(*id.as_bytes());
            let Some(bytes) = snapshot.get(Table::Experiences, &keys::experience_key(id)) else {
                continue;
            };
            results.push((decode_row::<Experience>(&bytes)?, score));
        }

        // Similarity descending; ties newest-first, then id ascending
        results.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);
        Ok(results)
    }

    /// The most recent experiences of a collective, newest first
    pub fn get_recent_experiences(
        &self,
        collective_id: CollectiveId,
        limit: usize,
        filter: Option<&ExperienceFilter>,
    ) -> Result<Vec<Experience>> {
        let snapshot = self.snapshot()?;
        self.recent_in(&snapshot, collective_id, limit, filter)
    }

    /// Recency scan against an existing snapshot
    pub(crate) fn recent_in(
        &self,
        snapshot: &Snapshot,
        collective_id: CollectiveId,
        limit: usize,
        filter: Option<&ExperienceFilter>,
    ) -> Result<Vec<Experience>> {
        self.catalog.require(collective_id)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let deadline = self
            .config()
            .limits
            .query_timeout
            .map(|timeout| Instant::now() + timeout);

        // Reverse scan over big-endian timestamps = reverse chronology.
        // Filters apply per row, so scan without a limit and stop once
        // enough rows matched.
        let prefix = keys::exp_by_collective_prefix(collective_id);
        let rows = snapshot.scan_prefix_rev(Table::ExpByCollective, &prefix, None, deadline)?;

        let mut results = Vec::with_capacity(limit.min(64));
        for (key, _) in rows {
            let Some((_, _, id)) = keys::parse_exp_by_collective_key(&key) else {
                return Err(PulseError::Corrupt("malformed exp_by_collective key".into()));
            };
            let Some(bytes) = snapshot.get(Table::Experiences, &keys::experience_key(id)) else {
                return Err(PulseError::Corrupt(format!(
                    "index row for missing experience {id}"
                )));
            };
            let experience: Experience = decode_row(&bytes)?;
            if filter::passes(filter, &experience) {
                results.push(experience);
                if results.len() == limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// Experiences of one type within a collective
    ///
    /// Prefix scan over the `exp_by_type` index; `type_tag` is the 0–8
    /// discriminant (see `ExperienceKind::type_tag`). Rows come back in
    /// id order, which for time-ordered ids is creation order.
    pub fn get_experiences_by_type(
        &self,
        collective_id: CollectiveId,
        type_tag: u8,
        limit: usize,
        filter: Option<&ExperienceFilter>,
    ) -> Result<Vec<Experience>> {
        self.catalog.require(collective_id)?;
        if limit == 0 {
            return Ok(Vec::new());
        }
        let snapshot = self.snapshot()?;
        let deadline = self
            .config()
            .limits
            .query_timeout
            .map(|timeout| Instant::now() + timeout);

        let prefix = keys::exp_by_type_prefix(collective_id, type_tag);
        let mut results = Vec::new();
        for (key, _) in snapshot.scan_prefix(Table::ExpByType, &prefix, None, deadline)? {
            if key.len() != 33 {
                return Err(PulseError::Corrupt("malformed exp_by_type key".into()));
            }
            let id = pulse_core::ExperienceId::from_bytes(key[17..33].try_into().map_err(|_| {
                PulseError::Corrupt("malformed exp_by_type key".into())
            })?);
            let Some(bytes) = snapshot.get(Table::Experiences, &keys::experience_key(id)) else {
                return Err(PulseError::Corrupt(format!(
                    "index row for missing experience {id}"
                )));
            };
            let experience: Experience = decode_row(&bytes)?;
            if filter::passes(filter, &experience) {
                results.push(experience);
                if results.len() == limit {
                    break;
                }
            }
        }
        Ok(results)
    }

    /// Number of experiences in a collective (archived included)
    pub fn count_experiences(&self, collective_id: CollectiveId) -> Result<u64> {
        let handle = self.catalog.require(collective_id)?;
        Ok(handle.experience_count())
    }
}
