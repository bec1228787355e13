//! Typed relations between experiences
//!
//! Directed edges within one collective. No self-edges, no
//! cross-collective edges, no duplicate `(source, target, kind)` edges.
//! Deleting either endpoint cascades (see `delete_experience`).

use crate::database::{decode_row, Change, Database};
use pulse_core::{
    keys, validate, Experience, ExperienceId, PulseError, Relation, RelationDirection, RelationId,
    RelationKind, Result,
};
use pulse_storage::{Snapshot, Table};
use std::collections::BTreeMap;

impl Database {
    /// Store a relation between two experiences of the same collective
    pub fn store_relation(
        &self,
        source_id: ExperienceId,
        target_id: ExperienceId,
        kind: RelationKind,
        strength: f32,
    ) -> Result<Relation> {
        validate::validate_score("strength", strength)?;
        if source_id == target_id {
            return Err(PulseError::Validation(
                "an experience cannot relate to itself".into(),
            ));
        }

        self.commit_with(|snapshot, _, now| {
            let source: Experience = decode_row(
                &snapshot
                    .get(Table::Experiences, &keys::experience_key(source_id))
                    .ok_or_else(|| PulseError::not_found("experience", source_id))?,
            )?;
            let target: Experience = decode_row(
                &snapshot
                    .get(Table::Experiences, &keys::experience_key(target_id))
                    .ok_or_else(|| PulseError::not_found("experience", target_id))?,
            )?;
            if source.collective_id != target.collective_id {
                return Err(PulseError::Validation(
                    "relations cannot span collectives".into(),
                ));
            }

            // One edge per (source, target, kind)
            let prefix = keys::relation_endpoint_prefix(source_id);
            for (key, _) in snapshot.scan_prefix(Table::RelationsBySource, &prefix, None, None)? {
                let Some(existing_id) = keys::parse_relation_endpoint_key(&key) else {
                    continue;
                };
                if let Some(bytes) = snapshot.get(Table::Relations, &keys::relation_key(existing_id))
                {
                    let existing: Relation = decode_row(&bytes)?;
                    if existing.target_id == target_id && existing.kind == kind {
                        return Err(PulseError::Validation(format!(
                            "relation already exists: {source_id} -[{kind:?}]-> {target_id}"
                        )));
                    }
                }
            }

            let relation = Relation {
                id: RelationId::new(),
                collective_id: source.collective_id,
                source_id,
                target_id,
                kind,
                strength,
                created_at: now,
            };

            let mut change = Change::new();
            change.batch.put(
                Table::Relations,
                keys::relation_key(relation.id),
                bincode::serialize(&relation)?,
            );
            change.batch.put_index(
                Table::RelationsBySource,
                keys::relation_endpoint_key(source_id, relation.id),
            );
            change.batch.put_index(
                Table::RelationsByTarget,
                keys::relation_endpoint_key(target_id, relation.id),
            );
            Ok((change, relation))
        })
    }

    /// Relations touching an experience, with the opposite endpoint's row
    pub fn get_related_experiences(
        &self,
        id: ExperienceId,
        direction: RelationDirection,
    ) -> Result<Vec<(Relation, Experience)>> {
        let snapshot = self.snapshot()?;
        self.related_pairs_in(&snapshot, id, direction)
    }

    pub(crate) fn related_pairs_in(
        &self,
        snapshot: &Snapshot,
        id: ExperienceId,
        direction: RelationDirection,
    ) -> Result<Vec<(Relation, Experience)>> {
        let relations = self.relations_of_in(snapshot, id, direction)?;
        let mut pairs = Vec::with_capacity(relations.len());
        for relation in relations.into_values() {
            let other = if relation.source_id == id {
                relation.target_id
            } else {
                relation.source_id
            };
            let Some(bytes) = snapshot.get(Table::Experiences, &keys::experience_key(other)) else {
                return Err(PulseError::Corrupt(format!(
                    "relation {} references missing experience {other}",
                    relation.id
                )));
            };
            pairs.push((relation, decode_row(&bytes)?));
        }
        Ok(pairs)
    }

    /// Relations of one experience, deduplicated by id
    pub(crate) fn relations_of_in(
        &self,
        snapshot: &Snapshot,
        id: ExperienceId,
        direction: RelationDirection,
    ) -> Result<BTreeMap<RelationId, Relation>> {
        let tables: &[Table] = match direction {
            RelationDirection::Out => &[Table::RelationsBySource],
            RelationDirection::In => &[Table::RelationsByTarget],
            RelationDirection::Both => &[Table::RelationsBySource, Table::RelationsByTarget],
        };

        let mut relations = BTreeMap::new();
        let prefix = keys::relation_endpoint_prefix(id);
        for table in tables {
            for (key, _) in snapshot.scan_prefix(*table, &prefix, None, None)? {
                let Some(relation_id) = keys::parse_relation_endpoint_key(&key) else {
                    return Err(PulseError::Corrupt("malformed relation index key".into()));
                };
                let Some(bytes) = snapshot.get(Table::Relations, &keys::relation_key(relation_id))
                else {
                    return Err(PulseError::Corrupt(format!(
                        "dangling relation index entry {relation_id}"
                    )));
                };
                relations.insert(relation_id, decode_row(&bytes)?);
            }
        }
        Ok(relations)
    }

    /// Fetch a relation by id; `None` if absent
    pub fn get_relation(&self, id: RelationId) -> Result<Option<Relation>> {
        let snapshot = self.snapshot()?;
        snapshot
            .get(Table::Relations, &keys::relation_key(id))
            .map(|bytes| decode_row(&bytes))
            .transpose()
    }

    /// Delete a relation directly
    pub fn delete_relation(&self, id: RelationId) -> Result<()> {
        self.commit_with(|snapshot, _, _| {
            let relation: Relation = decode_row(
                &snapshot
                    .get(Table::Relations, &keys::relation_key(id))
                    .ok_or_else(|| PulseError::not_found("relation", id))?,
            )?;

            let mut change = Change::new();
            change.batch.delete(Table::Relations, keys::relation_key(id));
            change.batch.delete(
                Table::RelationsBySource,
                keys::relation_endpoint_key(relation.source_id, id),
            );
            change.batch.delete(
                Table::RelationsByTarget,
                keys::relation_endpoint_key(relation.target_id, id),
            );
            Ok((change, ()))
        })
    }
}
