//! Experience lifecycle operations
//!
//! record → Live; archive ⇄ unarchive toggle vector-index membership;
//! delete is terminal and cascades to relations. Content and embedding
//! are immutable after recording.

use crate::database::{decode_row, Change, Database, IndexOp};
use crate::config::EmbeddingProvider;
use crate::watch::EventAttributes;
use pulse_core::{
    keys, validate, Experience, ExperienceId, ExperiencePatch, NewExperience, PulseError, Result,
    WatchEvent, WatchEventKind,
};
use pulse_storage::Table;

fn attributes_of(experience: &Experience) -> EventAttributes {
    EventAttributes {
        domain_tags: experience.domain_tags.clone(),
        type_tag: experience.kind.type_tag(),
        importance: experience.importance,
    }
}

impl Database {
    /// Record a new experience and return the stored row
    ///
    /// With an `External` provider the embedding must be supplied; with a
    /// builtin provider a missing embedding is generated from the
    /// content. Either way its length must equal the collective's frozen
    /// dimension.
    pub fn record_experience(&self, new: NewExperience) -> Result<Experience> {
        validate::validate_new_experience(&new)?;
        let handle = self.catalog.require(new.collective_id)?;
        let dim = handle.dimension();

        if let Some(quota) = self.config().limits.max_experiences_per_collective {
            if handle.experience_count() >= quota {
                return Err(PulseError::ResourceLimit(format!(
                    "collective holds {quota} experiences already"
                )));
            }
        }

        let embedding = match new.embedding.clone() {
            Some(embedding) => embedding,
            None => match &self.config().embedding_provider {
                EmbeddingProvider::Builtin { .. } => {
                    let embedder = self.embedder.as_ref().ok_or_else(|| {
                        PulseError::Embedding("no embedder installed".into())
                    })?;
                    embedder.embed(&new.content)?
                }
                EmbeddingProvider::External => {
                    return Err(PulseError::Validation(
                        "embedding is required with an external provider".into(),
                    ))
                }
            },
        };
        validate::validate_embedding(&embedding, dim)?;

        let collective_id = new.collective_id;
        let recorded = self.commit_with(|_, csn, now| {
            let id = ExperienceId::new();
            let experience = Experience {
                id,
                collective_id,
                content: new.content.clone(),
                kind: new.kind.clone(),
                importance: new.importance,
                confidence: new.confidence,
                application_count: 0,
                domain_tags: new.domain_tags.clone(),
                source_files: new.source_files.clone(),
                agent_id: new.agent_id.clone(),
                archived: false,
                created_at: now,
                updated_at: now,
            };

            let mut change = Change::new();
            change.batch.put(
                Table::Experiences,
                keys::experience_key(id),
                bincode::serialize(&experience)?,
            );
            change.batch.put(
                Table::Embeddings,
                keys::embedding_key(*id.as_bytes()),
                pulse_core::embedding_to_bytes(&embedding),
            );
            change.batch.put_index(
                Table::ExpByCollective,
                keys::exp_by_collective_key(collective_id, now, id),
            );
            change.batch.put_index(
                Table::ExpByType,
                keys::exp_by_type_key(collective_id, experience.kind.type_tag(), id),
            );
            change.index_ops.push(IndexOp::UpsertExperience {
                collective_id,
                id,
                embedding: embedding.clone(),
            });
            change.event = Some((
                WatchEvent {
                    experience_id: id,
                    collective_id,
                    kind: WatchEventKind::Created,
                    timestamp: now,
                    csn,
                },
                attributes_of(&experience),
            ));
            Ok((change, experience))
        })?;

        handle.bump_experience_count(1);
        Ok(recorded)
    }

    /// Fetch an experience by id; `None` if absent
    pub fn get_experience(&self, id: ExperienceId) -> Result<Option<Experience>> {
        let snapshot = self.snapshot()?;
        snapshot
            .get(Table::Experiences, &keys::experience_key(id))
            .map(|bytes| decode_row(&bytes))
            .transpose()
    }

    /// Patch the mutable fields of an experience
    ///
    /// Content, embedding and kind never change; archived state moves
    /// through [`archive_experience`] / [`unarchive_experience`] only.
    ///
    /// [`archive_experience`]: Database::archive_experience
    /// [`unarchive_experience`]: Database::unarchive_experience
    pub fn update_experience(&self, id: ExperienceId, patch: ExperiencePatch) -> Result<Experience> {
        validate::validate_patch(&patch)?;
        self.commit_with(|snapshot, csn, now| {
            let row = snapshot
                .get(Table::Experiences, &keys::experience_key(id))
                .ok_or_else(|| PulseError::not_found("experience", id))?;
            let mut experience: Experience = decode_row(&row)?;

            if patch.is_empty() {
                return Ok((Change::new(), experience));
            }
            if let Some(importance) = patch.importance {
                experience.importance = importance;
            }
            if let Some(confidence) = patch.confidence {
                experience.confidence = confidence;
            }
            if let Some(tags) = patch.domain_tags.clone() {
                experience.domain_tags = tags;
            }
            experience.updated_at = now;

            let mut change = Change::new();
            change.batch.put(
                Table::Experiences,
                keys::experience_key(id),
                bincode::serialize(&experience)?,
            );
            change.event = Some((
                WatchEvent {
                    experience_id: id,
                    collective_id: experience.collective_id,
                    kind: WatchEventKind::Updated,
                    timestamp: now,
                    csn,
                },
                attributes_of(&experience),
            ));
            Ok((change, experience))
        })
    }

    /// Archive an experience: it stays stored but leaves the vector
    /// index and default recency scans. Idempotent.
    pub fn archive_experience(&self, id: ExperienceId) -> Result<()> {
        self.commit_with(|snapshot, csn, now| {
            let row = snapshot
                .get(Table::Experiences, &keys::experience_key(id))
                .ok_or_else(|| PulseError::not_found("experience", id))?;
            let mut experience: Experience = decode_row(&row)?;
            if experience.archived {
                return Ok((Change::new(), ()));
            }
            experience.archived = true;
            experience.updated_at = now;

            let mut change = Change::new();
            change.batch.put(
                Table::Experiences,
                keys::experience_key(id),
                bincode::serialize(&experience)?,
            );
            change.index_ops.push(IndexOp::RemoveExperience {
                collective_id: experience.collective_id,
                id,
            });
            change.event = Some((
                WatchEvent {
                    experience_id: id,
                    collective_id: experience.collective_id,
                    kind: WatchEventKind::Archived,
                    timestamp: now,
                    csn,
                },
                attributes_of(&experience),
            ));
            Ok((change, ()))
        })
    }

    /// Return an archived experience to the vector index. Idempotent.
    pub fn unarchive_experience(&self, id: ExperienceId) -> Result<()> {
        self.commit_with(|snapshot, csn, now| {
            let row = snapshot
                .get(Table::Experiences, &keys::experience_key(id))
                .ok_or_else(|| PulseError::not_found("experience", id))?;
            let mut experience: Experience = decode_row(&row)?;
            if !experience.archived {
                return Ok((Change::new(), ()));
            }
            let blob = snapshot
                .get(Table::Embeddings, &keys::embedding_key(*id.as_bytes()))
                .ok_or_else(|| {
                    PulseError::Corrupt(format!("experience {id} has no stored embedding"))
                })?;
            let embedding = pulse_core::embedding_from_bytes(&blob)?;

            experience.archived = false;
            experience.updated_at = now;

            let mut change = Change::new();
            change.batch.put(
                Table::Experiences,
                keys::experience_key(id),
                bincode::serialize(&experience)?,
            );
            change.index_ops.push(IndexOp::UpsertExperience {
                collective_id: experience.collective_id,
                id,
                embedding,
            });
            change.event = Some((
                WatchEvent {
                    experience_id: id,
                    collective_id: experience.collective_id,
                    kind: WatchEventKind::Updated,
                    timestamp: now,
                    csn,
                },
                attributes_of(&experience),
            ));
            Ok((change, ()))
        })
    }

    /// Delete an experience, cascading to every relation touching it
    pub fn delete_experience(&self, id: ExperienceId) -> Result<()> {
        let collective_id = self.commit_with(|snapshot, csn, now| {
            let row = snapshot
                .get(Table::Experiences, &keys::experience_key(id))
                .ok_or_else(|| PulseError::not_found("experience", id))?;
            let experience: Experience = decode_row(&row)?;
            let collective_id = experience.collective_id;

            let mut change = Change::new();
            let batch = &mut change.batch;
            batch.delete(Table::Experiences, keys::experience_key(id));
            batch.delete(Table::Embeddings, keys::embedding_key(*id.as_bytes()));
            batch.delete(
                Table::ExpByCollective,
                keys::exp_by_collective_key(collective_id, experience.created_at, id),
            );
            batch.delete(
                Table::ExpByType,
                keys::exp_by_type_key(collective_id, experience.kind.type_tag(), id),
            );

            // Cascade: every relation with this experience as an endpoint
            for index_table in [Table::RelationsBySource, Table::RelationsByTarget] {
                let prefix = keys::relation_endpoint_prefix(id);
                for (key, _) in snapshot.scan_prefix(index_table, &prefix, None, None)? {
                    let Some(relation_id) = keys::parse_relation_endpoint_key(&key) else {
                        return Err(PulseError::Corrupt("malformed relation index key".into()));
                    };
                    let Some(row) = snapshot.get(Table::Relations, &keys::relation_key(relation_id))
                    else {
                        continue;
                    };
                    let relation: pulse_core::Relation = decode_row(&row)?;
                    batch.delete(Table::Relations, keys::relation_key(relation_id));
                    batch.delete(
                        Table::RelationsBySource,
                        keys::relation_endpoint_key(relation.source_id, relation_id),
                    );
                    batch.delete(
                        Table::RelationsByTarget,
                        keys::relation_endpoint_key(relation.target_id, relation_id),
                    );
                }
            }

            change.index_ops.push(IndexOp::RemoveExperience { collective_id, id });
            change.event = Some((
                WatchEvent {
                    experience_id: id,
                    collective_id,
                    kind: WatchEventKind::Deleted,
                    timestamp: now,
                    csn,
                },
                attributes_of(&experience),
            ));
            Ok((change, collective_id))
        })?;

        if let Some(handle) = self.catalog.get(collective_id) {
            handle.bump_experience_count(-1);
        }
        Ok(())
    }

    /// Atomically bump `application_count`, returning the new value
    pub fn reinforce_experience(&self, id: ExperienceId) -> Result<u64> {
        self.commit_with(|snapshot, csn, now| {
            let row = snapshot
                .get(Table::Experiences, &keys::experience_key(id))
                .ok_or_else(|| PulseError::not_found("experience", id))?;
            let mut experience: Experience = decode_row(&row)?;
            experience.application_count += 1;
            experience.updated_at = now;
            let count = experience.application_count;

            let mut change = Change::new();
            change.batch.put(
                Table::Experiences,
                keys::experience_key(id),
                bincode::serialize(&experience)?,
            );
            change.event = Some((
                WatchEvent {
                    experience_id: id,
                    collective_id: experience.collective_id,
                    kind: WatchEventKind::Updated,
                    timestamp: now,
                    csn,
                },
                attributes_of(&experience),
            ));
            Ok((change, count))
        })
    }
}
