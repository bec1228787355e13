//! Derived insights
//!
//! Insights are computed by consumers and stored alongside experiences;
//! each collective keeps a second vector index just for them.

use crate::database::{decode_row, Change, Database, IndexOp};
use crate::config::EmbeddingProvider;
use pulse_core::{keys, validate, CollectiveId, Insight, InsightId, NewInsight, PulseError, Result};
use pulse_storage::{Snapshot, Table};
use std::cmp::Ordering;

impl Database {
    /// Store an insight and index its embedding
    pub fn store_insight(&self, new: NewInsight) -> Result<Insight> {
        validate::validate_new_insight(&new)?;
        let handle = self.catalog.require(new.collective_id)?;
        let dim = handle.dimension();

        let embedding = match new.embedding.clone() {
            Some(embedding) => embedding,
            None => match &self.config().embedding_provider {
                EmbeddingProvider::Builtin { .. } => {
                    let embedder = self
                        .embedder
                        .as_ref()
                        .ok_or_else(|| PulseError::Embedding("no embedder installed".into()))?;
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
        self.commit_with(|snapshot, _, now| {
            // Referential integrity: every source experience must exist
            for source in &new.source_experience_ids {
                if snapshot
                    .get(Table::Experiences, &keys::experience_key(*source))
                    .is_none()
                {
                    return Err(PulseError::not_found("experience", *source));
                }
            }

            let insight = Insight {
                id: InsightId::new(),
                collective_id,
                content: new.content.clone(),
                kind: new.kind.clone(),
                source_experience_ids: new.source_experience_ids.clone(),
                confidence: new.confidence,
                created_at: now,
            };

            let mut change = Change::new();
            change.batch.put(
                Table::Insights,
                keys::insight_key(insight.id),
                bincode::serialize(&insight)?,
            );
            change.batch.put(
                Table::Embeddings,
                keys::embedding_key(*insight.id.as_bytes()),
                pulse_core::embedding_to_bytes(&embedding),
            );
            change.index_ops.push(IndexOp::UpsertInsight {
                collective_id,
                id: insight.id,
                embedding: embedding.clone(),
            });
            Ok((change, insight))
        })
    }

    /// Fetch an insight by id; `None` if absent
    pub fn get_insight(&self, id: InsightId) -> Result<Option<Insight>> {
        let snapshot = self.snapshot()?;
        snapshot
            .get(Table::Insights, &keys::insight_key(id))
            .map(|bytes| decode_row(&bytes))
            .transpose()
    }

    /// k-nearest insights by embedding similarity
    pub fn get_insights(
        &self,
        collective_id: CollectiveId,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(Insight, f32)>> {
        let snapshot = self.snapshot()?;
        self.insights_in(&snapshot, collective_id, query, k)
    }

    pub(crate) fn insights_in(
        &self,
        snapshot: &Snapshot,
        collective_id: CollectiveId,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(Insight, f32)>> {
        validate::validate_k(k)?;
        let handle = self.catalog.require(collective_id)?;
        validate::validate_embedding(query, handle.dimension())?;

        let index = handle.insights.read();
        let ef = index.params().ef_search.max(k);
        let hits = index.search(query, k, ef, None)?;
        drop(index);

        let mut results = Vec::with_capacity(hits.len());
        for (id, score) in hits {
            let id = InsightId::from_bytes(*id.as_bytes());
            let Some(bytes) = snapshot.get(Table::Insights, &keys::insight_key(id)) else {
                continue;
            };
            results.push((decode_row::<Insight>(&bytes)?, score));
        }
        results.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);
        Ok(results)
    }

    /// Delete an insight and its vector
    pub fn delete_insight(&self, id: InsightId) -> Result<()> {
        self.commit_with(|snapshot, _, _| {
            let insight: Insight = decode_row(
                &snapshot
                    .get(Table::Insights, &keys::insight_key(id))
                    .ok_or_else(|| PulseError::not_found("insight", id))?,
            )?;

            let mut change = Change::new();
            change.batch.delete(Table::Insights, keys::insight_key(id));
            change
                .batch
                .delete(Table::Embeddings, keys::embedding_key(*id.as_bytes()));
            change.index_ops.push(IndexOp::RemoveInsight {
                collective_id: insight.collective_id,
                id,
            });
            Ok((change, ()))
        })
    }
}
