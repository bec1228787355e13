//! Composite context retrieval
//!
//! `get_context_candidates` bundles similar + recent + insights + active
//! agents + relations under one read snapshot, so all five lists describe
//! the database at the same CSN.

use crate::database::Database;
use crate::ops::filter::ExperienceFilter;
use pulse_core::{
    Activity, CollectiveId, Csn, Experience, ExperienceId, Insight, Relation, RelationDirection,
    Result,
};
use std::collections::{BTreeMap, BTreeSet};

/// Parameters of a composite context query
#[derive(Debug, Clone)]
pub struct ContextRequest {
    /// Target collective
    pub collective_id: CollectiveId,
    /// Query embedding (length = collective dimension)
    pub query: Vec<f32>,
    /// Max similarity hits
    pub max_similar: usize,
    /// Max recency hits
    pub max_recent: usize,
    /// Filter applied to both retrieval paths
    pub filter: Option<ExperienceFilter>,
    /// Also query the insight index with the same embedding
    pub include_insights: bool,
    /// Max insight hits (when included)
    pub max_insights: usize,
    /// Also list currently active agents
    pub include_active_agents: bool,
    /// Also gather relations among the returned experiences
    pub include_relations: bool,
}

impl ContextRequest {
    /// Request with the common defaults: 10 similar, 5 recent, insights
    /// and agents and relations all included
    pub fn new(collective_id: CollectiveId, query: Vec<f32>) -> Self {
        Self {
            collective_id,
            query,
            max_similar: 10,
            max_recent: 5,
            filter: None,
            include_insights: true,
            max_insights: 5,
            include_active_agents: true,
            include_relations: true,
        }
    }
}

/// The five lists, all read from one snapshot
#[derive(Debug, Clone, Default)]
pub struct ContextCandidates {
    /// Similarity hits, score descending
    pub similar: Vec<(Experience, f32)>,
    /// Recency hits, newest first
    pub recent: Vec<Experience>,
    /// Insight hits, score descending (empty unless requested)
    pub insights: Vec<(Insight, f32)>,
    /// Currently active agents (empty unless requested)
    pub active_agents: Vec<Activity>,
    /// Relations whose both endpoints appear in `similar ∪ recent`
    pub relations: Vec<Relation>,
    /// The snapshot CSN all lists derive from
    pub snapshot_csn: Csn,
}

impl Database {
    /// Assemble context candidates under a single read snapshot
    pub fn get_context_candidates(&self, request: ContextRequest) -> Result<ContextCandidates> {
        let snapshot = self.snapshot()?;
        let filter = request.filter.as_ref();

        let similar = if request.max_similar > 0 {
            self.search_similar_in(
                &snapshot,
                request.collective_id,
                &request.query,
                request.max_similar,
                filter,
            )?
        } else {
            Vec::new()
        };

        let recent = self.recent_in(&snapshot, request.collective_id, request.max_recent, filter)?;

        let insights = if request.include_insights && request.max_insights > 0 {
            let handle = self.catalog.require(request.collective_id)?;
            if handle.insights.read().is_empty() {
                Vec::new()
            } else {
                self.insights_in(
                    &snapshot,
                    request.collective_id,
                    &request.query,
                    request.max_insights,
                )?
            }
        } else {
            Vec::new()
        };

        let active_agents = if request.include_active_agents {
            self.active_agents_in(&snapshot, request.collective_id)?
        } else {
            Vec::new()
        };

        let relations = if request.include_relations {
            let members: BTreeSet<ExperienceId> = similar
                .iter()
                .map(|(experience, _)| experience.id)
                .chain(recent.iter().map(|experience| experience.id))
                .collect();

            // A relation qualifies when both endpoints were retrieved, so
            // every edge the caller sees connects rows it also holds.
            let mut gathered: BTreeMap<pulse_core::RelationId, Relation> = BTreeMap::new();
            for &id in &members {
                for (relation_id, relation) in
                    self.relations_of_in(&snapshot, id, RelationDirection::Out)?
                {
                    if members.contains(&relation.target_id) {
                        gathered.insert(relation_id, relation);
                    }
                }
            }
            gathered.into_values().collect()
        } else {
            Vec::new()
        };

        Ok(ContextCandidates {
            similar,
            recent,
            insights,
            active_agents,
            relations,
            snapshot_csn: snapshot.csn(),
        })
    }
}
