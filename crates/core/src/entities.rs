//! Entity rows stored by PulseDB
//!
//! Rows are serialized with bincode: field order is fixed per schema
//! version, strings and vectors are length-prefixed, and enum variants
//! carry their discriminant. Experience and insight rows are stored
//! *without* their embedding — embeddings live in a dedicated table as raw
//! little-endian f32 bytes so the similarity hot path never pays row
//! deserialization costs.

use crate::types::{AgentId, CollectiveId, ExperienceId, InsightId, RelationId, Timestamp};
use serde::{Deserialize, Serialize};

/// An isolation boundary owning experiences, insights and a vector index
///
/// The embedding dimension is frozen at creation: every experience and
/// insight recorded into the collective must carry a vector of exactly
/// this length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collective {
    /// Collective identifier (time-ordered)
    pub id: CollectiveId,
    /// Human-readable name, unique per database
    pub name: String,
    /// Optional owning agent
    pub owner: Option<AgentId>,
    /// Frozen embedding dimension
    pub embedding_dimension: usize,
    /// Creation time (Unix millis)
    pub created_at: Timestamp,
}

/// The typed variant of an experience
///
/// Each variant carries a compact 1-byte tag (0–8) used by the
/// `exp_by_type` secondary index and the binary row encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExperienceKind {
    /// A difficulty the agent ran into
    Difficulty {
        /// What went wrong
        description: String,
        /// Subjective severity in [0, 1]
        severity: f32,
    },
    /// A solution to a problem
    Solution {
        /// Experience describing the problem, if recorded
        problem_ref: Option<ExperienceId>,
        /// How the problem was approached
        approach: String,
        /// Whether the approach worked
        worked: bool,
    },
    /// A recurring error pattern
    ErrorPattern,
    /// A pattern that reliably succeeds
    SuccessPattern {
        /// Subjective quality in [0, 1]
        quality: f32,
    },
    /// A preference expressed by the user
    UserPreference {
        /// How strongly the preference was expressed, in [0, 1]
        strength: f32,
    },
    /// An architectural decision and its context
    ArchitecturalDecision,
    /// A technical insight about the system under work
    TechInsight,
    /// A plain fact
    Fact,
    /// Anything else
    Generic {
        /// Optional free-form category
        category: Option<String>,
    },
}

impl ExperienceKind {
    /// The 1-byte tag for this variant (0–8)
    pub fn type_tag(&self) -> u8 {
        match self {
            ExperienceKind::Difficulty { .. } => 0,
            ExperienceKind::Solution { .. } => 1,
            ExperienceKind::ErrorPattern => 2,
            ExperienceKind::SuccessPattern { .. } => 3,
            ExperienceKind::UserPreference { .. } => 4,
            ExperienceKind::ArchitecturalDecision => 5,
            ExperienceKind::TechInsight => 6,
            ExperienceKind::Fact => 7,
            ExperienceKind::Generic { .. } => 8,
        }
    }

    /// Human-readable name of the variant
    pub fn name(&self) -> &'static str {
        match self {
            ExperienceKind::Difficulty { .. } => "difficulty",
            ExperienceKind::Solution { .. } => "solution",
            ExperienceKind::ErrorPattern => "error_pattern",
            ExperienceKind::SuccessPattern { .. } => "success_pattern",
            ExperienceKind::UserPreference { .. } => "user_preference",
            ExperienceKind::ArchitecturalDecision => "architectural_decision",
            ExperienceKind::TechInsight => "tech_insight",
            ExperienceKind::Fact => "fact",
            ExperienceKind::Generic { .. } => "generic",
        }
    }
}

/// An experience recorded by an agent
///
/// Content and embedding are immutable after recording. `importance`,
/// `confidence` and `domain_tags` are patchable; `application_count` is
/// bumped by reinforcement; `archived` toggles vector-index membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Experience identifier (time-ordered)
    pub id: ExperienceId,
    /// Owning collective
    pub collective_id: CollectiveId,
    /// The recorded text (≤ 100 KiB)
    pub content: String,
    /// Typed variant
    pub kind: ExperienceKind,
    /// Importance in [0, 1]
    pub importance: f32,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// How many times this experience was applied
    pub application_count: u64,
    /// Domain tags (≤ 10 × ≤ 100 chars)
    pub domain_tags: Vec<String>,
    /// Source files this experience refers to (≤ 10 × ≤ 500 chars)
    pub source_files: Vec<String>,
    /// Recording agent, if known
    pub agent_id: Option<AgentId>,
    /// Archived experiences stay in the store but leave the vector index
    pub archived: bool,
    /// Creation time (Unix millis)
    pub created_at: Timestamp,
    /// Last mutation time (Unix millis)
    pub updated_at: Timestamp,
}

/// Request to record a new experience
///
/// With an `External` embedding provider the embedding is mandatory; with
/// a builtin provider it may be omitted and is generated from `content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExperience {
    /// Target collective
    pub collective_id: CollectiveId,
    /// Experience text
    pub content: String,
    /// Typed variant
    pub kind: ExperienceKind,
    /// Embedding; length must equal the collective's frozen dimension
    pub embedding: Option<Vec<f32>>,
    /// Importance in [0, 1]
    pub importance: f32,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Domain tags
    pub domain_tags: Vec<String>,
    /// Source files
    pub source_files: Vec<String>,
    /// Recording agent
    pub agent_id: Option<AgentId>,
}

impl NewExperience {
    /// Minimal request with defaults for the optional metadata
    pub fn new(collective_id: CollectiveId, content: impl Into<String>, kind: ExperienceKind) -> Self {
        Self {
            collective_id,
            content: content.into(),
            kind,
            embedding: None,
            importance: 0.5,
            confidence: 0.5,
            domain_tags: Vec::new(),
            source_files: Vec::new(),
            agent_id: None,
        }
    }

    /// Attach an embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Set importance
    pub fn with_importance(mut self, importance: f32) -> Self {
        self.importance = importance;
        self
    }

    /// Set confidence
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set domain tags
    pub fn with_domain_tags(mut self, tags: Vec<String>) -> Self {
        self.domain_tags = tags;
        self
    }

    /// Set the recording agent
    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }
}

/// Patch of the mutable experience fields
///
/// Content, embedding and kind are immutable; only these fields can change
/// after recording.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperiencePatch {
    /// New importance, if changing
    pub importance: Option<f32>,
    /// New confidence, if changing
    pub confidence: Option<f32>,
    /// Replacement domain tags, if changing
    pub domain_tags: Option<Vec<String>>,
}

impl ExperiencePatch {
    /// True if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.importance.is_none() && self.confidence.is_none() && self.domain_tags.is_none()
    }
}

/// Directed, typed edge between two experiences of the same collective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// Source supports target
    Supports,
    /// Source contradicts target
    Contradicts,
    /// Source elaborates on target
    Elaborates,
    /// Source supersedes target
    Supersedes,
    /// Source implies target
    Implies,
    /// Unspecified relatedness
    RelatedTo,
}

impl RelationKind {
    /// The 1-byte tag for this variant (0–5)
    pub fn type_tag(&self) -> u8 {
        match self {
            RelationKind::Supports => 0,
            RelationKind::Contradicts => 1,
            RelationKind::Elaborates => 2,
            RelationKind::Supersedes => 3,
            RelationKind::Implies => 4,
            RelationKind::RelatedTo => 5,
        }
    }
}

/// A stored relation between two experiences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Relation identifier
    pub id: RelationId,
    /// Collective both endpoints belong to
    pub collective_id: CollectiveId,
    /// Source experience (≠ target)
    pub source_id: ExperienceId,
    /// Target experience
    pub target_id: ExperienceId,
    /// Edge type
    pub kind: RelationKind,
    /// Edge strength in [0, 1]
    pub strength: f32,
    /// Creation time (Unix millis)
    pub created_at: Timestamp,
}

/// Which relations of an experience to gather
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationDirection {
    /// Relations whose source is the experience
    Out,
    /// Relations whose target is the experience
    In,
    /// Both directions
    Both,
}

/// A derived insight stored alongside experiences
///
/// Insights are computed by consumers (synthesis is out of scope) and
/// participate in vector search through the collective's insight index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Insight identifier
    pub id: InsightId,
    /// Owning collective
    pub collective_id: CollectiveId,
    /// Insight text
    pub content: String,
    /// Free-form insight kind assigned by the producer
    pub kind: String,
    /// Experiences this insight was derived from
    pub source_experience_ids: Vec<ExperienceId>,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Creation time (Unix millis)
    pub created_at: Timestamp,
}

/// Request to store a new insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInsight {
    /// Target collective
    pub collective_id: CollectiveId,
    /// Insight text
    pub content: String,
    /// Free-form kind
    pub kind: String,
    /// Embedding; length must equal the collective's frozen dimension
    pub embedding: Option<Vec<f32>>,
    /// Experiences this insight was derived from
    pub source_experience_ids: Vec<ExperienceId>,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

/// An agent's live presence marker in a collective
///
/// Kept fresh by heartbeats; rows whose heartbeat is older than the stale
/// threshold are excluded from active-agent queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Collective the agent is working in
    pub collective_id: CollectiveId,
    /// The agent
    pub agent_id: AgentId,
    /// What the agent reports it is doing
    pub current_task: Option<String>,
    /// When the activity started (Unix millis)
    pub started_at: Timestamp,
    /// Last heartbeat (Unix millis)
    pub last_heartbeat: Timestamp,
}

/// What happened to an experience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchEventKind {
    /// Experience recorded
    Created,
    /// Mutable fields patched or reinforced
    Updated,
    /// Archived (left the vector index)
    Archived,
    /// Deleted
    Deleted,
}

/// A change notification delivered to watch subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    /// Affected experience
    pub experience_id: ExperienceId,
    /// Its collective
    pub collective_id: CollectiveId,
    /// What happened
    pub kind: WatchEventKind,
    /// Commit time (Unix millis)
    pub timestamp: Timestamp,
    /// Change sequence number of the commit
    pub csn: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_kinds() -> Vec<ExperienceKind> {
        vec![
            ExperienceKind::Difficulty {
                description: "d".into(),
                severity: 0.5,
            },
            ExperienceKind::Solution {
                problem_ref: None,
                approach: "a".into(),
                worked: true,
            },
            ExperienceKind::ErrorPattern,
            ExperienceKind::SuccessPattern { quality: 0.9 },
            ExperienceKind::UserPreference { strength: 0.3 },
            ExperienceKind::ArchitecturalDecision,
            ExperienceKind::TechInsight,
            ExperienceKind::Fact,
            ExperienceKind::Generic { category: None },
        ]
    }

    #[test]
    fn test_type_tags_are_dense_and_stable() {
        let tags: Vec<u8> = all_kinds().iter().map(|k| k.type_tag()).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_relation_tags_are_dense() {
        let kinds = [
            RelationKind::Supports,
            RelationKind::Contradicts,
            RelationKind::Elaborates,
            RelationKind::Supersedes,
            RelationKind::Implies,
            RelationKind::RelatedTo,
        ];
        let tags: Vec<u8> = kinds.iter().map(|k| k.type_tag()).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_experience_row_roundtrip() {
        let exp = Experience {
            id: ExperienceId::new(),
            collective_id: CollectiveId::new(),
            content: "learned something".into(),
            kind: ExperienceKind::TechInsight,
            importance: 0.8,
            confidence: 0.9,
            application_count: 3,
            domain_tags: vec!["rust".into()],
            source_files: vec!["src/lib.rs".into()],
            agent_id: AgentId::new("agent-1"),
            archived: false,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
        };
        let bytes = bincode::serialize(&exp).unwrap();
        let back: Experience = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, exp);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(ExperiencePatch::default().is_empty());
        assert!(!ExperiencePatch {
            importance: Some(0.1),
            ..Default::default()
        }
        .is_empty());
    }
}
