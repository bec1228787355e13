//! Retrieval filters
//!
//! One filter shape serves similarity search, recency scans and the
//! composite context query. Archived rows are excluded everywhere unless
//! the filter opts in.

use pulse_core::{Experience, Timestamp};

/// Post-filter applied to candidate experiences
#[derive(Debug, Clone, Default)]
pub struct ExperienceFilter {
    /// Keep experiences carrying at least one of these domain tags
    pub domains: Option<Vec<String>>,
    /// Keep these experience type tags (see `ExperienceKind::type_tag`)
    pub type_tags: Option<Vec<u8>>,
    /// Keep experiences at or above this importance
    pub min_importance: Option<f32>,
    /// Keep experiences at or above this confidence
    pub min_confidence: Option<f32>,
    /// Keep experiences created at or after this time
    pub since: Option<Timestamp>,
    /// Also return archived experiences
    pub include_archived: bool,
}

impl ExperienceFilter {
    /// True if the experience passes every configured predicate
    pub fn matches(&self, experience: &Experience) -> bool {
        if experience.archived && !self.include_archived {
            return false;
        }
        if let Some(domains) = &self.domains {
            if !domains
                .iter()
                .any(|d| experience.domain_tags.contains(d))
            {
                return false;
            }
        }
        if let Some(tags) = &self.type_tags {
            if !tags.contains(&experience.kind.type_tag()) {
                return false;
            }
        }
        if let Some(min) = self.min_importance {
            if experience.importance < min {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if experience.confidence < min {
                return false;
            }
        }
        if let Some(since) = self.since {
            if experience.created_at < since {
                return false;
            }
        }
        true
    }
}

/// The archived check alone, used when no filter was supplied
pub(crate) fn passes(filter: Option<&ExperienceFilter>, experience: &Experience) -> bool {
    match filter {
        Some(filter) => filter.matches(experience),
        None => !experience.archived,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::{CollectiveId, ExperienceId, ExperienceKind};

    fn experience() -> Experience {
        Experience {
            id: ExperienceId::new(),
            collective_id: CollectiveId::new(),
            content: "c".into(),
            kind: ExperienceKind::Fact,
            importance: 0.6,
            confidence: 0.8,
            application_count: 0,
            domain_tags: vec!["rust".into(), "storage".into()],
            source_files: vec![],
            agent_id: None,
            archived: false,
            created_at: 1_000,
            updated_at: 1_000,
        }
    }

    #[test]
    fn test_empty_filter_passes_live_rows() {
        assert!(ExperienceFilter::default().matches(&experience()));
    }

    #[test]
    fn test_archived_needs_opt_in() {
        let mut exp = experience();
        exp.archived = true;
        assert!(!ExperienceFilter::default().matches(&exp));
        let filter = ExperienceFilter {
            include_archived: true,
            ..Default::default()
        };
        assert!(filter.matches(&exp));
        assert!(!passes(None, &exp));
    }

    #[test]
    fn test_domain_filter_matches_any() {
        let filter = ExperienceFilter {
            domains: Some(vec!["python".into(), "storage".into()]),
            ..Default::default()
        };
        assert!(filter.matches(&experience()));
        let miss = ExperienceFilter {
            domains: Some(vec!["python".into()]),
            ..Default::default()
        };
        assert!(!miss.matches(&experience()));
    }

    #[test]
    fn test_threshold_filters() {
        let filter = ExperienceFilter {
            min_importance: Some(0.7),
            ..Default::default()
        };
        assert!(!filter.matches(&experience()));
        let filter = ExperienceFilter {
            min_confidence: Some(0.8),
            since: Some(1_000),
            ..Default::default()
        };
        assert!(filter.matches(&experience()));
        let filter = ExperienceFilter {
            since: Some(1_001),
            ..Default::default()
        };
        assert!(!filter.matches(&experience()));
    }

    #[test]
    fn test_type_tag_filter() {
        let filter = ExperienceFilter {
            type_tags: Some(vec![ExperienceKind::Fact.type_tag()]),
            ..Default::default()
        };
        assert!(filter.matches(&experience()));
        let filter = ExperienceFilter {
            type_tags: Some(vec![0]),
            ..Default::default()
        };
        assert!(!filter.matches(&experience()));
    }
}
