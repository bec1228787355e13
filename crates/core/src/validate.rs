//! Input validation
//!
//! Every public mutation validates its input here before touching
//! storage. Validation failures are never retried.

use crate::entities::{ExperienceKind, ExperiencePatch, NewExperience, NewInsight};
use crate::error::{PulseError, Result};
use crate::limits::{
    MAX_CONTENT_BYTES, MAX_DOMAIN_TAGS, MAX_DOMAIN_TAG_CHARS, MAX_SEARCH_K, MAX_SOURCE_FILES,
    MAX_SOURCE_FILE_CHARS,
};

fn fail(msg: impl Into<String>) -> PulseError {
    PulseError::Validation(msg.into())
}

/// Validate a unit-interval score field; NaN and infinities are rejected
pub fn validate_score(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() {
        return Err(fail(format!("{name} must be finite, got {value}")));
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(fail(format!("{name} must be in [0, 1], got {value}")));
    }
    Ok(())
}

/// Validate experience/insight content
pub fn validate_content(content: &str) -> Result<()> {
    if content.is_empty() {
        return Err(fail("content must not be empty"));
    }
    if content.len() > MAX_CONTENT_BYTES {
        return Err(fail(format!(
            "content is {} bytes, limit is {MAX_CONTENT_BYTES}",
            content.len()
        )));
    }
    Ok(())
}

/// Validate domain tags
pub fn validate_domain_tags(tags: &[String]) -> Result<()> {
    if tags.len() > MAX_DOMAIN_TAGS {
        return Err(fail(format!(
            "{} domain tags, limit is {MAX_DOMAIN_TAGS}",
            tags.len()
        )));
    }
    for tag in tags {
        if tag.is_empty() {
            return Err(fail("domain tags must not be empty"));
        }
        if tag.chars().count() > MAX_DOMAIN_TAG_CHARS {
            return Err(fail(format!(
                "domain tag exceeds {MAX_DOMAIN_TAG_CHARS} chars: {tag:?}"
            )));
        }
    }
    Ok(())
}

/// Validate source file paths
pub fn validate_source_files(files: &[String]) -> Result<()> {
    if files.len() > MAX_SOURCE_FILES {
        return Err(fail(format!(
            "{} source files, limit is {MAX_SOURCE_FILES}",
            files.len()
        )));
    }
    for file in files {
        if file.is_empty() {
            return Err(fail("source file paths must not be empty"));
        }
        if file.chars().count() > MAX_SOURCE_FILE_CHARS {
            return Err(fail(format!(
                "source file path exceeds {MAX_SOURCE_FILE_CHARS} chars"
            )));
        }
    }
    Ok(())
}

/// Validate an embedding vector: correct length, every component finite
pub fn validate_embedding(embedding: &[f32], expected_dim: usize) -> Result<()> {
    if embedding.len() != expected_dim {
        return Err(PulseError::DimensionMismatch {
            expected: expected_dim,
            actual: embedding.len(),
        });
    }
    if let Some(bad) = embedding.iter().find(|v| !v.is_finite()) {
        return Err(fail(format!("embedding contains a non-finite component: {bad}")));
    }
    Ok(())
}

/// Validate the variant-specific payload of an experience kind
pub fn validate_kind(kind: &ExperienceKind) -> Result<()> {
    match kind {
        ExperienceKind::Difficulty {
            description,
            severity,
        } => {
            if description.is_empty() {
                return Err(fail("difficulty description must not be empty"));
            }
            validate_score("severity", *severity)
        }
        ExperienceKind::Solution { approach, .. } => {
            if approach.is_empty() {
                return Err(fail("solution approach must not be empty"));
            }
            Ok(())
        }
        ExperienceKind::SuccessPattern { quality } => validate_score("quality", *quality),
        ExperienceKind::UserPreference { strength } => validate_score("strength", *strength),
        ExperienceKind::Generic { category } => {
            if let Some(category) = category {
                if category.chars().count() > MAX_DOMAIN_TAG_CHARS {
                    return Err(fail(format!(
                        "category exceeds {MAX_DOMAIN_TAG_CHARS} chars"
                    )));
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Validate a new-experience request (embedding length is checked against
/// the collective separately, once its dimension is known)
pub fn validate_new_experience(new: &NewExperience) -> Result<()> {
    validate_content(&new.content)?;
    validate_kind(&new.kind)?;
    validate_score("importance", new.importance)?;
    validate_score("confidence", new.confidence)?;
    validate_domain_tags(&new.domain_tags)?;
    validate_source_files(&new.source_files)?;
    Ok(())
}

/// Validate a patch of mutable experience fields
pub fn validate_patch(patch: &ExperiencePatch) -> Result<()> {
    if let Some(importance) = patch.importance {
        validate_score("importance", importance)?;
    }
    if let Some(confidence) = patch.confidence {
        validate_score("confidence", confidence)?;
    }
    if let Some(tags) = &patch.domain_tags {
        validate_domain_tags(tags)?;
    }
    Ok(())
}

/// Validate a new-insight request
pub fn validate_new_insight(new: &NewInsight) -> Result<()> {
    validate_content(&new.content)?;
    if new.kind.is_empty() {
        return Err(fail("insight kind must not be empty"));
    }
    if new.kind.chars().count() > MAX_DOMAIN_TAG_CHARS {
        return Err(fail(format!(
            "insight kind exceeds {MAX_DOMAIN_TAG_CHARS} chars"
        )));
    }
    validate_score("confidence", new.confidence)?;
    Ok(())
}

/// Validate the `k` parameter of a similarity search
pub fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(fail("k must be at least 1"));
    }
    if k > MAX_SEARCH_K {
        return Err(fail(format!("k is {k}, limit is {MAX_SEARCH_K}")));
    }
    Ok(())
}
