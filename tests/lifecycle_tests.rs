//! Experience lifecycle: record → get → update → archive → unarchive →
//! delete, plus the validation boundaries.

mod common;

use common::{embed, record, setup, DIM};
use pulsedb::{
    ExperienceKind, ExperiencePatch, NewExperience, PulseError, RelationDirection,
};

#[test]
fn test_full_lifecycle() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();

    let recorded = db
        .record_experience(
            NewExperience::new(collective, "hello", ExperienceKind::Generic { category: None })
                .with_embedding(embed(1))
                .with_importance(0.5)
                .with_confidence(0.9),
        )
        .unwrap();
    let id = recorded.id;

    // record → get returns the stored entity
    let fetched = db.get_experience(id).unwrap().unwrap();
    assert_eq!(fetched.content, "hello");
    assert_eq!(fetched.importance, 0.5);
    assert_eq!(fetched, recorded);

    // Patch mutable fields only
    let updated = db
        .update_experience(
            id,
            ExperiencePatch {
                importance: Some(0.9),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.importance, 0.9);
    assert_eq!(updated.content, "hello");

    // Archive: gone from search
    db.archive_experience(id).unwrap();
    assert!(db.search_similar(collective, &embed(1), 10).unwrap().is_empty());
    assert!(db.get_experience(id).unwrap().unwrap().archived);

    // Idempotent: a second archive changes nothing and burns no CSN
    let csn = db.csn();
    db.archive_experience(id).unwrap();
    assert_eq!(db.csn(), csn);

    // Unarchive: back in search with ~1.0 similarity
    db.unarchive_experience(id).unwrap();
    let hits = db.search_similar(collective, &embed(1), 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.id, id);
    assert!(hits[0].1 > 0.99);

    // Delete is terminal
    db.delete_experience(id).unwrap();
    assert!(db.get_experience(id).unwrap().is_none());
    assert!(matches!(
        db.delete_experience(id),
        Err(PulseError::NotFound { .. })
    ));
}

#[test]
fn test_reinforce_increments() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();
    let exp = record(&db, collective, "useful", embed(2));

    assert_eq!(db.reinforce_experience(exp.id).unwrap(), 1);
    assert_eq!(db.reinforce_experience(exp.id).unwrap(), 2);
    assert_eq!(
        db.get_experience(exp.id).unwrap().unwrap().application_count,
        2
    );
}

#[test]
fn test_content_boundaries() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();

    let exact = "x".repeat(100 * 1024);
    assert!(db
        .record_experience(
            NewExperience::new(collective, exact, ExperienceKind::Fact)
                .with_embedding(embed(1))
        )
        .is_ok());

    let over = "x".repeat(100 * 1024 + 1);
    assert!(matches!(
        db.record_experience(
            NewExperience::new(collective, over, ExperienceKind::Fact).with_embedding(embed(1))
        ),
        Err(PulseError::Validation(_))
    ));

    assert!(matches!(
        db.record_experience(
            NewExperience::new(collective, "", ExperienceKind::Fact).with_embedding(embed(1))
        ),
        Err(PulseError::Validation(_))
    ));
}

#[test]
fn test_float_boundaries() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();

    for importance in [0.0f32, 1.0, -0.0] {
        assert!(db
            .record_experience(
                NewExperience::new(collective, "ok", ExperienceKind::Fact)
                    .with_embedding(embed(1))
                    .with_importance(importance)
            )
            .is_ok());
    }
    for importance in [f32::NAN, f32::INFINITY, 1.5, -0.1] {
        assert!(db
            .record_experience(
                NewExperience::new(collective, "bad", ExperienceKind::Fact)
                    .with_embedding(embed(1))
                    .with_importance(importance)
            )
            .is_err());
    }

    // One NaN component poisons the embedding
    let mut poisoned = embed(1);
    poisoned[2] = f32::NAN;
    assert!(db
        .record_experience(
            NewExperience::new(collective, "bad", ExperienceKind::Fact).with_embedding(poisoned)
        )
        .is_err());
}

#[test]
fn test_k_boundaries() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();
    record(&db, collective, "a", embed(1));

    assert!(matches!(
        db.search_similar(collective, &embed(1), 0),
        Err(PulseError::Validation(_))
    ));
    assert!(db.search_similar(collective, &embed(1), 1000).is_ok());
    assert!(matches!(
        db.search_similar(collective, &embed(1), 1001),
        Err(PulseError::Validation(_))
    ));
}

#[test]
fn test_embedding_dimension_enforced() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();

    assert!(matches!(
        db.record_experience(
            NewExperience::new(collective, "short", ExperienceKind::Fact)
                .with_embedding(vec![1.0; DIM - 1])
        ),
        Err(PulseError::DimensionMismatch { .. })
    ));
    assert!(matches!(
        db.search_similar(collective, &vec![1.0; DIM + 1], 5),
        Err(PulseError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_external_provider_requires_embedding() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();
    assert!(matches!(
        db.record_experience(NewExperience::new(collective, "no vector", ExperienceKind::Fact)),
        Err(PulseError::Validation(_))
    ));
}

#[test]
fn test_builtin_provider_generates_embeddings() {
    use pulsedb::{Database, Embedder, EmbeddingProvider};
    use std::sync::Arc;

    struct AxisEmbedder;
    impl Embedder for AxisEmbedder {
        fn embed(&self, text: &str) -> pulsedb::Result<Vec<f32>> {
            let mut v = vec![0.0f32; DIM];
            v[text.len() % DIM] = 1.0;
            Ok(v)
        }
        fn dim(&self) -> usize {
            DIM
        }
    }

    let temp_dir = tempfile::TempDir::new().unwrap();
    let mut config = common::test_config();
    config.embedding_provider = EmbeddingProvider::Builtin { model_path: None };

    // Builtin without an installed embedder refuses to open
    assert!(matches!(
        Database::open(temp_dir.path(), config.clone()),
        Err(PulseError::Embedding(_))
    ));

    let db =
        Database::open_with_embedder(temp_dir.path(), config, Some(Arc::new(AxisEmbedder))).unwrap();
    let collective = db.create_collective("c1", None).unwrap();

    // No embedding supplied: the engine generates one from the content
    let exp = db
        .record_experience(NewExperience::new(
            collective,
            "abcd",
            ExperienceKind::Fact,
        ))
        .unwrap();
    let mut query = vec![0.0f32; DIM];
    query["abcd".len() % DIM] = 1.0;
    let hits = db.search_similar(collective, &query, 5).unwrap();
    assert_eq!(hits[0].0.id, exp.id);
    assert!(hits[0].1 > 0.99);
}

#[test]
fn test_update_missing_is_not_found() {
    let (db, _dir) = setup();
    db.create_collective("c1", None).unwrap();
    assert!(matches!(
        db.update_experience(
            pulsedb::ExperienceId::new(),
            ExperiencePatch {
                importance: Some(0.4),
                ..Default::default()
            }
        ),
        Err(PulseError::NotFound { .. })
    ));
}

#[test]
fn test_delete_cascades_before_terminal_state() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();
    let a = record(&db, collective, "a", embed(1));
    let b = record(&db, collective, "b", embed(2));
    db.store_relation(a.id, b.id, pulsedb::RelationKind::Supports, 0.8)
        .unwrap();

    db.delete_experience(b.id).unwrap();
    assert!(db
        .get_related_experiences(a.id, RelationDirection::Both)
        .unwrap()
        .is_empty());
}

#[test]
fn test_experiences_by_type() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();

    let fact = db
        .record_experience(
            NewExperience::new(collective, "a fact", ExperienceKind::Fact).with_embedding(embed(1)),
        )
        .unwrap();
    db.record_experience(
        NewExperience::new(
            collective,
            "a solution",
            ExperienceKind::Solution {
                problem_ref: Some(fact.id),
                approach: "try this".into(),
                worked: true,
            },
        )
        .with_embedding(embed(2)),
    )
    .unwrap();

    let facts = db
        .get_experiences_by_type(collective, ExperienceKind::Fact.type_tag(), 10, None)
        .unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].id, fact.id);

    let difficulties = db
        .get_experiences_by_type(collective, 0, 10, None)
        .unwrap();
    assert!(difficulties.is_empty());

    // Deleting removes the row from the type index too
    db.delete_experience(fact.id).unwrap();
    assert!(db
        .get_experiences_by_type(collective, ExperienceKind::Fact.type_tag(), 10, None)
        .unwrap()
        .is_empty());
}

#[test]
fn test_recent_returns_newest_first() {
    let (db, _dir) = setup();
    let collective = db.create_collective("c1", None).unwrap();
    let mut ids = Vec::new();
    for i in 0..20 {
        ids.push(record(&db, collective, &format!("e{i}"), embed(i)).id);
    }

    let recent = db.get_recent_experiences(collective, 5, None).unwrap();
    assert_eq!(recent.len(), 5);
    let got: Vec<_> = recent.iter().map(|e| e.id).collect();
    let expected: Vec<_> = ids.iter().rev().take(5).copied().collect();
    assert_eq!(got, expected);
}
