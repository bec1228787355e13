//! Composite context retrieval: the blended query and its snapshot
//! consistency.

mod common;

use common::{embed, record, setup, DIM};
use pulsedb::{
    AgentId, ContextRequest, ExperienceFilter, NewInsight, RelationKind,
};

#[test]
fn test_context_blend_shapes_and_membership() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();

    // 90 older experiences far from the query vector...
    let mut older = Vec::new();
    for i in 0..90 {
        let mut v = vec![0.0f32; DIM];
        v[1 + (i % (DIM - 1))] = 1.0;
        older.push(record(&db, c1, &format!("old-{i}"), v).id);
    }
    // ...then 10 recent ones clustered on the query axis
    let mut recent_ids = Vec::new();
    for i in 0..10 {
        let mut v = vec![0.0f32; DIM];
        v[0] = 1.0;
        v[1] = 0.01 * i as f32;
        recent_ids.push(record(&db, c1, &format!("new-{i}"), v).id);
    }

    // Relate two retrieved experiences, and one retrieved-to-old pair
    db.store_relation(recent_ids[9], recent_ids[8], RelationKind::Elaborates, 0.9)
        .unwrap();
    db.store_relation(recent_ids[0], older[0], RelationKind::Supersedes, 0.9)
        .unwrap();

    let mut query = vec![0.0f32; DIM];
    query[0] = 1.0;

    let request = ContextRequest {
        max_similar: 10,
        max_recent: 5,
        include_insights: false,
        include_active_agents: false,
        ..ContextRequest::new(c1, query)
    };
    let context = db.get_context_candidates(request).unwrap();

    // Exactly 5 recent, newest first
    assert_eq!(context.recent.len(), 5);
    let got: Vec<_> = context.recent.iter().map(|e| e.id).collect();
    let expected: Vec<_> = recent_ids.iter().rev().take(5).copied().collect();
    assert_eq!(got, expected);

    // ≤ 10 similar, scores non-increasing
    assert!(context.similar.len() <= 10);
    assert!(context
        .similar
        .windows(2)
        .all(|w| w[0].1 >= w[1].1));

    // Every relation endpoint is in similar ∪ recent
    let members: std::collections::BTreeSet<_> = context
        .similar
        .iter()
        .map(|(e, _)| e.id)
        .chain(context.recent.iter().map(|e| e.id))
        .collect();
    assert!(!context.relations.is_empty());
    for relation in &context.relations {
        assert!(members.contains(&relation.source_id));
        assert!(members.contains(&relation.target_id));
    }
}

#[test]
fn test_context_includes_insights_and_agents() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let exp = record(&db, c1, "observation", embed(1));

    db.store_insight(NewInsight {
        collective_id: c1,
        content: "agents repeat this mistake".into(),
        kind: "pattern".into(),
        embedding: Some(embed(1)),
        source_experience_ids: vec![exp.id],
        confidence: 0.7,
    })
    .unwrap();

    let agent = AgentId::new("worker-1").unwrap();
    db.register_activity(c1, agent.clone(), Some("reviewing".into()))
        .unwrap();

    let context = db
        .get_context_candidates(ContextRequest::new(c1, embed(1)))
        .unwrap();

    assert_eq!(context.insights.len(), 1);
    assert_eq!(context.insights[0].0.kind, "pattern");
    assert_eq!(context.active_agents.len(), 1);
    assert_eq!(context.active_agents[0].agent_id, agent);
    assert_eq!(context.active_agents[0].current_task.as_deref(), Some("reviewing"));
}

#[test]
fn test_context_respects_filter() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    for i in 0..6 {
        db.record_experience(
            pulsedb::NewExperience::new(c1, format!("e{i}"), pulsedb::ExperienceKind::Fact)
                .with_embedding(embed(0))
                .with_importance(if i % 2 == 0 { 0.9 } else { 0.1 }),
        )
        .unwrap();
    }

    let request = ContextRequest {
        filter: Some(ExperienceFilter {
            min_importance: Some(0.5),
            ..Default::default()
        }),
        include_insights: false,
        include_active_agents: false,
        include_relations: false,
        ..ContextRequest::new(c1, embed(0))
    };
    let context = db.get_context_candidates(request).unwrap();
    assert_eq!(context.similar.len(), 3);
    assert!(context.similar.iter().all(|(e, _)| e.importance > 0.5));
    assert!(context.recent.iter().all(|e| e.importance > 0.5));
}

#[test]
fn test_context_snapshot_csn_is_reported() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    record(&db, c1, "a", embed(1));
    let csn = db.csn();
    let context = db
        .get_context_candidates(ContextRequest::new(c1, embed(1)))
        .unwrap();
    assert_eq!(context.snapshot_csn, csn);
}

#[test]
fn test_stale_agents_age_out_of_context() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let mut config = common::test_config();
    config.limits.stale_agent_threshold = std::time::Duration::from_millis(50);
    let db = pulsedb::Database::open(temp_dir.path(), config).unwrap();
    let c1 = db.create_collective("c1", None).unwrap();
    record(&db, c1, "a", embed(1));

    let agent = AgentId::new("sleepy").unwrap();
    db.register_activity(c1, agent.clone(), None).unwrap();
    assert_eq!(db.get_active_agents(c1).unwrap().len(), 1);

    std::thread::sleep(std::time::Duration::from_millis(80));
    assert!(db.get_active_agents(c1).unwrap().is_empty());

    // A heartbeat brings the agent back
    db.update_heartbeat(c1, &agent).unwrap();
    assert_eq!(db.get_active_agents(c1).unwrap().len(), 1);

    db.end_activity(c1, &agent).unwrap();
    assert!(db.get_active_agents(c1).unwrap().is_empty());
}

#[test]
fn test_insight_lifecycle() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let exp = record(&db, c1, "seed", embed(2));

    let insight = db
        .store_insight(NewInsight {
            collective_id: c1,
            content: "derived wisdom".into(),
            kind: "synthesis".into(),
            embedding: Some(embed(2)),
            source_experience_ids: vec![exp.id],
            confidence: 0.6,
        })
        .unwrap();

    let hits = db.get_insights(c1, &embed(2), 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.id, insight.id);
    assert!(hits[0].1 > 0.99);

    db.delete_insight(insight.id).unwrap();
    assert!(db.get_insights(c1, &embed(2), 5).unwrap().is_empty());
    assert!(db.get_insight(insight.id).unwrap().is_none());
}
