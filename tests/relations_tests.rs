//! Typed relations: validation, traversal, cascades.

mod common;

use common::{embed, record, setup};
use pulsedb::{PulseError, RelationDirection, RelationKind};

#[test]
fn test_relation_roundtrip_and_directions() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let a = record(&db, c1, "a", embed(1));
    let b = record(&db, c1, "b", embed(2));
    let c = record(&db, c1, "c", embed(3));

    let ab = db
        .store_relation(a.id, b.id, RelationKind::Supports, 0.8)
        .unwrap();
    db.store_relation(c.id, b.id, RelationKind::Contradicts, 0.4)
        .unwrap();

    assert_eq!(ab.strength, 0.8);
    assert_eq!(ab.collective_id, c1);

    let out = db.get_related_experiences(a.id, RelationDirection::Out).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].1.id, b.id);

    let incoming = db.get_related_experiences(b.id, RelationDirection::In).unwrap();
    assert_eq!(incoming.len(), 2);

    let both = db.get_related_experiences(b.id, RelationDirection::Both).unwrap();
    assert_eq!(both.len(), 2);

    assert!(db
        .get_related_experiences(a.id, RelationDirection::In)
        .unwrap()
        .is_empty());
}

#[test]
fn test_self_relation_rejected() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let a = record(&db, c1, "a", embed(1));
    assert!(matches!(
        db.store_relation(a.id, a.id, RelationKind::RelatedTo, 0.5),
        Err(PulseError::Validation(_))
    ));
}

#[test]
fn test_cross_collective_relation_rejected() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let c2 = db.create_collective("c2", None).unwrap();
    let a = record(&db, c1, "a", embed(1));
    let b = record(&db, c2, "b", embed(2));
    assert!(matches!(
        db.store_relation(a.id, b.id, RelationKind::Implies, 0.5),
        Err(PulseError::Validation(_))
    ));
}

#[test]
fn test_duplicate_edge_rejected_but_other_kind_allowed() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let a = record(&db, c1, "a", embed(1));
    let b = record(&db, c1, "b", embed(2));

    db.store_relation(a.id, b.id, RelationKind::Supports, 0.5)
        .unwrap();
    assert!(matches!(
        db.store_relation(a.id, b.id, RelationKind::Supports, 0.9),
        Err(PulseError::Validation(_))
    ));
    // Same endpoints, different kind: fine
    assert!(db
        .store_relation(a.id, b.id, RelationKind::Elaborates, 0.9)
        .is_ok());
    // Reverse direction: fine
    assert!(db
        .store_relation(b.id, a.id, RelationKind::Supports, 0.9)
        .is_ok());
}

#[test]
fn test_missing_endpoint_is_not_found() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let a = record(&db, c1, "a", embed(1));
    assert!(matches!(
        db.store_relation(a.id, pulsedb::ExperienceId::new(), RelationKind::Supports, 0.5),
        Err(PulseError::NotFound { .. })
    ));
}

#[test]
fn test_delete_experience_cascades_relations() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let e1 = record(&db, c1, "e1", embed(1));
    let e2 = record(&db, c1, "e2", embed(2));
    let e3 = record(&db, c1, "e3", embed(3));

    let r12 = db
        .store_relation(e1.id, e2.id, RelationKind::Supports, 0.5)
        .unwrap();
    let r23 = db
        .store_relation(e2.id, e3.id, RelationKind::Elaborates, 0.5)
        .unwrap();

    db.delete_experience(e2.id).unwrap();

    assert!(db.get_relation(r12.id).unwrap().is_none());
    assert!(db.get_relation(r23.id).unwrap().is_none());
    assert!(db
        .get_related_experiences(e1.id, RelationDirection::Out)
        .unwrap()
        .is_empty());
    assert!(db
        .get_related_experiences(e3.id, RelationDirection::Both)
        .unwrap()
        .is_empty());
}

#[test]
fn test_delete_relation_directly() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let a = record(&db, c1, "a", embed(1));
    let b = record(&db, c1, "b", embed(2));
    let relation = db
        .store_relation(a.id, b.id, RelationKind::Supersedes, 1.0)
        .unwrap();

    db.delete_relation(relation.id).unwrap();
    assert!(matches!(
        db.delete_relation(relation.id),
        Err(PulseError::NotFound { .. })
    ));
    // Endpoints untouched
    assert!(db.get_experience(a.id).unwrap().is_some());
    assert!(db.get_experience(b.id).unwrap().is_some());
}

#[test]
fn test_strength_bounds() {
    let (db, _dir) = setup();
    let c1 = db.create_collective("c1", None).unwrap();
    let a = record(&db, c1, "a", embed(1));
    let b = record(&db, c1, "b", embed(2));
    assert!(matches!(
        db.store_relation(a.id, b.id, RelationKind::Supports, 1.5),
        Err(PulseError::Validation(_))
    ));
    assert!(matches!(
        db.store_relation(a.id, b.id, RelationKind::Supports, f32::NAN),
        Err(PulseError::Validation(_))
    ));
}
