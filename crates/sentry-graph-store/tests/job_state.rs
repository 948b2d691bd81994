use sentry_graph_store::{
    Entity, JobState, JobStateError, JobStateResult, MemoryJobState, Relationship,
    RelationshipClass,
};
use serde_json::json;

fn member(id: &str, email: &str) -> Entity {
    Entity::new(
        format!("sentry-member-{id}"),
        "sentry_member",
        ["User"],
        json!({ "id": id, "email": email }),
    )
    .with_attribute("username", email)
}

fn has_member(from: &str, to: &str) -> Relationship {
    Relationship::new(
        "sentry_organization_has_member",
        RelationshipClass::Has,
        from,
        to,
    )
}

fn exercise_find_returns_inserted_entity<S: JobState>(store: &S) -> JobStateResult<()> {
    let inserted = store.add_entity(member("1000", "a@x.com"))?;
    let found = store
        .find_entity("sentry-member-1000")
        .expect("inserted entity should be found");
    assert_eq!(found, inserted);
    assert_eq!(found.raw_source, json!({ "id": "1000", "email": "a@x.com" }));
    Ok(())
}

fn exercise_duplicate_relationship<S: JobState>(store: &S) -> JobStateResult<()> {
    store.add_relationship(has_member("sentry-organization-1", "sentry-member-1000"))?;
    store.add_relationship(has_member("sentry-organization-2", "sentry-member-1000"))?;

    let error = store
        .add_relationship(has_member("sentry-organization-1", "sentry-member-1000"))
        .expect_err("identical triple should be rejected");
    assert!(matches!(error, JobStateError::DuplicateRelationship { .. }));
    assert_eq!(store.relationship_count(), 2);
    Ok(())
}

#[test]
fn memory_job_state_find_after_add_expected_same_entity() {
    exercise_find_returns_inserted_entity(&MemoryJobState::new())
        .expect("memory store should round-trip entities");
}

#[test]
fn memory_job_state_identical_relationship_expected_rejected() {
    exercise_duplicate_relationship(&MemoryJobState::new())
        .expect("memory store should reject duplicate edges");
}

#[test]
fn memory_job_state_clone_expected_shared_run_state() {
    let store = MemoryJobState::new();
    let handle = store.clone();
    handle
        .add_entity(member("7", "b@x.com"))
        .expect("insert through clone should succeed");

    assert!(store.has_key("sentry-member-7"));
    let collected = store.collect();
    assert_eq!(collected.entities.len(), 1);
    assert!(collected.relationships.is_empty());
}

#[test]
fn memory_job_state_add_entities_duplicate_in_batch_expected_first_kept() {
    let store = MemoryJobState::new();
    let error = store
        .add_entities(vec![member("1", "a@x.com"), member("1", "other@x.com")])
        .expect_err("batch with duplicate key should fail");

    assert!(matches!(error, JobStateError::DuplicateKey { .. }));
    let kept = store
        .find_entity("sentry-member-1")
        .expect("first entity should remain");
    assert_eq!(kept.attribute_str("username"), Some("a@x.com"));
}

#[test]
fn memory_job_state_iterate_relationships_expected_type_scoped() {
    let store = MemoryJobState::new();
    store
        .add_relationship(has_member("sentry-organization-1", "sentry-member-1"))
        .expect("insert");
    store
        .add_relationship(Relationship::new(
            "sentry_team_has_member",
            RelationshipClass::Has,
            "sentry-team-10",
            "sentry-member-1",
        ))
        .expect("insert");

    let scoped: Vec<Relationship> = store
        .iterate_relationships("sentry_team_has_member")
        .collect();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].from_key, "sentry-team-10");
    assert_eq!(store.iterate_relationships("unknown_type").count(), 0);
}
