//! Pure builders from provider records to graph entities and relationships.

use crate::constants::{
    EntityMetadata, MEMBER, ORGANIZATION, ORGANIZATION_HAS_MEMBER, ORGANIZATION_HAS_PROJECT,
    ORGANIZATION_HAS_TEAM, PROJECT, RelationshipMetadata, TEAM, TEAM_ASSIGNED_PROJECT,
    TEAM_HAS_MEMBER,
};
use sentry_graph_client::{
    SentryMember, SentryOrganization, SentryProject, SentryTeam, SourceRecord,
};
use crate::IngestError;
use sentry_graph_store::{Entity, EntityKey, Relationship, entity_key};
use serde_json::Value;

pub fn organization_key(provider_id: &str) -> EntityKey {
    entity_key(ORGANIZATION.key_prefix, provider_id)
}

pub fn team_key(provider_id: &str) -> EntityKey {
    entity_key(TEAM.key_prefix, provider_id)
}

pub fn project_key(provider_id: &str) -> EntityKey {
    entity_key(PROJECT.key_prefix, provider_id)
}

pub fn member_key(provider_id: &str) -> EntityKey {
    entity_key(MEMBER.key_prefix, provider_id)
}

fn base_entity(metadata: &EntityMetadata, key: EntityKey, raw: &Value) -> Entity {
    Entity::new(key, metadata.entity_type, [metadata.class], raw.clone())
}

pub fn organization_entity(record: &SourceRecord<SentryOrganization>) -> Entity {
    let organization = &record.data;
    base_entity(&ORGANIZATION, organization_key(&organization.id), &record.raw)
        .with_optional_attribute("name", organization.name.clone())
        .with_optional_attribute("slug", organization.slug.clone())
}

pub fn team_entity(record: &SourceRecord<SentryTeam>) -> Entity {
    let team = &record.data;
    base_entity(&TEAM, team_key(&team.id), &record.raw)
        .with_optional_attribute("name", team.name.clone())
        .with_attribute("slug", team.slug.clone())
}

pub fn project_entity(record: &SourceRecord<SentryProject>) -> Entity {
    let project = &record.data;
    base_entity(&PROJECT, project_key(&project.id), &record.raw)
        .with_optional_attribute("name", project.name.clone())
        .with_optional_attribute("slug", project.slug.clone())
        .with_optional_attribute("platform", project.platform.clone())
}

/// Members are users in the graph; `username` mirrors the email address.
pub fn member_entity(record: &SourceRecord<SentryMember>) -> Entity {
    let member = &record.data;
    base_entity(&MEMBER, member_key(&member.id), &record.raw)
        .with_optional_attribute("name", member.name.clone())
        .with_optional_attribute("username", member.email.clone())
        .with_optional_attribute("email", member.email.clone())
        .with_optional_attribute("role", member.role.clone())
        .with_optional_attribute("pending", member.pending)
}

fn check_endpoint(
    metadata: &RelationshipMetadata,
    endpoint: &'static str,
    expected: &str,
    entity: &Entity,
) -> Result<(), IngestError> {
    if entity.entity_type == expected {
        return Ok(());
    }
    Err(IngestError::RelationshipEndpoint {
        relationship_type: metadata.relationship_type.to_string(),
        endpoint,
        key: entity.key.clone(),
        expected: expected.to_string(),
        actual: entity.entity_type.clone(),
    })
}

/// Builds a relationship after checking both endpoints against the declared
/// source and target types.
fn relate(
    metadata: &RelationshipMetadata,
    from: &Entity,
    to: &Entity,
) -> Result<Relationship, IngestError> {
    check_endpoint(metadata, "source", metadata.source_type, from)?;
    check_endpoint(metadata, "target", metadata.target_type, to)?;
    Ok(Relationship::between(
        metadata.relationship_type,
        metadata.class,
        from,
        to,
    ))
}

pub fn organization_has_team(
    organization: &Entity,
    team: &Entity,
) -> Result<Relationship, IngestError> {
    relate(&ORGANIZATION_HAS_TEAM, organization, team)
}

pub fn organization_has_project(
    organization: &Entity,
    project: &Entity,
) -> Result<Relationship, IngestError> {
    relate(&ORGANIZATION_HAS_PROJECT, organization, project)
}

pub fn organization_has_member(
    organization: &Entity,
    member: &Entity,
) -> Result<Relationship, IngestError> {
    relate(&ORGANIZATION_HAS_MEMBER, organization, member)
}

pub fn team_assigned_project(
    team: &Entity,
    project: &Entity,
) -> Result<Relationship, IngestError> {
    relate(&TEAM_ASSIGNED_PROJECT, team, project)
}

pub fn team_has_member(
    team: &Entity,
    member: &Entity,
) -> Result<Relationship, IngestError> {
    relate(&TEAM_HAS_MEMBER, team, member)
}
