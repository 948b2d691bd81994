use sentry_graph_store::RelationshipClass;

pub const STEP_ORGANIZATIONS: &str = "fetch-organizations";
pub const STEP_PROJECTS: &str = "fetch-projects";
pub const STEP_TEAMS: &str = "fetch-teams";
pub const STEP_MEMBERS: &str = "fetch-members";
pub const STEP_TEAM_MEMBERS: &str = "fetch-team-members";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityMetadata {
    pub resource_name: &'static str,
    pub entity_type: &'static str,
    pub class: &'static str,
    pub key_prefix: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelationshipMetadata {
    pub relationship_type: &'static str,
    pub class: RelationshipClass,
    pub source_type: &'static str,
    pub target_type: &'static str,
}

pub const ORGANIZATION: EntityMetadata = EntityMetadata {
    resource_name: "Organization",
    entity_type: "sentry_organization",
    class: "Account",
    key_prefix: "sentry-organization",
};

pub const TEAM: EntityMetadata = EntityMetadata {
    resource_name: "Team",
    entity_type: "sentry_team",
    class: "UserGroup",
    key_prefix: "sentry-team",
};

pub const PROJECT: EntityMetadata = EntityMetadata {
    resource_name: "Project",
    entity_type: "sentry_project",
    class: "Project",
    key_prefix: "sentry-project",
};

pub const MEMBER: EntityMetadata = EntityMetadata {
    resource_name: "Member",
    entity_type: "sentry_member",
    class: "User",
    key_prefix: "sentry-member",
};

pub const ORGANIZATION_HAS_TEAM: RelationshipMetadata = RelationshipMetadata {
    relationship_type: "sentry_organization_has_team",
    class: RelationshipClass::Has,
    source_type: ORGANIZATION.entity_type,
    target_type: TEAM.entity_type,
};

pub const ORGANIZATION_HAS_PROJECT: RelationshipMetadata = RelationshipMetadata {
    relationship_type: "sentry_organization_has_project",
    class: RelationshipClass::Has,
    source_type: ORGANIZATION.entity_type,
    target_type: PROJECT.entity_type,
};

pub const ORGANIZATION_HAS_MEMBER: RelationshipMetadata = RelationshipMetadata {
    relationship_type: "sentry_organization_has_member",
    class: RelationshipClass::Has,
    source_type: ORGANIZATION.entity_type,
    target_type: MEMBER.entity_type,
};

pub const TEAM_ASSIGNED_PROJECT: RelationshipMetadata = RelationshipMetadata {
    relationship_type: "sentry_team_assigned_project",
    class: RelationshipClass::Assigned,
    source_type: TEAM.entity_type,
    target_type: PROJECT.entity_type,
};

pub const TEAM_HAS_MEMBER: RelationshipMetadata = RelationshipMetadata {
    relationship_type: "sentry_team_has_member",
    class: RelationshipClass::Has,
    source_type: TEAM.entity_type,
    target_type: MEMBER.entity_type,
};

pub const ENTITY_TYPES: [EntityMetadata; 4] = [ORGANIZATION, TEAM, PROJECT, MEMBER];

pub const RELATIONSHIP_TYPES: [RelationshipMetadata; 5] = [
    ORGANIZATION_HAS_TEAM,
    ORGANIZATION_HAS_PROJECT,
    ORGANIZATION_HAS_MEMBER,
    TEAM_ASSIGNED_PROJECT,
    TEAM_HAS_MEMBER,
];

pub fn entity_metadata(entity_type: &str) -> Option<EntityMetadata> {
    ENTITY_TYPES
        .iter()
        .copied()
        .find(|metadata| metadata.entity_type == entity_type)
}

pub fn relationship_metadata(relationship_type: &str) -> Option<RelationshipMetadata> {
    RELATIONSHIP_TYPES
        .iter()
        .copied()
        .find(|metadata| metadata.relationship_type == relationship_type)
}
