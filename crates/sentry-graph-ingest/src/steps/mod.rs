use crate::constants::{
    MEMBER, ORGANIZATION, ORGANIZATION_HAS_MEMBER, ORGANIZATION_HAS_PROJECT,
    ORGANIZATION_HAS_TEAM, PROJECT, STEP_MEMBERS, STEP_ORGANIZATIONS, STEP_PROJECTS, STEP_TEAMS,
    STEP_TEAM_MEMBERS, TEAM, TEAM_ASSIGNED_PROJECT, TEAM_HAS_MEMBER,
};
use crate::{StepContext, StepDefinition};
use sentry_graph_store::Entity;
use std::sync::Arc;

pub mod members;
pub mod organizations;
pub mod projects;
pub mod team_members;
pub mod teams;

/// The Sentry ingestion steps in declaration order.
pub fn sentry_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new(
            STEP_ORGANIZATIONS,
            "Fetch Organizations",
            Arc::new(organizations::OrganizationsStep),
        )
        .entities([ORGANIZATION.entity_type]),
        StepDefinition::new(STEP_PROJECTS, "Fetch Projects", Arc::new(projects::ProjectsStep))
            .entities([PROJECT.entity_type])
            .relationships([ORGANIZATION_HAS_PROJECT.relationship_type])
            .depends_on([STEP_ORGANIZATIONS]),
        StepDefinition::new(STEP_TEAMS, "Fetch Teams", Arc::new(teams::TeamsStep))
            .entities([TEAM.entity_type])
            .relationships([
                ORGANIZATION_HAS_TEAM.relationship_type,
                TEAM_ASSIGNED_PROJECT.relationship_type,
            ])
            .depends_on([STEP_ORGANIZATIONS, STEP_PROJECTS]),
        StepDefinition::new(STEP_MEMBERS, "Fetch Members", Arc::new(members::MembersStep))
            .entities([MEMBER.entity_type])
            .relationships([ORGANIZATION_HAS_MEMBER.relationship_type])
            .depends_on([STEP_ORGANIZATIONS]),
        StepDefinition::new(
            STEP_TEAM_MEMBERS,
            "Fetch Team Members",
            Arc::new(team_members::TeamMembersStep),
        )
        .relationships([TEAM_HAS_MEMBER.relationship_type])
        .depends_on([STEP_TEAMS, STEP_MEMBERS]),
    ]
}

/// Stored organizations paired with their slug. Organizations without a
/// slug cannot be used to address child endpoints and are skipped.
pub(crate) fn organizations_with_slug(
    context: &StepContext<'_>,
) -> Box<dyn Iterator<Item = (Entity, String)> + Send> {
    let step_id = context.step_id.to_string();
    let organizations = context
        .job_state
        .iterate_entities(ORGANIZATION.entity_type)
        .filter_map(move |organization| {
            let Some(slug) = organization.attribute_str("slug").map(str::to_string) else {
                tracing::warn!(
                    step_id = %step_id,
                    key = %organization.key,
                    "organization has no slug; skipping"
                );
                return None;
            };
            Some((organization, slug))
        });
    Box::new(organizations)
}
