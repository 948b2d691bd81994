use crate::constants::{ORGANIZATION_HAS_TEAM, TEAM_HAS_MEMBER};
use crate::converters::{member_key, team_has_member};
use crate::{IngestError, StepContext, StepExecutor};
use async_trait::async_trait;

/// Links teams to members. Membership is only visible through the per-team
/// endpoint, so this walks the stored organization/team edges and resolves
/// each reported member against the members step's output.
#[derive(Debug, Default)]
pub struct TeamMembersStep;

#[async_trait]
impl StepExecutor for TeamMembersStep {
    async fn execute(&self, context: &StepContext<'_>) -> Result<(), IngestError> {
        let edges = context
            .job_state
            .iterate_relationships(ORGANIZATION_HAS_TEAM.relationship_type);
        for edge in edges {
            // The team's memberships cannot be fetched without its organization.
            let Some(organization) = context.job_state.find_entity(&edge.from_key) else {
                context.skip_cross_reference(
                    TEAM_HAS_MEMBER.relationship_type,
                    &edge.to_key,
                    &edge.from_key,
                );
                continue;
            };
            let Some(team) = context.job_state.find_entity(&edge.to_key) else {
                context.skip_cross_reference(
                    ORGANIZATION_HAS_TEAM.relationship_type,
                    &edge.from_key,
                    &edge.to_key,
                );
                continue;
            };
            let (Some(organization_slug), Some(team_slug)) =
                (organization.attribute_str("slug"), team.attribute_str("slug"))
            else {
                tracing::warn!(team = %team.key, "team or organization has no slug; skipping");
                continue;
            };

            let mut pages = context.client.team_members(organization_slug, team_slug);
            while let Some(record) = pages.next_record().await? {
                let key = member_key(&record.data.id);
                match context.job_state.find_entity(&key) {
                    Some(member) => {
                        context
                            .job_state
                            .add_relationship(team_has_member(&team, &member)?)?;
                    }
                    None => context.skip_cross_reference(
                        TEAM_HAS_MEMBER.relationship_type,
                        &team.key,
                        &key,
                    ),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ReconciliationEvent, RuntimeEventKind};
    use crate::steps::harness::Harness;
    use sentry_graph_store::{Entity, JobState, Relationship, RelationshipClass};
    use serde_json::json;

    fn stored_team(harness: &Harness) {
        harness
            .store
            .add_entity(
                Entity::new("sentry-team-10", "sentry_team", ["UserGroup"], json!({}))
                    .with_attribute("slug", "core"),
            )
            .expect("team should store");
    }

    fn skipped(harness: &Harness) -> Vec<(String, String, String)> {
        harness
            .events()
            .into_iter()
            .filter_map(|event| match event.kind {
                RuntimeEventKind::Reconciliation(ReconciliationEvent::CrossReferenceSkipped {
                    relationship_type,
                    from_key,
                    missing_key,
                    ..
                }) => Some((relationship_type, from_key, missing_key)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(flavor = "current_thread")]
    async fn team_members_step_missing_organization_expected_team_reported_as_source() {
        let harness = Harness::new();
        stored_team(&harness);
        harness
            .store
            .add_relationship(Relationship::new(
                "sentry_organization_has_team",
                RelationshipClass::Has,
                "sentry-organization-404",
                "sentry-team-10",
            ))
            .expect("edge should store");

        TeamMembersStep
            .execute(&harness.context("fetch-team-members"))
            .await
            .expect("missing organization should not be fatal");

        assert_eq!(
            skipped(&harness),
            vec![(
                "sentry_team_has_member".to_string(),
                "sentry-team-10".to_string(),
                "sentry-organization-404".to_string()
            )]
        );
        assert!(harness.mock.requests().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn team_members_step_unknown_member_expected_membership_skipped() {
        let harness = Harness::new();
        harness
            .store
            .add_entity(
                Entity::new(
                    "sentry-organization-1",
                    "sentry_organization",
                    ["Account"],
                    json!({}),
                )
                .with_attribute("slug", "acme"),
            )
            .expect("organization should store");
        stored_team(&harness);
        harness
            .store
            .add_entity(Entity::new(
                "sentry-member-1000",
                "sentry_member",
                ["User"],
                json!({}),
            ))
            .expect("member should store");
        harness
            .store
            .add_relationship(Relationship::new(
                "sentry_organization_has_team",
                RelationshipClass::Has,
                "sentry-organization-1",
                "sentry-team-10",
            ))
            .expect("edge should store");
        harness.mock.respond_json(
            "teams/acme/core/members/",
            json!([{"id": "1000"}, {"id": "2000"}]),
        );

        TeamMembersStep
            .execute(&harness.context("fetch-team-members"))
            .await
            .expect("unknown member should not be fatal");

        let graph = harness.store.collect();
        assert!(graph.contains_relationship(
            "sentry_team_has_member",
            "sentry-team-10",
            "sentry-member-1000"
        ));
        assert_eq!(
            skipped(&harness),
            vec![(
                "sentry_team_has_member".to_string(),
                "sentry-team-10".to_string(),
                "sentry-member-2000".to_string()
            )]
        );
    }
}
