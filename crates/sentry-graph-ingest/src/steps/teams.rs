use crate::constants::TEAM_ASSIGNED_PROJECT;
use crate::converters::{organization_has_team, project_key, team_assigned_project, team_entity};
use crate::steps::organizations_with_slug;
use crate::{IngestError, StepContext, StepExecutor};
use async_trait::async_trait;

/// Teams of each organization. Project assignments come from the team
/// payload and resolve against projects stored by the projects step.
#[derive(Debug, Default)]
pub struct TeamsStep;

#[async_trait]
impl StepExecutor for TeamsStep {
    async fn execute(&self, context: &StepContext<'_>) -> Result<(), IngestError> {
        for (organization, slug) in organizations_with_slug(context) {
            let mut pages = context.client.teams(&slug);
            while let Some(record) = pages.next_record().await? {
                let team = context.job_state.add_entity(team_entity(&record))?;
                context
                    .job_state
                    .add_relationship(organization_has_team(&organization, &team)?)?;

                for project_ref in &record.data.projects {
                    let key = project_key(&project_ref.id);
                    match context.job_state.find_entity(&key) {
                        Some(project) => {
                            context
                                .job_state
                                .add_relationship(team_assigned_project(&team, &project)?)?;
                        }
                        None => context.skip_cross_reference(
                            TEAM_ASSIGNED_PROJECT.relationship_type,
                            &team.key,
                            &key,
                        ),
                    }
                }
            }
        }
        Ok(())
    }
}
