use crate::converters::{organization_has_project, project_entity};
use crate::steps::organizations_with_slug;
use crate::{IngestError, StepContext, StepExecutor};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct ProjectsStep;

#[async_trait]
impl StepExecutor for ProjectsStep {
    async fn execute(&self, context: &StepContext<'_>) -> Result<(), IngestError> {
        for (organization, slug) in organizations_with_slug(context) {
            let mut pages = context.client.projects(&slug);
            while let Some(record) = pages.next_record().await? {
                let project = context.job_state.add_entity(project_entity(&record))?;
                context
                    .job_state
                    .add_relationship(organization_has_project(&organization, &project)?)?;
            }
            tracing::debug!(
                organization = %slug,
                pages = pages.pages_fetched(),
                "projects fetched"
            );
        }
        Ok(())
    }
}
