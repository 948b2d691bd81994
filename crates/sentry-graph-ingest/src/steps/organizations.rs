use crate::converters::organization_entity;
use crate::{IngestError, StepContext, StepExecutor};
use async_trait::async_trait;

/// Stores the configured organization, or every organization the
/// credential can see when no slug is configured.
#[derive(Debug, Default)]
pub struct OrganizationsStep;

#[async_trait]
impl StepExecutor for OrganizationsStep {
    async fn execute(&self, context: &StepContext<'_>) -> Result<(), IngestError> {
        let mut pages = context.client.organizations(context.organization_slug);
        while let Some(record) = pages.next_record().await? {
            let organization = context.job_state.add_entity(organization_entity(&record))?;
            tracing::debug!(key = %organization.key, "stored organization");
        }
        Ok(())
    }
}
