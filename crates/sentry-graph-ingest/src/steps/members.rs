use crate::converters::{member_entity, organization_has_member};
use crate::steps::organizations_with_slug;
use crate::{IngestError, StepContext, StepExecutor};
use async_trait::async_trait;

/// Organization members from the `members/` endpoint, whose ids match the
/// ones the team members endpoint reports.
#[derive(Debug, Default)]
pub struct MembersStep;

#[async_trait]
impl StepExecutor for MembersStep {
    async fn execute(&self, context: &StepContext<'_>) -> Result<(), IngestError> {
        for (organization, slug) in organizations_with_slug(context) {
            let mut pages = context.client.members(&slug);
            while let Some(record) = pages.next_record().await? {
                let member = context.job_state.add_entity(member_entity(&record))?;
                context
                    .job_state
                    .add_relationship(organization_has_member(&organization, &member)?)?;
            }
        }
        Ok(())
    }
}
