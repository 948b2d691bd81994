use crate::config::{AuthMode, IngestConfig};
use crate::events::RuntimeEventSink;
use crate::runner::{PipelineRunner, RunConfig, RunResult};
use crate::steps::sentry_steps;
use crate::{IngestError, StepDefinition, StepGraph};
use sentry_graph_client::{
    AuthGrant, Credential, ReqwestTransport, SentryClient, SharedTransport,
};
use sentry_graph_store::{CollectedGraph, JobState, MemoryJobState};
use std::sync::Arc;

/// What a finished run hands to the exporter.
#[derive(Debug)]
pub struct IngestReport {
    pub run: RunResult,
    pub graph: CollectedGraph,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.run.is_success()
    }
}

/// Wires configuration, client, step graph and store together for one run.
pub struct IngestDriver {
    config: IngestConfig,
    transport: SharedTransport,
    steps: Vec<StepDefinition>,
    events: RuntimeEventSink,
    run_id: Option<String>,
}

impl IngestDriver {
    pub fn new(config: IngestConfig) -> Self {
        Self {
            config: config.normalized(),
            transport: Arc::new(ReqwestTransport::new()),
            steps: sentry_steps(),
            events: RuntimeEventSink::default(),
            run_id: None,
        }
    }

    pub fn with_transport(mut self, transport: SharedTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_steps(mut self, steps: Vec<StepDefinition>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_events(mut self, events: RuntimeEventSink) -> Self {
        self.events = events;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Builds an authenticated client. Installation deployments without a
    /// token exchange the install code (or refresh token) first.
    pub async fn build_client(&self) -> Result<SentryClient, IngestError> {
        let base_url = self.config.base_url().to_string();
        match self.config.auth_mode()? {
            AuthMode::StaticToken { token } => Ok(SentryClient::new(
                Arc::clone(&self.transport),
                base_url,
                Credential::bearer(token),
            )),
            AuthMode::Installation {
                installation,
                token,
                install_code,
                refresh_token,
            } => {
                let credential = Credential {
                    token: token.clone(),
                    refresh_token: refresh_token.clone(),
                };
                let client = SentryClient::new(Arc::clone(&self.transport), base_url, credential)
                    .with_installation(installation);
                if token.is_none() {
                    let grant = match (install_code, refresh_token) {
                        (Some(code), _) => AuthGrant::AuthorizationCode(code),
                        (None, Some(refresh_token)) => AuthGrant::RefreshToken(refresh_token),
                        (None, None) => {
                            return Err(crate::ConfigurationError::new(
                                "installation credentials need an install code or refresh token",
                            )
                            .into());
                        }
                    };
                    tracing::info!(grant_type = grant.grant_type(), "exchanging installation grant");
                    client.authorize(grant).await?;
                }
                Ok(client)
            }
        }
    }

    /// Validates, authenticates and runs every step against `job_state`.
    /// Configuration and authentication problems fail before any step runs.
    pub async fn run_with_store(&self, job_state: &dyn JobState) -> Result<RunResult, IngestError> {
        self.config.auth_mode()?;
        let graph = StepGraph::new(self.steps.clone())?;
        let client = self.build_client().await?;
        client.verify_authentication().await?;
        tracing::info!(base_url = client.base_url(), "credential verified");

        let run = PipelineRunner
            .run(
                &graph,
                job_state,
                &client,
                RunConfig {
                    run_id: self.run_id.clone(),
                    organization_slug: self.config.organization_slug.clone(),
                    events: self.events.clone(),
                },
            )
            .await;
        Ok(run)
    }

    pub async fn run(&self) -> Result<IngestReport, IngestError> {
        let job_state = MemoryJobState::new();
        let run = self.run_with_store(&job_state).await?;
        Ok(IngestReport {
            run,
            graph: job_state.collect(),
        })
    }
}
