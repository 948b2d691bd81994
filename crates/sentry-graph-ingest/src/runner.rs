use crate::events::{PipelineEvent, ReconciliationEvent, RunEvents, RuntimeEventSink, StepEvent};
use crate::lint::{undeclared_type_diagnostic, undeclared_types};
use crate::{Diagnostic, IngestError, StepContext, StepGraph};
use sentry_graph_client::SentryClient;
use sentry_graph_store::{DanglingRelationship, JobState};
use serde::Serialize;
use std::time::Instant;

#[derive(Clone, Default)]
pub struct RunConfig {
    pub run_id: Option<String>,
    pub organization_slug: Option<String>,
    pub events: RuntimeEventSink,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub status: StepStatus,
    pub entities_added: usize,
    pub relationships_added: usize,
    pub notes: Option<String>,
}

/// Outcome of one run. On failure, `failure` holds the step error and the
/// store keeps whatever completed steps wrote.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub completed_steps: Vec<String>,
    pub skipped_steps: Vec<String>,
    pub step_outcomes: Vec<StepOutcome>,
    pub warnings: Vec<Diagnostic>,
    pub dangling: Vec<DanglingRelationship>,
    pub failure: Option<IngestError>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }

    pub fn failed_step(&self) -> Option<&str> {
        self.failure.as_ref().and_then(IngestError::step_id)
    }

    pub fn failure_reason(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }
}

/// Executes a validated step graph strictly in its topological order and
/// stops at the first failing step.
#[derive(Debug, Default)]
pub struct PipelineRunner;

impl PipelineRunner {
    pub async fn run(
        &self,
        graph: &StepGraph,
        job_state: &dyn JobState,
        client: &SentryClient,
        config: RunConfig,
    ) -> RunResult {
        let run_id = config
            .run_id
            .unwrap_or_else(|| format!("sentry-ingest-{}", crate::events::timestamp_now()));
        let events = RunEvents::new(run_id.clone(), config.events);
        let order = graph.order_ids();
        tracing::info!(run_id = %run_id, steps = ?order, "starting ingestion run");
        events.pipeline(PipelineEvent::Started {
            run_id: run_id.clone(),
            step_order: order,
        });

        let mut completed_steps = Vec::new();
        let mut skipped_steps = Vec::new();
        let mut step_outcomes = Vec::new();
        let mut warnings: Vec<Diagnostic> = graph.diagnostics().to_vec();
        let mut failure: Option<IngestError> = None;

        for step in graph.execution_order() {
            if let Some(failed) = failure.as_ref().and_then(IngestError::step_id) {
                tracing::info!(step_id = %step.id, blocked_by = failed, "skipping step");
                events.step(StepEvent::Skipped {
                    run_id: run_id.clone(),
                    step_id: step.id.clone(),
                    blocked_by: failed.to_string(),
                });
                skipped_steps.push(step.id.clone());
                step_outcomes.push(StepOutcome {
                    step_id: step.id.clone(),
                    status: StepStatus::Skipped,
                    entities_added: 0,
                    relationships_added: 0,
                    notes: Some(format!("not run after '{failed}' failed")),
                });
                continue;
            }

            tracing::info!(step_id = %step.id, name = %step.name, "step started");
            events.step(StepEvent::Started {
                run_id: run_id.clone(),
                step_id: step.id.clone(),
                name: step.name.clone(),
            });

            let types_before = job_state.encountered_types();
            let entities_before = job_state.entity_count();
            let relationships_before = job_state.relationship_count();
            let started = Instant::now();

            let context = StepContext {
                step_id: &step.id,
                job_state,
                client,
                events: &events,
                organization_slug: config.organization_slug.as_deref(),
            };
            let result = step.executor.execute(&context).await;

            let entities_added = job_state.entity_count() - entities_before;
            let relationships_added = job_state.relationship_count() - relationships_before;
            let types_after = job_state.encountered_types();
            for type_name in undeclared_types(step, &types_before, &types_after) {
                let diagnostic = undeclared_type_diagnostic(&step.id, &type_name);
                tracing::warn!(step_id = %step.id, type_name = %type_name, "{}", diagnostic.message);
                events.step(StepEvent::UndeclaredType {
                    run_id: run_id.clone(),
                    step_id: step.id.clone(),
                    type_name,
                });
                warnings.push(diagnostic);
            }

            match result {
                Ok(()) => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    tracing::info!(
                        step_id = %step.id,
                        entities_added,
                        relationships_added,
                        duration_ms,
                        "step completed"
                    );
                    events.step(StepEvent::Completed {
                        run_id: run_id.clone(),
                        step_id: step.id.clone(),
                        entities_added,
                        relationships_added,
                        duration_ms,
                    });
                    completed_steps.push(step.id.clone());
                    step_outcomes.push(StepOutcome {
                        step_id: step.id.clone(),
                        status: StepStatus::Completed,
                        entities_added,
                        relationships_added,
                        notes: None,
                    });
                }
                Err(error) => {
                    let error = IngestError::step_execution(step.id.clone(), error);
                    let reason = error.to_string();
                    tracing::error!(step_id = %step.id, error = %reason, "step failed");
                    events.step(StepEvent::Failed {
                        run_id: run_id.clone(),
                        step_id: step.id.clone(),
                        reason: reason.clone(),
                    });
                    step_outcomes.push(StepOutcome {
                        step_id: step.id.clone(),
                        status: StepStatus::Failed,
                        entities_added,
                        relationships_added,
                        notes: Some(reason),
                    });
                    failure = Some(error);
                }
            }
        }

        let dangling = job_state.dangling_relationships();
        for entry in &dangling {
            tracing::warn!(run_id = %run_id, "{entry}");
            events.reconciliation(ReconciliationEvent::DanglingRelationship {
                run_id: run_id.clone(),
                relationship_type: entry.relationship.relationship_type.clone(),
                from_key: entry.relationship.from_key.clone(),
                to_key: entry.relationship.to_key.clone(),
                missing_keys: entry.missing_keys.clone(),
            });
        }

        let status = if failure.is_some() {
            RunStatus::Fail
        } else {
            RunStatus::Success
        };
        match failure.as_ref() {
            Some(error) => events.pipeline(PipelineEvent::Failed {
                run_id: run_id.clone(),
                step_id: error.step_id().map(str::to_string),
                reason: error.to_string(),
            }),
            None => {
                tracing::info!(
                    run_id = %run_id,
                    entities = job_state.entity_count(),
                    relationships = job_state.relationship_count(),
                    "ingestion run completed"
                );
                events.pipeline(PipelineEvent::Completed {
                    run_id: run_id.clone(),
                    entity_count: job_state.entity_count(),
                    relationship_count: job_state.relationship_count(),
                });
            }
        }

        RunResult {
            run_id,
            status,
            completed_steps,
            skipped_steps,
            step_outcomes,
            warnings,
            dangling,
            failure,
        }
    }
}
