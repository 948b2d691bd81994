use crate::events::{ReconciliationEvent, RunEvents};
use crate::{ConfigurationError, Diagnostic, IngestError, validate_or_raise};
use async_trait::async_trait;
use sentry_graph_client::SentryClient;
use sentry_graph_store::JobState;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Everything a step may touch while it runs.
pub struct StepContext<'a> {
    pub step_id: &'a str,
    pub job_state: &'a dyn JobState,
    pub client: &'a SentryClient,
    pub events: &'a RunEvents,
    pub organization_slug: Option<&'a str>,
}

impl StepContext<'_> {
    /// Records a cross-reference that could not be built because one side was
    /// never stored. Never fatal.
    pub fn skip_cross_reference(&self, relationship_type: &str, from_key: &str, missing_key: &str) {
        tracing::warn!(
            step_id = self.step_id,
            relationship_type,
            from_key,
            missing_key,
            "skipping cross-reference to unknown entity"
        );
        self.events
            .reconciliation(ReconciliationEvent::CrossReferenceSkipped {
                run_id: self.events.run_id().to_string(),
                step_id: self.step_id.to_string(),
                relationship_type: relationship_type.to_string(),
                from_key: from_key.to_string(),
                missing_key: missing_key.to_string(),
            });
    }
}

#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, context: &StepContext<'_>) -> Result<(), IngestError>;
}

#[derive(Clone)]
pub struct StepDefinition {
    pub id: String,
    pub name: String,
    pub entity_types: Vec<String>,
    pub relationship_types: Vec<String>,
    pub depends_on: Vec<String>,
    pub executor: Arc<dyn StepExecutor>,
}

impl StepDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        executor: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_types: Vec::new(),
            relationship_types: Vec::new(),
            depends_on: Vec::new(),
            executor,
        }
    }

    pub fn entities<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn relationships<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationship_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn depends_on<I, S>(mut self, step_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = step_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn declared_types(&self) -> impl Iterator<Item = &str> {
        self.entity_types
            .iter()
            .chain(self.relationship_types.iter())
            .map(String::as_str)
    }

    pub fn declares_type(&self, type_name: &str) -> bool {
        self.declared_types().any(|declared| declared == type_name)
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entity_types", &self.entity_types)
            .field("relationship_types", &self.relationship_types)
            .field("depends_on", &self.depends_on)
            .finish_non_exhaustive()
    }
}

/// Kahn's algorithm over step positions. Ready steps leave in declaration
/// order. Unknown and self dependencies are ignored here; lint reports them.
/// On a cycle, returns the ids that never became ready.
pub fn topological_order(steps: &[StepDefinition]) -> Result<Vec<usize>, Vec<String>> {
    let mut positions: BTreeMap<&str, usize> = BTreeMap::new();
    for (position, step) in steps.iter().enumerate() {
        positions.entry(step.id.as_str()).or_insert(position);
    }

    let mut indegree = vec![0usize; steps.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); steps.len()];
    for (position, step) in steps.iter().enumerate() {
        let dependencies: BTreeSet<usize> = step
            .depends_on
            .iter()
            .filter_map(|dependency| positions.get(dependency.as_str()).copied())
            .filter(|dependency| *dependency != position)
            .collect();
        indegree[position] = dependencies.len();
        for dependency in dependencies {
            dependents[dependency].push(position);
        }
    }

    let mut ready: BTreeSet<usize> = indegree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(position, _)| position)
        .collect();
    let mut order = Vec::with_capacity(steps.len());
    while let Some(position) = ready.pop_first() {
        order.push(position);
        for &dependent in &dependents[position] {
            indegree[dependent] -= 1;
            if indegree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() == steps.len() {
        return Ok(order);
    }
    let placed: BTreeSet<usize> = order.into_iter().collect();
    Err(steps
        .iter()
        .enumerate()
        .filter(|(position, _)| !placed.contains(position))
        .map(|(_, step)| step.id.clone())
        .collect())
}

/// A validated step set with its execution order fixed at construction.
#[derive(Debug)]
pub struct StepGraph {
    steps: Vec<StepDefinition>,
    order: Vec<usize>,
    diagnostics: Vec<Diagnostic>,
}

impl StepGraph {
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, ConfigurationError> {
        let diagnostics = validate_or_raise(&steps, &[])?;
        let order = topological_order(&steps).map_err(|stuck| {
            ConfigurationError::new(format!(
                "step dependencies form a cycle through: {}",
                stuck.join(", ")
            ))
        })?;
        Ok(Self {
            steps,
            order,
            diagnostics,
        })
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn step(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn execution_order(&self) -> impl Iterator<Item = &StepDefinition> {
        self.order.iter().map(|position| &self.steps[*position])
    }

    pub fn order_ids(&self) -> Vec<String> {
        self.execution_order().map(|step| step.id.clone()).collect()
    }

    /// Non-fatal findings from validation.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}
