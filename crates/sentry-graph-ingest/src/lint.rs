use crate::step::topological_order;
use crate::{ConfigurationError, Diagnostic, Severity, StepDefinition};
use std::collections::{BTreeMap, BTreeSet};

pub trait LintRule {
    fn name(&self) -> &str;
    fn apply(&self, steps: &[StepDefinition]) -> Vec<Diagnostic>;
}

pub fn validate(steps: &[StepDefinition], extra_rules: &[&dyn LintRule]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    diagnostics.extend(rule_step_id_present(steps));
    diagnostics.extend(rule_unique_ids(steps));
    diagnostics.extend(rule_dependency_exists(steps));
    diagnostics.extend(rule_no_self_dependency(steps));
    diagnostics.extend(rule_acyclic(steps));
    diagnostics.extend(rule_single_type_owner(steps));
    diagnostics.extend(rule_declares_outputs(steps));

    for rule in extra_rules {
        diagnostics.extend(rule.apply(steps));
    }

    diagnostics
}

pub fn validate_or_raise(
    steps: &[StepDefinition],
    extra_rules: &[&dyn LintRule],
) -> Result<Vec<Diagnostic>, ConfigurationError> {
    let diagnostics = validate(steps, extra_rules);
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(ConfigurationError::from_diagnostics(diagnostics));
    }
    Ok(diagnostics)
}

/// Types whose stored count grew while `step` ran but that the step never
/// declared.
pub fn undeclared_types(
    step: &StepDefinition,
    before: &BTreeMap<String, usize>,
    after: &BTreeMap<String, usize>,
) -> Vec<String> {
    after
        .iter()
        .filter(|(type_name, count)| before.get(*type_name).copied().unwrap_or(0) < **count)
        .filter(|(type_name, _)| !step.declares_type(type_name))
        .map(|(type_name, _)| type_name.clone())
        .collect()
}

pub fn undeclared_type_diagnostic(step_id: &str, type_name: &str) -> Diagnostic {
    Diagnostic::new(
        "declared_types_written",
        Severity::Warning,
        format!("step wrote undeclared type '{type_name}'"),
    )
    .with_step_id(step_id)
    .with_fix(format!("add '{type_name}' to the step's declared types"))
}

fn rule_step_id_present(steps: &[StepDefinition]) -> Vec<Diagnostic> {
    steps
        .iter()
        .filter(|step| step.id.trim().is_empty())
        .map(|step| {
            Diagnostic::new(
                "step_id_present",
                Severity::Error,
                format!("step '{}' has an empty id", step.name),
            )
        })
        .collect()
}

fn rule_unique_ids(steps: &[StepDefinition]) -> Vec<Diagnostic> {
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();
    let mut diagnostics = Vec::new();
    for step in steps {
        if !seen.insert(step.id.as_str()) && reported.insert(step.id.as_str()) {
            diagnostics.push(
                Diagnostic::new(
                    "unique_ids",
                    Severity::Error,
                    format!("step id '{}' is declared more than once", step.id),
                )
                .with_step_id(step.id.clone()),
            );
        }
    }
    diagnostics
}

fn rule_dependency_exists(steps: &[StepDefinition]) -> Vec<Diagnostic> {
    let known: BTreeSet<&str> = steps.iter().map(|step| step.id.as_str()).collect();
    let mut diagnostics = Vec::new();
    for step in steps {
        for dependency in &step.depends_on {
            if !known.contains(dependency.as_str()) {
                diagnostics.push(
                    Diagnostic::new(
                        "dependency_exists",
                        Severity::Error,
                        format!(
                            "step '{}' depends on undeclared step '{}'",
                            step.id, dependency
                        ),
                    )
                    .with_step_id(step.id.clone())
                    .with_dependency(step.id.clone(), dependency.clone()),
                );
            }
        }
    }
    diagnostics
}

fn rule_no_self_dependency(steps: &[StepDefinition]) -> Vec<Diagnostic> {
    steps
        .iter()
        .filter(|step| step.depends_on.iter().any(|dependency| *dependency == step.id))
        .map(|step| {
            Diagnostic::new(
                "no_self_dependency",
                Severity::Error,
                format!("step '{}' depends on itself", step.id),
            )
            .with_step_id(step.id.clone())
            .with_dependency(step.id.clone(), step.id.clone())
        })
        .collect()
}

fn rule_acyclic(steps: &[StepDefinition]) -> Vec<Diagnostic> {
    match topological_order(steps) {
        Ok(_) => Vec::new(),
        Err(stuck) => vec![Diagnostic::new(
            "acyclic",
            Severity::Error,
            format!(
                "step dependencies form a cycle through: {}",
                stuck.join(", ")
            ),
        )],
    }
}

fn rule_single_type_owner(steps: &[StepDefinition]) -> Vec<Diagnostic> {
    let mut owners: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for step in steps {
        let declared: BTreeSet<&str> = step.declared_types().collect();
        for type_name in declared {
            owners.entry(type_name).or_default().push(step.id.as_str());
        }
    }

    owners
        .into_iter()
        .filter(|(_, steps)| steps.len() > 1)
        .map(|(type_name, steps)| {
            Diagnostic::new(
                "single_type_owner",
                Severity::Warning,
                format!(
                    "type '{type_name}' is declared by several steps: {}",
                    steps.join(", ")
                ),
            )
        })
        .collect()
}

fn rule_declares_outputs(steps: &[StepDefinition]) -> Vec<Diagnostic> {
    steps
        .iter()
        .filter(|step| step.declared_types().next().is_none())
        .map(|step| {
            Diagnostic::new(
                "declares_outputs",
                Severity::Info,
                "step declares no entity or relationship types",
            )
            .with_step_id(step.id.clone())
        })
        .collect()
}
