use crate::Diagnostic;
use sentry_graph_client::ClientError;
use sentry_graph_store::JobStateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    JobState(#[from] JobStateError),
    #[error("step '{step_id}' failed: {source}")]
    StepExecution {
        step_id: String,
        #[source]
        source: Box<IngestError>,
    },
    #[error(
        "{relationship_type} expects a {expected} {endpoint} but '{key}' is a {actual}"
    )]
    RelationshipEndpoint {
        relationship_type: String,
        endpoint: &'static str,
        key: String,
        expected: String,
        actual: String,
    },
    #[error("step error: {0}")]
    Step(String),
}

impl IngestError {
    pub fn step_execution(step_id: impl Into<String>, source: IngestError) -> Self {
        Self::StepExecution {
            step_id: step_id.into(),
            source: Box::new(source),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// True when the root cause is a rejected credential, including one
    /// raised from inside a step.
    pub fn is_authentication(&self) -> bool {
        match self {
            Self::Client(error) => error.is_authentication(),
            Self::StepExecution { source, .. } => source.is_authentication(),
            _ => false,
        }
    }

    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::StepExecution { step_id, .. } => Some(step_id),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct ConfigurationError {
    pub message: String,
    pub diagnostics: Vec<Diagnostic>,
    pub errors_count: usize,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            diagnostics: Vec::new(),
            errors_count: 1,
        }
    }

    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let errors: Vec<&str> = diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.is_error())
            .map(|diagnostic| diagnostic.message.as_str())
            .collect();
        let message = format!(
            "step graph validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        );
        let errors_count = errors.len();
        Self {
            message,
            diagnostics,
            errors_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;

    #[test]
    fn step_execution_wrapping_client_auth_error_expected_authentication_detected() {
        let error = IngestError::step_execution(
            "fetch-teams",
            IngestError::Client(ClientError::Authentication {
                endpoint: "teams".to_string(),
                message: "expired".to_string(),
            }),
        );

        assert!(error.is_authentication());
        assert_eq!(error.step_id(), Some("fetch-teams"));
        assert!(error.to_string().starts_with("step 'fetch-teams' failed:"));
    }

    #[test]
    fn configuration_error_from_diagnostics_expected_only_errors_counted() {
        let error = ConfigurationError::from_diagnostics(vec![
            Diagnostic::new("acyclic", Severity::Error, "cycle through a, b"),
            Diagnostic::new("single_type_owner", Severity::Warning, "shared type"),
        ]);

        assert_eq!(error.errors_count, 1);
        assert_eq!(error.diagnostics.len(), 2);
        assert!(error.message.contains("cycle through a, b"));
        assert!(!error.message.contains("shared type"));
    }
}
