use crate::{ConfigurationError, Diagnostic, Severity};
use sentry_graph_client::{DEFAULT_SENTRY_BASE_URL, Installation};
use std::fmt;

pub const ENV_AUTH_TOKEN: &str = "AUTH_TOKEN";
pub const ENV_CLIENT_TOKEN: &str = "CLIENT_TOKEN";
pub const ENV_ORGANIZATION_SLUG: &str = "ORGANIZATION_SLUG";
pub const ENV_CLIENT_ID: &str = "CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "CLIENT_SECRET";
pub const ENV_INSTALL_CODE: &str = "INSTALL_CODE";
pub const ENV_INSTALL_ID: &str = "INSTALL_ID";
pub const ENV_REFRESH_TOKEN: &str = "REFRESH_TOKEN";
pub const ENV_SENTRY_BASE_URL: &str = "SENTRY_BASE_URL";

/// Connection settings for one ingestion run. Blank values are treated as
/// absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IngestConfig {
    pub auth_token: Option<String>,
    pub organization_slug: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub install_code: Option<String>,
    pub install_id: Option<String>,
    pub refresh_token: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    StaticToken {
        token: String,
    },
    Installation {
        installation: Installation,
        token: Option<String>,
        install_code: Option<String>,
        refresh_token: Option<String>,
    },
}

impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticToken { .. } => f.write_str("StaticToken"),
            Self::Installation { installation, .. } => f
                .debug_struct("Installation")
                .field("install_id", &installation.install_id)
                .finish_non_exhaustive(),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source; `AUTH_TOKEN` wins over
    /// `CLIENT_TOKEN`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| normalize(lookup(name));
        Self {
            auth_token: read(ENV_AUTH_TOKEN).or_else(|| read(ENV_CLIENT_TOKEN)),
            organization_slug: read(ENV_ORGANIZATION_SLUG),
            client_id: read(ENV_CLIENT_ID),
            client_secret: read(ENV_CLIENT_SECRET),
            install_code: read(ENV_INSTALL_CODE),
            install_id: read(ENV_INSTALL_ID),
            refresh_token: read(ENV_REFRESH_TOKEN),
            base_url: read(ENV_SENTRY_BASE_URL),
        }
    }

    /// Drops blank strings so later checks only see meaningful values.
    pub fn normalized(self) -> Self {
        Self {
            auth_token: normalize(self.auth_token),
            organization_slug: normalize(self.organization_slug),
            client_id: normalize(self.client_id),
            client_secret: normalize(self.client_secret),
            install_code: normalize(self.install_code),
            install_id: normalize(self.install_id),
            refresh_token: normalize(self.refresh_token),
            base_url: normalize(self.base_url),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_SENTRY_BASE_URL)
    }

    pub fn auth_mode(&self) -> Result<AuthMode, ConfigurationError> {
        let config = self.clone().normalized();
        let installation_fields = [
            (ENV_CLIENT_ID, &config.client_id),
            (ENV_CLIENT_SECRET, &config.client_secret),
            (ENV_INSTALL_ID, &config.install_id),
            (ENV_INSTALL_CODE, &config.install_code),
            (ENV_REFRESH_TOKEN, &config.refresh_token),
        ];
        let uses_installation = installation_fields.iter().any(|(_, value)| value.is_some());

        if !uses_installation {
            return match config.auth_token {
                Some(token) => Ok(AuthMode::StaticToken { token }),
                None => Err(auth_error(
                    format!(
                        "no credentials configured; set {ENV_AUTH_TOKEN}, or {ENV_CLIENT_ID}, \
                         {ENV_CLIENT_SECRET}, {ENV_INSTALL_ID} and {ENV_INSTALL_CODE} or \
                         {ENV_REFRESH_TOKEN}"
                    ),
                    vec![ENV_AUTH_TOKEN.to_string()],
                )),
            };
        }

        let mut missing: Vec<String> = installation_fields[..3]
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if config.install_code.is_none() && config.refresh_token.is_none() {
            missing.push(format!("{ENV_INSTALL_CODE} or {ENV_REFRESH_TOKEN}"));
        }
        if !missing.is_empty() {
            return Err(auth_error(
                format!(
                    "incomplete installation credentials; missing {}",
                    missing.join(", ")
                ),
                missing,
            ));
        }

        let (Some(client_id), Some(client_secret), Some(install_id)) =
            (config.client_id, config.client_secret, config.install_id)
        else {
            return Err(auth_error(
                "incomplete installation credentials".to_string(),
                Vec::new(),
            ));
        };
        Ok(AuthMode::Installation {
            installation: Installation {
                install_id,
                client_id,
                client_secret,
            },
            token: config.auth_token,
            install_code: config.install_code,
            refresh_token: config.refresh_token,
        })
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("IngestConfig")
            .field("auth_token", &redacted(&self.auth_token))
            .field("organization_slug", &self.organization_slug)
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("install_code", &redacted(&self.install_code))
            .field("install_id", &self.install_id)
            .field("refresh_token", &redacted(&self.refresh_token))
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn auth_error(message: String, missing: Vec<String>) -> ConfigurationError {
    let diagnostics = missing
        .into_iter()
        .map(|field| {
            Diagnostic::new("auth_config", Severity::Error, format!("missing {field}"))
                .with_fix(format!("set {field}"))
        })
        .collect();
    ConfigurationError {
        message,
        diagnostics,
        errors_count: 1,
    }
}
