use serde::Deserialize;
use serde_json::{Value, json};
use std::fmt;

/// Bearer credential owned by one client instance. Replaced in place when
/// the installation flow issues a new token.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Sentry integration-platform installation used to mint and refresh tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Installation {
    pub install_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl Installation {
    pub fn authorizations_path(&self) -> String {
        format!("sentry-app-installations/{}/authorizations/", self.install_id)
    }

    pub fn authorization_body(&self, grant: &AuthGrant) -> Value {
        let mut body = json!({
            "grant_type": grant.grant_type(),
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        });
        match grant {
            AuthGrant::AuthorizationCode(code) => body["code"] = json!(code),
            AuthGrant::RefreshToken(token) => body["refresh_token"] = json!(token),
        }
        body
    }
}

impl fmt::Debug for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installation")
            .field("install_id", &self.install_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum AuthGrant {
    AuthorizationCode(String),
    RefreshToken(String),
}

impl AuthGrant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode(_) => "authorization_code",
            Self::RefreshToken(_) => "refresh_token",
        }
    }
}

impl fmt::Debug for AuthGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthGrant({})", self.grant_type())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub token: String,
    #[serde(default, rename = "refreshToken")]
    pub refresh_token: Option<String>,
}
