#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("authentication failed for {endpoint}: {message}")]
    Authentication { endpoint: String, message: String },

    #[error("transient http failure for {endpoint}: {message}")]
    TransientHttp {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("http request to {endpoint} failed with status {status}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientHttp { .. })
    }
}

pub(crate) fn map_http_status(status: u16, endpoint: &str, body: String) -> ClientError {
    match status {
        401 => ClientError::Authentication {
            endpoint: endpoint.to_string(),
            message: format!("provider rejected credential: {body}"),
        },
        429 | 500..=599 => ClientError::TransientHttp {
            endpoint: endpoint.to_string(),
            status: Some(status),
            message: body,
        },
        _ => ClientError::Http {
            endpoint: endpoint.to_string(),
            status,
            body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_http_status_server_error_expected_transient() {
        let error = map_http_status(503, "organizations/", "unavailable".to_string());
        assert!(error.is_transient());
    }

    #[test]
    fn map_http_status_not_found_expected_http_with_status() {
        let error = map_http_status(404, "organizations/nope/", "missing".to_string());
        assert!(matches!(error, ClientError::Http { status: 404, .. }));
        assert_eq!(
            error.to_string(),
            "http request to organizations/nope/ failed with status 404: missing"
        );
    }
}
