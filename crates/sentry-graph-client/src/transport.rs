use crate::errors::ClientError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer_token: Option<String>,
    pub json_body: Option<Value>,
}

impl ProviderRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            bearer_token: None,
            json_body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            bearer_token: None,
            json_body: Some(body),
        }
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Response as seen by the client. Header names are lower-case; repeated
/// headers are joined with `", "`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ProviderResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ClientError>;
}

#[async_trait]
impl<T> ProviderTransport for Arc<T>
where
    T: ProviderTransport + ?Sized,
{
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ClientError> {
        (**self).send(request).await
    }
}

pub type SharedTransport = Arc<dyn ProviderTransport>;

#[derive(Clone, Debug, PartialEq)]
pub struct RetryBackoffConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetryBackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            backoff_factor: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

pub fn delay_for_attempt_ms(attempt: u32, config: &RetryBackoffConfig) -> u64 {
    let exp = (attempt.saturating_sub(1)) as i32;
    let base = (config.initial_delay_ms as f64) * config.backoff_factor.powi(exp);
    base.min(config.max_delay_ms as f64).round().max(0.0) as u64
}

fn is_retryable_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// HTTP transport backed by `reqwest`. Connection failures, 429 and 5xx
/// responses are retried with exponential backoff; the last response is
/// returned once attempts run out.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    retry: RetryBackoffConfig,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            retry: RetryBackoffConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryBackoffConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, request: &ProviderRequest) -> Result<ProviderResponse, ClientError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        builder = builder
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(DEFAULT_REQUEST_TIMEOUT);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ClientError::TransientHttp {
                endpoint: request.url.clone(),
                status: None,
                message: format!("http {} failed: {err}", request.method.as_str()),
            })?;
        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .text()
            .await
            .map_err(|err| ClientError::TransientHttp {
                endpoint: request.url.clone(),
                status: Some(status),
                message: format!("http read body failed: {err}"),
            })?;

        Ok(ProviderResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl ProviderTransport for ReqwestTransport {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ClientError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.send_once(&request).await {
                Ok(response) if is_retryable_status(response.status) && attempt < max_attempts => {
                    tracing::debug!(
                        url = %request.url,
                        status = response.status,
                        attempt,
                        "retryable response from provider"
                    );
                }
                Ok(response) => return Ok(response),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    tracing::debug!(url = %request.url, attempt, %error, "provider request failed");
                }
                Err(error) => return Err(error),
            }

            let delay_ms = delay_for_attempt_ms(attempt, &self.retry);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            attempt += 1;
        }
    }
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    collected
}
