use crate::auth::Credential;
use crate::client::SentryClient;
use crate::errors::ClientError;
use crate::transport::{HttpMethod, ProviderRequest, ProviderResponse, ProviderTransport};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const MOCK_BASE_URL: &str = "https://sentry.test/api/0/";

type RouteKey = (HttpMethod, String, Option<String>);

/// Scripted in-memory provider.
///
/// Routes are keyed by method, path relative to [`MOCK_BASE_URL`] and
/// optional `cursor` query value. One-shot responses are served before
/// sticky ones; a cursor-specific route wins over a cursor-less one.
/// Unrouted requests answer 404.
#[derive(Clone, Debug, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<MockProviderState>>,
}

#[derive(Debug, Default)]
struct MockProviderState {
    once: BTreeMap<RouteKey, VecDeque<ProviderResponse>>,
    sticky: BTreeMap<RouteKey, ProviderResponse>,
    requests: Vec<ProviderRequest>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client over this provider with a static bearer token.
    pub fn client(&self, token: &str) -> SentryClient {
        SentryClient::new(
            Arc::new(self.clone()),
            MOCK_BASE_URL,
            Credential::bearer(token),
        )
    }

    pub fn respond(&self, path: &str, response: ProviderResponse) {
        self.state()
            .sticky
            .insert(route(HttpMethod::Get, path, None), response);
    }

    pub fn respond_json(&self, path: &str, body: Value) {
        self.respond(path, ProviderResponse::json(200, &body));
    }

    pub fn respond_once(&self, path: &str, response: ProviderResponse) {
        self.respond_once_at(path, None, response);
    }

    /// One-shot response for the request carrying `cursor`.
    pub fn respond_once_at(&self, path: &str, cursor: Option<&str>, response: ProviderResponse) {
        self.state()
            .once
            .entry(route(HttpMethod::Get, path, cursor))
            .or_default()
            .push_back(response);
    }

    pub fn respond_post(&self, path: &str, response: ProviderResponse) {
        self.state()
            .sticky
            .insert(route(HttpMethod::Post, path, None), response);
    }

    /// Serves one page of a paginated listing. `cursor` is the cursor the
    /// request must carry (`None` for the first page); `next_cursor` is
    /// advertised in the `Link` header when another page follows.
    pub fn respond_page(
        &self,
        path: &str,
        cursor: Option<&str>,
        records: Value,
        next_cursor: Option<&str>,
    ) {
        let response = page_response(path, &records, next_cursor);
        self.state()
            .sticky
            .insert(route(HttpMethod::Get, path, cursor), response);
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.state().requests.clone()
    }

    pub fn request_count(&self, method: HttpMethod, path: &str) -> usize {
        let url = format!("{MOCK_BASE_URL}{path}");
        self.state()
            .requests
            .iter()
            .filter(|request| request.method == method && request.url == url)
            .count()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockProviderState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ProviderTransport for MockProvider {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ClientError> {
        let mut state = self.state();
        state.requests.push(request.clone());

        let path = request
            .url
            .strip_prefix(MOCK_BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        let cursor = request.query_value("cursor").map(str::to_string);
        let exact = (request.method, path.clone(), cursor.clone());
        let any_cursor = (request.method, path, None);

        for key in [&exact, &any_cursor] {
            if let Some(queue) = state.once.get_mut(key) {
                if let Some(response) = queue.pop_front() {
                    return Ok(response);
                }
            }
        }
        for key in [&exact, &any_cursor] {
            if let Some(response) = state.sticky.get(key) {
                return Ok(response.clone());
            }
        }

        Ok(ProviderResponse::json(
            404,
            &json!({ "detail": format!("no mock route for {}", request.url) }),
        ))
    }
}

fn route(method: HttpMethod, path: &str, cursor: Option<&str>) -> RouteKey {
    (method, path.to_string(), cursor.map(str::to_string))
}

/// A 200 response carrying `records` and a Sentry-style `Link` header.
pub fn page_response(path: &str, records: &Value, next_cursor: Option<&str>) -> ProviderResponse {
    let url = format!("{MOCK_BASE_URL}{path}");
    let next = match next_cursor {
        Some(cursor) => {
            format!(r#"<{url}?&cursor={cursor}>; rel="next"; results="true"; cursor="{cursor}""#)
        }
        None => format!(r#"<{url}?&cursor=end>; rel="next"; results="false"; cursor="end""#),
    };
    let link = format!(
        r#"<{url}?&cursor=start>; rel="previous"; results="false"; cursor="start", {next}"#
    );
    ProviderResponse::json(200, records).with_header("link", link)
}

pub fn unauthorized() -> ProviderResponse {
    ProviderResponse::json(401, &json!({ "detail": "Invalid token" }))
}

pub fn token_grant(token: &str, refresh_token: &str) -> ProviderResponse {
    ProviderResponse::json(
        201,
        &json!({
            "token": token,
            "refreshToken": refresh_token,
            "expiresAt": "2030-01-01T00:00:00Z",
        }),
    )
}
