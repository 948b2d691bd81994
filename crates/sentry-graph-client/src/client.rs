use crate::auth::{AuthGrant, Credential, Installation, TokenGrant};
use crate::errors::{ClientError, map_http_status};
use crate::one_or_many::OneOrMany;
use crate::pagination::{PageSignal, page_signal};
use crate::transport::{ProviderRequest, ProviderResponse, SharedTransport};
use crate::types::{
    SentryMember, SentryOrganization, SentryProject, SentryTeam, SourceRecord, decode_record,
};
use futures::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::marker::PhantomData;
use tokio::sync::RwLock;

pub const DEFAULT_SENTRY_BASE_URL: &str = "https://sentry.io/api/0/";

/// Authenticated access to the Sentry REST API.
///
/// Each instance owns its credential, so clients for different organizations
/// or tokens never share auth state.
pub struct SentryClient {
    transport: SharedTransport,
    base_url: String,
    credential: RwLock<Credential>,
    installation: Option<Installation>,
}

impl SentryClient {
    pub fn new(
        transport: SharedTransport,
        base_url: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            credential: RwLock::new(credential),
            installation: None,
        }
    }

    /// Enables the token exchange and refresh-on-401 behavior.
    pub fn with_installation(mut self, installation: Installation) -> Self {
        self.installation = Some(installation);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn supports_refresh(&self) -> bool {
        self.installation.is_some()
    }

    pub async fn credential(&self) -> Credential {
        self.credential.read().await.clone()
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Exchanges an install code or refresh token for a new token pair and
    /// swaps it into this client.
    pub async fn authorize(&self, grant: AuthGrant) -> Result<(), ClientError> {
        let installation = self.installation.as_ref().ok_or_else(|| {
            ClientError::InvalidRequest(
                "token exchange requires installation credentials".to_string(),
            )
        })?;
        let url = self.endpoint(&installation.authorizations_path());
        tracing::debug!(grant_type = grant.grant_type(), "requesting installation token");

        let response = self
            .transport
            .send(ProviderRequest::post_json(
                url.clone(),
                installation.authorization_body(&grant),
            ))
            .await?;
        if !response.is_success() {
            return Err(ClientError::Authentication {
                endpoint: url,
                message: format!(
                    "{} grant rejected with status {}: {}",
                    grant.grant_type(),
                    response.status,
                    response.body
                ),
            });
        }

        let issued: TokenGrant =
            serde_json::from_str(&response.body).map_err(|err| ClientError::Decode {
                endpoint: url.clone(),
                message: format!("token grant decode failed: {err}"),
            })?;

        let mut credential = self.credential.write().await;
        credential.token = Some(issued.token);
        if let Some(refresh_token) = issued.refresh_token {
            credential.refresh_token = Some(refresh_token);
        }
        Ok(())
    }

    pub async fn refresh_credential(&self) -> Result<(), ClientError> {
        let refresh_token = self.credential.read().await.refresh_token.clone();
        let Some(refresh_token) = refresh_token else {
            return Err(ClientError::Authentication {
                endpoint: self.base_url.clone(),
                message: "credential expired and no refresh token is available".to_string(),
            });
        };
        self.authorize(AuthGrant::RefreshToken(refresh_token)).await
    }

    /// Authenticated call against the API root; any non-success answer means the
    /// credential is unusable.
    pub async fn verify_authentication(&self) -> Result<(), ClientError> {
        match self.get("", Vec::new()).await {
            Ok(_) => Ok(()),
            Err(ClientError::Http {
                endpoint,
                status,
                body,
            }) => Err(ClientError::Authentication {
                endpoint,
                message: format!("authentication check failed with status {status}: {body}"),
            }),
            Err(ClientError::TransientHttp {
                endpoint,
                status: Some(status),
                message,
            }) => Err(ClientError::Authentication {
                endpoint,
                message: format!("authentication check failed with status {status}: {message}"),
            }),
            Err(error) => Err(error),
        }
    }

    /// Authenticated GET. A 401 triggers at most one credential refresh and
    /// one retry of the same request.
    pub async fn get(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<ProviderResponse, ClientError> {
        let url = self.endpoint(path);
        let response = self.send_get(&url, &query).await?;
        if response.status != 401 {
            return check_status(response, &url);
        }
        if !self.supports_refresh() {
            return Err(map_http_status(response.status, &url, response.body));
        }

        tracing::warn!(endpoint = %url, "bearer token rejected; refreshing credential");
        self.refresh_credential().await?;

        let retried = self.send_get(&url, &query).await?;
        if retried.status == 401 {
            return Err(ClientError::Authentication {
                endpoint: url,
                message: format!("credential rejected again after refresh: {}", retried.body),
            });
        }
        check_status(retried, &url)
    }

    async fn send_get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<ProviderResponse, ClientError> {
        let bearer_token = self.credential.read().await.token.clone();
        let request = ProviderRequest {
            query: query.to_vec(),
            bearer_token,
            ..ProviderRequest::get(url)
        };
        self.transport.send(request).await
    }

    pub fn paginate<T: DeserializeOwned>(&self, path: impl Into<String>) -> ResourcePages<'_, T> {
        ResourcePages::new(self, path.into())
    }

    /// Organizations visible to the credential. With a slug, only that
    /// organization's detail record is fetched.
    pub fn organizations(&self, slug: Option<&str>) -> ResourcePages<'_, SentryOrganization> {
        match slug {
            Some(slug) => self.paginate(format!("organizations/{slug}/")),
            None => self.paginate("organizations/"),
        }
    }

    pub fn teams(&self, organization_slug: &str) -> ResourcePages<'_, SentryTeam> {
        self.paginate(format!("organizations/{organization_slug}/teams/"))
    }

    pub fn projects(&self, organization_slug: &str) -> ResourcePages<'_, SentryProject> {
        self.paginate(format!("organizations/{organization_slug}/projects/"))
    }

    pub fn members(&self, organization_slug: &str) -> ResourcePages<'_, SentryMember> {
        self.paginate(format!("organizations/{organization_slug}/members/"))
    }

    pub fn users(&self, organization_slug: &str) -> ResourcePages<'_, SentryMember> {
        self.paginate(format!("organizations/{organization_slug}/users/"))
    }

    pub fn team_members(
        &self,
        organization_slug: &str,
        team_slug: &str,
    ) -> ResourcePages<'_, SentryMember> {
        self.paginate(format!("teams/{organization_slug}/{team_slug}/members/"))
    }
}

fn check_status(response: ProviderResponse, url: &str) -> Result<ProviderResponse, ClientError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(map_http_status(response.status, url, response.body))
    }
}

/// Lazy record sequence over one paginated endpoint.
///
/// Pages are fetched on demand and the sequence ends once the provider stops
/// signalling more results. Calling the endpoint method again starts a new
/// scan from the first page.
pub struct ResourcePages<'a, T> {
    client: &'a SentryClient,
    path: String,
    next_cursor: Option<String>,
    seen_cursors: BTreeSet<String>,
    buffer: VecDeque<Value>,
    exhausted: bool,
    pages_fetched: usize,
    _record: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> ResourcePages<'a, T> {
    fn new(client: &'a SentryClient, path: String) -> Self {
        Self {
            client,
            path,
            next_cursor: None,
            seen_cursors: BTreeSet::new(),
            buffer: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub async fn next_record(&mut self) -> Result<Option<SourceRecord<T>>, ClientError> {
        loop {
            if let Some(raw) = self.buffer.pop_front() {
                return decode_record(&self.path, raw).map(Some);
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    pub async fn collect_all(mut self) -> Result<Vec<SourceRecord<T>>, ClientError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record().await? {
            records.push(record);
        }
        Ok(records)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<SourceRecord<T>, ClientError>> + 'a
    where
        T: 'a,
    {
        futures::stream::try_unfold(self, |mut pages| async move {
            let next = pages.next_record().await?;
            Ok::<_, ClientError>(next.map(|record| (record, pages)))
        })
    }

    async fn fetch_page(&mut self) -> Result<(), ClientError> {
        let query = self
            .next_cursor
            .as_ref()
            .map(|cursor| vec![("cursor".to_string(), cursor.clone())])
            .unwrap_or_default();
        let response = self.client.get(&self.path, query).await?;

        let records: OneOrMany<Value> =
            serde_json::from_str(&response.body).map_err(|err| ClientError::Decode {
                endpoint: self.path.clone(),
                message: format!("page decode failed: {err}"),
            })?;
        self.pages_fetched += 1;
        tracing::debug!(
            endpoint = %self.path,
            page = self.pages_fetched,
            records = records.len(),
            "fetched provider page"
        );
        self.buffer.extend(records);

        match page_signal(&response) {
            PageSignal::More { cursor } => {
                if !self.seen_cursors.insert(cursor.clone()) {
                    return Err(ClientError::Decode {
                        endpoint: self.path.clone(),
                        message: format!("pagination cursor '{cursor}' repeated"),
                    });
                }
                self.next_cursor = Some(cursor);
            }
            PageSignal::Exhausted => {
                self.next_cursor = None;
                self.exhausted = true;
            }
            PageSignal::MissingCursor => {
                return Err(ClientError::Decode {
                    endpoint: self.path.clone(),
                    message: "next page advertised without a cursor".to_string(),
                });
            }
        }
        Ok(())
    }
}
