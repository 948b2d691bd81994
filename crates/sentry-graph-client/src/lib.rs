#![doc = r#"
Sentry REST API access for the ingestion pipeline.

| Client method | Endpoint |
| --- | --- |
| `SentryClient::verify_authentication` | `GET /api/0/` |
| `SentryClient::organizations(None)` | `GET /api/0/organizations/` |
| `SentryClient::organizations(Some(slug))` | `GET /api/0/organizations/{slug}/` |
| `SentryClient::teams` | `GET /api/0/organizations/{slug}/teams/` |
| `SentryClient::projects` | `GET /api/0/organizations/{slug}/projects/` |
| `SentryClient::members` | `GET /api/0/organizations/{slug}/members/` |
| `SentryClient::users` | `GET /api/0/organizations/{slug}/users/` |
| `SentryClient::team_members` | `GET /api/0/teams/{org}/{team}/members/` |
| `SentryClient::authorize` | `POST /api/0/sentry-app-installations/{id}/authorizations/` |

Notes:
- List endpoints are consumed through `ResourcePages`, which follows the `Link` header cursor until `results="false"`.
- Every page body is decoded as `OneOrMany`, so the organization detail object and list arrays look the same to callers.
- A 401 triggers one refresh through the installation flow (when configured) and one retry of the failed page.
"#]

pub mod auth;
pub mod client;
pub mod errors;
pub mod one_or_many;
pub mod pagination;
pub mod testing;
pub mod transport;
pub mod types;

pub use auth::{AuthGrant, Credential, Installation, TokenGrant};
pub use client::{DEFAULT_SENTRY_BASE_URL, ResourcePages, SentryClient};
pub use errors::ClientError;
pub use one_or_many::OneOrMany;
pub use pagination::{LinkEntry, PageSignal, page_signal, parse_link_header};
pub use testing::MockProvider;
pub use transport::{
    HttpMethod, ProviderRequest, ProviderResponse, ProviderTransport, ReqwestTransport,
    RetryBackoffConfig, SharedTransport, delay_for_attempt_ms,
};
pub use types::{
    SentryMember, SentryOrganization, SentryProject, SentryProjectRef, SentryTeam, SourceRecord,
    decode_record,
};
