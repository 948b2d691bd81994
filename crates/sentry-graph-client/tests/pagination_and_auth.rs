use futures::TryStreamExt;
use sentry_graph_client::testing::{MOCK_BASE_URL, token_grant, unauthorized};
use sentry_graph_client::{
    AuthGrant, ClientError, Credential, HttpMethod, Installation, MockProvider, ProviderResponse,
    SentryClient, SentryTeam,
};
use serde_json::json;
use std::sync::Arc;

const TEAMS: &str = "organizations/acme/teams/";
const AUTHORIZATIONS: &str = "sentry-app-installations/inst-1/authorizations/";

fn installation() -> Installation {
    Installation {
        install_id: "inst-1".to_string(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
    }
}

fn oauth_client(mock: &MockProvider) -> SentryClient {
    SentryClient::new(
        Arc::new(mock.clone()),
        MOCK_BASE_URL,
        Credential::bearer("stale-token").with_refresh_token("refresh-1"),
    )
    .with_installation(installation())
}

fn team(id: &str) -> serde_json::Value {
    json!({ "id": id, "slug": format!("team-{id}"), "name": format!("Team {id}") })
}

fn bearer_tokens_for(mock: &MockProvider, path: &str) -> Vec<Option<String>> {
    let url = format!("{MOCK_BASE_URL}{path}");
    mock.requests()
        .into_iter()
        .filter(|request| request.url == url)
        .map(|request| request.bearer_token)
        .collect()
}

#[tokio::test(flavor = "current_thread")]
async fn teams_three_pages_expected_concatenation_each_record_once() {
    let mock = MockProvider::new();
    mock.respond_page(TEAMS, None, json!([team("1"), team("2")]), Some("0:2:0"));
    mock.respond_page(TEAMS, Some("0:2:0"), json!([team("3"), team("4")]), Some("0:4:0"));
    mock.respond_page(TEAMS, Some("0:4:0"), json!([team("5")]), None);
    let client = mock.client("token");

    let mut pages = client.teams("acme");
    let mut ids = Vec::new();
    while let Some(record) = pages.next_record().await.expect("page fetch should succeed") {
        ids.push(record.data.id);
    }

    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(pages.pages_fetched(), 3);
    let cursors: Vec<Option<String>> = mock
        .requests()
        .iter()
        .map(|request| request.query_value("cursor").map(str::to_string))
        .collect();
    assert_eq!(
        cursors,
        vec![None, Some("0:2:0".to_string()), Some("0:4:0".to_string())]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn teams_restarted_scan_expected_fetch_from_first_page() {
    let mock = MockProvider::new();
    mock.respond_page(TEAMS, None, json!([team("1")]), Some("next"));
    mock.respond_page(TEAMS, Some("next"), json!([team("2")]), None);
    let client = mock.client("token");

    let first = client.teams("acme").collect_all().await.expect("first scan");
    let second = client.teams("acme").collect_all().await.expect("second scan");

    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
    assert_eq!(mock.request_count(HttpMethod::Get, TEAMS), 4);
}

#[tokio::test(flavor = "current_thread")]
async fn teams_into_stream_expected_same_records_as_collect() {
    let mock = MockProvider::new();
    mock.respond_page(TEAMS, None, json!([team("1")]), Some("c1"));
    mock.respond_page(TEAMS, Some("c1"), json!([team("2")]), None);
    let client = mock.client("token");

    let streamed: Vec<SentryTeam> = client
        .teams("acme")
        .into_stream()
        .map_ok(|record| record.data)
        .try_collect()
        .await
        .expect("stream should complete");

    let slugs: Vec<&str> = streamed.iter().map(|team| team.slug.as_str()).collect();
    assert_eq!(slugs, vec!["team-1", "team-2"]);
}

#[tokio::test(flavor = "current_thread")]
async fn teams_repeated_cursor_expected_decode_error_instead_of_loop() {
    let mock = MockProvider::new();
    mock.respond_page(TEAMS, None, json!([team("1")]), Some("loop"));
    mock.respond_page(TEAMS, Some("loop"), json!([team("2")]), Some("loop"));
    let client = mock.client("token");

    let error = client
        .teams("acme")
        .collect_all()
        .await
        .expect_err("repeated cursor should fail");

    assert!(matches!(error, ClientError::Decode { .. }));
}

#[tokio::test(flavor = "current_thread")]
async fn teams_more_results_without_cursor_expected_decode_error() {
    let mock = MockProvider::new();
    let link = format!(r#"<{MOCK_BASE_URL}{TEAMS}>; rel="next"; results="true""#);
    mock.respond(
        TEAMS,
        ProviderResponse::json(200, &json!([team("1")])).with_header("link", link),
    );
    let client = mock.client("token");

    let error = client
        .teams("acme")
        .collect_all()
        .await
        .expect_err("next link without cursor should fail");

    assert!(matches!(error, ClientError::Decode { .. }));
    assert_eq!(mock.request_count(HttpMethod::Get, TEAMS), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn users_two_pages_expected_members_from_users_endpoint() {
    let mock = MockProvider::new();
    let users = "organizations/acme/users/";
    mock.respond_page(
        users,
        None,
        json!([{ "id": "1000", "email": "dev@acme.io", "name": "Dev" }]),
        Some("u2"),
    );
    mock.respond_page(
        users,
        Some("u2"),
        json!([{ "id": "1001", "email": "ops@acme.io" }]),
        None,
    );
    let client = mock.client("token");

    let records = client
        .users("acme")
        .collect_all()
        .await
        .expect("users listing should succeed");

    let emails: Vec<Option<&str>> = records
        .iter()
        .map(|record| record.data.email.as_deref())
        .collect();
    assert_eq!(emails, vec![Some("dev@acme.io"), Some("ops@acme.io")]);
    assert_eq!(mock.request_count(HttpMethod::Get, users), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn organizations_with_slug_single_object_expected_one_record() {
    let mock = MockProvider::new();
    mock.respond_json(
        "organizations/acme/",
        json!({ "id": "1", "slug": "acme", "name": "Acme" }),
    );
    mock.respond_json(
        "organizations/",
        json!([{ "id": "1", "slug": "acme" }, { "id": "2", "slug": "globex" }]),
    );
    let client = mock.client("token");

    let scoped = client
        .organizations(Some("acme"))
        .collect_all()
        .await
        .expect("detail fetch should succeed");
    let unscoped = client
        .organizations(None)
        .collect_all()
        .await
        .expect("listing should succeed");

    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].data.name.as_deref(), Some("Acme"));
    assert_eq!(unscoped.len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn get_unauthorized_then_success_expected_single_refresh_and_retry() {
    let mock = MockProvider::new();
    mock.respond_once(TEAMS, unauthorized());
    mock.respond_page(TEAMS, None, json!([team("1")]), None);
    mock.respond_post(AUTHORIZATIONS, token_grant("fresh-token", "refresh-2"));
    let client = oauth_client(&mock);

    let records = client
        .teams("acme")
        .collect_all()
        .await
        .expect("request should succeed after refresh");

    assert_eq!(records.len(), 1);
    assert_eq!(mock.request_count(HttpMethod::Post, AUTHORIZATIONS), 1);
    assert_eq!(
        bearer_tokens_for(&mock, TEAMS),
        vec![
            Some("stale-token".to_string()),
            Some("fresh-token".to_string())
        ]
    );
    let credential = client.credential().await;
    assert_eq!(credential.refresh_token.as_deref(), Some("refresh-2"));

    let refresh_request = mock
        .requests()
        .into_iter()
        .find(|request| request.method == HttpMethod::Post)
        .expect("refresh request should be recorded");
    let body = refresh_request.json_body.expect("refresh body");
    assert_eq!(body["grant_type"], "refresh_token");
    assert_eq!(body["refresh_token"], "refresh-1");
}

#[tokio::test(flavor = "current_thread")]
async fn teams_unauthorized_on_second_page_expected_refresh_and_same_cursor_retry() {
    let mock = MockProvider::new();
    mock.respond_page(TEAMS, None, json!([team("1")]), Some("c2"));
    mock.respond_once_at(TEAMS, Some("c2"), unauthorized());
    mock.respond_page(TEAMS, Some("c2"), json!([team("2")]), None);
    mock.respond_post(AUTHORIZATIONS, token_grant("fresh-token", "refresh-2"));
    let client = oauth_client(&mock);

    let records = client
        .teams("acme")
        .collect_all()
        .await
        .expect("scan should resume after refresh");

    let ids: Vec<&str> = records.iter().map(|record| record.data.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(mock.request_count(HttpMethod::Post, AUTHORIZATIONS), 1);

    let sequence: Vec<(HttpMethod, Option<String>, Option<String>)> = mock
        .requests()
        .into_iter()
        .map(|request| {
            (
                request.method,
                request.query_value("cursor").map(str::to_string),
                request.bearer_token.clone(),
            )
        })
        .collect();
    assert_eq!(
        sequence,
        vec![
            (HttpMethod::Get, None, Some("stale-token".to_string())),
            (
                HttpMethod::Get,
                Some("c2".to_string()),
                Some("stale-token".to_string())
            ),
            (HttpMethod::Post, None, None),
            (
                HttpMethod::Get,
                Some("c2".to_string()),
                Some("fresh-token".to_string())
            ),
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn get_unauthorized_after_refresh_expected_authentication_error_no_more_retries() {
    let mock = MockProvider::new();
    mock.respond(TEAMS, unauthorized());
    mock.respond_post(AUTHORIZATIONS, token_grant("fresh-token", "refresh-2"));
    let client = oauth_client(&mock);

    let error = client
        .teams("acme")
        .collect_all()
        .await
        .expect_err("second 401 should be fatal");

    assert!(error.is_authentication());
    assert_eq!(mock.request_count(HttpMethod::Get, TEAMS), 2);
    assert_eq!(mock.request_count(HttpMethod::Post, AUTHORIZATIONS), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn get_unauthorized_static_token_expected_authentication_without_refresh() {
    let mock = MockProvider::new();
    mock.respond(TEAMS, unauthorized());
    let client = mock.client("static-token");

    let error = client
        .teams("acme")
        .collect_all()
        .await
        .expect_err("401 should fail");

    assert!(error.is_authentication());
    assert_eq!(mock.request_count(HttpMethod::Get, TEAMS), 1);
    assert_eq!(mock.request_count(HttpMethod::Post, AUTHORIZATIONS), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn get_refresh_rejected_expected_authentication_error() {
    let mock = MockProvider::new();
    mock.respond(TEAMS, unauthorized());
    mock.respond_post(
        AUTHORIZATIONS,
        ProviderResponse::json(400, &json!({ "detail": "invalid grant" })),
    );
    let client = oauth_client(&mock);

    let error = client
        .teams("acme")
        .collect_all()
        .await
        .expect_err("rejected refresh should fail");

    assert!(error.is_authentication());
    assert_eq!(mock.request_count(HttpMethod::Get, TEAMS), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn authorize_install_code_expected_token_installed() {
    let mock = MockProvider::new();
    mock.respond_post(AUTHORIZATIONS, token_grant("issued", "refresh-9"));
    mock.respond_json("", json!({ "version": "0" }));
    let client = SentryClient::new(Arc::new(mock.clone()), MOCK_BASE_URL, Credential::default())
        .with_installation(installation());

    client
        .authorize(AuthGrant::AuthorizationCode("code-1".to_string()))
        .await
        .expect("code exchange should succeed");
    client
        .verify_authentication()
        .await
        .expect("authentication check should succeed");

    assert_eq!(bearer_tokens_for(&mock, ""), vec![Some("issued".to_string())]);
}

#[tokio::test(flavor = "current_thread")]
async fn verify_authentication_forbidden_expected_authentication_error() {
    let mock = MockProvider::new();
    mock.respond("", ProviderResponse::json(403, &json!({ "detail": "forbidden" })));
    let client = mock.client("token");

    let error = client
        .verify_authentication()
        .await
        .expect_err("authentication check should fail");

    assert!(error.is_authentication());
}

#[tokio::test(flavor = "current_thread")]
async fn teams_not_found_expected_http_error_with_status() {
    let mock = MockProvider::new();
    let client = mock.client("token");

    let error = client
        .teams("missing")
        .collect_all()
        .await
        .expect_err("unrouted path should 404");

    assert!(matches!(error, ClientError::Http { status: 404, .. }));
}
