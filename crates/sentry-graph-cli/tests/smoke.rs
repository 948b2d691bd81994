use serde_json::{Value, json};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREDENTIAL_VARS: [&str; 10] = [
    "AUTH_TOKEN",
    "CLIENT_TOKEN",
    "ORGANIZATION_SLUG",
    "CLIENT_ID",
    "CLIENT_SECRET",
    "INSTALL_CODE",
    "INSTALL_ID",
    "REFRESH_TOKEN",
    "SENTRY_BASE_URL",
    "RUST_LOG",
];

fn run_cli(args: &[&str], cwd: &Path) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sentry-graph-cli"));
    for name in CREDENTIAL_VARS {
        command.env_remove(name);
    }
    command
        .args(args)
        .arg("--log-level")
        .arg("error")
        .current_dir(cwd)
        .output()
        .expect("cli should execute")
}

async fn run_cli_async(args: Vec<String>, cwd: &Path) -> Output {
    let cwd = cwd.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_cli(&args, &cwd)
    })
    .await
    .expect("cli task should join")
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn acme_server(members_ok: bool) -> MockServer {
    let server = MockServer::start().await;
    mount_json(&server, "/api/0/", json!({"version": "0"})).await;
    mount_json(
        &server,
        "/api/0/organizations/acme/",
        json!({"id": "1", "slug": "acme", "name": "Acme"}),
    )
    .await;
    mount_json(
        &server,
        "/api/0/organizations/acme/projects/",
        json!([{"id": "100", "slug": "web", "name": "Web"}]),
    )
    .await;
    mount_json(
        &server,
        "/api/0/organizations/acme/teams/",
        json!([{
            "id": "10",
            "slug": "core",
            "name": "Core",
            "projects": [{"id": "100", "slug": "web"}]
        }]),
    )
    .await;
    if members_ok {
        mount_json(
            &server,
            "/api/0/organizations/acme/members/",
            json!([{"id": "1000", "email": "dev@acme.io", "name": "Dev"}]),
        )
        .await;
    }
    mount_json(
        &server,
        "/api/0/teams/acme/core/members/",
        json!([{"id": "1000", "email": "dev@acme.io"}]),
    )
    .await;
    server
}

fn output_text(output: &Output) -> (String, String) {
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

#[test]
fn plan_command_json_expected_dependency_order() {
    let temp = TempDir::new().expect("temp dir should create");
    let output = run_cli(&["plan", "--json"], temp.path());
    let (stdout, stderr) = output_text(&output);
    assert!(output.status.success(), "stdout:\n{stdout}\nstderr:\n{stderr}");

    let plan: Value = serde_json::from_str(&stdout).expect("plan should be json");
    let ids: Vec<&str> = plan
        .as_array()
        .expect("plan should be an array")
        .iter()
        .filter_map(|step| step["id"].as_str())
        .collect();
    assert_eq!(
        ids,
        vec![
            "fetch-organizations",
            "fetch-projects",
            "fetch-teams",
            "fetch-members",
            "fetch-team-members",
        ]
    );

    let team_members = &plan[4];
    let has_member = &team_members["relationship_types"][0];
    assert_eq!(has_member["type"], "sentry_team_has_member");
    assert_eq!(has_member["class"], "HAS");
    assert_eq!(has_member["source_type"], "sentry_team");
    assert_eq!(has_member["target_type"], "sentry_member");
    assert_eq!(plan[0]["entity_types"][0]["resource_name"], "Organization");
    assert_eq!(plan[0]["entity_types"][0]["class"], "Account");
}

#[test]
fn run_command_without_credentials_expected_configuration_error() {
    let temp = TempDir::new().expect("temp dir should create");
    let output = run_cli(&["run", "--no-stream-events"], temp.path());
    let (stdout, stderr) = output_text(&output);

    assert_eq!(output.status.code(), Some(1), "stdout:\n{stdout}\nstderr:\n{stderr}");
    assert!(stderr.contains("error: no credentials configured"), "{stderr}");
    assert!(stdout.is_empty(), "{stdout}");
}

#[test]
fn check_config_installation_flags_expected_authorization_code_grant() {
    let temp = TempDir::new().expect("temp dir should create");
    let output = run_cli(
        &[
            "check-config",
            "--client-id",
            "cid",
            "--client-secret",
            "secret",
            "--install-id",
            "inst-1",
            "--install-code",
            "code-1",
        ],
        temp.path(),
    );
    let (stdout, stderr) = output_text(&output);

    assert!(output.status.success(), "stdout:\n{stdout}\nstderr:\n{stderr}");
    assert!(stdout.contains("auth_mode: installation"));
    assert!(stdout.contains("install_id: inst-1"));
    assert!(stdout.contains("grant: authorization_code"));
    assert!(stdout.contains("organization_slug: <all visible>"));
    assert!(!stdout.contains("secret"));
}

#[test]
fn check_config_env_file_expected_values_loaded() {
    let temp = TempDir::new().expect("temp dir should create");
    std::fs::write(
        temp.path().join(".env"),
        "AUTH_TOKEN=from-file\nORGANIZATION_SLUG=acme\n",
    )
    .expect("env file write should succeed");

    let output = run_cli(&["check-config"], temp.path());
    let (stdout, stderr) = output_text(&output);

    assert!(output.status.success(), "stdout:\n{stdout}\nstderr:\n{stderr}");
    assert!(stdout.contains("auth_mode: static_token"));
    assert!(stdout.contains("organization_slug: acme"));
}

#[tokio::test(flavor = "current_thread")]
async fn run_command_acme_server_expected_graph_file_and_summary() {
    let server = acme_server(true).await;
    let temp = TempDir::new().expect("temp dir should create");
    let graph_path = temp.path().join("graph.json");

    let output = run_cli_async(
        vec![
            "run".to_string(),
            "--auth-token".to_string(),
            "tok".to_string(),
            "--organization-slug".to_string(),
            "acme".to_string(),
            "--base-url".to_string(),
            format!("{}/api/0/", server.uri()),
            "--run-id".to_string(),
            "smoke-run".to_string(),
            "--output".to_string(),
            graph_path.display().to_string(),
            "--event-json".to_string(),
        ],
        temp.path(),
    )
    .await;
    let (stdout, stderr) = output_text(&output);

    assert!(output.status.success(), "stdout:\n{stdout}\nstderr:\n{stderr}");
    assert!(stdout.contains("\"category\":\"pipeline\""));
    assert!(stdout.contains("\"category\":\"step\""));
    assert!(stdout.contains("run_id: smoke-run"));
    assert!(stdout.contains("status: success"));
    assert!(stdout.contains("collected: entities=4 relationships=5"));

    let graph: Value = serde_json::from_str(
        &std::fs::read_to_string(&graph_path).expect("graph file should exist"),
    )
    .expect("graph should be json");
    assert_eq!(graph["entities"].as_array().map(Vec::len), Some(4));
    assert_eq!(graph["relationships"].as_array().map(Vec::len), Some(5));
}

#[tokio::test(flavor = "current_thread")]
async fn run_command_members_missing_expected_exit_two_and_graph_on_stdout() {
    let server = acme_server(false).await;
    let temp = TempDir::new().expect("temp dir should create");

    let output = run_cli_async(
        vec![
            "run".to_string(),
            "--auth-token".to_string(),
            "tok".to_string(),
            "--organization-slug".to_string(),
            "acme".to_string(),
            "--base-url".to_string(),
            format!("{}/api/0/", server.uri()),
            "--no-stream-events".to_string(),
        ],
        temp.path(),
    )
    .await;
    let (stdout, stderr) = output_text(&output);

    assert_eq!(output.status.code(), Some(2), "stdout:\n{stdout}\nstderr:\n{stderr}");
    assert!(stderr.contains("status: fail"));
    assert!(stderr.contains("skipped_steps: fetch-team-members"));
    assert!(stderr.contains("failure_reason: step 'fetch-members' failed"));

    let graph: Value = serde_json::from_str(&stdout).expect("partial graph should be json");
    assert_eq!(graph["entities"].as_array().map(Vec::len), Some(3));
}
