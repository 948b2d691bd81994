mod logging;

use clap::{ArgAction, Parser, Subcommand};
use sentry_graph_ingest::constants::{entity_metadata, relationship_metadata};
use sentry_graph_ingest::steps::sentry_steps;
use sentry_graph_ingest::{
    AuthMode, IngestConfig, IngestDriver, IngestReport, PipelineEvent, ReconciliationEvent,
    RunStatus, RuntimeEvent, RuntimeEventKind, RuntimeEventSink, Severity, StepEvent, StepGraph,
    runtime_event_channel,
};
use sentry_graph_store::CollectedGraph;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "sentry-graph-cli")]
#[command(about = "Collects Sentry organizations, teams, projects and members into a graph")]
struct Cli {
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Run(RunArgs),
    Plan(PlanArgs),
    CheckConfig(CheckConfigArgs),
}

/// Flags that override the matching environment variables.
#[derive(clap::Args, Debug)]
struct ConnectionArgs {
    #[arg(long)]
    auth_token: Option<String>,
    #[arg(long)]
    organization_slug: Option<String>,
    #[arg(long)]
    client_id: Option<String>,
    #[arg(long)]
    client_secret: Option<String>,
    #[arg(long)]
    install_code: Option<String>,
    #[arg(long)]
    install_id: Option<String>,
    #[arg(long)]
    refresh_token: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
    #[arg(long)]
    run_id: Option<String>,
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long = "no-stream-events", action = ArgAction::SetTrue)]
    no_stream_events: bool,
    #[arg(long, action = ArgAction::SetTrue)]
    event_json: bool,
}

#[derive(clap::Args, Debug)]
struct PlanArgs {
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(clap::Args, Debug)]
struct CheckConfigArgs {
    #[command(flatten)]
    connection: ConnectionArgs,
}

/// Where run progress goes. When the graph is printed to stdout, everything
/// else moves to stderr.
#[derive(Clone, Copy, Debug)]
enum Console {
    Stdout,
    Stderr,
}

impl Console {
    fn line(self, text: &str) {
        match self {
            Self::Stdout => println!("{text}"),
            Self::Stderr => eprintln!("{text}"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
    logging::init(&cli.log_level);

    let result = match cli.command {
        Commands::Run(args) => run_command(args).await,
        Commands::Plan(args) => plan_command(args),
        Commands::CheckConfig(args) => check_config_command(args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

async fn run_command(args: RunArgs) -> Result<ExitCode, String> {
    let config = args.connection.into_config();
    tracing::debug!(?config, "resolved configuration");
    let console = if args.output.is_some() {
        Console::Stdout
    } else {
        Console::Stderr
    };

    let (event_sink, event_task) = event_stream(!args.no_stream_events, args.event_json, console);

    let mut driver = IngestDriver::new(config).with_events(event_sink);
    if let Some(run_id) = args.run_id {
        driver = driver.with_run_id(run_id);
    }
    let result = driver.run().await;
    drop(driver);

    if let Some(task) = event_task {
        task.await.map_err(|error| error.to_string())?;
    }

    let report = result.map_err(|error| error.to_string())?;
    write_graph(&report.graph, args.output.as_deref())?;
    print_run_summary(&report, console);
    Ok(exit_code_for_status(report.run.status))
}

fn plan_command(args: PlanArgs) -> Result<ExitCode, String> {
    let graph = StepGraph::new(sentry_steps()).map_err(|error| error.to_string())?;

    if args.json {
        let steps: Vec<_> = graph
            .execution_order()
            .map(|step| {
                json!({
                    "id": step.id,
                    "name": step.name,
                    "depends_on": step.depends_on,
                    "entity_types": step
                        .entity_types
                        .iter()
                        .map(|type_name| entity_type_json(type_name))
                        .collect::<Vec<_>>(),
                    "relationship_types": step
                        .relationship_types
                        .iter()
                        .map(|type_name| relationship_type_json(type_name))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        let rendered = serde_json::to_string_pretty(&steps).map_err(|e| e.to_string())?;
        println!("{rendered}");
        return Ok(ExitCode::SUCCESS);
    }

    for (index, step) in graph.execution_order().enumerate() {
        println!("{}. {} ({})", index + 1, step.id, step.name);
        if !step.depends_on.is_empty() {
            println!("   depends_on: {}", step.depends_on.join(", "));
        }
        if !step.entity_types.is_empty() {
            println!("   entities: {}", step.entity_types.join(", "));
        }
        if !step.relationship_types.is_empty() {
            println!("   relationships: {}", step.relationship_types.join(", "));
        }
    }
    for diagnostic in graph.diagnostics() {
        if diagnostic.severity != Severity::Info {
            println!("warning: [{}] {}", diagnostic.rule, diagnostic.message);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn entity_type_json(type_name: &str) -> Value {
    match entity_metadata(type_name) {
        Some(metadata) => json!({
            "type": metadata.entity_type,
            "resource_name": metadata.resource_name,
            "class": metadata.class,
        }),
        None => json!({ "type": type_name }),
    }
}

fn relationship_type_json(type_name: &str) -> Value {
    match relationship_metadata(type_name) {
        Some(metadata) => json!({
            "type": metadata.relationship_type,
            "class": metadata.class.as_str(),
            "source_type": metadata.source_type,
            "target_type": metadata.target_type,
        }),
        None => json!({ "type": type_name }),
    }
}

fn check_config_command(args: CheckConfigArgs) -> Result<ExitCode, String> {
    let config = args.connection.into_config();
    let mode = config.auth_mode().map_err(|error| error.to_string())?;

    match mode {
        AuthMode::StaticToken { .. } => println!("auth_mode: static_token"),
        AuthMode::Installation {
            installation,
            token,
            install_code,
            ..
        } => {
            println!("auth_mode: installation");
            println!("install_id: {}", installation.install_id);
            let grant = match (token.is_some(), install_code.is_some()) {
                (true, _) => "existing_token",
                (false, true) => "authorization_code",
                (false, false) => "refresh_token",
            };
            println!("grant: {grant}");
        }
    }
    println!(
        "organization_slug: {}",
        config
            .organization_slug
            .as_deref()
            .unwrap_or("<all visible>")
    );
    println!("base_url: {}", config.base_url());
    Ok(ExitCode::SUCCESS)
}

impl ConnectionArgs {
    fn into_config(self) -> IngestConfig {
        let env = IngestConfig::from_env();
        IngestConfig {
            auth_token: self.auth_token.or(env.auth_token),
            organization_slug: self.organization_slug.or(env.organization_slug),
            client_id: self.client_id.or(env.client_id),
            client_secret: self.client_secret.or(env.client_secret),
            install_code: self.install_code.or(env.install_code),
            install_id: self.install_id.or(env.install_id),
            refresh_token: self.refresh_token.or(env.refresh_token),
            base_url: self.base_url.or(env.base_url),
        }
        .normalized()
    }
}

fn event_stream(
    stream_events: bool,
    event_json: bool,
    console: Console,
) -> (RuntimeEventSink, Option<tokio::task::JoinHandle<()>>) {
    if !stream_events {
        return (RuntimeEventSink::default(), None);
    }

    let (tx, mut rx) = runtime_event_channel();
    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event_json {
                match serde_json::to_string(&event) {
                    Ok(line) => console.line(&line),
                    Err(_) => print_event_text(&event, console),
                }
            } else {
                print_event_text(&event, console);
            }
        }
    });
    (RuntimeEventSink::with_sender(tx), Some(task))
}

fn print_event_text(event: &RuntimeEvent, console: Console) {
    console.line(&format!(
        "[event seq={}] {} {} {}",
        event.sequence_no,
        event.timestamp,
        event_kind_label(&event.kind),
        event_detail(&event.kind)
    ));
}

fn event_kind_label(kind: &RuntimeEventKind) -> &'static str {
    match kind {
        RuntimeEventKind::Pipeline(_) => "pipeline",
        RuntimeEventKind::Step(_) => "step",
        RuntimeEventKind::Reconciliation(_) => "reconciliation",
    }
}

fn event_detail(kind: &RuntimeEventKind) -> String {
    match kind {
        RuntimeEventKind::Pipeline(PipelineEvent::Started { step_order, .. }) => {
            format!("started order={}", step_order.join(","))
        }
        RuntimeEventKind::Pipeline(PipelineEvent::Completed {
            entity_count,
            relationship_count,
            ..
        }) => format!("completed entities={entity_count} relationships={relationship_count}"),
        RuntimeEventKind::Pipeline(PipelineEvent::Failed { reason, .. }) => {
            format!("failed {reason}")
        }
        RuntimeEventKind::Step(StepEvent::Started { step_id, .. }) => {
            format!("started {step_id}")
        }
        RuntimeEventKind::Step(StepEvent::Completed {
            step_id,
            entities_added,
            relationships_added,
            duration_ms,
            ..
        }) => format!(
            "completed {step_id} entities={entities_added} relationships={relationships_added} \
             duration_ms={duration_ms}"
        ),
        RuntimeEventKind::Step(StepEvent::Failed { step_id, reason, .. }) => {
            format!("failed {step_id} {reason}")
        }
        RuntimeEventKind::Step(StepEvent::Skipped {
            step_id,
            blocked_by,
            ..
        }) => format!("skipped {step_id} blocked_by={blocked_by}"),
        RuntimeEventKind::Step(StepEvent::UndeclaredType {
            step_id, type_name, ..
        }) => format!("undeclared_type {step_id} {type_name}"),
        RuntimeEventKind::Reconciliation(ReconciliationEvent::CrossReferenceSkipped {
            relationship_type,
            missing_key,
            ..
        }) => format!("cross_reference_skipped {relationship_type} missing={missing_key}"),
        RuntimeEventKind::Reconciliation(ReconciliationEvent::DanglingRelationship {
            relationship_type,
            missing_keys,
            ..
        }) => format!(
            "dangling {relationship_type} missing={}",
            missing_keys.join(",")
        ),
    }
}

fn write_graph(graph: &CollectedGraph, output: Option<&Path>) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(graph).map_err(|e| e.to_string())?;
    match output {
        Some(path) => std::fs::write(path, rendered)
            .map_err(|e| format!("failed writing graph to '{}': {e}", path.display())),
        None => {
            println!("{rendered}");
            Ok(())
        }
    }
}

fn print_run_summary(report: &IngestReport, console: Console) {
    let run = &report.run;
    console.line(&format!("run_id: {}", run.run_id));
    console.line(&format!(
        "status: {}",
        match run.status {
            RunStatus::Success => "success",
            RunStatus::Fail => "fail",
        }
    ));
    console.line(&format!("completed_steps: {}", run.completed_steps.join(", ")));
    if !run.skipped_steps.is_empty() {
        console.line(&format!("skipped_steps: {}", run.skipped_steps.join(", ")));
    }
    console.line(&format!(
        "collected: entities={} relationships={}",
        report.graph.entities.len(),
        report.graph.relationships.len()
    ));
    if !run.dangling.is_empty() {
        console.line(&format!("dangling_relationships: {}", run.dangling.len()));
    }
    if let Some(reason) = run.failure_reason() {
        console.line(&format!("failure_reason: {reason}"));
    }
}

fn exit_code_for_status(status: RunStatus) -> ExitCode {
    match status {
        RunStatus::Success => ExitCode::SUCCESS,
        RunStatus::Fail => ExitCode::from(2),
    }
}
