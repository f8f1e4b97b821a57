mod config;
mod definitions;
mod registry;
mod stores;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use config::{ConfigError, Settings, load_settings};
use definitions::{
    DefinitionError, IssueSeverity, ValidationIssue, definition_json_schema, load_definitions,
};
use registry::{RegistryError, RunContext, RunOptions, init_logging, start_run, write_result};
use serde::Serialize;
use stores::{Engine, connect, preview_store};
use tablesmith_core::{
    DEFINITION_VERSION, DependencyGraphReport, Error as CoreError, Schema,
    build_dependency_report, redact_connection_string,
};
use tablesmith_materialize::{MaterializationResult, PendingSet, ProcessError};
use tablesmith_store::Store;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("definition error: {0}")]
    Definitions(#[from] DefinitionError),
    #[error("store error: {0}")]
    Core(#[from] CoreError),
    #[error("materialization failed: {0}")]
    Process(#[from] ProcessError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
    #[error("{0} model(s) still pending")]
    Unsettled(usize),
}

#[derive(Parser, Debug)]
#[command(name = "tablesmith", version, about = "Create tables from schema definitions in dependency order")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create pending tables in the target store.
    Apply(ApplyArgs),
    /// Show what `apply` would create without changing the store.
    Plan(TargetArgs),
    /// Print the JSON Schema for definition documents.
    Schema,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Config file (defaults to ./tablesmith.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Database connection string; overrides the config file.
    #[arg(long, value_name = "CONNECTION_STRING")]
    conn: Option<String>,
    /// Directory of *.json / *.toml definitions.
    #[arg(long)]
    definitions: Option<PathBuf>,
    /// Maximum number of processing passes.
    #[arg(long, default_value_t = 10)]
    passes: usize,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Output directory for runs; overrides the config file.
    #[arg(long)]
    run_dir: Option<PathBuf>,
    /// Fail when models remain pending after the last pass.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

/// Outcome of a sequence of passes.
#[derive(Debug, Serialize)]
struct PassSummary {
    passes: usize,
    /// Tables created across all passes, in creation order.
    tables_created: Vec<String>,
    /// Result of the last pass.
    last: MaterializationResult,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    graph: DependencyGraphReport,
    #[serde(flatten)]
    summary: PassSummary,
    ddl: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Apply(args) => run_apply(args).await,
        Command::Plan(args) => run_plan(args).await,
        Command::Schema => {
            let schema = definition_json_schema()?;
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

struct Target {
    settings: Settings,
    conn: String,
    engine: Engine,
    definitions: PathBuf,
}

fn resolve_target(args: &TargetArgs) -> Result<Target, CliError> {
    let settings = load_settings(args.config.as_deref())?;
    let conn = args
        .conn
        .clone()
        .or_else(|| settings.connection.clone())
        .ok_or_else(|| CliError::InvalidConfig("connection string is required".to_string()))?;
    let engine = Engine::detect(&conn)
        .ok_or_else(|| CliError::UnsupportedEngine(redact_connection_string(&conn).redacted))?;
    let definitions = args
        .definitions
        .clone()
        .unwrap_or_else(|| settings.definitions.clone());

    Ok(Target {
        settings,
        conn,
        engine,
        definitions,
    })
}

async fn run_apply(args: ApplyArgs) -> Result<(), CliError> {
    let ApplyArgs {
        target,
        run_dir,
        strict,
    } = args;
    let max_passes = target.passes;
    let target = resolve_target(&target)?;

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        engine: target.engine.as_str().to_string(),
        definition_version: DEFINITION_VERSION.to_string(),
        strict,
        run_dir: run_dir.unwrap_or_else(|| target.settings.run_dir.clone()),
        options: RunOptions {
            definitions: target.definitions.clone(),
            max_passes,
            postgres_schema: (target.engine == Engine::Postgres)
                .then(|| target.settings.postgres.schema.clone()),
            sqlite_foreign_keys: (target.engine == Engine::Sqlite)
                .then_some(target.settings.sqlite.foreign_keys),
        },
        connection: redact_connection_string(&target.conn),
    };

    let run_paths = start_run(&run_ctx)?;
    init_logging(Some(&run_paths.logs_path), &target.settings.log_level)?;

    tracing::info!(event = "run_started", run_id = %run_id, engine = %run_ctx.engine);
    let timer = Instant::now();

    let schemas = read_definitions(&target)?;
    let store = connect(target.engine, &target.conn, &target.settings).await?;

    let pending = PendingSet::new();
    pending.add_schemas(schemas);

    let summary = match run_passes(&pending, store.as_ref(), max_passes).await {
        Ok(summary) => summary,
        Err(err) => {
            tracing::warn!(event = "run_failed", run_id = %run_id, error = %err);
            return Err(err.into());
        }
    };

    write_result(&run_paths, &summary)?;
    tracing::info!(event = "result_written", path = %run_paths.result_path.display());
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let remaining = summary.last.pending_schemas.len();
    tracing::info!(
        event = "run_finished",
        passes = summary.passes,
        created = summary.tables_created.len(),
        pending = remaining,
        duration_ms = timer.elapsed().as_millis() as u64
    );

    if strict && remaining > 0 {
        return Err(CliError::Unsettled(remaining));
    }
    Ok(())
}

async fn run_plan(args: TargetArgs) -> Result<(), CliError> {
    let target = resolve_target(&args)?;
    init_logging(None, &target.settings.log_level)?;

    let schemas = read_definitions(&target)?;
    let live = connect(target.engine, &target.conn, &target.settings).await?;
    let tables = live.list_existing_tables().await?;
    let preview = preview_store(
        target.engine,
        tables,
        live.supports_foreign_key_enforcement(),
    );

    let pending = PendingSet::new();
    pending.add_schemas(schemas);
    let graph = build_dependency_report(&pending.list_pending());
    let summary = run_passes(&pending, &preview, args.passes).await?;

    let output = PlanOutput {
        graph,
        summary,
        ddl: preview.statements(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read_definitions(target: &Target) -> Result<Vec<Schema>, CliError> {
    match load_definitions(&target.definitions) {
        Ok(loaded) => {
            for issue in &loaded.warnings {
                log_issue(issue);
            }
            tracing::info!(
                event = "definitions_loaded",
                count = loaded.schemas.len(),
                dir = %target.definitions.display()
            );
            Ok(loaded.schemas)
        }
        Err(DefinitionError::Invalid(report)) => {
            for issue in report.errors.iter().chain(&report.warnings) {
                log_issue(issue);
            }
            Err(DefinitionError::Invalid(report).into())
        }
        Err(err) => Err(err.into()),
    }
}

fn log_issue(issue: &ValidationIssue) {
    match issue.severity {
        IssueSeverity::Error => tracing::error!(
            code = %issue.code,
            path = %issue.path,
            hint = issue.hint.as_deref().unwrap_or(""),
            "{}",
            issue.message
        ),
        IssueSeverity::Warning => tracing::warn!(
            code = %issue.code,
            path = %issue.path,
            hint = issue.hint.as_deref().unwrap_or(""),
            "{}",
            issue.message
        ),
    }
}

/// Run passes until the pending set is empty, a pass makes no progress, or
/// `max_passes` passes have run.
async fn run_passes<S>(
    pending: &PendingSet,
    store: &S,
    max_passes: usize,
) -> Result<PassSummary, ProcessError>
where
    S: Store + ?Sized,
{
    let mut summary = PassSummary {
        passes: 0,
        tables_created: Vec::new(),
        last: MaterializationResult::default(),
    };

    while summary.passes < max_passes.max(1) {
        let before = pending.len();
        let result = pending.process(store).await?;
        summary.passes += 1;
        summary
            .tables_created
            .extend(result.tables_created.iter().cloned());
        summary.last = result;

        if pending.is_empty() || pending.len() >= before {
            break;
        }
    }

    Ok(summary)
}
