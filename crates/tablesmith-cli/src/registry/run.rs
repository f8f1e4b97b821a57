use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tablesmith_core::RedactedConnection;

use super::{RegistryError, RegistryResult};

/// Store options recorded with a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub definitions: PathBuf,
    pub max_passes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_foreign_keys: Option<bool>,
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub engine: String,
    pub definition_version: String,
    pub strict: bool,
    pub run_dir: PathBuf,
    pub options: RunOptions,
    pub connection: RedactedConnection,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub engine: String,
    pub definition_version: String,
    pub strict: bool,
    pub options: RunOptions,
    pub connection: RedactedConnection,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub result_path: PathBuf,
}

/// Create `<run_dir>/<timestamp>__run_<id>/` with `config.json` and an empty log.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config_path = root.join("config.json");
    let logs_path = root.join("logs.ndjson");
    let result_path = root.join("result.json");

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        engine: ctx.engine.clone(),
        definition_version: ctx.definition_version.clone(),
        strict: ctx.strict,
        options: ctx.options.clone(),
        connection: ctx.connection.clone(),
        git: collect_git_info(),
    };

    write_json(&config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        root,
        logs_path,
        result_path,
    })
}

pub fn write_result<T: Serialize>(paths: &RunPaths, result: &T) -> RegistryResult<()> {
    write_json(&paths.result_path, result)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesmith_core::redact_connection_string;

    #[test]
    fn writes_config_without_credentials() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = RunContext {
            run_id: "abc".to_string(),
            started_at: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .expect("timestamp")
                .with_timezone(&Utc),
            engine: "postgres".to_string(),
            definition_version: "0.1".to_string(),
            strict: false,
            run_dir: dir.path().to_path_buf(),
            options: RunOptions {
                definitions: PathBuf::from("schemas"),
                max_passes: 3,
                postgres_schema: Some("public".to_string()),
                sqlite_foreign_keys: None,
            },
            connection: redact_connection_string("postgres://app:hunter2@db/app"),
        };

        let paths = start_run(&ctx).expect("start run");
        assert!(paths.root.ends_with("2026-01-02T03-04-05Z__run_abc"));
        assert!(paths.logs_path.exists());

        let config = std::fs::read_to_string(paths.root.join("config.json")).expect("config");
        assert!(!config.contains("hunter2"));
        assert!(config.contains("\"max_passes\": 3"));
        assert!(!config.contains("sqlite_foreign_keys"));

        write_result(&paths, &serde_json::json!({"ok": true})).expect("result");
        assert!(paths.result_path.exists());
    }
}
