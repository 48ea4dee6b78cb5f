use std::env;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use backend_domain::{DbConfig, OrchestratorConfig, RuntimeConfig};

use crate::config::validation::{validate_http_url, validate_non_empty};

pub const CONFIG_ENV: &str = "SCANSYNC_CONFIG";
const ENV_PREFIX: &str = "SCANSYNC_";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: String,
    pub orchestrator_url: String,
    pub orchestrator_namespace: String,
    pub task_queue: String,
    pub workflow_type: String,
    pub progress_query: String,
    pub pipeline_testing_mode: bool,
    pub connect_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub max_body_bytes: u64,
    pub sync_interval_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let orchestrator = OrchestratorConfig::default();
        Self {
            bind_addr: "127.0.0.1:3240".to_string(),
            database_path: "./scans.db".to_string(),
            orchestrator_url: orchestrator.url,
            orchestrator_namespace: orchestrator.namespace,
            task_queue: orchestrator.task_queue,
            workflow_type: orchestrator.workflow_type,
            progress_query: orchestrator.progress_query,
            pipeline_testing_mode: false,
            connect_timeout_seconds: orchestrator.connect_timeout_seconds,
            request_timeout_seconds: orchestrator.request_timeout_seconds,
            max_body_bytes: 1024 * 1024,
            sync_interval_seconds: 15,
        }
    }
}

impl AppConfig {
    pub async fn load() -> Result<Self> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| "./config.toml".to_string());
        Self::load_from(Path::new(&path), |key| env::var(key).ok()).await
    }

    /// Reads `file_path` (defaults when absent), then applies overrides from
    /// `lookup`, resolves relative paths, normalizes and validates.
    pub async fn load_from(
        file_path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = if file_path.exists() {
            let content = fs::read_to_string(file_path)
                .await
                .with_context(|| format!("read {}", file_path.display()))?;
            toml::from_str(&content).with_context(|| format!("parse {}", file_path.display()))?
        } else {
            warn!(path = %file_path.display(), "config file not found, using defaults");
            AppConfig::default()
        };
        config.apply_overrides(lookup);
        config.resolve_paths(file_path.parent());
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    pub fn normalize(&mut self) {
        self.bind_addr = self.bind_addr.trim().to_string();
        self.database_path = self.database_path.trim().to_string();
        self.orchestrator_url = self.orchestrator_url.trim().trim_end_matches('/').to_string();
        self.orchestrator_namespace = self.orchestrator_namespace.trim().to_string();
        if self.orchestrator_namespace.is_empty() {
            self.orchestrator_namespace = OrchestratorConfig::default().namespace;
        }
        self.task_queue = self.task_queue.trim().to_string();
        self.workflow_type = self.workflow_type.trim().to_string();
        self.progress_query = self.progress_query.trim().to_string();
    }

    fn resolve_paths(&mut self, base_dir: Option<&Path>) {
        let Some(base) = base_dir else {
            return;
        };
        if self.database_path.trim() == ":memory:" {
            return;
        }
        self.database_path = resolve_path(base, &self.database_path);
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|err| anyhow!("invalid bind_addr: {}", err))?;
        validate_http_url("orchestrator_url", &self.orchestrator_url)?;
        validate_non_empty("database_path", &self.database_path)?;
        validate_non_empty("task_queue", &self.task_queue)?;
        validate_non_empty("workflow_type", &self.workflow_type)?;
        validate_non_empty("progress_query", &self.progress_query)?;
        if self.max_body_bytes == 0 {
            return Err(anyhow!("max_body_bytes must be greater than 0"));
        }
        Ok(())
    }

    pub fn to_runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            bind_addr: self.bind_addr.clone(),
            max_body_bytes: self.max_body_bytes,
            request_timeout_seconds: self.request_timeout_seconds,
            sync_interval_seconds: self.sync_interval_seconds,
            pipeline_testing_mode: self.pipeline_testing_mode,
        }
    }

    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            database_path: self.database_path.clone(),
        }
    }

    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            url: self.orchestrator_url.clone(),
            namespace: self.orchestrator_namespace.clone(),
            task_queue: self.task_queue.clone(),
            workflow_type: self.workflow_type.clone(),
            progress_query: self.progress_query.clone(),
            connect_timeout_seconds: self.connect_timeout_seconds,
            request_timeout_seconds: self.request_timeout_seconds,
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        if let Some(value) = var("BIND_ADDR") {
            self.bind_addr = value;
        }
        if let Some(value) = var("DATABASE_PATH") {
            self.database_path = value;
        }
        if let Some(value) = var("ORCHESTRATOR_URL") {
            self.orchestrator_url = value;
        }
        if let Some(value) = var("ORCHESTRATOR_NAMESPACE") {
            self.orchestrator_namespace = value;
        }
        if let Some(value) = var("TASK_QUEUE") {
            self.task_queue = value;
        }
        if let Some(value) = var("WORKFLOW_TYPE") {
            self.workflow_type = value;
        }
        if let Some(value) = var("PROGRESS_QUERY") {
            self.progress_query = value;
        }
        if let Some(value) = var("PIPELINE_TESTING_MODE") {
            self.pipeline_testing_mode = value.parse().unwrap_or(self.pipeline_testing_mode);
        }
        if let Some(value) = var("CONNECT_TIMEOUT_SECONDS") {
            self.connect_timeout_seconds = value.parse().unwrap_or(self.connect_timeout_seconds);
        }
        if let Some(value) = var("REQUEST_TIMEOUT_SECONDS") {
            self.request_timeout_seconds = value.parse().unwrap_or(self.request_timeout_seconds);
        }
        if let Some(value) = var("MAX_BODY_BYTES") {
            self.max_body_bytes = value.parse().unwrap_or(self.max_body_bytes);
        }
        if let Some(value) = var("SYNC_INTERVAL_SECONDS") {
            self.sync_interval_seconds = value.parse().unwrap_or(self.sync_interval_seconds);
        }
    }
}

fn resolve_path(base: &Path, value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        trimmed.to_string()
    } else {
        base.join(path).to_string_lossy().to_string()
    }
}
