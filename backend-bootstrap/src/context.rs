use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use backend_application::{AppState, Metrics, OrchestratorClient};
use backend_domain::ports::ScanRepository;
use backend_infrastructure::{AppConfig, HttpOrchestratorConnector, SqliteScanRepository};

const IN_MEMORY_DATABASE: &str = ":memory:";

pub struct AppContext {
    pub state: AppState,
}

impl AppContext {
    pub async fn new() -> Result<Self> {
        let config = AppConfig::load().await?;
        Self::from_config(&config).await
    }

    /// Opens the store and prepares the orchestrator handle. The orchestrator
    /// is not contacted here; the first scan operation connects.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let runtime_config = config.to_runtime_config();
        let db_config = config.to_db_config();
        let orchestrator_config = config.to_orchestrator_config();

        let repo = if db_config.database_path == IN_MEMORY_DATABASE {
            SqliteScanRepository::in_memory()?
        } else {
            SqliteScanRepository::open(&db_config.database_path)?
        };
        repo.ensure_schema()
            .await
            .context("prepare scan store schema")?;

        let connector = HttpOrchestratorConnector::new(&orchestrator_config)?;
        info!(
            database_path = %db_config.database_path,
            orchestrator_url = %orchestrator_config.url,
            namespace = %orchestrator_config.namespace,
            task_queue = %orchestrator_config.task_queue,
            "context ready"
        );

        let state = AppState {
            config: runtime_config,
            scan_repo: Arc::new(repo),
            orchestrator: Arc::new(OrchestratorClient::new(
                Arc::new(connector),
                orchestrator_config,
            )),
            metrics: Arc::new(Metrics::default()),
        };

        Ok(Self { state })
    }
}
