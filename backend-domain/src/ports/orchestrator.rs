use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::entities::{WorkflowDescription, WorkflowProgress, WorkflowStart};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("orchestrator unavailable: {0}")]
    Unavailable(String),
    #[error("workflow start failed: {0}")]
    StartFailed(String),
}

/// Establishes a live session with the orchestration backend.
#[async_trait]
pub trait OrchestratorConnector: Send + Sync {
    async fn connect(&self) -> anyhow::Result<Arc<dyn OrchestratorConnection>>;
}

#[async_trait]
pub trait OrchestratorConnection: Send + Sync {
    async fn submit(&self, start: &WorkflowStart) -> anyhow::Result<()>;
    async fn query(&self, workflow_id: &str, query_name: &str) -> anyhow::Result<WorkflowProgress>;
    async fn describe(&self, workflow_id: &str) -> anyhow::Result<WorkflowDescription>;
    async fn close(&self) {}
}
