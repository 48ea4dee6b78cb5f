//! Owned handle to the orchestration backend.
//!
//! The handle keeps a single-slot cache for the connection: the first caller
//! creates one shared connect attempt and every caller that arrives while it
//! is in flight awaits that same attempt. A successful attempt is kept until
//! [`OrchestratorClient::close`]; a failed one is dropped so the next call
//! starts over.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use backend_domain::ports::{OrchestratorConnection, OrchestratorConnector, OrchestratorError};
use backend_domain::{OrchestratorConfig, PipelineInput, WorkflowId, WorkflowProgress, WorkflowStart};

type ConnectResult = Result<Arc<dyn OrchestratorConnection>, String>;
type ConnectAttempt = Shared<BoxFuture<'static, ConnectResult>>;

enum ConnectionSlot {
    Unset,
    Connecting {
        generation: u64,
        attempt: ConnectAttempt,
    },
    Ready(Arc<dyn OrchestratorConnection>),
}

struct SlotState {
    slot: ConnectionSlot,
    generation: u64,
}

pub struct OrchestratorClient {
    connector: Arc<dyn OrchestratorConnector>,
    config: OrchestratorConfig,
    state: Mutex<SlotState>,
}

impl OrchestratorClient {
    pub fn new(connector: Arc<dyn OrchestratorConnector>, config: OrchestratorConfig) -> Self {
        Self {
            connector,
            config,
            state: Mutex::new(SlotState {
                slot: ConnectionSlot::Unset,
                generation: 0,
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn is_connected(&self) -> bool {
        matches!(self.state.lock().await.slot, ConnectionSlot::Ready(_))
    }

    /// Submits a pipeline workflow and returns its identifier.
    pub async fn start(
        &self,
        web_url: &str,
        repo_path: &str,
        config_path: Option<&str>,
        testing_mode: Option<bool>,
    ) -> Result<String, OrchestratorError> {
        let connection = self
            .connection()
            .await
            .map_err(OrchestratorError::Unavailable)?;

        let workflow_id = WorkflowId::derive(web_url, Utc::now()).into_inner();
        let start = WorkflowStart {
            workflow_id: workflow_id.clone(),
            workflow_type: self.config.workflow_type.clone(),
            task_queue: self.config.task_queue.clone(),
            input: PipelineInput {
                web_url: web_url.to_string(),
                repo_path: repo_path.to_string(),
                config_path: config_path.map(ToString::to_string),
                pipeline_testing_mode: testing_mode.unwrap_or(false),
                workflow_id: workflow_id.clone(),
            },
        };
        connection
            .submit(&start)
            .await
            .map_err(|err| OrchestratorError::StartFailed(format!("{:#}", err)))?;

        info!(
            workflow_id = %workflow_id,
            task_queue = %self.config.task_queue,
            "workflow submitted"
        );
        Ok(workflow_id)
    }

    /// Reads live progress. `None` means the orchestrator could not answer this
    /// time; callers skip the cycle instead of failing the scan.
    pub async fn query_progress(&self, workflow_id: &str) -> Option<WorkflowProgress> {
        let connection = match self.connection().await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(workflow_id, "orchestrator unavailable for progress query: {}", err);
                return None;
            }
        };

        match connection
            .query(workflow_id, &self.config.progress_query)
            .await
        {
            Ok(progress) => Some(progress),
            Err(query_err) => {
                debug!(
                    workflow_id,
                    "progress query failed, falling back to describe: {:#}", query_err
                );
                match connection.describe(workflow_id).await {
                    Ok(description) => Some(WorkflowProgress::from_description(description)),
                    Err(describe_err) => {
                        warn!(
                            workflow_id,
                            "workflow progress unavailable: query: {:#}; describe: {:#}",
                            query_err,
                            describe_err
                        );
                        None
                    }
                }
            }
        }
    }

    /// Drops the cached connection; the next operation reconnects lazily.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut state.slot, ConnectionSlot::Unset)
        };
        if let ConnectionSlot::Ready(connection) = previous {
            connection.close().await;
            info!("orchestrator connection closed");
        }
    }

    async fn connection(&self) -> ConnectResult {
        let (generation, attempt) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            match &state.slot {
                ConnectionSlot::Ready(connection) => return Ok(connection.clone()),
                ConnectionSlot::Connecting {
                    generation,
                    attempt,
                } => (*generation, attempt.clone()),
                ConnectionSlot::Unset => {
                    state.generation += 1;
                    let generation = state.generation;
                    let connector = self.connector.clone();
                    let attempt = async move {
                        connector
                            .connect()
                            .await
                            .map_err(|err| format!("{:#}", err))
                    }
                    .boxed()
                    .shared();
                    state.slot = ConnectionSlot::Connecting {
                        generation,
                        attempt: attempt.clone(),
                    };
                    debug!(generation, "connecting to orchestrator");
                    (generation, attempt)
                }
            }
        };

        let result = attempt.await;

        let mut state = self.state.lock().await;
        let still_current = matches!(
            &state.slot,
            ConnectionSlot::Connecting { generation: current, .. } if *current == generation
        );
        if still_current {
            state.slot = match &result {
                Ok(connection) => {
                    info!(url = %self.config.url, "orchestrator connected");
                    ConnectionSlot::Ready(connection.clone())
                }
                Err(err) => {
                    warn!(url = %self.config.url, "orchestrator connect failed: {}", err);
                    ConnectionSlot::Unset
                }
            };
        }
        result
    }
}
