use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use backend_domain::ports::{OrchestratorConnection, OrchestratorConnector};
use backend_domain::{OrchestratorConfig, WorkflowDescription, WorkflowProgress, WorkflowStart};

use crate::utils::parse_rfc3339;

const STATUS_PREFIX: &str = "WORKFLOW_EXECUTION_STATUS_";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("orchestrator responded {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("orchestrator response missing {0}")]
    MissingField(&'static str),
}

/// Connects to the orchestrator through its HTTP gateway.
pub struct HttpOrchestratorConnector {
    client: Client,
    namespace_url: String,
}

impl HttpOrchestratorConnector {
    pub fn new(config: &OrchestratorConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds.max(1)))
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .build()
            .context("build orchestrator http client")?;
        Ok(Self {
            client,
            namespace_url: format!(
                "{}/api/v1/namespaces/{}",
                config.url.trim_end_matches('/'),
                config.namespace
            ),
        })
    }
}

#[async_trait]
impl OrchestratorConnector for HttpOrchestratorConnector {
    async fn connect(&self) -> Result<Arc<dyn OrchestratorConnection>> {
        let response = self
            .client
            .get(&self.namespace_url)
            .send()
            .await
            .with_context(|| format!("reach orchestrator at {}", self.namespace_url))?;
        ensure_success(response).await?;
        info!(namespace_url = %self.namespace_url, "orchestrator connected");
        Ok(Arc::new(HttpOrchestratorConnection {
            client: self.client.clone(),
            namespace_url: self.namespace_url.clone(),
        }))
    }
}

pub struct HttpOrchestratorConnection {
    client: Client,
    namespace_url: String,
}

impl HttpOrchestratorConnection {
    fn workflow_url(&self, workflow_id: &str) -> String {
        format!("{}/workflows/{}", self.namespace_url, workflow_id)
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(rename = "queryResult")]
    query_result: Option<WorkflowProgress>,
}

#[derive(Deserialize)]
struct DescribeResponse {
    #[serde(rename = "workflowExecutionInfo")]
    execution_info: Option<ExecutionInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionInfo {
    status: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    close_time: Option<String>,
}

#[async_trait]
impl OrchestratorConnection for HttpOrchestratorConnection {
    async fn submit(&self, start: &WorkflowStart) -> Result<()> {
        let body = json!({
            "workflowId": start.workflow_id,
            "workflowType": { "name": start.workflow_type },
            "taskQueue": { "name": start.task_queue },
            "input": [start.input],
        });
        let response = self
            .client
            .post(self.workflow_url(&start.workflow_id))
            .json(&body)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn query(&self, workflow_id: &str, query_name: &str) -> Result<WorkflowProgress> {
        let url = format!("{}/query/{}", self.workflow_url(workflow_id), query_name);
        let response = self
            .client
            .post(url)
            .json(&json!({ "query": { "queryType": query_name } }))
            .send()
            .await?;
        let payload: QueryResponse = ensure_success(response)
            .await?
            .json()
            .await
            .context("decode query result")?;
        payload
            .query_result
            .ok_or_else(|| GatewayError::MissingField("queryResult").into())
    }

    async fn describe(&self, workflow_id: &str) -> Result<WorkflowDescription> {
        let response = self.client.get(self.workflow_url(workflow_id)).send().await?;
        let payload: DescribeResponse = ensure_success(response)
            .await?
            .json()
            .await
            .context("decode workflow description")?;
        let info = payload
            .execution_info
            .ok_or(GatewayError::MissingField("workflowExecutionInfo"))?;
        Ok(WorkflowDescription {
            status: normalize_execution_status(&info.status),
            start_time: parse_rfc3339(info.start_time.as_deref()),
            close_time: parse_rfc3339(info.close_time.as_deref()),
        })
    }

    async fn close(&self) {
        debug!(namespace_url = %self.namespace_url, "orchestrator session released");
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status {
        status,
        body: body.trim().to_string(),
    }
    .into())
}

/// `WORKFLOW_EXECUTION_STATUS_TIMED_OUT` -> `timed_out`.
fn normalize_execution_status(raw: &str) -> String {
    raw.trim()
        .strip_prefix(STATUS_PREFIX)
        .unwrap_or(raw.trim())
        .to_lowercase()
}
