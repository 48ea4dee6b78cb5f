// Orchestrator-side view of a pipeline workflow

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::ScanSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Where a progress report came from. Coarse reports only carry status and
/// timing, so they must not overwrite the detailed fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressSource {
    #[default]
    Query,
    Describe,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowProgress {
    pub status: String,
    #[serde(default)]
    pub current_phase: Option<String>,
    #[serde(default)]
    pub current_agent: Option<String>,
    #[serde(default)]
    pub completed_agents: Vec<String>,
    #[serde(default)]
    pub failed_agent: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub elapsed_ms: Option<u64>,
    #[serde(default)]
    pub agent_metrics: BTreeMap<String, AgentMetrics>,
    #[serde(default)]
    pub summary: Option<ScanSummary>,
    #[serde(skip)]
    pub source: ProgressSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Running,
    Completed,
    Failed,
    Unknown,
}

impl From<&str> for ProgressStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "running" => ProgressStatus::Running,
            "completed" => ProgressStatus::Completed,
            "failed" | "terminated" | "canceled" | "cancelled" | "timed_out" => {
                ProgressStatus::Failed
            }
            _ => ProgressStatus::Unknown,
        }
    }
}

/// Coarse execution metadata, used when the progress query is unsupported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDescription {
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub close_time: Option<DateTime<Utc>>,
}

impl WorkflowProgress {
    pub fn progress_status(&self) -> ProgressStatus {
        ProgressStatus::from(self.status.as_str())
    }

    pub fn from_description(description: WorkflowDescription) -> Self {
        let status = ProgressStatus::from(description.status.as_str());
        let error = match (status, description.status.as_str()) {
            (ProgressStatus::Failed, "failed") => Some("workflow failed".to_string()),
            (ProgressStatus::Failed, other) => Some(format!("workflow {}", other)),
            _ => None,
        };
        let elapsed_ms = match (description.start_time, description.close_time) {
            (Some(start), Some(close)) => {
                u64::try_from(close.signed_duration_since(start).num_milliseconds()).ok()
            }
            _ => None,
        };
        Self {
            status: description.status,
            current_phase: None,
            current_agent: None,
            completed_agents: Vec::new(),
            failed_agent: None,
            error,
            start_time: description.start_time.map(|time| time.timestamp_millis()),
            elapsed_ms,
            agent_metrics: BTreeMap::new(),
            summary: None,
            source: ProgressSource::Describe,
        }
    }
}

/// Arguments handed to the pipeline workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineInput {
    pub web_url: String,
    pub repo_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub pipeline_testing_mode: bool,
    pub workflow_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStart {
    pub workflow_id: String,
    pub workflow_type: String,
    pub task_queue: String,
    pub input: PipelineInput,
}
