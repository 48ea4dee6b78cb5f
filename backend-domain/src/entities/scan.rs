// Scan entity
// Local record of one pipeline run and its link to an orchestrator workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ScanStatus::Pending),
            "running" => Some(ScanStatus::Running),
            "completed" => Some(ScanStatus::Completed),
            "failed" => Some(ScanStatus::Failed),
            _ => None,
        }
    }

    /// Completed and failed scans never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        matches!(
            (self, next),
            (ScanStatus::Pending, ScanStatus::Running)
                | (ScanStatus::Pending, ScanStatus::Failed)
                | (ScanStatus::Running, ScanStatus::Completed)
                | (ScanStatus::Running, ScanStatus::Failed)
        )
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate figures reported by the pipeline once it has them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub total_cost_usd: f64,
    pub total_duration_ms: u64,
    pub total_turns: u64,
    pub agent_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: String,
    pub workflow_id: Option<String>,
    pub target_url: String,
    pub repo_path: String,
    pub config_path: Option<String>,
    pub status: ScanStatus,
    pub current_phase: Option<String>,
    pub current_agent: Option<String>,
    pub completed_agents: Vec<String>,
    pub error: Option<String>,
    pub summary: Option<ScanSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable inputs of a scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    pub target_url: String,
    pub repo_path: String,
    pub config_path: Option<String>,
}

/// Field-level partial update. `None` leaves the field untouched; nullable
/// fields use `Some(None)` to clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPatch {
    pub workflow_id: Option<String>,
    pub status: Option<ScanStatus>,
    pub current_phase: Option<Option<String>>,
    pub current_agent: Option<Option<String>>,
    pub completed_agents: Option<Vec<String>>,
    pub error: Option<Option<String>>,
    pub summary: Option<Option<ScanSummary>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanTransitionError {
    #[error("scan {id} is {status} and can no longer change")]
    Terminal { id: String, status: ScanStatus },
    #[error("scan {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ScanStatus,
        to: ScanStatus,
    },
    #[error("scan {id} is already bound to workflow {current}")]
    WorkflowReassigned { id: String, current: String },
}

impl ScanPatch {
    pub fn started(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: Some(workflow_id.into()),
            status: Some(ScanStatus::Running),
            ..Self::default()
        }
    }

    pub fn start_failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(ScanStatus::Failed),
            error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.workflow_id.is_none()
            && self.status.is_none()
            && self.current_phase.is_none()
            && self.current_agent.is_none()
            && self.completed_agents.is_none()
            && self.error.is_none()
            && self.summary.is_none()
    }

    /// Rejects patches that would break the scan lifecycle.
    pub fn check_against(&self, scan: &Scan) -> Result<(), ScanTransitionError> {
        if self.is_empty() {
            return Ok(());
        }
        if scan.status.is_terminal() {
            return Err(ScanTransitionError::Terminal {
                id: scan.id.clone(),
                status: scan.status,
            });
        }
        if let Some(next) = self.status {
            if next != scan.status && !scan.status.can_transition_to(next) {
                return Err(ScanTransitionError::InvalidTransition {
                    id: scan.id.clone(),
                    from: scan.status,
                    to: next,
                });
            }
        }
        if let (Some(current), Some(next)) = (&scan.workflow_id, &self.workflow_id) {
            if current != next {
                return Err(ScanTransitionError::WorkflowReassigned {
                    id: scan.id.clone(),
                    current: current.clone(),
                });
            }
        }
        Ok(())
    }

    /// Copies the present slots onto `scan`. Timestamps are the store's job.
    pub fn apply_to(self, scan: &mut Scan) {
        if let Some(workflow_id) = self.workflow_id {
            scan.workflow_id = Some(workflow_id);
        }
        if let Some(status) = self.status {
            scan.status = status;
        }
        if let Some(current_phase) = self.current_phase {
            scan.current_phase = current_phase;
        }
        if let Some(current_agent) = self.current_agent {
            scan.current_agent = current_agent;
        }
        if let Some(completed_agents) = self.completed_agents {
            scan.completed_agents = completed_agents;
        }
        if let Some(error) = self.error {
            scan.error = error;
        }
        if let Some(summary) = self.summary {
            scan.summary = summary;
        }
    }
}
