// Public request/response shapes. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backend_domain::{Scan, ScanStatus, ScanSummary};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScanRequest {
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub repo_path: Option<String>,
    #[serde(default)]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanView {
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

impl From<Scan> for ScanView {
    fn from(scan: Scan) -> Self {
        Self {
            id: scan.id,
            workflow_id: scan.workflow_id,
            target_url: scan.target_url,
            repo_path: scan.repo_path,
            config_path: scan.config_path,
            status: scan.status,
            current_phase: scan.current_phase,
            current_agent: scan.current_agent,
            completed_agents: scan.completed_agents,
            error: scan.error,
            summary: scan.summary,
            created_at: scan.created_at,
            updated_at: scan.updated_at,
        }
    }
}

impl From<ScanView> for Scan {
    fn from(view: ScanView) -> Self {
        Self {
            id: view.id,
            workflow_id: view.workflow_id,
            target_url: view.target_url,
            repo_path: view.repo_path,
            config_path: view.config_path,
            status: view.status,
            current_phase: view.current_phase,
            current_agent: view.current_agent,
            completed_agents: view.completed_agents,
            error: view.error,
            summary: view.summary,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAllResponse {
    pub attempted: usize,
}
