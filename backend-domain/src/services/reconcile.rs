// Orchestrator progress -> scan patch
// The orchestrator is the only source of truth; nothing here derives state locally.

use crate::entities::{ProgressSource, ProgressStatus, ScanPatch, ScanStatus, WorkflowProgress};

pub fn progress_status_to_scan(status: ProgressStatus) -> Option<ScanStatus> {
    match status {
        ProgressStatus::Running => Some(ScanStatus::Running),
        ProgressStatus::Completed => Some(ScanStatus::Completed),
        ProgressStatus::Failed => Some(ScanStatus::Failed),
        ProgressStatus::Unknown => None,
    }
}

/// Builds the patch that copies `progress` into a running scan.
///
/// Detailed reports overwrite phase, agent, completed agents, error and
/// summary wholesale. Coarse reports only move the status and, on failure,
/// record the error.
pub fn progress_patch(progress: WorkflowProgress) -> ScanPatch {
    let status = progress_status_to_scan(progress.progress_status());
    match progress.source {
        ProgressSource::Query => ScanPatch {
            workflow_id: None,
            status,
            current_phase: Some(progress.current_phase),
            current_agent: Some(progress.current_agent),
            completed_agents: Some(progress.completed_agents),
            error: Some(progress.error),
            summary: Some(progress.summary),
        },
        ProgressSource::Describe => ScanPatch {
            status,
            error: match status {
                Some(ScanStatus::Failed) => progress.error.map(Some),
                _ => None,
            },
            ..ScanPatch::default()
        },
    }
}
