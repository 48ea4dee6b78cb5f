use anyhow::anyhow;
use tracing::{error, info, warn};

use crate::dtos::CreateScanRequest;
use crate::{AppError, AppState};
use backend_domain::{normalize_optional_text, NewScan, Scan, ScanPatch};

/// Records a scan and submits its workflow.
///
/// The record is persisted before the orchestrator is contacted. A failed
/// start is written back as a terminal `failed` scan instead of an error, so
/// the caller always gets the durable record.
pub async fn create_scan(state: &AppState, payload: CreateScanRequest) -> Result<Scan, AppError> {
    let new_scan = validate_create(payload)?;

    let scan = state
        .scan_repo
        .create_scan(new_scan)
        .await
        .map_err(|err| {
            error!("failed to persist scan: {:#}", err);
            AppError::Internal(err)
        })?;
    state.metrics.record_scan_created();
    info!(scan_id = %scan.id, target_url = %scan.target_url, "scan created");

    let patch = match state
        .orchestrator
        .start(
            &scan.target_url,
            &scan.repo_path,
            scan.config_path.as_deref(),
            Some(state.config.pipeline_testing_mode),
        )
        .await
    {
        Ok(workflow_id) => {
            info!(scan_id = %scan.id, workflow_id = %workflow_id, "scan running");
            ScanPatch::started(workflow_id)
        }
        Err(err) => {
            state.metrics.record_start_failure();
            warn!(scan_id = %scan.id, "workflow start failed: {}", err);
            ScanPatch::start_failed(err.to_string())
        }
    };

    let written = match state.scan_repo.update_scan(&scan.id, patch).await {
        Ok(written) => written,
        Err(err) => {
            // The workflow may already be live; never leave the record pending.
            error!(scan_id = %scan.id, "failed to record workflow start: {:#}", err);
            state.metrics.record_start_failure();
            state
                .scan_repo
                .update_scan(
                    &scan.id,
                    ScanPatch::start_failed(format!("failed to record workflow start: {:#}", err)),
                )
                .await?
        }
    };
    written.ok_or_else(|| AppError::Internal(anyhow!("scan {} vanished after creation", scan.id)))
}

fn validate_create(payload: CreateScanRequest) -> Result<NewScan, AppError> {
    let target_url = normalize_optional_text(payload.target_url)
        .ok_or_else(|| AppError::BadRequest("targetUrl is required".to_string()))?;
    let repo_path = normalize_optional_text(payload.repo_path)
        .ok_or_else(|| AppError::BadRequest("repoPath is required".to_string()))?;
    Ok(NewScan {
        target_url,
        repo_path,
        config_path: normalize_optional_text(payload.config_path),
    })
}
