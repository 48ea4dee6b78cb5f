use anyhow::anyhow;
use futures_util::future::join_all;
use tracing::{debug, error, info};

use crate::dtos::SyncAllResponse;
use crate::{AppError, AppState};
use backend_domain::{progress_patch, Scan, ScanStatus, ScanTransitionError};

/// Copies the orchestrator's view of one scan into the store.
pub async fn sync_scan(state: &AppState, id: &str) -> Result<Scan, AppError> {
    let scan = state
        .scan_repo
        .get_scan(id)
        .await?
        .ok_or_else(|| AppError::NotFound(id.to_string()))?;
    reconcile_scan(state, scan).await.map_err(|err| {
        state.metrics.record_sync_error();
        error!(scan_id = id, "scan sync failed: {:#}", err);
        AppError::Internal(err)
    })
}

/// Syncs every running scan concurrently. One scan failing, or its task
/// panicking, never stops the rest; the result counts attempts, not successes.
pub async fn sync_all_scans(state: &AppState) -> Result<SyncAllResponse, AppError> {
    let eligible: Vec<Scan> = state
        .scan_repo
        .list_scans()
        .await?
        .into_iter()
        .filter(|scan| scan.status == ScanStatus::Running && scan.workflow_id.is_some())
        .collect();
    let attempted = eligible.len();

    let handles = eligible
        .into_iter()
        .map(|scan| {
            let state = state.clone();
            let scan_id = scan.id.clone();
            let handle = tokio::spawn(async move { reconcile_scan(&state, scan).await });
            (scan_id, handle)
        })
        .collect::<Vec<_>>();

    let (ids, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
    let results = join_all(handles).await;
    for (scan_id, result) in ids.iter().zip(results) {
        match result {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                state.metrics.record_sync_error();
                error!(scan_id = %scan_id, "scan sync failed: {:#}", err);
            }
            Err(join_err) => {
                state.metrics.record_sync_error();
                error!(scan_id = %scan_id, "scan sync task aborted: {}", join_err);
            }
        }
    }

    info!(attempted, "sync round finished");
    Ok(SyncAllResponse { attempted })
}

async fn reconcile_scan(state: &AppState, scan: Scan) -> anyhow::Result<Scan> {
    let Some(workflow_id) = scan.workflow_id.clone() else {
        return Ok(scan);
    };
    if scan.status.is_terminal() {
        return Ok(scan);
    }

    state.metrics.record_sync_attempt();
    let Some(progress) = state.orchestrator.query_progress(&workflow_id).await else {
        state.metrics.record_sync_skipped();
        debug!(scan_id = %scan.id, workflow_id = %workflow_id, "progress unavailable, keeping scan as is");
        return Ok(scan);
    };

    let updated = match state
        .scan_repo
        .update_scan(&scan.id, progress_patch(progress))
        .await
    {
        Ok(updated) => updated,
        Err(err) if finished_elsewhere(&err) => {
            state.metrics.record_sync_skipped();
            debug!(scan_id = %scan.id, workflow_id = %workflow_id, "scan finished by a concurrent sync");
            return state
                .scan_repo
                .get_scan(&scan.id)
                .await?
                .ok_or_else(|| anyhow!("scan {} vanished during sync", scan.id));
        }
        Err(err) => return Err(err),
    }
    .ok_or_else(|| anyhow!("scan {} vanished during sync", scan.id))?;
    state.metrics.record_sync_applied();
    if updated.status != scan.status {
        info!(
            scan_id = %updated.id,
            workflow_id = %workflow_id,
            from = %scan.status,
            to = %updated.status,
            "scan status changed"
        );
    }
    Ok(updated)
}

/// The snapshot was running when read, but the stored scan reached a
/// terminal state before the patch landed.
fn finished_elsewhere(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ScanTransitionError>(),
        Some(ScanTransitionError::Terminal { .. })
    )
}
