use tracing::error;

use crate::{AppError, AppState};
use backend_domain::Scan;

pub async fn get_scan(state: &AppState, id: &str) -> Result<Scan, AppError> {
    state
        .scan_repo
        .get_scan(id)
        .await
        .map_err(|err| {
            error!(scan_id = id, "failed to load scan: {:#}", err);
            AppError::Internal(err)
        })?
        .ok_or_else(|| AppError::NotFound(id.to_string()))
}

pub async fn list_scans(state: &AppState) -> Result<Vec<Scan>, AppError> {
    state.scan_repo.list_scans().await.map_err(|err| {
        error!("failed to list scans: {:#}", err);
        AppError::Internal(err)
    })
}
