use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use backend_application::commands::{scan_commands, sync_commands};
use backend_application::dtos::{CreateScanRequest, ScanView, SyncAllResponse};
use backend_application::queries::scan_queries;
use backend_application::AppState;

use crate::error::HttpError;

pub async fn create_scan(
    State(state): State<AppState>,
    payload: Result<Json<CreateScanRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScanView>), HttpError> {
    let Json(payload) = payload?;
    let scan = scan_commands::create_scan(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(scan.into())))
}

pub async fn list_scans(State(state): State<AppState>) -> Result<Json<Vec<ScanView>>, HttpError> {
    let scans = scan_queries::list_scans(&state).await?;
    Ok(Json(scans.into_iter().map(ScanView::from).collect()))
}

pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanView>, HttpError> {
    let scan = scan_queries::get_scan(&state, &id).await?;
    Ok(Json(scan.into()))
}

pub async fn sync_scan(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ScanView>, HttpError> {
    let scan = sync_commands::sync_scan(&state, &id).await?;
    Ok(Json(scan.into()))
}

pub async fn sync_all_scans(
    State(state): State<AppState>,
) -> Result<Json<SyncAllResponse>, HttpError> {
    let result = sync_commands::sync_all_scans(&state).await?;
    Ok(Json(result))
}
