//! Regional mirror and sync trigger endpoints
//!
//! - `POST /api/regional-sync/run`: on-demand reconciliation
//! - `GET /api/regional-sync/status`: in-flight flag and last run
//! - `GET /api/regionals`: active mirror rows
//! - `GET /api/regionals/:external_id/history`: every row for one id

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::regional::{LocalRegional, RegionalState};
use crate::sync::{runs, SyncOutcome, SyncRunRecord, SyncTrigger};
use crate::AppState;

/// Response for a completed on-demand run
#[derive(Debug, Serialize)]
pub struct SyncRunResponse {
    pub run_id: Uuid,
    pub inserted: usize,
    pub deactivated: usize,
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub running: bool,
    pub last_run: Option<SyncRunRecord>,
}

#[derive(Debug, Serialize)]
pub struct RegionalListResponse {
    pub count: usize,
    pub regionals: Vec<LocalRegional>,
}

#[derive(Debug, Serialize)]
pub struct RegionalHistoryResponse {
    pub external_id: String,
    pub state: RegionalState,
    pub current_id: Option<i64>,
    pub rows: Vec<LocalRegional>,
}

/// POST /api/regional-sync/run
pub async fn trigger_sync(State(state): State<AppState>) -> ApiResult<Json<SyncRunResponse>> {
    match state.sync.run(SyncTrigger::OnDemand).await? {
        SyncOutcome::Applied(summary) => Ok(Json(SyncRunResponse {
            run_id: summary.run_id,
            inserted: summary.inserted,
            deactivated: summary.deactivated,
        })),
        SyncOutcome::Skipped => Err(ApiError::Conflict(
            "regional sync already in progress".to_string(),
        )),
    }
}

/// GET /api/regional-sync/status
pub async fn sync_status(State(state): State<AppState>) -> ApiResult<Json<SyncStatusResponse>> {
    let last_run = runs::load_last_run(state.sync.store().pool()).await?;

    Ok(Json(SyncStatusResponse {
        running: state.sync.is_running(),
        last_run,
    }))
}

/// GET /api/regionals
pub async fn list_regionals(State(state): State<AppState>) -> ApiResult<Json<RegionalListResponse>> {
    let regionals = state.sync.store().list_active().await?;

    Ok(Json(RegionalListResponse {
        count: regionals.len(),
        regionals,
    }))
}

/// GET /api/regionals/:external_id/history
pub async fn regional_history(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> ApiResult<Json<RegionalHistoryResponse>> {
    let history = state
        .sync
        .store()
        .history_for(&external_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("regional {}", external_id)))?;

    Ok(Json(RegionalHistoryResponse {
        external_id: history.external_id().to_string(),
        state: history.state(),
        current_id: history.current().map(|row| row.id),
        rows: history.rows().to_vec(),
    }))
}

/// Build regional routes (all protected)
pub fn regional_routes() -> Router<AppState> {
    Router::new()
        .route("/api/regional-sync/run", post(trigger_sync))
        .route("/api/regional-sync/status", get(sync_status))
        .route("/api/regionals", get(list_regionals))
        .route("/api/regionals/:external_id/history", get(regional_history))
}
