//! Fraud alert review endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use crate::error::Result;
use crate::pagination::{PageParams, PageResponse};
use crate::services::alerts::{Alert, AlertFilter, UpdateAlertStatus};
use crate::state::AppState;

/// GET /api/fraud/alerts
///
/// Query parameters: page, limit, status, severity.
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<AlertFilter>,
) -> Result<Json<PageResponse<Alert>>> {
    let page = state.alerts.list(&filter, params).await?;
    Ok(Json(page.into()))
}

/// PUT /api/fraud/alerts/:id/status
pub async fn update_alert_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<UpdateAlertStatus>,
) -> Result<Json<Alert>> {
    let alert = state.alerts.update_status(&id, update).await?;
    state.metrics.inc_alerts_updated();
    info!(alert_id = %alert.id, status = ?alert.status, "Fraud alert status changed");
    Ok(Json(alert))
}
