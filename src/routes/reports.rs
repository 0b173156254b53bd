//! Saved report endpoints

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{AppError, Result};
use crate::models::{
    AnalyticsResult, CreateReportInput, DateRange, ExportFormat, Report, UpdateReportInput,
};
use crate::pagination::{PageParams, PageResponse};
use crate::render::RenderedView;
use crate::routes::analytics::run_query;
use crate::services::exporter::ExportResponse;
use crate::state::AppState;

/// Header naming the acting user
pub const USER_HEADER: &str = "x-user-id";
const DEFAULT_USER: &str = "current_user";

/// Days of history an on-demand run covers.
pub const RUN_WINDOW_DAYS: i64 = 30;

pub(crate) fn acting_user(headers: &HeaderMap) -> &str {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_USER)
}

/// GET /api/analytics/reports
///
/// Query parameters:
/// - page: 1-based page (default: 1)
/// - limit: page size, 1-100 (default: 20)
pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PageResponse<Report>>> {
    let page = state.store.list(params).await?;
    Ok(Json(page.into()))
}

/// POST /api/analytics/reports
pub async fn create_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<CreateReportInput>,
) -> Result<(StatusCode, Json<Report>)> {
    let input = input.normalize()?;
    let created_by = acting_user(&headers);

    let report = state.store.create(input, created_by).await.map_err(|e| {
        error!(error = %e, "Failed to create report");
        e
    })?;
    state.metrics.inc_reports_created();
    info!(report_id = %report.id, created_by = created_by, "Report created");
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/analytics/reports/:id
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Report>> {
    state.store.get(&id).await.map(Json)
}

/// PUT /api/analytics/reports/:id
///
/// Partial update; `"schedule": null` clears the schedule.
pub async fn update_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateReportInput>,
) -> Result<Json<Report>> {
    let input = input.normalize()?;
    let report = state.store.update(&id, input).await.map_err(|e| {
        if !matches!(e, AppError::NotFound(_)) {
            error!(report_id = %id, error = %e, "Failed to update report");
        }
        e
    })?;
    state.metrics.inc_reports_updated();
    info!(report_id = %id, "Report updated");
    Ok(Json(report))
}

/// DELETE /api/analytics/reports/:id
pub async fn delete_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    if !state.store.delete(&id).await? {
        return Err(AppError::NotFound(format!("report '{}'", id)));
    }
    state.metrics.inc_reports_deleted();
    info!(report_id = %id, "Report deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub report: Report,
    pub result: AnalyticsResult,
    pub view: RenderedView,
}

/// POST /api/analytics/reports/:id/run
///
/// Executes the report over the last 30 days (or its preset `timeRange`),
/// renders it with its chart type and records the run.
pub async fn run_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RunResponse>> {
    let report = state.store.get(&id).await?;
    let now = Utc::now();
    let query = report.to_query(DateRange::last_days(now, RUN_WINDOW_DAYS));

    let result = run_query(&state, &query).await?;
    let view = state
        .renderer
        .render_chart(&result, report.visualization.chart_type);
    let report = state.store.record_run(&id, now).await?;

    Ok(Json(RunResponse {
        report,
        result,
        view,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportReportRequest {
    #[serde(default)]
    pub format: ExportFormat,
}

/// POST /api/analytics/reports/:id/export
pub async fn export_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ExportReportRequest>>,
) -> Result<Json<ExportResponse>> {
    let format = body.map(|Json(b)| b.format).unwrap_or_default();
    state.store.get(&id).await?;
    let outcome = state.exporter.export_report(&id, format).await;
    state.metrics.record_export(&outcome);

    match outcome {
        Ok(response) => {
            info!(report_id = %id, format = format.as_str(), "Export link issued");
            Ok(Json(response))
        }
        Err(e) => {
            error!(report_id = %id, error = %e, "Export failed");
            Err(e)
        }
    }
}
