//! Ad-hoc analytics endpoints: catalog, queries, rendering, exports and drafts

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::builder::{DraftAction, ReportDraft};
use crate::error::{AppError, Result};
use crate::models::{AnalyticsMetric, AnalyticsQuery, AnalyticsResult, ChartType, ExportFormat};
use crate::render::RenderedView;
use crate::services::exporter::ExportResponse;
use crate::state::AppState;

/// GET /api/analytics/metrics
///
/// Returns the metric catalog.
pub async fn list_metrics(State(state): State<AppState>) -> Result<Json<Vec<AnalyticsMetric>>> {
    let catalog = state.executor.catalog().await.map_err(|e| {
        error!(error = %e, "Failed to load metric catalog");
        e
    })?;
    Ok(Json(catalog.metrics().to_vec()))
}

/// POST /api/analytics/query
pub async fn execute_query(
    State(state): State<AppState>,
    Json(query): Json<AnalyticsQuery>,
) -> Result<Json<AnalyticsResult>> {
    run_query(&state, &query).await.map(Json)
}

/// Execute, count and log one query.
pub(crate) async fn run_query(state: &AppState, query: &AnalyticsQuery) -> Result<AnalyticsResult> {
    let key = query.key();
    let outcome = state.executor.execute(query).await;
    state.metrics.record_query(&outcome);

    match &outcome {
        Ok(result) => info!(
            query_key = %key,
            rows = result.data.len(),
            total_rows = result.metadata.total_rows,
            execution_time_ms = result.metadata.execution_time_ms,
            "Query executed"
        ),
        Err(e @ AppError::Validation(_)) => warn!(query_key = %key, error = %e, "Query rejected"),
        Err(e) => error!(query_key = %key, error = %e, "Query failed"),
    }
    outcome
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub result: AnalyticsResult,
    /// Unknown chart types render an "unsupported" placeholder
    pub chart_type: String,
}

/// POST /api/analytics/render
///
/// Turns a result into a presentation-neutral view.
pub async fn render(
    State(state): State<AppState>,
    Json(request): Json<RenderRequest>,
) -> Json<RenderedView> {
    Json(state.renderer.render(&request.result, &request.chart_type))
}

#[derive(Debug, Deserialize)]
pub struct ExportQueryRequest {
    pub query: AnalyticsQuery,
    #[serde(default)]
    pub format: ExportFormat,
}

/// POST /api/analytics/export
///
/// Requests a download link for an ad-hoc query.
pub async fn export_query(
    State(state): State<AppState>,
    Json(request): Json<ExportQueryRequest>,
) -> Result<Json<ExportResponse>> {
    let outcome = state
        .exporter
        .export_query(&request.query, request.format)
        .await;
    state.metrics.record_export(&outcome);

    match outcome {
        Ok(response) => {
            info!(
                query_key = %request.query.key(),
                format = request.format.as_str(),
                "Export link issued"
            );
            Ok(Json(response))
        }
        Err(e) => {
            error!(query_key = %request.query.key(), error = %e, "Export failed");
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyDraftRequest {
    #[serde(default)]
    pub draft: Option<ReportDraft>,
    pub actions: Vec<DraftAction>,
}

/// POST /api/analytics/drafts/apply
///
/// Applies builder actions in order, starting from the given draft or a
/// fresh one. The first rejected action fails the whole request.
pub async fn apply_draft(Json(request): Json<ApplyDraftRequest>) -> Result<Json<ReportDraft>> {
    let mut draft = request.draft.unwrap_or_default();
    draft.apply_all(request.actions)?;
    Ok(Json(draft))
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub query: AnalyticsQuery,
    pub result: AnalyticsResult,
    pub view: RenderedView,
}

/// POST /api/analytics/drafts/preview
///
/// Executes the draft over the last 30 days and renders it with the draft's
/// chart type. Drafts without metrics never reach the executor.
pub async fn preview_draft(
    State(state): State<AppState>,
    Json(draft): Json<ReportDraft>,
) -> Result<Json<PreviewResponse>> {
    let query = draft.preview(Utc::now())?;
    let result = run_query(&state, &query).await?;
    let view = state
        .renderer
        .render_chart(&result, draft.visualization.chart_type);
    Ok(Json(PreviewResponse {
        query,
        result,
        view,
    }))
}

/// GET /api/analytics/chart-types
pub async fn chart_types() -> Json<Vec<ChartType>> {
    Json(ChartType::ALL.to_vec())
}
