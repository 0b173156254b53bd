//! Transaction list, detail, bulk review and export endpoints

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use tracing::{error, info, warn};

use crate::error::{AppError, Result};
use crate::pagination::{PageParams, PageResponse};
use crate::routes::reports::acting_user;
use crate::services::exporter::ExportResponse;
use crate::services::transactions::{
    BulkActionRequest, BulkActionResult, Transaction, TransactionExportRequest, TransactionFilter,
};
use crate::state::AppState;

/// GET /api/transactions
///
/// Query parameters:
/// - page, limit: as for every list endpoint
/// - status, type, merchantId, customerId: exact matches
/// - minAmount, maxAmount, minRiskScore: inclusive bounds
/// - search: case-insensitive text match
/// - from, to: RFC 3339 timestamps
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
    Query(filter): Query<TransactionFilter>,
) -> Result<Json<PageResponse<Transaction>>> {
    let page = state.transactions.list(&filter, params).await?;
    Ok(Json(page.into()))
}

/// GET /api/transactions/:id
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>> {
    state.transactions.get(&id).await.map(Json)
}

/// POST /api/transactions/bulk-action
///
/// Applies one review action to every listed transaction. Unknown ids are
/// skipped and left out of `processed`.
pub async fn bulk_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkActionRequest>,
) -> Result<Json<BulkActionResult>> {
    let actor = acting_user(&headers);
    match state.transactions.bulk_action(&request).await {
        Ok(result) => {
            state.metrics.inc_bulk_actions();
            info!(
                action = request.action.as_str(),
                requested = request.transaction_ids.len(),
                processed = result.processed,
                actor = actor,
                reason = request.reason.as_deref().unwrap_or(""),
                "Bulk action applied"
            );
            Ok(Json(result))
        }
        Err(e @ AppError::Validation(_)) => {
            warn!(error = %e, "Bulk action rejected");
            Err(e)
        }
        Err(e) => {
            error!(action = request.action.as_str(), error = %e, "Bulk action failed");
            Err(e)
        }
    }
}

/// POST /api/transactions/export
///
/// Requests a download link for the transactions matching `filters`.
pub async fn export_transactions(
    State(state): State<AppState>,
    Json(request): Json<TransactionExportRequest>,
) -> Result<Json<ExportResponse>> {
    let outcome = state.transactions.export(&request).await;
    state.metrics.record_export(&outcome);

    match outcome {
        Ok(response) => {
            info!(
                format = request.format.as_str(),
                include_metadata = request.include_metadata,
                "Transaction export link issued"
            );
            Ok(Json(response))
        }
        Err(e) => {
            error!(error = %e, "Transaction export failed");
            Err(e)
        }
    }
}
