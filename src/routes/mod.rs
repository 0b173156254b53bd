//! HTTP routes

pub mod alerts;
pub mod analytics;
pub mod dashboard;
pub mod health;
pub mod metrics;
pub mod reports;
pub mod transactions;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health and metrics (Kubernetes probes + Prometheus)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::prometheus_metrics))
        // Fraud overview
        .route("/api/dashboard", get(dashboard::overview))
        // Ad-hoc analytics
        .route("/api/analytics/metrics", get(analytics::list_metrics))
        .route("/api/analytics/chart-types", get(analytics::chart_types))
        .route("/api/analytics/query", post(analytics::execute_query))
        .route("/api/analytics/render", post(analytics::render))
        .route("/api/analytics/export", post(analytics::export_query))
        // Report builder
        .route("/api/analytics/drafts/apply", post(analytics::apply_draft))
        .route("/api/analytics/drafts/preview", post(analytics::preview_draft))
        // Saved reports
        .route(
            "/api/analytics/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route(
            "/api/analytics/reports/:id",
            get(reports::get_report)
                .put(reports::update_report)
                .delete(reports::delete_report),
        )
        .route("/api/analytics/reports/:id/run", post(reports::run_report))
        .route("/api/analytics/reports/:id/export", post(reports::export_report))
        // Transactions and fraud alert review
        .route("/api/transactions", get(transactions::list_transactions))
        .route("/api/transactions/export", post(transactions::export_transactions))
        .route("/api/transactions/bulk-action", post(transactions::bulk_action))
        .route("/api/transactions/:id", get(transactions::get_transaction))
        .route("/api/fraud/alerts", get(alerts::list_alerts))
        .route("/api/fraud/alerts/:id/status", put(alerts::update_alert_status))
        // Live analytics dashboard
        .route("/api/analytics/dashboard", get(dashboard::snapshot))
        .route("/api/analytics/dashboard/ws", get(dashboard::ws_handler))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
