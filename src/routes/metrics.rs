//! Prometheus metrics endpoint

use std::sync::atomic::{AtomicU64, Ordering};

use axum::{extract::State, http::header, response::IntoResponse};

use crate::state::AppState;

/// Application metrics for Prometheus
#[derive(Default)]
pub struct Metrics {
    queries_executed_total: AtomicU64,
    queries_failed_total: AtomicU64,
    reports_created_total: AtomicU64,
    reports_updated_total: AtomicU64,
    reports_deleted_total: AtomicU64,
    exports_total: AtomicU64,
    exports_failed_total: AtomicU64,
    dashboard_polls_total: AtomicU64,
    /// Ticks dropped because the previous fetch was still running
    dashboard_polls_skipped_total: AtomicU64,
    scheduled_runs_total: AtomicU64,
    scheduled_runs_abandoned_total: AtomicU64,
    bulk_actions_total: AtomicU64,
    alerts_updated_total: AtomicU64,
    /// Active WebSocket connections
    ws_connections: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a query outcome.
    pub fn record_query<T, E>(&self, outcome: &std::result::Result<T, E>) {
        match outcome {
            Ok(_) => self.queries_executed_total.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.queries_failed_total.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Count an export outcome.
    pub fn record_export<T, E>(&self, outcome: &std::result::Result<T, E>) {
        match outcome {
            Ok(_) => self.exports_total.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.exports_failed_total.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn inc_reports_created(&self) {
        self.reports_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reports_updated(&self) {
        self.reports_updated_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reports_deleted(&self) {
        self.reports_deleted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dashboard_polls(&self) {
        self.dashboard_polls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_dashboard_polls_skipped(&self) {
        self.dashboard_polls_skipped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_scheduled_runs(&self) {
        self.scheduled_runs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_scheduled_runs_abandoned(&self) {
        self.scheduled_runs_abandoned_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bulk_actions(&self) {
        self.bulk_actions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alerts_updated(&self) {
        self.alerts_updated_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ws_connections(&self) {
        self.ws_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_ws_connections(&self) {
        self.ws_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed_total: self.queries_executed_total.load(Ordering::Relaxed),
            queries_failed_total: self.queries_failed_total.load(Ordering::Relaxed),
            reports_created_total: self.reports_created_total.load(Ordering::Relaxed),
            reports_updated_total: self.reports_updated_total.load(Ordering::Relaxed),
            reports_deleted_total: self.reports_deleted_total.load(Ordering::Relaxed),
            exports_total: self.exports_total.load(Ordering::Relaxed),
            exports_failed_total: self.exports_failed_total.load(Ordering::Relaxed),
            dashboard_polls_total: self.dashboard_polls_total.load(Ordering::Relaxed),
            dashboard_polls_skipped_total: self
                .dashboard_polls_skipped_total
                .load(Ordering::Relaxed),
            scheduled_runs_total: self.scheduled_runs_total.load(Ordering::Relaxed),
            scheduled_runs_abandoned_total: self
                .scheduled_runs_abandoned_total
                .load(Ordering::Relaxed),
            bulk_actions_total: self.bulk_actions_total.load(Ordering::Relaxed),
            alerts_updated_total: self.alerts_updated_total.load(Ordering::Relaxed),
            ws_connections: self.ws_connections.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queries_executed_total: u64,
    pub queries_failed_total: u64,
    pub reports_created_total: u64,
    pub reports_updated_total: u64,
    pub reports_deleted_total: u64,
    pub exports_total: u64,
    pub exports_failed_total: u64,
    pub dashboard_polls_total: u64,
    pub dashboard_polls_skipped_total: u64,
    pub scheduled_runs_total: u64,
    pub scheduled_runs_abandoned_total: u64,
    pub bulk_actions_total: u64,
    pub alerts_updated_total: u64,
    pub ws_connections: u64,
}

impl MetricsSnapshot {
    /// Prometheus text exposition format.
    pub fn to_prometheus(&self) -> String {
        let counters: [(&str, &str, u64); 13] = [
            (
                "analytics_queries_executed_total",
                "Analytics queries that returned a result",
                self.queries_executed_total,
            ),
            (
                "analytics_queries_failed_total",
                "Analytics queries that failed",
                self.queries_failed_total,
            ),
            (
                "analytics_reports_created_total",
                "Reports created",
                self.reports_created_total,
            ),
            (
                "analytics_reports_updated_total",
                "Reports updated",
                self.reports_updated_total,
            ),
            (
                "analytics_reports_deleted_total",
                "Reports deleted",
                self.reports_deleted_total,
            ),
            (
                "analytics_exports_total",
                "Export links issued",
                self.exports_total,
            ),
            (
                "analytics_exports_failed_total",
                "Export requests that failed",
                self.exports_failed_total,
            ),
            (
                "analytics_dashboard_polls_total",
                "Dashboard refreshes published",
                self.dashboard_polls_total,
            ),
            (
                "analytics_dashboard_polls_skipped_total",
                "Dashboard ticks skipped while a fetch was in flight",
                self.dashboard_polls_skipped_total,
            ),
            (
                "analytics_scheduled_runs_total",
                "Scheduled report runs completed",
                self.scheduled_runs_total,
            ),
            (
                "analytics_scheduled_runs_abandoned_total",
                "Scheduled report runs abandoned after a failed export",
                self.scheduled_runs_abandoned_total,
            ),
            (
                "analytics_transaction_bulk_actions_total",
                "Transaction bulk actions applied",
                self.bulk_actions_total,
            ),
            (
                "analytics_fraud_alerts_updated_total",
                "Fraud alert status changes",
                self.alerts_updated_total,
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            output.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n\n"
            ));
        }
        output.push_str(&format!(
            r#"# HELP analytics_websocket_connections Current number of active WebSocket connections
# TYPE analytics_websocket_connections gauge
analytics_websocket_connections {}

# HELP analytics_info Build information
# TYPE analytics_info gauge
analytics_info{{version="{}"}} 1
"#,
            self.ws_connections,
            env!("CARGO_PKG_VERSION"),
        ));
        output
    }
}

/// GET /metrics
///
/// Returns Prometheus-format metrics
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.snapshot().to_prometheus(),
    )
}
