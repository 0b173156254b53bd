//! Report scheduler task - exports scheduled reports when they come due

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::state::AppState;

/// Background task that runs due reports every `period`.
pub async fn report_scheduler_task(state: AppState, period: Duration) {
    let mut interval = tokio::time::interval(period);

    info!("Report scheduler task started ({}s interval)", period.as_secs());

    loop {
        interval.tick().await;

        let ran = run_due_reports(&state, Utc::now()).await;
        if ran > 0 {
            info!(reports = ran, "Scheduled reports exported");
        }
    }
}

/// Export every report due at `now` and advance its schedule.
///
/// A failed export abandons that run: `next_run_at` moves to the following
/// occurrence and `last_run_at` keeps its previous value. Returns the number
/// of completed runs.
pub async fn run_due_reports(state: &AppState, now: DateTime<Utc>) -> usize {
    let due = match state.store.due(now).await {
        Ok(due) => due,
        Err(e) => {
            error!(error = %e, "Failed to load due reports");
            return 0;
        }
    };

    let mut ran = 0;
    for report in due {
        let Some(schedule) = &report.schedule else {
            continue;
        };

        let outcome = state.exporter.export_report(&report.id, schedule.format).await;
        state.metrics.record_export(&outcome);
        let export = match outcome {
            Ok(export) => export,
            Err(e) => {
                error!(report_id = %report.id, error = %e, "Scheduled export failed");
                state.metrics.inc_scheduled_runs_abandoned();
                match state.store.skip_run(&report.id, now).await {
                    Ok(updated) => warn!(
                        report_id = %report.id,
                        next_run_at = ?updated.next_run_at,
                        "Scheduled run abandoned"
                    ),
                    Err(e) => {
                        error!(report_id = %report.id, error = %e, "Failed to skip scheduled run")
                    }
                }
                continue;
            }
        };

        match state.store.record_run(&report.id, now).await {
            Ok(updated) => {
                ran += 1;
                state.metrics.inc_scheduled_runs();
                info!(
                    report_id = %report.id,
                    name = %report.name,
                    recipients = ?schedule.recipients,
                    download_url = %export.download_url,
                    next_run_at = ?updated.next_run_at,
                    "Scheduled report delivered"
                );
            }
            Err(e) => {
                error!(report_id = %report.id, error = %e, "Failed to record scheduled run");
            }
        }
    }
    ran
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{
        CreateReportInput, ExportFormat, ReportSchedule, ReportType, ReportVisualization,
        ScheduleFrequency,
    };
    use crate::error::{AppError, Result};
    use crate::models::AnalyticsQuery;
    use crate::render::Renderer;
    use crate::services::exporter::{ExportResponse, ReportExporter};
    use crate::state::Backends;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct UnavailableExporter;

    #[async_trait]
    impl ReportExporter for UnavailableExporter {
        async fn export_report(&self, _id: &str, _format: ExportFormat) -> Result<ExportResponse> {
            Err(AppError::Upstream {
                status: 503,
                message: "export service unavailable".into(),
            })
        }

        async fn export_query(
            &self,
            _query: &AnalyticsQuery,
            _format: ExportFormat,
        ) -> Result<ExportResponse> {
            Err(AppError::Upstream {
                status: 503,
                message: "export service unavailable".into(),
            })
        }
    }

    fn scheduled_input() -> CreateReportInput {
        CreateReportInput {
            name: "Nightly fraud".into(),
            description: String::new(),
            report_type: ReportType::Fraud,
            filters: Default::default(),
            metrics: vec!["fraud_rate".into()],
            visualization: ReportVisualization::default(),
            schedule: Some(ReportSchedule {
                frequency: ScheduleFrequency::Daily,
                time: "02:00".into(),
                day_of_week: None,
                day_of_month: None,
                recipients: vec!["risk@example.com".into()],
                format: ExportFormat::Csv,
            }),
        }
    }

    #[tokio::test]
    async fn test_due_report_runs_once() {
        let state = AppState::mock(Config::default(), 4);
        let report = state.store.create(scheduled_input(), "ops").await.unwrap();
        let due_at = report.next_run_at.unwrap();

        assert_eq!(run_due_reports(&state, due_at - chrono::Duration::minutes(1)).await, 0);
        assert_eq!(run_due_reports(&state, due_at).await, 1);
        // Already advanced to the next day
        assert_eq!(run_due_reports(&state, due_at).await, 0);

        let stored = state.store.get(&report.id).await.unwrap();
        assert_eq!(stored.last_run_at, Some(due_at));
        assert_eq!(stored.next_run_at, Some(due_at + chrono::Duration::days(1)));

        let metrics = state.metrics.snapshot();
        assert_eq!(metrics.scheduled_runs_total, 1);
        assert_eq!(metrics.exports_total, 1);
    }

    #[tokio::test]
    async fn test_failed_export_advances_schedule() {
        let backends = Backends {
            exporter: Arc::new(UnavailableExporter),
            ..Backends::mock(Some(4))
        };
        let state = AppState::new(Config::default(), backends, Renderer::default());
        let report = state.store.create(scheduled_input(), "ops").await.unwrap();
        let due_at = report.next_run_at.unwrap();

        assert_eq!(run_due_reports(&state, due_at).await, 0);
        // The abandoned run is not retried on later ticks
        assert_eq!(run_due_reports(&state, due_at).await, 0);
        assert_eq!(run_due_reports(&state, due_at + chrono::Duration::minutes(5)).await, 0);

        let stored = state.store.get(&report.id).await.unwrap();
        assert_eq!(stored.last_run_at, None);
        assert_eq!(stored.next_run_at, Some(due_at + chrono::Duration::days(1)));

        let metrics = state.metrics.snapshot();
        assert_eq!(metrics.exports_failed_total, 1);
        assert_eq!(metrics.scheduled_runs_abandoned_total, 1);
        assert_eq!(metrics.scheduled_runs_total, 0);
    }
}
