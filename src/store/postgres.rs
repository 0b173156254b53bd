//! PostgreSQL-backed report store

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::info;

use super::{new_report_id, ReportStore};
use crate::error::{AppError, Result};
use crate::filters::Filters;
use crate::models::{
    CreateReportInput, Report, ReportSchedule, ReportType, ReportVisualization, UpdateReportInput,
};
use crate::pagination::{Page, PageParams};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS analytics_reports (
    id            TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    report_type   TEXT NOT NULL,
    created_by    TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL,
    schedule      JSONB,
    filters       JSONB NOT NULL DEFAULT '{}',
    metrics       JSONB NOT NULL,
    visualization JSONB NOT NULL,
    last_run_at   TIMESTAMPTZ,
    next_run_at   TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS analytics_reports_created_at_idx ON analytics_reports (created_at DESC);
CREATE INDEX IF NOT EXISTS analytics_reports_next_run_idx ON analytics_reports (next_run_at)
    WHERE next_run_at IS NOT NULL;
"#;

const COLUMNS: &str = "id, name, description, report_type, created_by, created_at, updated_at, \
                       schedule, filters, metrics, visualization, last_run_at, next_run_at";

/// Report store over a Postgres connection pool
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    /// Connect and make sure the reports table exists.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(connection_string)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect: {}", e)))?;

        info!("Database connection pool established");
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    async fn write(&self, report: &Report) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE analytics_reports SET
                name = $2, description = $3, report_type = $4, updated_at = $5,
                schedule = $6, filters = $7, metrics = $8, visualization = $9,
                last_run_at = $10, next_run_at = $11
            WHERE id = $1
            "#,
        )
        .bind(&report.id)
        .bind(&report.name)
        .bind(&report.description)
        .bind(report.report_type.as_str())
        .bind(report.updated_at)
        .bind(report.schedule.as_ref().map(Json))
        .bind(Json(&report.filters))
        .bind(Json(&report.metrics))
        .bind(Json(&report.visualization))
        .bind(report.last_run_at)
        .bind(report.next_run_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn create(&self, input: CreateReportInput, created_by: &str) -> Result<Report> {
        let report = Report::from_input(new_report_id(), input, created_by, Utc::now());

        sqlx::query(
            r#"
            INSERT INTO analytics_reports (
                id, name, description, report_type, created_by, created_at, updated_at,
                schedule, filters, metrics, visualization, last_run_at, next_run_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(&report.id)
        .bind(&report.name)
        .bind(&report.description)
        .bind(report.report_type.as_str())
        .bind(&report.created_by)
        .bind(report.created_at)
        .bind(report.updated_at)
        .bind(report.schedule.as_ref().map(Json))
        .bind(Json(&report.filters))
        .bind(Json(&report.metrics))
        .bind(Json(&report.visualization))
        .bind(report.last_run_at)
        .bind(report.next_run_at)
        .execute(&self.pool)
        .await?;

        Ok(report)
    }

    async fn list(&self, params: PageParams) -> Result<Page<Report>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analytics_reports")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM analytics_reports ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            COLUMNS
        ))
        .bind(params.limit() as i64)
        .bind(params.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let results = rows.iter().map(report_from_row).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(results, params, total.max(0) as usize))
    }

    async fn get(&self, id: &str) -> Result<Report> {
        let row = sqlx::query(&format!("SELECT {} FROM analytics_reports WHERE id = $1", COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("report '{}'", id)))?;
        report_from_row(&row)
    }

    async fn update(&self, id: &str, input: UpdateReportInput) -> Result<Report> {
        let mut report = self.get(id).await?;
        report.apply_update(input, Utc::now());
        self.write(&report).await?;
        Ok(report)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM analytics_reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Report>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM analytics_reports \
             WHERE next_run_at IS NOT NULL AND next_run_at <= $1 ORDER BY next_run_at",
            COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(report_from_row).collect()
    }

    async fn record_run(&self, id: &str, ran_at: DateTime<Utc>) -> Result<Report> {
        let mut report = self.get(id).await?;
        report.record_run(ran_at);
        self.write(&report).await?;
        Ok(report)
    }

    async fn skip_run(&self, id: &str, at: DateTime<Utc>) -> Result<Report> {
        let mut report = self.get(id).await?;
        report.skip_run(at);
        self.write(&report).await?;
        Ok(report)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

fn report_from_row(row: &PgRow) -> Result<Report> {
    let report_type: String = row.try_get("report_type")?;
    let schedule: Option<Json<ReportSchedule>> = row.try_get("schedule")?;
    let filters: Json<Filters> = row.try_get("filters")?;
    let metrics: Json<Vec<String>> = row.try_get("metrics")?;
    let visualization: Json<ReportVisualization> = row.try_get("visualization")?;
    let schedule = schedule.map(|Json(s)| s);

    Ok(Report {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        report_type: report_type.parse::<ReportType>()?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        is_scheduled: schedule.is_some(),
        schedule,
        filters: filters.0,
        metrics: metrics.0,
        visualization: visualization.0,
        last_run_at: row.try_get("last_run_at")?,
        next_run_at: row.try_get("next_run_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_covers_selected_columns() {
        for column in COLUMNS.split(',').map(str::trim) {
            assert!(SCHEMA.contains(&format!("    {} ", column)), "missing column {}", column);
        }
    }
}
