//! Report store: CRUD over persisted report definitions
//!
//! Last write wins. There is no version check and no soft delete.

mod memory;
mod postgres;
mod remote;

pub use memory::MemoryReportStore;
pub use postgres::PgReportStore;
pub use remote::RemoteReportStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{CreateReportInput, Report, UpdateReportInput};
use crate::pagination::{Page, PageParams};

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist a new report with a fresh id and timestamps.
    async fn create(&self, input: CreateReportInput, created_by: &str) -> Result<Report>;

    /// One page of reports, newest first.
    async fn list(&self, params: PageParams) -> Result<Page<Report>>;

    /// Fails with `NotFound` for unknown ids.
    async fn get(&self, id: &str) -> Result<Report>;

    /// Merge `input` into the stored report.
    async fn update(&self, id: &str, input: UpdateReportInput) -> Result<Report>;

    /// Returns whether a report was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Scheduled reports whose next run is at or before `now`.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Report>>;

    /// Stamp a run and advance the report's schedule.
    async fn record_run(&self, id: &str, ran_at: DateTime<Utc>) -> Result<Report>;

    /// Advance the schedule of a run that was abandoned; `lastRunAt` is kept.
    async fn skip_run(&self, id: &str, at: DateTime<Utc>) -> Result<Report>;

    /// Cheap reachability check for readiness probes.
    async fn ping(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

pub(crate) fn new_report_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
