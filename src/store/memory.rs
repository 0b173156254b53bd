use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{new_report_id, ReportStore};
use crate::error::{AppError, Result};
use crate::models::{CreateReportInput, Report, UpdateReportInput};
use crate::pagination::{Page, PageParams};

/// Process-local store used in mock mode and tests.
#[derive(Default)]
pub struct MemoryReportStore {
    /// Creation order, oldest first
    reports: RwLock<Vec<Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn modify<F>(&self, id: &str, f: F) -> Result<Report>
    where
        F: FnOnce(&mut Report),
    {
        let mut reports = self.reports.write();
        let report = reports
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::NotFound(format!("report '{}'", id)))?;
        f(report);
        Ok(report.clone())
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn create(&self, input: CreateReportInput, created_by: &str) -> Result<Report> {
        let report = Report::from_input(new_report_id(), input, created_by, Utc::now());
        self.reports.write().push(report.clone());
        Ok(report)
    }

    async fn list(&self, params: PageParams) -> Result<Page<Report>> {
        let reports = self.reports.read();
        let newest_first: Vec<Report> = reports.iter().rev().cloned().collect();
        Ok(Page::from_slice(&newest_first, params))
    }

    async fn get(&self, id: &str) -> Result<Report> {
        self.reports
            .read()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("report '{}'", id)))
    }

    async fn update(&self, id: &str, input: UpdateReportInput) -> Result<Report> {
        let now = Utc::now();
        self.modify(id, |report| report.apply_update(input, now))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut reports = self.reports.write();
        let before = reports.len();
        reports.retain(|r| r.id != id);
        Ok(reports.len() < before)
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<Report>> {
        let mut due: Vec<Report> = self
            .reports
            .read()
            .iter()
            .filter(|r| r.next_run_at.is_some_and(|next| next <= now))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.next_run_at);
        Ok(due)
    }

    async fn record_run(&self, id: &str, ran_at: DateTime<Utc>) -> Result<Report> {
        self.modify(id, |report| report.record_run(ran_at))
    }

    async fn skip_run(&self, id: &str, at: DateTime<Utc>) -> Result<Report> {
        self.modify(id, |report| report.skip_run(at))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
