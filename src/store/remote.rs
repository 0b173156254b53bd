use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ReportStore;
use crate::error::{AppError, Result};
use crate::models::{CreateReportInput, Report, UpdateReportInput};
use crate::pagination::{Page, PageParams};
use crate::services::upstream::UpstreamClient;

const REPORTS_PATH: &str = "/api/analytics/reports";

/// Delegates persistence to the upstream reports API.
///
/// The upstream service runs its own schedules, so nothing is ever due here.
pub struct RemoteReportStore {
    upstream: UpstreamClient,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody<'a> {
    #[serde(flatten)]
    input: &'a CreateReportInput,
    created_by: &'a str,
}

impl RemoteReportStore {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    fn report_path(id: &str) -> String {
        format!("{}/{}", REPORTS_PATH, id)
    }
}

#[async_trait]
impl ReportStore for RemoteReportStore {
    async fn create(&self, input: CreateReportInput, created_by: &str) -> Result<Report> {
        let body = CreateBody {
            input: &input,
            created_by,
        };
        self.upstream.post_json(REPORTS_PATH, &body).await
    }

    async fn list(&self, params: PageParams) -> Result<Page<Report>> {
        let query = [("page", params.page()), ("limit", params.limit())];
        self.upstream.get_json_with_query(REPORTS_PATH, &query).await
    }

    async fn get(&self, id: &str) -> Result<Report> {
        self.upstream.get_json(&Self::report_path(id)).await
    }

    async fn update(&self, id: &str, input: UpdateReportInput) -> Result<Report> {
        self.upstream.put_json(&Self::report_path(id), &input).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        match self.upstream.delete(&Self::report_path(id)).await {
            Ok(()) => Ok(true),
            Err(AppError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn due(&self, _now: DateTime<Utc>) -> Result<Vec<Report>> {
        Ok(Vec::new())
    }

    async fn record_run(&self, id: &str, _ran_at: DateTime<Utc>) -> Result<Report> {
        self.get(id).await
    }

    async fn skip_run(&self, id: &str, _at: DateTime<Utc>) -> Result<Report> {
        self.get(id).await
    }

    async fn ping(&self) -> Result<()> {
        let query = [("page", 1), ("limit", 1)];
        self.upstream
            .get_json_with_query::<Page<Report>, _>(REPORTS_PATH, &query)
            .await
            .map(|_| ())
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}
