//! Export adapter: asks a rendering service for a downloadable artifact

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::Result;
use crate::models::{AnalyticsQuery, ExportFormat};
use crate::services::upstream::UpstreamClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub download_url: String,
}

/// Produces download links; no file is ever generated locally.
#[async_trait]
pub trait ReportExporter: Send + Sync {
    async fn export_report(&self, report_id: &str, format: ExportFormat) -> Result<ExportResponse>;

    async fn export_query(
        &self,
        query: &AnalyticsQuery,
        format: ExportFormat,
    ) -> Result<ExportResponse>;
}

/// Hands out placeholder links.
#[derive(Debug, Clone, Default)]
pub struct MockExporter;

#[async_trait]
impl ReportExporter for MockExporter {
    async fn export_report(
        &self,
        _report_id: &str,
        format: ExportFormat,
    ) -> Result<ExportResponse> {
        Ok(ExportResponse {
            download_url: format!("https://example.com/mock-report.{}", format.as_str()),
        })
    }

    async fn export_query(
        &self,
        query: &AnalyticsQuery,
        format: ExportFormat,
    ) -> Result<ExportResponse> {
        query.validate()?;
        Ok(ExportResponse {
            download_url: format!(
                "https://example.com/mock-report-{}.{}",
                query.key(),
                format.as_str()
            ),
        })
    }
}

/// Forwards export requests to the upstream service.
pub struct RemoteExporter {
    upstream: UpstreamClient,
}

impl RemoteExporter {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl ReportExporter for RemoteExporter {
    async fn export_report(&self, report_id: &str, format: ExportFormat) -> Result<ExportResponse> {
        self.upstream
            .post_json(
                &format!("/api/analytics/reports/{}/export", report_id),
                &json!({ "format": format }),
            )
            .await
    }

    async fn export_query(
        &self,
        query: &AnalyticsQuery,
        format: ExportFormat,
    ) -> Result<ExportResponse> {
        query.validate()?;
        self.upstream
            .post_json(
                "/api/analytics/export",
                &json!({ "query": query, "format": format }),
            )
            .await
    }
}
