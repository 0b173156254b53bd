//! Core domain models for the analytics pipeline

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::filters::Filters;

/// One result row. Key order is significant: the renderer treats the first
/// key as the category axis.
pub type Row = Map<String, Value>;

/// Inclusive time window of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    /// The `days` days leading up to `now`.
    pub fn last_days(now: DateTime<Utc>, days: i64) -> Self {
        Self {
            from: now - chrono::Duration::days(days),
            to: now,
        }
    }
}

/// Declarative query handed to an executor. Treated as immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    /// Metric identifiers, unique, in display order
    pub metrics: Vec<String>,
    /// Grouping keys; the first one becomes the row's leading column
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub filters: Filters,
    pub date_range: DateRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl AnalyticsQuery {
    /// Check the invariants every executor relies on.
    pub fn validate(&self) -> Result<()> {
        validate_metrics(&self.metrics)?;
        if self.date_range.from > self.date_range.to {
            return Err(AppError::validation("'from' must not be after 'to'"));
        }
        Ok(())
    }

    /// Logical identity of this query.
    pub fn key(&self) -> QueryKey {
        QueryKey::of(self)
    }

    /// Identity ignoring the date window, for rolling queries re-issued on a timer.
    pub fn rolling_key(&self) -> QueryKey {
        let epoch = DateTime::<Utc>::default();
        QueryKey::of(&AnalyticsQuery {
            date_range: DateRange {
                from: epoch,
                to: epoch,
            },
            ..self.clone()
        })
    }
}

/// A metric selection must be a non-empty ordered set of non-blank ids.
pub fn validate_metrics(metrics: &[String]) -> Result<()> {
    if metrics.is_empty() {
        return Err(AppError::validation("select at least one metric"));
    }
    for (i, metric) in metrics.iter().enumerate() {
        if metric.trim().is_empty() {
            return Err(AppError::validation("metric identifiers must not be blank"));
        }
        if metrics[..i].contains(metric) {
            return Err(AppError::validation(format!(
                "metric '{}' is selected more than once",
                metric
            )));
        }
    }
    Ok(())
}

/// Stable hash of a query's canonical JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn of(query: &AnalyticsQuery) -> Self {
        // Serialization of these types cannot fail; fall back to Debug just in case.
        let canonical =
            serde_json::to_string(query).unwrap_or_else(|_| format!("{:?}", query));
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        QueryKey(format!("{:016x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result envelope returned by every executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsResult {
    pub data: Vec<Row>,
    #[serde(default)]
    pub summary: Map<String, Value>,
    pub metadata: ResultMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub total_rows: usize,
    #[serde(alias = "executionTime")]
    pub execution_time_ms: u64,
    /// The executed query, echoed back as JSON text
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Transaction,
    Fraud,
    Pattern,
    Customer,
    Merchant,
    Custom,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Transaction => "transaction",
            ReportType::Fraud => "fraud",
            ReportType::Pattern => "pattern",
            ReportType::Customer => "customer",
            ReportType::Merchant => "merchant",
            ReportType::Custom => "custom",
        }
    }
}

impl FromStr for ReportType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        [
            ReportType::Transaction,
            ReportType::Fraud,
            ReportType::Pattern,
            ReportType::Customer,
            ReportType::Merchant,
            ReportType::Custom,
        ]
        .into_iter()
        .find(|t| t.as_str() == s)
        .ok_or_else(|| AppError::validation(format!("unknown report type '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleFrequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Pdf,
    Excel,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Excel => "excel",
        }
    }
}

/// Recurrence attached to a report. Absent means on-demand only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSchedule {
    pub frequency: ScheduleFrequency,
    /// Time of day, `HH:MM`, UTC
    pub time: String,
    /// 0 = Sunday
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default)]
    pub format: ExportFormat,
}

impl Default for ReportSchedule {
    fn default() -> Self {
        Self {
            frequency: ScheduleFrequency::Weekly,
            time: "09:00".to_string(),
            day_of_week: None,
            day_of_month: None,
            recipients: Vec::new(),
            format: ExportFormat::Pdf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Pie,
    Scatter,
    Table,
    Heatmap,
}

impl ChartType {
    pub const ALL: [ChartType; 6] = [
        ChartType::Line,
        ChartType::Bar,
        ChartType::Pie,
        ChartType::Scatter,
        ChartType::Table,
        ChartType::Heatmap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::Line => "line",
            ChartType::Bar => "bar",
            ChartType::Pie => "pie",
            ChartType::Scatter => "scatter",
            ChartType::Table => "table",
            ChartType::Heatmap => "heatmap",
        }
    }
}

impl FromStr for ChartType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        ChartType::ALL
            .into_iter()
            .find(|chart| chart.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unsupported chart type '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// How a report's result should be presented
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportVisualization {
    pub chart_type: ChartType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Default for ReportVisualization {
    fn default() -> Self {
        Self {
            chart_type: ChartType::Table,
            group_by: Some(Vec::new()),
            sort_by: None,
            sort_order: Some(SortOrder::Asc),
            limit: None,
        }
    }
}

/// A persisted, named query configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_scheduled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ReportSchedule>,
    #[serde(default)]
    pub filters: Filters,
    pub metrics: Vec<String>,
    pub visualization: ReportVisualization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl Report {
    /// Materialise a new report from user input.
    pub fn from_input(
        id: String,
        input: CreateReportInput,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let next_run_at = input
            .schedule
            .as_ref()
            .and_then(|schedule| schedule.next_run_after(now));
        Self {
            id,
            name: input.name,
            description: input.description,
            report_type: input.report_type,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            is_scheduled: input.schedule.is_some(),
            schedule: input.schedule,
            filters: input.filters,
            metrics: input.metrics,
            visualization: input.visualization,
            last_run_at: None,
            next_run_at,
        }
    }

    /// Merge a partial update; fields absent from `input` are kept.
    pub fn apply_update(&mut self, input: UpdateReportInput, now: DateTime<Utc>) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(description) = input.description {
            self.description = description;
        }
        if let Some(report_type) = input.report_type {
            self.report_type = report_type;
        }
        if let Some(filters) = input.filters {
            self.filters = filters;
        }
        if let Some(metrics) = input.metrics {
            self.metrics = metrics;
        }
        if let Some(visualization) = input.visualization {
            self.visualization = visualization;
        }
        if let Some(schedule) = input.schedule {
            self.next_run_at = schedule.as_ref().and_then(|s| s.next_run_after(now));
            self.is_scheduled = schedule.is_some();
            self.schedule = schedule;
        }
        self.updated_at = now;
    }

    /// Note a completed run and advance the schedule.
    pub fn record_run(&mut self, ran_at: DateTime<Utc>) {
        self.last_run_at = Some(ran_at);
        self.next_run_at = self
            .schedule
            .as_ref()
            .and_then(|schedule| schedule.next_run_after(ran_at));
    }

    /// Advance the schedule past `at` without recording a run.
    pub fn skip_run(&mut self, at: DateTime<Utc>) {
        self.next_run_at = self
            .schedule
            .as_ref()
            .and_then(|schedule| schedule.next_run_after(at));
    }

    /// Query that produces this report's data over `date_range`.
    ///
    /// A preset `timeRange` filter narrows or widens the window to end at
    /// `date_range.to`.
    pub fn to_query(&self, date_range: DateRange) -> AnalyticsQuery {
        let dimensions = self
            .visualization
            .group_by
            .clone()
            .filter(|group_by| !group_by.is_empty())
            .unwrap_or_else(|| vec!["date".to_string()]);
        AnalyticsQuery {
            metrics: self.metrics.clone(),
            dimensions,
            filters: self.filters.clone(),
            date_range: self.filters.window(date_range),
            group_by: None,
            limit: self.visualization.limit,
            offset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    #[serde(default)]
    pub filters: Filters,
    pub metrics: Vec<String>,
    pub visualization: ReportVisualization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ReportSchedule>,
}

/// Partial update. `schedule: null` clears the schedule, a missing key keeps it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub report_type: Option<ReportType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<ReportVisualization>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub schedule: Option<Option<ReportSchedule>>,
}

impl UpdateReportInput {
    /// Check the supplied fields and trim the name, as creation does.
    pub fn normalize(mut self) -> Result<Self> {
        if let Some(name) = self.name.take() {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::validation("report name must not be blank"));
            }
            self.name = Some(name.to_string());
        }
        if let Some(metrics) = &self.metrics {
            validate_metrics(metrics)?;
        }
        if let Some(Some(schedule)) = &self.schedule {
            schedule.validate()?;
        }
        Ok(self)
    }
}

/// Distinguishes an explicit `null` from a missing key.
fn deserialize_present<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricDataType {
    Number,
    Percentage,
    Currency,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

/// Catalog entry describing an aggregatable quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsMetric {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub data_type: MetricDataType,
    pub aggregation_type: AggregationType,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn query(metrics: &[&str]) -> AnalyticsQuery {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap();
        AnalyticsQuery {
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            dimensions: vec!["date".into()],
            filters: Filters::default(),
            date_range: DateRange::last_days(now, 30),
            group_by: None,
            limit: None,
            offset: None,
        }
    }

    #[test]
    fn test_query_validation() {
        assert!(query(&["total_amount"]).validate().is_ok());
        assert!(matches!(query(&[]).validate(), Err(AppError::Validation(_))));
        assert!(query(&["fraud_rate", "fraud_rate"]).validate().is_err());

        let mut inverted = query(&["total_amount"]);
        std::mem::swap(&mut inverted.date_range.from, &mut inverted.date_range.to);
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_query_key_is_stable_and_discriminating() {
        let a = query(&["total_amount", "fraud_rate"]);
        assert_eq!(a.key(), a.clone().key());
        assert_ne!(a.key(), query(&["fraud_rate", "total_amount"]).key());
        assert_eq!(a.key().as_str().len(), 16);
    }

    #[test]
    fn test_rolling_key_ignores_window() {
        let a = query(&["total_amount"]);
        let mut b = a.clone();
        b.date_range = DateRange::last_days(Utc::now(), 7);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.rolling_key(), b.rolling_key());
        assert_ne!(a.rolling_key(), query(&["fraud_rate"]).rolling_key());
    }

    #[test]
    fn test_result_accepts_legacy_execution_time() {
        let result: AnalyticsResult = serde_json::from_value(json!({
            "data": [{"date": "2024-01-01", "transactions": 10}],
            "summary": {},
            "metadata": {"totalRows": 1, "executionTime": 150, "query": "{}"}
        }))
        .unwrap();
        assert_eq!(result.metadata.execution_time_ms, 150);
        let keys: Vec<_> = result.data[0].keys().cloned().collect();
        assert_eq!(keys, vec!["date", "transactions"]);
    }

    #[test]
    fn test_update_schedule_null_vs_missing() {
        let cleared: UpdateReportInput =
            serde_json::from_value(json!({"schedule": null})).unwrap();
        assert_eq!(cleared.schedule, Some(None));

        let untouched: UpdateReportInput =
            serde_json::from_value(json!({"name": "X"})).unwrap();
        assert_eq!(untouched.schedule, None);
        assert_eq!(untouched.name.as_deref(), Some("X"));
    }

    #[test]
    fn test_update_normalize() {
        let update: UpdateReportInput =
            serde_json::from_value(json!({"name": "  Renamed "})).unwrap();
        assert_eq!(update.normalize().unwrap().name.as_deref(), Some("Renamed"));

        let duplicated: UpdateReportInput =
            serde_json::from_value(json!({"metrics": ["fraud_rate", "fraud_rate"]})).unwrap();
        assert!(matches!(duplicated.normalize(), Err(AppError::Validation(_))));

        let blank: UpdateReportInput =
            serde_json::from_value(json!({"metrics": ["fraud_rate", " "]})).unwrap();
        assert!(blank.normalize().is_err());

        let untouched = UpdateReportInput::default();
        assert_eq!(untouched.clone().normalize().unwrap(), untouched);
    }

    #[test]
    fn test_chart_type_parse() {
        assert_eq!("pie".parse::<ChartType>().unwrap(), ChartType::Pie);
        assert!("radar".parse::<ChartType>().is_err());
    }

    #[test]
    fn test_report_to_query_defaults_to_date_dimension() {
        let now = Utc::now();
        let input = CreateReportInput {
            name: "Weekly fraud".into(),
            description: String::new(),
            report_type: ReportType::Fraud,
            filters: Filters::default(),
            metrics: vec!["fraud_rate".into()],
            visualization: ReportVisualization::default(),
            schedule: None,
        };
        let report = Report::from_input("r1".into(), input, "analyst", now);
        let q = report.to_query(DateRange::last_days(now, 7));
        assert_eq!(q.dimensions, vec!["date"]);
        assert_eq!(q.metrics, vec!["fraud_rate"]);
        assert!(!report.is_scheduled);
        assert!(report.next_run_at.is_none());
    }

    #[test]
    fn test_report_to_query_honours_time_range_filter() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut filters = Filters::default();
        filters.set("timeRange", json!("last_7d")).unwrap();
        let input = CreateReportInput {
            name: "Last week".into(),
            description: String::new(),
            report_type: ReportType::Transaction,
            filters,
            metrics: vec!["total_amount".into()],
            visualization: ReportVisualization::default(),
            schedule: None,
        };
        let report = Report::from_input("r2".into(), input, "analyst", now);

        let q = report.to_query(DateRange::last_days(now, 30));
        assert_eq!(q.date_range, DateRange::last_days(now, 7));
    }
}
