//! Query executors: synthetic data for demos, pass-through for production

use std::time::Instant;

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::catalog::MetricCatalog;
use crate::error::Result;
use crate::models::{
    AggregationType, AnalyticsMetric, AnalyticsQuery, AnalyticsResult, MetricDataType,
    ResultMetadata, Row,
};
use crate::render::humanize_key;
use crate::services::upstream::UpstreamClient;

/// Rows a synthetic result holds at most.
pub const MOCK_MAX_ROWS: usize = 30;

/// Runs analytics queries and describes the metrics it can answer.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a query. Invalid queries are rejected before any work is done.
    async fn execute(&self, query: &AnalyticsQuery) -> Result<AnalyticsResult>;

    /// Metric catalog backing this executor.
    async fn catalog(&self) -> Result<MetricCatalog>;

    fn name(&self) -> &'static str;
}

/// Generates pseudo-random rows shaped after the requested metrics.
pub struct MockExecutor {
    catalog: MetricCatalog,
    rng: Mutex<StdRng>,
    max_rows: usize,
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Deterministic generator, for tests and reproducible demos.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            catalog: MetricCatalog::builtin(),
            rng: Mutex::new(rng),
            max_rows: MOCK_MAX_ROWS,
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    fn data_type(&self, metric: &str) -> MetricDataType {
        self.catalog
            .get(metric)
            .map(|m| m.data_type)
            .unwrap_or(MetricDataType::Number)
    }

    fn aggregation(&self, metric: &str) -> AggregationType {
        self.catalog
            .get(metric)
            .map(|m| m.aggregation_type)
            .unwrap_or(AggregationType::Sum)
    }

    fn generate_rows(&self, query: &AnalyticsQuery) -> Vec<Row> {
        let dimension = query
            .dimensions
            .first()
            .map(String::as_str)
            .unwrap_or("date");
        let end = query.date_range.to.date_naive();
        let span_days = (end - query.date_range.from.date_naive()).num_days().max(0) as usize + 1;
        let total = span_days.min(self.max_rows);

        let mut rng = self.rng.lock();
        (0..total)
            .map(|i| {
                let mut row = Map::new();
                let category = if dimension == "date" {
                    (end - Duration::days(i as i64)).format("%Y-%m-%d").to_string()
                } else {
                    format!("{} {}", humanize_key(dimension), i + 1)
                };
                row.insert(dimension.to_string(), Value::from(category));
                for metric in &query.metrics {
                    let value = match self.data_type(metric) {
                        MetricDataType::Count => Value::from(rng.gen_range(100..1100_i64)),
                        MetricDataType::Currency => Value::from(rng.gen_range(10_000..110_000_i64)),
                        MetricDataType::Percentage => number_value(rng.gen_range(0.0..0.05)),
                        MetricDataType::Number => {
                            number_value((rng.gen_range(0.0..1000.0_f64) * 100.0).round() / 100.0)
                        }
                    };
                    row.insert(metric.clone(), value);
                }
                row
            })
            .collect()
    }

    fn summarize(&self, query: &AnalyticsQuery, rows: &[Row]) -> Map<String, Value> {
        query
            .metrics
            .iter()
            .map(|metric| {
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| row.get(metric).and_then(Value::as_f64))
                    .collect();
                (metric.clone(), number_value(aggregate(self.aggregation(metric), &values)))
            })
            .collect()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(&self, query: &AnalyticsQuery) -> Result<AnalyticsResult> {
        query.validate()?;
        let started = Instant::now();

        let all_rows = self.generate_rows(query);
        let total_rows = all_rows.len();
        let data: Vec<Row> = all_rows
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        let summary = self.summarize(query, &data);

        let result = AnalyticsResult {
            data,
            summary,
            metadata: ResultMetadata {
                total_rows,
                execution_time_ms: started.elapsed().as_millis() as u64,
                query: serde_json::to_string(query)?,
            },
        };

        debug!(
            query_key = %query.key(),
            rows = result.data.len(),
            "Generated synthetic analytics result"
        );
        Ok(result)
    }

    async fn catalog(&self) -> Result<MetricCatalog> {
        Ok(self.catalog.clone())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Forwards queries to the upstream aggregation endpoint.
pub struct RemoteExecutor {
    upstream: UpstreamClient,
}

impl RemoteExecutor {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl QueryExecutor for RemoteExecutor {
    async fn execute(&self, query: &AnalyticsQuery) -> Result<AnalyticsResult> {
        query.validate()?;
        self.upstream.post_json("/api/analytics/query", query).await
    }

    async fn catalog(&self) -> Result<MetricCatalog> {
        let metrics: Vec<AnalyticsMetric> = self.upstream.get_json("/api/analytics/metrics").await?;
        Ok(MetricCatalog::new(metrics))
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

fn aggregate(kind: AggregationType, values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match kind {
        AggregationType::Sum => values.iter().sum(),
        AggregationType::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregationType::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationType::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationType::Count => values.len() as f64,
    }
}

/// Integral values serialize as integers, everything else as floats.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::filters::Filters;
    use crate::models::DateRange;
    use chrono::{TimeZone, Utc};

    fn query(metrics: &[&str], days: i64) -> AnalyticsQuery {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        AnalyticsQuery {
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            dimensions: vec!["date".into()],
            filters: Filters::default(),
            date_range: DateRange::last_days(now, days),
            group_by: None,
            limit: None,
            offset: None,
        }
    }

    #[tokio::test]
    async fn test_rows_follow_requested_metrics() {
        let executor = MockExecutor::with_seed(7);
        let result = executor
            .execute(&query(&["fraud_rate", "total_transactions"], 90))
            .await
            .unwrap();

        assert_eq!(result.data.len(), MOCK_MAX_ROWS);
        assert_eq!(result.metadata.total_rows, MOCK_MAX_ROWS);

        let first = &result.data[0];
        let keys: Vec<_> = first.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["date", "fraud_rate", "total_transactions"]);
        assert_eq!(first["date"], "2024-01-31");
        assert_eq!(result.data[1]["date"], "2024-01-30");

        for row in &result.data {
            let rate = row["fraud_rate"].as_f64().unwrap();
            assert!((0.0..0.05).contains(&rate));
            let count = row["total_transactions"].as_i64().unwrap();
            assert!((100..1100).contains(&count));
        }
    }

    #[tokio::test]
    async fn test_summary_uses_aggregation_type() {
        let executor = MockExecutor::with_seed(11);
        let result = executor
            .execute(&query(&["total_transactions", "fraud_rate"], 6))
            .await
            .unwrap();
        assert_eq!(result.data.len(), 7);

        let sum: i64 = result
            .data
            .iter()
            .map(|row| row["total_transactions"].as_i64().unwrap())
            .sum();
        assert_eq!(result.summary["total_transactions"].as_i64(), Some(sum));

        let avg = result.summary["fraud_rate"].as_f64().unwrap();
        assert!((0.0..0.05).contains(&avg));
    }

    #[tokio::test]
    async fn test_limit_and_offset() {
        let executor = MockExecutor::with_seed(3);
        let mut q = query(&["total_amount"], 30);
        q.offset = Some(5);
        q.limit = Some(10);
        let result = executor.execute(&q).await.unwrap();
        assert_eq!(result.data.len(), 10);
        assert_eq!(result.data[0]["date"], "2024-01-26");
        assert_eq!(result.metadata.total_rows, MOCK_MAX_ROWS);
    }

    #[tokio::test]
    async fn test_same_seed_same_rows() {
        let q = query(&["total_amount"], 10);
        let a = MockExecutor::with_seed(42).execute(&q).await.unwrap();
        let b = MockExecutor::with_seed(42).execute(&q).await.unwrap();
        assert_eq!(a.data, b.data);
        let echoed: AnalyticsQuery = serde_json::from_str(&a.metadata.query).unwrap();
        assert_eq!(echoed, q);
    }

    #[tokio::test]
    async fn test_empty_metrics_rejected() {
        let executor = MockExecutor::with_seed(1);
        let err = executor.execute(&query(&[], 30)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_non_date_dimension() {
        let executor = MockExecutor::with_seed(5).with_max_rows(3);
        let mut q = query(&["total_amount"], 30);
        q.dimensions = vec!["merchant".into()];
        let result = executor.execute(&q).await.unwrap();
        assert_eq!(result.data.len(), 3);
        assert_eq!(result.data[2]["merchant"], "Merchant 3");
    }

    #[test]
    fn test_aggregate() {
        let values = [2.0, 4.0, 9.0];
        assert_eq!(aggregate(AggregationType::Sum, &values), 15.0);
        assert_eq!(aggregate(AggregationType::Avg, &values), 5.0);
        assert_eq!(aggregate(AggregationType::Min, &values), 2.0);
        assert_eq!(aggregate(AggregationType::Max, &values), 9.0);
        assert_eq!(aggregate(AggregationType::Count, &values), 3.0);
        assert_eq!(aggregate(AggregationType::Max, &[]), 0.0);
    }
}
