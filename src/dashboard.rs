//! Fraud dashboard overview and the live analytics snapshot feed

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Result;
use crate::filters::Filters;
use crate::models::{AnalyticsQuery, AnalyticsResult, DateRange};
use crate::services::executor::QueryExecutor;
use crate::services::upstream::UpstreamClient;
use crate::single_flight::SingleFlight;

/// Days covered by the analytics dashboard query.
pub const DASHBOARD_WINDOW_DAYS: i64 = 30;

pub const DASHBOARD_METRICS: [&str; 3] = ["total_transactions", "total_amount", "fraud_rate"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_transactions: u64,
    pub total_volume: f64,
    pub fraud_alerts: u64,
    pub pattern_detections: u64,
    pub success_rate: f64,
    pub average_transaction_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTrend {
    pub date: String,
    pub volume: f64,
    pub transactions: u64,
    pub fraud_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Velocity,
    Amount,
    Location,
    Merchant,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    New,
    Investigating,
    Resolved,
    FalsePositive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudAlert {
    pub id: String,
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub status: AlertStatus,
    pub risk_score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Recurring,
    Anomaly,
    Cluster,
    Velocity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternInsight {
    pub id: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub description: String,
    pub confidence: f64,
    pub affected_transactions: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Everything the fraud overview page shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub metrics: DashboardMetrics,
    pub trends: Vec<TransactionTrend>,
    pub recent_alerts: Vec<FraudAlert>,
    pub pattern_insights: Vec<PatternInsight>,
}

#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn overview(&self) -> Result<DashboardData>;
}

/// Serves the canned demo overview.
#[derive(Debug, Clone, Default)]
pub struct MockDashboard;

#[async_trait]
impl DashboardSource for MockDashboard {
    async fn overview(&self) -> Result<DashboardData> {
        Ok(mock_overview())
    }
}

/// Assembles the overview from four upstream endpoints fetched concurrently.
pub struct RemoteDashboard {
    upstream: UpstreamClient,
}

impl RemoteDashboard {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl DashboardSource for RemoteDashboard {
    async fn overview(&self) -> Result<DashboardData> {
        let (metrics, trends, recent_alerts, pattern_insights) = tokio::try_join!(
            self.upstream.get_json::<DashboardMetrics>("/api/dashboard/metrics"),
            self.upstream.get_json::<Vec<TransactionTrend>>("/api/dashboard/trends"),
            self.upstream.get_json::<Vec<FraudAlert>>("/api/dashboard/alerts/recent"),
            self.upstream.get_json::<Vec<PatternInsight>>("/api/dashboard/patterns"),
        )?;
        Ok(DashboardData {
            metrics,
            trends,
            recent_alerts,
            pattern_insights,
        })
    }
}

/// Headline numbers pulled out of the dashboard query's summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub transactions: f64,
    pub revenue: f64,
    pub fraud_rate: f64,
}

impl DashboardStats {
    /// Missing or non-numeric summary entries count as zero.
    pub fn from_summary(summary: &Map<String, Value>) -> Self {
        let number = |key: &str| summary.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        Self {
            transactions: number("total_transactions"),
            revenue: number("total_amount"),
            fraud_rate: number("fraud_rate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub stats: DashboardStats,
    pub result: AnalyticsResult,
    pub refreshed_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    pub fn new(result: AnalyticsResult, refreshed_at: DateTime<Utc>) -> Self {
        Self {
            stats: DashboardStats::from_summary(&result.summary),
            result,
            refreshed_at,
        }
    }
}

/// Daily totals, volume and fraud rate over the trailing window.
pub fn dashboard_query(now: DateTime<Utc>) -> AnalyticsQuery {
    AnalyticsQuery {
        metrics: DASHBOARD_METRICS.iter().map(|m| m.to_string()).collect(),
        dimensions: vec!["date".to_string()],
        filters: Filters::default(),
        date_range: DateRange::last_days(now, DASHBOARD_WINDOW_DAYS),
        group_by: None,
        limit: None,
        offset: None,
    }
}

/// Outcome of one refresh attempt
#[derive(Debug)]
pub enum Refresh {
    Published(DashboardSnapshot),
    /// A fetch for the same query was still outstanding
    Skipped,
}

/// Latest dashboard snapshot plus its subscribers.
///
/// Fetches are de-duplicated by the query's rolling key; the last completed
/// fetch wins.
#[derive(Clone)]
pub struct DashboardFeed {
    latest: Arc<RwLock<Option<DashboardSnapshot>>>,
    tx: broadcast::Sender<DashboardSnapshot>,
    flights: SingleFlight,
}

impl DashboardFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            latest: Arc::new(RwLock::new(None)),
            tx,
            flights: SingleFlight::new(),
        }
    }

    pub fn latest(&self) -> Option<DashboardSnapshot> {
        self.latest.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardSnapshot> {
        self.tx.subscribe()
    }

    pub fn subscribers(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Store `snapshot` as the latest and fan it out to subscribers.
    pub fn publish(&self, snapshot: DashboardSnapshot) {
        *self.latest.write() = Some(snapshot.clone());
        // No subscribers is fine
        let _ = self.tx.send(snapshot);
    }

    /// Execute the dashboard query unless one is already running.
    pub async fn refresh(&self, executor: &dyn QueryExecutor) -> Result<Refresh> {
        let query = dashboard_query(Utc::now());
        let key = query.rolling_key();
        let Some(_guard) = self.flights.try_acquire(key.as_str()) else {
            debug!(
                query_key = %key,
                in_flight = self.flights.len(),
                "Dashboard fetch still in flight"
            );
            return Ok(Refresh::Skipped);
        };

        let result = executor.execute(&query).await?;
        let snapshot = DashboardSnapshot::new(result, Utc::now());
        self.publish(snapshot.clone());
        Ok(Refresh::Published(snapshot))
    }
}

fn timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default()
}

fn trend(date: &str, volume: f64, transactions: u64, fraud_count: u64) -> TransactionTrend {
    TransactionTrend {
        date: date.to_string(),
        volume,
        transactions,
        fraud_count,
    }
}

#[allow(clippy::too_many_arguments)]
fn alert(
    id: &str,
    transaction_id: &str,
    alert_type: AlertType,
    severity: AlertSeverity,
    description: &str,
    at: &str,
    status: AlertStatus,
    risk_score: u8,
) -> FraudAlert {
    FraudAlert {
        id: id.to_string(),
        transaction_id: transaction_id.to_string(),
        alert_type,
        severity,
        description: description.to_string(),
        timestamp: timestamp(at),
        status,
        risk_score,
    }
}

fn insight(
    id: &str,
    insight_type: InsightType,
    description: &str,
    confidence: f64,
    affected_transactions: u64,
    at: &str,
    metadata: Value,
) -> PatternInsight {
    PatternInsight {
        id: id.to_string(),
        insight_type,
        description: description.to_string(),
        confidence,
        affected_transactions,
        timestamp: timestamp(at),
        metadata: metadata.as_object().cloned(),
    }
}

/// Demo overview served when no upstream is configured.
pub fn mock_overview() -> DashboardData {
    DashboardData {
        metrics: DashboardMetrics {
            total_transactions: 45_632,
            total_volume: 2_847_563.89,
            fraud_alerts: 127,
            pattern_detections: 43,
            success_rate: 98.7,
            average_transaction_value: 62.43,
        },
        trends: vec![
            trend("2024-01-01", 234_567.89, 3456, 12),
            trend("2024-01-02", 245_678.9, 3678, 8),
            trend("2024-01-03", 256_789.01, 3890, 15),
            trend("2024-01-04", 267_890.12, 4012, 6),
            trend("2024-01-05", 278_901.23, 4234, 19),
            trend("2024-01-06", 289_012.34, 4456, 11),
            trend("2024-01-07", 300_123.45, 4678, 7),
        ],
        recent_alerts: vec![
            alert(
                "alert-001",
                "txn-12345",
                AlertType::Velocity,
                AlertSeverity::High,
                "Unusual transaction velocity detected - 15 transactions in 2 minutes",
                "2024-01-07T14:30:00Z",
                AlertStatus::New,
                85,
            ),
            alert(
                "alert-002",
                "txn-12346",
                AlertType::Amount,
                AlertSeverity::Critical,
                "Transaction amount significantly exceeds user's typical spending pattern",
                "2024-01-07T14:15:00Z",
                AlertStatus::Investigating,
                95,
            ),
            alert(
                "alert-003",
                "txn-12347",
                AlertType::Location,
                AlertSeverity::Medium,
                "Transaction from unusual geographic location",
                "2024-01-07T13:45:00Z",
                AlertStatus::New,
                72,
            ),
            alert(
                "alert-004",
                "txn-12348",
                AlertType::Merchant,
                AlertSeverity::Low,
                "First-time merchant interaction with high-risk category",
                "2024-01-07T13:20:00Z",
                AlertStatus::Resolved,
                58,
            ),
        ],
        pattern_insights: vec![
            insight(
                "pattern-001",
                InsightType::Recurring,
                "Recurring transaction pattern identified for merchant \"Coffee Shop Chain\"",
                0.94,
                156,
                "2024-01-07T12:00:00Z",
                json!({"merchantId": "merch-789", "frequency": "daily"}),
            ),
            insight(
                "pattern-002",
                InsightType::Anomaly,
                "Anomalous spending pattern detected during late-night hours",
                0.87,
                23,
                "2024-01-07T11:30:00Z",
                json!({"timeRange": "23:00-03:00", "avgAmount": "245.67"}),
            ),
            insight(
                "pattern-003",
                InsightType::Cluster,
                "Geographic clustering of transactions suggesting coordinated activity",
                0.91,
                89,
                "2024-01-07T10:15:00Z",
                json!({"location": "Downtown District", "radius": "2km"}),
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::executor::MockExecutor;

    #[test]
    fn test_mock_overview_round_trips_wire_names() {
        let value = serde_json::to_value(mock_overview()).unwrap();
        assert_eq!(value["metrics"]["totalTransactions"], 45_632);
        assert_eq!(value["trends"].as_array().unwrap().len(), 7);
        assert_eq!(value["recentAlerts"][0]["type"], "velocity");
        assert_eq!(value["recentAlerts"][0]["riskScore"], 85);
        assert_eq!(value["recentAlerts"][0]["timestamp"], "2024-01-07T14:30:00Z");
        assert_eq!(value["patternInsights"][2]["metadata"]["radius"], "2km");

        let back: DashboardData = serde_json::from_value(value).unwrap();
        assert_eq!(back, mock_overview());
    }

    #[test]
    fn test_false_positive_status_wire_name() {
        let status: AlertStatus = serde_json::from_str("\"false_positive\"").unwrap();
        assert_eq!(status, AlertStatus::FalsePositive);
    }

    #[test]
    fn test_dashboard_query_shape() {
        let now = Utc::now();
        let query = dashboard_query(now);
        assert_eq!(query.metrics, DASHBOARD_METRICS);
        assert_eq!(query.dimensions, vec!["date"]);
        assert_eq!(query.date_range.to, now);
        assert_eq!((query.date_range.to - query.date_range.from).num_days(), 30);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_stats_from_summary() {
        let summary = json!({
            "total_transactions": 1200,
            "total_amount": 5400.5,
            "fraud_rate": "n/a"
        });
        let stats = DashboardStats::from_summary(summary.as_object().unwrap());
        assert_eq!(stats.transactions, 1200.0);
        assert_eq!(stats.revenue, 5400.5);
        assert_eq!(stats.fraud_rate, 0.0);
    }

    #[tokio::test]
    async fn test_refresh_publishes_to_subscribers() {
        let feed = DashboardFeed::new(4);
        let mut rx = feed.subscribe();
        let executor = MockExecutor::with_seed(9);

        let refresh = feed.refresh(&executor).await.unwrap();
        let Refresh::Published(snapshot) = refresh else {
            panic!("expected a published snapshot");
        };
        assert_eq!(snapshot.result.data.len(), 30);
        assert_eq!(feed.latest(), Some(snapshot.clone()));
        assert_eq!(rx.recv().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_refresh_skips_while_in_flight() {
        let feed = DashboardFeed::new(4);
        let key = dashboard_query(Utc::now()).rolling_key();
        let _held = feed.flights.try_acquire(key.as_str()).unwrap();

        let refresh = feed.refresh(&MockExecutor::with_seed(1)).await.unwrap();
        assert!(matches!(refresh, Refresh::Skipped));
        assert!(feed.latest().is_none());
    }
}
