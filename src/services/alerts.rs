//! Fraud alert review queue

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dashboard::AlertSeverity;
use crate::error::{AppError, Result};
use crate::pagination::{Page, PageParams, PagedQuery};
use crate::services::upstream::UpstreamClient;

/// Size of the synthetic alert queue.
pub const MOCK_ALERTS: usize = 160;

const MAX_RESOLUTION_LEN: usize = 1000;

/// Where an alert stands in the analyst workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Open,
    Investigating,
    Resolved,
    FalsePositive,
}

impl ReviewStatus {
    /// Resolved and false-positive alerts are closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, ReviewStatus::Resolved | ReviewStatus::FalsePositive)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub transaction_id: String,
    pub customer_id: String,
    pub title: String,
    pub description: String,
    pub severity: AlertSeverity,
    pub status: ReviewStatus,
    pub risk_score: u8,
    pub fraud_probability: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    /// Detection rules that fired
    #[serde(default)]
    pub triggers: Vec<String>,
}

impl Alert {
    /// Move to `update.status`. Closing stamps `resolved_at` and keeps the
    /// resolution note; reopening clears both.
    pub fn apply(&mut self, update: &UpdateAlertStatus, at: DateTime<Utc>) {
        self.status = update.status;
        self.updated_at = at;
        if update.status.is_closed() {
            self.resolved_at = Some(at);
            self.resolution = update.resolution.clone();
        } else {
            self.resolved_at = None;
            self.resolution = None;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<AlertSeverity>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        self.status.map_or(true, |s| alert.status == s)
            && self.severity.map_or(true, |s| alert.severity == s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAlertStatus {
    pub status: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl UpdateAlertStatus {
    /// Trim the resolution note; a blank note counts as none.
    pub fn normalize(self) -> Result<Self> {
        let resolution = self
            .resolution
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty());
        if resolution
            .as_ref()
            .is_some_and(|note| note.chars().count() > MAX_RESOLUTION_LEN)
        {
            return Err(AppError::validation(format!(
                "resolution must be at most {} characters",
                MAX_RESOLUTION_LEN
            )));
        }
        Ok(Self {
            status: self.status,
            resolution,
        })
    }
}

#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Newest first.
    async fn list(&self, filter: &AlertFilter, params: PageParams) -> Result<Page<Alert>>;

    async fn update_status(&self, id: &str, update: UpdateAlertStatus) -> Result<Alert>;
}

const DETECTIONS: [(&str, &[&str]); 5] = [
    ("Velocity spike", &["velocity_check"]),
    ("Unusual location", &["geo_mismatch", "new_device"]),
    ("High-value transfer", &["amount_threshold"]),
    ("Card testing pattern", &["small_amounts", "velocity_check"]),
    ("Possible account takeover", &["password_reset", "new_device"]),
];

/// Synthetic queue generated once at startup; status updates mutate it.
pub struct MockAlerts {
    /// Newest first
    alerts: RwLock<Vec<Alert>>,
}

impl Default for MockAlerts {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAlerts {
    pub fn new() -> Self {
        Self::generate(&mut StdRng::from_entropy(), Utc::now())
    }

    /// Deterministic queue, for tests and reproducible demos.
    pub fn with_seed(seed: u64) -> Self {
        Self::generate(&mut StdRng::seed_from_u64(seed), Utc::now())
    }

    fn generate(rng: &mut StdRng, now: DateTime<Utc>) -> Self {
        let mut at = now;
        let alerts = (1..=MOCK_ALERTS)
            .map(|n| {
                at -= Duration::minutes(rng.gen_range(10..240));
                generate_alert(rng, n, at)
            })
            .collect();
        Self {
            alerts: RwLock::new(alerts),
        }
    }
}

fn severity_for(risk_score: u8) -> AlertSeverity {
    match risk_score {
        90.. => AlertSeverity::Critical,
        75..=89 => AlertSeverity::High,
        50..=74 => AlertSeverity::Medium,
        _ => AlertSeverity::Low,
    }
}

fn generate_alert(rng: &mut StdRng, n: usize, created_at: DateTime<Utc>) -> Alert {
    let (title, triggers) = DETECTIONS[rng.gen_range(0..DETECTIONS.len())];
    let risk_score: u8 = rng.gen_range(30..=100);
    let status = match rng.gen_range(0..10) {
        0..=4 => ReviewStatus::Open,
        5..=6 => ReviewStatus::Investigating,
        7..=8 => ReviewStatus::Resolved,
        _ => ReviewStatus::FalsePositive,
    };
    let updated_at = created_at + Duration::minutes(rng.gen_range(0..120));
    let closed = status.is_closed();

    Alert {
        id: format!("alert_{:04}", n),
        transaction_id: format!("txn_{:05}", rng.gen_range(1..=200)),
        customer_id: format!("cust_{:03}", rng.gen_range(1..=8)),
        title: title.to_string(),
        description: format!("{} detected with risk score {}", title, risk_score),
        severity: severity_for(risk_score),
        status,
        risk_score,
        fraud_probability: f64::from(risk_score) / 100.0,
        created_at,
        updated_at,
        resolved_at: closed.then_some(updated_at),
        resolution: closed.then(|| "Reviewed by analyst".to_string()),
        triggers: triggers.iter().map(|t| t.to_string()).collect(),
    }
}

#[async_trait]
impl AlertSource for MockAlerts {
    async fn list(&self, filter: &AlertFilter, params: PageParams) -> Result<Page<Alert>> {
        let alerts = self.alerts.read();
        let matching: Vec<Alert> = alerts
            .iter()
            .filter(|alert| filter.matches(alert))
            .cloned()
            .collect();
        Ok(Page::from_slice(&matching, params))
    }

    async fn update_status(&self, id: &str, update: UpdateAlertStatus) -> Result<Alert> {
        let update = update.normalize()?;
        let mut alerts = self.alerts.write();
        let alert = alerts
            .iter_mut()
            .find(|alert| alert.id == id)
            .ok_or_else(|| AppError::NotFound(format!("alert '{}'", id)))?;
        alert.apply(&update, Utc::now());
        Ok(alert.clone())
    }
}

/// Reads and updates the alert queue held by the upstream service.
pub struct RemoteAlerts {
    upstream: UpstreamClient,
}

impl RemoteAlerts {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl AlertSource for RemoteAlerts {
    async fn list(&self, filter: &AlertFilter, params: PageParams) -> Result<Page<Alert>> {
        self.upstream
            .get_json_with_query("/api/fraud/alerts", &PagedQuery::new(params, filter))
            .await
    }

    async fn update_status(&self, id: &str, update: UpdateAlertStatus) -> Result<Alert> {
        let update = update.normalize()?;
        self.upstream
            .put_json(&format!("/api/fraud/alerts/{}/status", id), &update)
            .await
    }
}
