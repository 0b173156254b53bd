//! Transaction list, bulk review actions and transaction exports

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::filters::TransactionStatus;
use crate::models::ExportFormat;
use crate::pagination::{Page, PageParams, PagedQuery};
use crate::services::exporter::ExportResponse;
use crate::services::upstream::UpstreamClient;

/// Size of the synthetic transaction pool.
pub const MOCK_TRANSACTIONS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    Transfer,
    Payment,
    Withdrawal,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::Credit,
        TransactionType::Debit,
        TransactionType::Transfer,
        TransactionType::Payment,
        TransactionType::Withdrawal,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    pub currency: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// 0-100
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_last4: Option<String>,
}

/// Transaction list filters. Every field is optional and they combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TransactionStatus>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_risk_score: Option<u8>,
    /// Case-insensitive match on id, description, merchant and customer names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_amount, self.max_amount) {
            if min > max {
                return Err(AppError::validation("minAmount must not exceed maxAmount"));
            }
        }
        if self.min_risk_score.is_some_and(|score| score > 100) {
            return Err(AppError::validation("minRiskScore must be between 0 and 100"));
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AppError::validation("from must not be after to"));
            }
        }
        Ok(())
    }

    pub fn matches(&self, txn: &Transaction) -> bool {
        let contains = |field: &Option<String>, needle: &str| {
            field
                .as_deref()
                .is_some_and(|value| value.to_lowercase().contains(needle))
        };

        self.status.map_or(true, |s| txn.status == s)
            && self.transaction_type.map_or(true, |t| txn.transaction_type == t)
            && self
                .merchant_id
                .as_ref()
                .map_or(true, |id| txn.merchant_id.as_ref() == Some(id))
            && self.customer_id.as_ref().map_or(true, |id| &txn.customer_id == id)
            && self.min_amount.map_or(true, |min| txn.amount >= min)
            && self.max_amount.map_or(true, |max| txn.amount <= max)
            && self
                .min_risk_score
                .map_or(true, |min| txn.risk_score.is_some_and(|score| score >= min))
            && self.from.map_or(true, |from| txn.timestamp >= from)
            && self.to.map_or(true, |to| txn.timestamp <= to)
            && self
                .search
                .as_deref()
                .map(|term| term.trim().to_lowercase())
                .filter(|term| !term.is_empty())
                .map_or(true, |term| {
                    txn.id.to_lowercase().contains(&term)
                        || contains(&txn.description, &term)
                        || contains(&txn.merchant_name, &term)
                        || contains(&txn.customer_name, &term)
                })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Approve,
    Reject,
    Flag,
    Investigate,
}

impl BulkAction {
    /// Status a transaction ends up in once the action is applied.
    pub fn resulting_status(&self) -> TransactionStatus {
        match self {
            BulkAction::Approve => TransactionStatus::Completed,
            BulkAction::Reject => TransactionStatus::Failed,
            BulkAction::Flag => TransactionStatus::Flagged,
            BulkAction::Investigate => TransactionStatus::Suspicious,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Approve => "approve",
            BulkAction::Reject => "reject",
            BulkAction::Flag => "flag",
            BulkAction::Investigate => "investigate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionRequest {
    pub transaction_ids: Vec<String>,
    pub action: BulkAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BulkActionRequest {
    pub fn validate(&self) -> Result<()> {
        if self.transaction_ids.is_empty() {
            return Err(AppError::validation("select at least one transaction"));
        }
        if self.transaction_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(AppError::validation("transaction ids must not be blank"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkActionResult {
    pub success: bool,
    /// Distinct known transactions the action was applied to
    pub processed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionExportRequest {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub filters: TransactionFilter,
    #[serde(default)]
    pub include_metadata: bool,
}

/// Source of transactions and the review actions taken on them.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// Newest first.
    async fn list(
        &self,
        filter: &TransactionFilter,
        params: PageParams,
    ) -> Result<Page<Transaction>>;

    async fn get(&self, id: &str) -> Result<Transaction>;

    async fn bulk_action(&self, request: &BulkActionRequest) -> Result<BulkActionResult>;

    async fn export(&self, request: &TransactionExportRequest) -> Result<ExportResponse>;

    fn name(&self) -> &'static str;
}

const MERCHANTS: [(&str, &str, &str); 6] = [
    ("m_001", "Amazon", "retail"),
    ("m_002", "Uber", "transport"),
    ("m_003", "Starbucks", "food"),
    ("m_004", "Shell", "fuel"),
    ("m_005", "Netflix", "subscription"),
    ("m_006", "Crypto Exchange Ltd", "crypto"),
];

const CUSTOMERS: [&str; 8] = [
    "John Smith",
    "Maria Garcia",
    "Wei Chen",
    "Aisha Khan",
    "Lucas Silva",
    "Emma Brown",
    "Omar Haddad",
    "Sofia Rossi",
];

const LOCATIONS: [&str; 6] = [
    "New York, US",
    "London, UK",
    "Dubai, AE",
    "Singapore, SG",
    "Lagos, NG",
    "Sao Paulo, BR",
];

/// Synthetic pool generated once at startup; bulk actions mutate it.
pub struct MockTransactions {
    /// Newest first
    transactions: RwLock<Vec<Transaction>>,
}

impl Default for MockTransactions {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransactions {
    pub fn new() -> Self {
        Self::generate(&mut StdRng::from_entropy(), Utc::now())
    }

    /// Deterministic pool, for tests and reproducible demos.
    pub fn with_seed(seed: u64) -> Self {
        Self::generate(&mut StdRng::seed_from_u64(seed), Utc::now())
    }

    fn generate(rng: &mut StdRng, now: DateTime<Utc>) -> Self {
        let mut at = now;
        let transactions = (1..=MOCK_TRANSACTIONS)
            .map(|n| {
                at -= Duration::minutes(rng.gen_range(5..90));
                generate_transaction(rng, n, at)
            })
            .collect();
        Self {
            transactions: RwLock::new(transactions),
        }
    }
}

fn generate_transaction(rng: &mut StdRng, n: usize, timestamp: DateTime<Utc>) -> Transaction {
    let (merchant_id, merchant_name, category) = MERCHANTS[rng.gen_range(0..MERCHANTS.len())];
    let customer = rng.gen_range(0..CUSTOMERS.len());
    let transaction_type = TransactionType::ALL[rng.gen_range(0..TransactionType::ALL.len())];
    let risk_score: u8 = rng.gen_range(0..=100);
    let status = if risk_score >= 90 {
        TransactionStatus::Suspicious
    } else if risk_score >= 75 && rng.gen_bool(0.5) {
        TransactionStatus::Flagged
    } else if rng.gen_bool(0.05) {
        TransactionStatus::Failed
    } else if rng.gen_bool(0.1) {
        TransactionStatus::Pending
    } else {
        TransactionStatus::Completed
    };
    let amount = (rng.gen_range(5.0..5_000.0_f64) * 100.0).round() / 100.0;

    Transaction {
        id: format!("txn_{:05}", n),
        amount,
        currency: "USD".to_string(),
        transaction_type,
        status,
        merchant_id: Some(merchant_id.to_string()),
        merchant_name: Some(merchant_name.to_string()),
        customer_id: format!("cust_{:03}", customer + 1),
        customer_name: Some(CUSTOMERS[customer].to_string()),
        timestamp,
        description: Some(format!("{} purchase", merchant_name)),
        category: Some(category.to_string()),
        risk_score: Some(risk_score),
        fraud_probability: Some(f64::from(risk_score) / 100.0),
        location: Some(LOCATIONS[rng.gen_range(0..LOCATIONS.len())].to_string()),
        card_last4: Some(format!("{:04}", rng.gen_range(0..10_000))),
    }
}

#[async_trait]
impl TransactionSource for MockTransactions {
    async fn list(
        &self,
        filter: &TransactionFilter,
        params: PageParams,
    ) -> Result<Page<Transaction>> {
        filter.validate()?;
        let transactions = self.transactions.read();
        let matching: Vec<Transaction> = transactions
            .iter()
            .filter(|txn| filter.matches(txn))
            .cloned()
            .collect();
        Ok(Page::from_slice(&matching, params))
    }

    async fn get(&self, id: &str) -> Result<Transaction> {
        self.transactions
            .read()
            .iter()
            .find(|txn| txn.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("transaction '{}'", id)))
    }

    async fn bulk_action(&self, request: &BulkActionRequest) -> Result<BulkActionResult> {
        request.validate()?;
        let ids: HashSet<&str> = request.transaction_ids.iter().map(String::as_str).collect();
        let status = request.action.resulting_status();

        let mut processed = 0;
        for txn in self.transactions.write().iter_mut() {
            if ids.contains(txn.id.as_str()) {
                txn.status = status;
                processed += 1;
            }
        }
        debug!(
            action = request.action.as_str(),
            requested = ids.len(),
            processed,
            "Bulk action applied"
        );
        Ok(BulkActionResult {
            success: true,
            processed,
        })
    }

    async fn export(&self, request: &TransactionExportRequest) -> Result<ExportResponse> {
        request.filters.validate()?;
        Ok(ExportResponse {
            download_url: format!(
                "https://example.com/mock-export.{}",
                request.format.as_str()
            ),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Lists and reviews transactions held by the upstream service.
pub struct RemoteTransactions {
    upstream: UpstreamClient,
}

impl RemoteTransactions {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[async_trait]
impl TransactionSource for RemoteTransactions {
    async fn list(
        &self,
        filter: &TransactionFilter,
        params: PageParams,
    ) -> Result<Page<Transaction>> {
        filter.validate()?;
        self.upstream
            .get_json_with_query("/api/transactions", &PagedQuery::new(params, filter))
            .await
    }

    async fn get(&self, id: &str) -> Result<Transaction> {
        self.upstream
            .get_json(&format!("/api/transactions/{}", id))
            .await
    }

    async fn bulk_action(&self, request: &BulkActionRequest) -> Result<BulkActionResult> {
        request.validate()?;
        self.upstream
            .post_json("/api/transactions/bulk-action", request)
            .await
    }

    async fn export(&self, request: &TransactionExportRequest) -> Result<ExportResponse> {
        request.filters.validate()?;
        self.upstream
            .post_json("/api/transactions/export", request)
            .await
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_pool_is_newest_first_and_deterministic() {
        let a = MockTransactions::with_seed(9);
        let b = MockTransactions::with_seed(9);
        let all = TransactionFilter::default();
        let first = a.list(&all, PageParams::new(1, 100)).await.unwrap();
        let again = b.list(&all, PageParams::new(1, 100)).await.unwrap();

        assert_eq!(first.total_results, MOCK_TRANSACTIONS);
        assert_eq!(first.total_pages, 2);
        assert!(first.results.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
        let amounts = |page: &Page<Transaction>| {
            page.results.iter().map(|t| t.amount).collect::<Vec<_>>()
        };
        assert_eq!(amounts(&first), amounts(&again));
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let source = MockTransactions::with_seed(3);
        let filter = TransactionFilter {
            status: Some(TransactionStatus::Suspicious),
            min_risk_score: Some(90),
            ..Default::default()
        };
        let page = source.list(&filter, PageParams::new(1, 100)).await.unwrap();
        assert!(page
            .results
            .iter()
            .all(|t| t.status == TransactionStatus::Suspicious && t.risk_score >= Some(90)));

        let by_name = TransactionFilter {
            search: Some("  STARBUCKS ".into()),
            ..Default::default()
        };
        let page = source.list(&by_name, PageParams::new(1, 100)).await.unwrap();
        assert!(page
            .results
            .iter()
            .all(|t| t.merchant_name.as_deref() == Some("Starbucks")));
    }

    #[tokio::test]
    async fn test_inverted_bounds_rejected() {
        let source = MockTransactions::with_seed(3);
        let filter = TransactionFilter {
            min_amount: Some(500.0),
            max_amount: Some(10.0),
            ..Default::default()
        };
        let err = source.list(&filter, PageParams::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let filter = TransactionFilter {
            min_risk_score: Some(101),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }

    #[tokio::test]
    async fn test_bulk_action_counts_known_ids_once() {
        let source = MockTransactions::with_seed(5);
        let request = BulkActionRequest {
            transaction_ids: vec![
                "txn_00001".into(),
                "txn_00002".into(),
                "txn_00001".into(),
                "txn_99999".into(),
            ],
            action: BulkAction::Flag,
            reason: Some("velocity".into()),
        };
        let result = source.bulk_action(&request).await.unwrap();
        assert_eq!(result, BulkActionResult { success: true, processed: 2 });
        assert_eq!(source.get("txn_00002").await.unwrap().status, TransactionStatus::Flagged);

        let empty = BulkActionRequest {
            transaction_ids: vec![],
            ..request
        };
        assert!(matches!(
            source.bulk_action(&empty).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_transaction_not_found() {
        let source = MockTransactions::with_seed(5);
        assert!(matches!(
            source.get("txn_nope").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_upstream_query_flattens_filter() {
        let filter = TransactionFilter {
            status: Some(TransactionStatus::Pending),
            min_amount: Some(25.5),
            ..Default::default()
        };
        let query = PagedQuery::new(PageParams::new(2, 10), &filter);
        let value = serde_json::to_value(query).unwrap();
        assert_eq!(
            value,
            json!({"page": 2, "limit": 10, "status": "pending", "minAmount": 25.5})
        );
    }
}
