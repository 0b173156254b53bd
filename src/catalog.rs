//! Metric catalog: what can be queried and how each metric is typed

use std::collections::HashMap;

use crate::models::{AggregationType, AnalyticsMetric, MetricDataType};

/// Lookup table over the metrics an executor understands.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    metrics: Vec<AnalyticsMetric>,
}

impl MetricCatalog {
    pub fn new(metrics: Vec<AnalyticsMetric>) -> Self {
        Self { metrics }
    }

    /// Catalog served in mock mode.
    pub fn builtin() -> Self {
        Self::new(vec![
            metric(
                "total_transactions",
                "Total Transactions",
                "Total number of transactions",
                "transactions",
                MetricDataType::Count,
                AggregationType::Sum,
            ),
            metric(
                "total_amount",
                "Total Amount",
                "Total transaction amount",
                "transactions",
                MetricDataType::Currency,
                AggregationType::Sum,
            ),
            metric(
                "fraud_rate",
                "Fraud Rate",
                "Percentage of fraudulent transactions",
                "fraud",
                MetricDataType::Percentage,
                AggregationType::Avg,
            ),
            metric(
                "avg_transaction_amount",
                "Average Transaction Amount",
                "Average amount per transaction",
                "transactions",
                MetricDataType::Currency,
                AggregationType::Avg,
            ),
        ])
    }

    pub fn metrics(&self) -> &[AnalyticsMetric] {
        &self.metrics
    }

    pub fn get(&self, id: &str) -> Option<&AnalyticsMetric> {
        self.metrics.iter().find(|m| m.id == id)
    }

    /// Per-key type descriptors for the renderer.
    pub fn data_types(&self) -> HashMap<String, MetricDataType> {
        self.metrics
            .iter()
            .map(|m| (m.id.clone(), m.data_type))
            .collect()
    }
}

fn metric(
    id: &str,
    name: &str,
    description: &str,
    category: &str,
    data_type: MetricDataType,
    aggregation_type: AggregationType,
) -> AnalyticsMetric {
    AnalyticsMetric {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        data_type,
        aggregation_type,
    }
}
