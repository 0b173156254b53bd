//! Query filters: typed known kinds plus a free-form escape hatch
//!
//! On the wire a filter set is a flat JSON object. The keys `timeRange` and
//! `status` are parsed into typed values and rejected when malformed; every
//! other key is kept verbatim.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::DateRange;

pub const TIME_RANGE_KEY: &str = "timeRange";
pub const STATUS_KEY: &str = "status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    LastHour,
    #[serde(rename = "last_24h")]
    Last24h,
    #[serde(rename = "last_7d")]
    Last7d,
    #[serde(rename = "last_30d")]
    Last30d,
    #[serde(rename = "last_90d")]
    Last90d,
    /// Explicit range carried by the query's own `dateRange`
    Custom,
}

impl TimeRange {
    pub const ALL: [TimeRange; 6] = [
        TimeRange::LastHour,
        TimeRange::Last24h,
        TimeRange::Last7d,
        TimeRange::Last30d,
        TimeRange::Last90d,
        TimeRange::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::LastHour => "last_hour",
            TimeRange::Last24h => "last_24h",
            TimeRange::Last7d => "last_7d",
            TimeRange::Last30d => "last_30d",
            TimeRange::Last90d => "last_90d",
            TimeRange::Custom => "custom",
        }
    }

    /// Concrete window ending at `now`; `None` for `custom`.
    pub fn date_range(&self, now: DateTime<Utc>) -> Option<DateRange> {
        let span = match self {
            TimeRange::LastHour => Duration::hours(1),
            TimeRange::Last24h => Duration::hours(24),
            TimeRange::Last7d => Duration::days(7),
            TimeRange::Last30d => Duration::days(30),
            TimeRange::Last90d => Duration::days(90),
            TimeRange::Custom => return None,
        };
        Some(DateRange {
            from: now - span,
            to: now,
        })
    }
}

impl FromStr for TimeRange {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        TimeRange::ALL
            .into_iter()
            .find(|range| range.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unknown time range '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Pending,
    Failed,
    Suspicious,
    Flagged,
}

impl TransactionStatus {
    pub const ALL: [TransactionStatus; 5] = [
        TransactionStatus::Completed,
        TransactionStatus::Pending,
        TransactionStatus::Failed,
        TransactionStatus::Suspicious,
        TransactionStatus::Flagged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Suspicious => "suspicious",
            TransactionStatus::Flagged => "flagged",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        TransactionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unknown transaction status '{}'", s)))
    }
}

/// A report or query filter set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Filters {
    pub time_range: Option<TimeRange>,
    pub status: Option<TransactionStatus>,
    /// Any other key/value pair, stored as supplied
    pub custom: BTreeMap<String, Value>,
}

impl Filters {
    /// Set one filter. An empty string or `null` clears a known filter.
    /// Free-form keys are stored exactly as given.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        match key {
            _ if key.trim().is_empty() => {
                Err(AppError::validation("filter key must not be blank"))
            }
            TIME_RANGE_KEY => {
                self.time_range = parse_known(key, value)?;
                Ok(())
            }
            STATUS_KEY => {
                self.status = parse_known(key, value)?;
                Ok(())
            }
            _ => {
                self.custom.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Remove a filter; returns whether anything was set.
    pub fn remove(&mut self, key: &str) -> bool {
        match key {
            TIME_RANGE_KEY => self.time_range.take().is_some(),
            STATUS_KEY => self.status.take().is_some(),
            _ => self.custom.remove(key).is_some(),
        }
    }

    pub fn len(&self) -> usize {
        self.custom.len()
            + usize::from(self.time_range.is_some())
            + usize::from(self.status.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Window a query should cover: the preset `timeRange` ending where
    /// `fallback` ends, or `fallback` itself when no preset applies.
    pub fn window(&self, fallback: DateRange) -> DateRange {
        self.time_range
            .and_then(|range| range.date_range(fallback.to))
            .unwrap_or(fallback)
    }
}

fn parse_known<T: FromStr<Err = AppError>>(key: &str, value: Value) -> Result<Option<T>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => s.parse().map(Some),
        other => Err(AppError::validation(format!(
            "filter '{}' expects a string, got {}",
            key, other
        ))),
    }
}

impl TryFrom<Map<String, Value>> for Filters {
    type Error = AppError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut filters = Filters::default();
        for (key, value) in map {
            filters.set(&key, value)?;
        }
        Ok(filters)
    }
}

impl From<Filters> for Map<String, Value> {
    fn from(filters: Filters) -> Self {
        let mut map = Map::new();
        if let Some(range) = filters.time_range {
            map.insert(TIME_RANGE_KEY.to_string(), Value::from(range.as_str()));
        }
        if let Some(status) = filters.status {
            map.insert(STATUS_KEY.to_string(), Value::from(status.as_str()));
        }
        map.extend(filters.custom);
        map
    }
}
