//! Display formatting for metric values and column keys

use std::collections::HashMap;

use serde_json::Value;

use crate::catalog::MetricCatalog;
use crate::models::MetricDataType;

/// Formats values by their metric type when known, by key name otherwise.
#[derive(Debug, Clone, Default)]
pub struct ValueFormatter {
    types: HashMap<String, MetricDataType>,
}

impl ValueFormatter {
    pub fn new(types: HashMap<String, MetricDataType>) -> Self {
        Self { types }
    }

    pub fn from_catalog(catalog: &MetricCatalog) -> Self {
        Self::new(catalog.data_types())
    }

    pub fn data_type(&self, key: &str) -> Option<MetricDataType> {
        self.types.get(key).copied()
    }

    pub fn format(&self, key: &str, value: &Value) -> String {
        match (self.data_type(key), value.as_f64()) {
            (Some(data_type), Some(number)) => format_typed(data_type, number),
            _ => format_by_name(key, value),
        }
    }
}

/// Key-name heuristic: `rate`/`percent` → percentage, `amount`/`total` →
/// currency, anything else → grouped number. Non-numbers pass through.
pub fn format_by_name(key: &str, value: &Value) -> String {
    let Some(number) = value.as_f64() else {
        return display_value(value);
    };
    let key = key.to_ascii_lowercase();
    if key.contains("rate") || key.contains("percent") {
        format_percent(number)
    } else if key.contains("amount") || key.contains("total") {
        format_currency(number)
    } else {
        format_number(number)
    }
}

pub fn format_typed(data_type: MetricDataType, value: f64) -> String {
    match data_type {
        MetricDataType::Percentage => format_percent(value),
        MetricDataType::Currency => format_currency(value),
        MetricDataType::Count | MetricDataType::Number => format_number(value),
    }
}

/// Ratio to percentage with one decimal: `0.42` → `42.0%`.
pub fn format_percent(ratio: f64) -> String {
    if !ratio.is_finite() {
        return ratio.to_string();
    }
    format!("{:.1}%", ratio * 100.0)
}

/// US dollars: `1500` → `$1,500.00`.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let body = format!("${}.{}", group_thousands(int), frac);
    if value < 0.0 && fixed != "0.00" {
        format!("-{}", body)
    } else {
        body
    }
}

/// Grouped number with at most three decimals: `1234.5` → `1,234.5`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let fixed = format!("{:.3}", value.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac.trim_end_matches('0');

    let mut out = group_thousands(int);
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    if value < 0.0 && out != "0" {
        out.insert(0, '-');
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Plain text for a cell that is not formatted as a number.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// `fraudRate` / `fraud_rate` → `Fraud Rate`.
pub fn humanize_key(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
