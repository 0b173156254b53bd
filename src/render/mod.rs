//! Chart/table renderer: turns a result envelope into a presentation model
//!
//! Rendering never fails. Empty data and unknown chart types produce explicit
//! placeholders instead of errors or blank charts.

pub mod format;

use serde::Serialize;
use serde_json::Value;

use crate::catalog::MetricCatalog;
use crate::models::{AnalyticsResult, ChartType, Row};

pub use format::{humanize_key, ValueFormatter};

/// Series/slice colors, reused cyclically.
pub const PALETTE: [&str; 6] = [
    "#0088FE", "#00C49F", "#FFBB28", "#FF8042", "#8884D8", "#82CA9D",
];

/// Heatmap grid width.
pub const HEATMAP_COLUMNS: usize = 7;

pub const NO_DATA_MESSAGE: &str = "No data available";
pub const UNSUPPORTED_MESSAGE: &str = "Unsupported chart type";

pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

/// Everything a client needs to draw one result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedView {
    /// Chart type as requested, even when unsupported
    pub chart_type: String,
    pub body: ViewBody,
    pub summary: Vec<SummaryStat>,
    pub metadata: ViewMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaceholderReason {
    NoData,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewBody {
    Placeholder {
        reason: PlaceholderReason,
        message: String,
    },
    /// Line, bar and scatter charts
    Cartesian {
        chart: ChartType,
        category_key: String,
        categories: Vec<String>,
        series: Vec<Series>,
    },
    Pie {
        slices: Vec<PieSlice>,
        total: f64,
    },
    Table {
        columns: Vec<Column>,
        rows: Vec<Vec<String>>,
    },
    Heatmap {
        columns: usize,
        cells: Vec<HeatCell>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: String,
    pub label: String,
    pub color: &'static str,
    /// One entry per row; `None` where the row has no number for this key
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    /// Share of the total, 0..=1
    pub share: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: String,
    pub header: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatCell {
    pub row: usize,
    /// Largest numeric value in the row
    pub value: f64,
    /// `value` clipped to 0..=100
    pub intensity: f64,
    pub opacity: f64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryStat {
    pub key: String,
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMetadata {
    pub rows: String,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    formatter: ValueFormatter,
}

impl Renderer {
    pub fn new(formatter: ValueFormatter) -> Self {
        Self { formatter }
    }

    /// Renderer whose number formatting follows the catalog's data types.
    pub fn with_catalog(catalog: &MetricCatalog) -> Self {
        Self::new(ValueFormatter::from_catalog(catalog))
    }

    /// Render for a chart type given by name.
    pub fn render(&self, result: &AnalyticsResult, chart_type: &str) -> RenderedView {
        let body = if result.data.is_empty() {
            no_data()
        } else {
            match chart_type.parse::<ChartType>() {
                Ok(chart) => self.body(&result.data, chart),
                Err(_) => ViewBody::Placeholder {
                    reason: PlaceholderReason::Unsupported,
                    message: UNSUPPORTED_MESSAGE.to_string(),
                },
            }
        };

        RenderedView {
            chart_type: chart_type.to_string(),
            body,
            summary: self.summary(result),
            metadata: ViewMetadata {
                rows: format::format_number(result.metadata.total_rows as f64),
                execution_time_ms: result.metadata.execution_time_ms,
            },
        }
    }

    pub fn render_chart(&self, result: &AnalyticsResult, chart: ChartType) -> RenderedView {
        self.render(result, chart.as_str())
    }

    fn body(&self, rows: &[Row], chart: ChartType) -> ViewBody {
        match chart {
            ChartType::Line | ChartType::Bar | ChartType::Scatter => cartesian(rows, chart),
            ChartType::Pie => pie(rows),
            ChartType::Table => self.table(rows),
            ChartType::Heatmap => heatmap(rows),
        }
    }

    fn table(&self, rows: &[Row]) -> ViewBody {
        let mut keys: Vec<&str> = Vec::new();
        for row in rows {
            for key in row.keys() {
                if !keys.contains(&key.as_str()) {
                    keys.push(key);
                }
            }
        }

        let columns = keys
            .iter()
            .map(|key| Column {
                key: key.to_string(),
                header: humanize_key(key),
            })
            .collect();

        let rows = rows
            .iter()
            .map(|row| {
                keys.iter()
                    .map(|key| {
                        row.get(*key)
                            .map(|value| self.formatter.format(key, value))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        ViewBody::Table { columns, rows }
    }

    fn summary(&self, result: &AnalyticsResult) -> Vec<SummaryStat> {
        result
            .summary
            .iter()
            .map(|(key, value)| SummaryStat {
                key: key.clone(),
                label: humanize_key(key),
                value: self.formatter.format(key, value),
            })
            .collect()
    }
}

fn no_data() -> ViewBody {
    ViewBody::Placeholder {
        reason: PlaceholderReason::NoData,
        message: NO_DATA_MESSAGE.to_string(),
    }
}

fn cartesian(rows: &[Row], chart: ChartType) -> ViewBody {
    let first = &rows[0];
    let mut keys = first.keys();
    let category_key = keys.next().cloned().unwrap_or_default();

    let categories = rows
        .iter()
        .map(|row| {
            row.get(&category_key)
                .map(format::display_value)
                .unwrap_or_default()
        })
        .collect();

    // Palette index follows key position, so the category key consumes slot 0.
    let series = first
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, (_, value))| value.is_number())
        .map(|(position, (key, _))| Series {
            key: key.clone(),
            label: humanize_key(key),
            color: palette_color(position),
            values: rows
                .iter()
                .map(|row| row.get(key).and_then(Value::as_f64))
                .collect(),
        })
        .collect();

    ViewBody::Cartesian {
        chart,
        category_key,
        categories,
        series,
    }
}

fn pie(rows: &[Row]) -> ViewBody {
    let mut slices: Vec<PieSlice> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut values = row.values();
            let label = values.next().map(format::display_value).unwrap_or_default();
            let value = values.next().and_then(Value::as_f64).unwrap_or(0.0);
            PieSlice {
                label,
                value,
                share: 0.0,
                color: palette_color(index),
            }
        })
        .collect();

    let total: f64 = slices.iter().map(|slice| slice.value).sum();
    if total != 0.0 {
        for slice in &mut slices {
            slice.share = slice.value / total;
        }
    }

    ViewBody::Pie { slices, total }
}

fn heatmap(rows: &[Row]) -> ViewBody {
    let cells = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let value = row
                .values()
                .filter_map(Value::as_f64)
                .fold(None, |max: Option<f64>, v| Some(max.map_or(v, |m| m.max(v))))
                .unwrap_or(0.0);
            let intensity = value.clamp(0.0, 100.0);
            HeatCell {
                row: index,
                value,
                intensity,
                opacity: intensity / 100.0,
                title: format!("Value: {}", format::format_number(value)),
            }
        })
        .collect();

    ViewBody::Heatmap {
        columns: HEATMAP_COLUMNS,
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultMetadata;
    use serde_json::{json, Map};

    fn result(rows: Value) -> AnalyticsResult {
        let data: Vec<Row> = serde_json::from_value(rows).unwrap();
        AnalyticsResult {
            metadata: ResultMetadata {
                total_rows: data.len(),
                execution_time_ms: 12,
                query: "{}".into(),
            },
            data,
            summary: Map::new(),
        }
    }

    #[test]
    fn test_empty_data_renders_placeholder() {
        let renderer = Renderer::default();
        for chart in ChartType::ALL {
            let view = renderer.render_chart(&result(json!([])), chart);
            assert_eq!(
                view.body,
                ViewBody::Placeholder {
                    reason: PlaceholderReason::NoData,
                    message: NO_DATA_MESSAGE.into()
                }
            );
        }
    }

    #[test]
    fn test_unknown_chart_type_renders_placeholder() {
        let view = Renderer::default().render(&result(json!([{"a": 1}])), "radar");
        assert_eq!(view.chart_type, "radar");
        assert!(matches!(
            view.body,
            ViewBody::Placeholder {
                reason: PlaceholderReason::Unsupported,
                ..
            }
        ));
    }

    #[test]
    fn test_pie_colors_and_total() {
        let view = Renderer::default().render_chart(
            &result(json!([{"label": "A", "value": 10}, {"label": "B", "value": 20}])),
            ChartType::Pie,
        );
        let ViewBody::Pie { slices, total } = view.body else {
            panic!("expected pie body");
        };
        assert_eq!(total, 30.0);
        assert_eq!(slices[0].label, "A");
        assert_eq!(slices[0].color, PALETTE[0]);
        assert_eq!(slices[1].color, PALETTE[1]);
        assert!((slices[1].share - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pie_palette_wraps() {
        let rows: Vec<Value> = (0..8).map(|i| json!({"k": i, "v": 1})).collect();
        let view = Renderer::default().render_chart(&result(Value::Array(rows)), ChartType::Pie);
        let ViewBody::Pie { slices, .. } = view.body else {
            panic!("expected pie body");
        };
        assert_eq!(slices[6].color, PALETTE[0]);
        assert_eq!(slices[7].color, PALETTE[1]);
    }

    #[test]
    fn test_line_uses_first_key_as_category() {
        let view = Renderer::default().render_chart(
            &result(json!([
                {"date": "2024-01-01", "transactions": 3456, "note": "x", "fraudRate": 0.01},
                {"date": "2024-01-02", "transactions": 3678, "note": "y", "fraudRate": 0.02}
            ])),
            ChartType::Line,
        );
        let ViewBody::Cartesian {
            category_key,
            categories,
            series,
            ..
        } = view.body
        else {
            panic!("expected cartesian body");
        };
        assert_eq!(category_key, "date");
        assert_eq!(categories, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].key, "transactions");
        assert_eq!(series[0].color, PALETTE[1]);
        assert_eq!(series[1].key, "fraudRate");
        assert_eq!(series[1].color, PALETTE[3]);
        assert_eq!(series[0].values, vec![Some(3456.0), Some(3678.0)]);
    }

    #[test]
    fn test_table_humanizes_and_formats() {
        let view = Renderer::default().render_chart(
            &result(json!([
                {"date": "2024-01-01", "fraudRate": 0.42, "count": 1500},
                {"date": "2024-01-02", "fraudRate": 0.1, "merchant": "ACME"}
            ])),
            ChartType::Table,
        );
        let ViewBody::Table { columns, rows } = view.body else {
            panic!("expected table body");
        };
        let headers: Vec<_> = columns.iter().map(|c| c.header.as_str()).collect();
        assert_eq!(headers, vec!["Date", "Fraud Rate", "Count", "Merchant"]);
        assert_eq!(rows[0], vec!["2024-01-01", "42.0%", "1,500", ""]);
        assert_eq!(rows[1], vec!["2024-01-02", "10.0%", "", "ACME"]);
    }

    #[test]
    fn test_heatmap_clips_intensity() {
        let view = Renderer::default().render_chart(
            &result(json!([
                {"day": "Mon", "a": 40, "b": 75},
                {"day": "Tue", "a": 250},
                {"day": "Wed", "label": "none"}
            ])),
            ChartType::Heatmap,
        );
        let ViewBody::Heatmap { columns, cells } = view.body else {
            panic!("expected heatmap body");
        };
        assert_eq!(columns, HEATMAP_COLUMNS);
        assert_eq!(cells[0].value, 75.0);
        assert!((cells[0].opacity - 0.75).abs() < 1e-9);
        assert_eq!(cells[1].intensity, 100.0);
        assert_eq!(cells[1].opacity, 1.0);
        assert_eq!(cells[2].value, 0.0);
    }

    #[test]
    fn test_summary_and_metadata() {
        let mut res = result(json!([{"date": "2024-01-01", "n": 1}]));
        res.summary.insert("avgFraudRate".into(), json!(0.025));
        res.summary.insert("totalAmount".into(), json!(1500));
        res.metadata.total_rows = 1500;

        let view = Renderer::default().render_chart(&res, ChartType::Bar);
        assert_eq!(view.summary[0].label, "Avg Fraud Rate");
        assert_eq!(view.summary[0].value, "2.5%");
        assert_eq!(view.summary[1].value, "$1,500.00");
        assert_eq!(view.metadata.rows, "1,500");
        assert_eq!(view.metadata.execution_time_ms, 12);
    }

    #[test]
    fn test_catalog_types_override_heuristic() {
        let renderer = Renderer::with_catalog(&MetricCatalog::builtin());
        let view = renderer.render_chart(
            &result(json!([{"date": "2024-01-01", "total_transactions": 1500}])),
            ChartType::Table,
        );
        let ViewBody::Table { rows, .. } = view.body else {
            panic!("expected table body");
        };
        assert_eq!(rows[0][1], "1,500");
    }
}
