//! Query builder: report form state and the transitions that edit it
//!
//! The draft is plain serializable data. Every edit goes through
//! [`ReportDraft::apply`], so a form can be driven and tested without any UI.
//! Nothing here talks to the network; [`ReportDraft::submit`] and
//! [`ReportDraft::preview`] are the only ways out, and both refuse an empty
//! metric selection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::filters::Filters;
use crate::models::{
    validate_metrics, AnalyticsQuery, ChartType, CreateReportInput, DateRange, ReportSchedule,
    ReportType, ReportVisualization, SortOrder,
};

/// Days of history a preview covers.
pub const PREVIEW_DAYS: i64 = 30;

/// In-progress report definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDraft {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub metrics: Vec<String>,
    pub filters: Filters,
    pub visualization: ReportVisualization,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ReportSchedule>,
}

impl Default for ReportDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            report_type: ReportType::Custom,
            metrics: Vec::new(),
            filters: Filters::default(),
            visualization: ReportVisualization::default(),
            schedule: None,
        }
    }
}

/// One edit to a [`ReportDraft`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DraftAction {
    SetName { name: String },
    SetDescription { description: String },
    SetType { report_type: ReportType },
    ToggleMetric { id: String, checked: bool },
    SetFilter { key: String, value: Value },
    RemoveFilter { key: String },
    SetChartType { chart_type: ChartType },
    SetGroupBy { group_by: Vec<String> },
    SetSortBy { sort_by: Option<String> },
    SetSortOrder { sort_order: SortOrder },
    SetLimit { limit: Option<usize> },
    EnableSchedule,
    DisableSchedule,
    UpdateSchedule { schedule: ReportSchedule },
    Reset,
}

impl ReportDraft {
    /// Apply one edit. A rejected edit leaves the draft unchanged.
    pub fn apply(&mut self, action: DraftAction) -> Result<()> {
        match action {
            DraftAction::SetName { name } => self.name = name,
            DraftAction::SetDescription { description } => self.description = description,
            DraftAction::SetType { report_type } => self.report_type = report_type,
            DraftAction::ToggleMetric { id, checked } => {
                let present = self.metrics.contains(&id);
                if checked && !present {
                    self.metrics.push(id);
                } else if !checked {
                    self.metrics.retain(|m| *m != id);
                }
            }
            DraftAction::SetFilter { key, value } => {
                let mut filters = self.filters.clone();
                filters.set(&key, value)?;
                self.filters = filters;
            }
            DraftAction::RemoveFilter { key } => {
                self.filters.remove(&key);
            }
            DraftAction::SetChartType { chart_type } => {
                self.visualization.chart_type = chart_type
            }
            DraftAction::SetGroupBy { group_by } => self.visualization.group_by = Some(group_by),
            DraftAction::SetSortBy { sort_by } => {
                self.visualization.sort_by = sort_by.filter(|s| !s.is_empty())
            }
            DraftAction::SetSortOrder { sort_order } => {
                self.visualization.sort_order = Some(sort_order)
            }
            DraftAction::SetLimit { limit } => self.visualization.limit = limit,
            DraftAction::EnableSchedule => {
                if self.schedule.is_none() {
                    self.schedule = Some(ReportSchedule::default());
                }
            }
            DraftAction::DisableSchedule => self.schedule = None,
            DraftAction::UpdateSchedule { schedule } => self.schedule = Some(schedule),
            DraftAction::Reset => *self = ReportDraft::default(),
        }
        Ok(())
    }

    /// Apply a sequence of edits, stopping at the first rejected one.
    pub fn apply_all<I>(&mut self, actions: I) -> Result<()>
    where
        I: IntoIterator<Item = DraftAction>,
    {
        actions.into_iter().try_for_each(|action| self.apply(action))
    }

    /// Produce the creation payload for the report store.
    pub fn submit(&self) -> Result<CreateReportInput> {
        validate_metrics(&self.metrics)?;
        if self.name.trim().is_empty() {
            return Err(AppError::validation("report name must not be blank"));
        }
        if let Some(schedule) = &self.schedule {
            schedule.validate()?;
        }
        Ok(CreateReportInput {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            report_type: self.report_type,
            filters: self.filters.clone(),
            metrics: self.metrics.clone(),
            visualization: self.visualization.clone(),
            schedule: self.schedule.clone(),
        })
    }

    /// Produce a preview query covering the last [`PREVIEW_DAYS`] days, or
    /// the draft's preset `timeRange` when one is set.
    pub fn preview(&self, now: DateTime<Utc>) -> Result<AnalyticsQuery> {
        validate_metrics(&self.metrics)?;
        let query = AnalyticsQuery {
            metrics: self.metrics.clone(),
            dimensions: vec!["date".to_string()],
            filters: self.filters.clone(),
            date_range: self.filters.window(DateRange::last_days(now, PREVIEW_DAYS)),
            group_by: None,
            limit: None,
            offset: None,
        };
        query.validate()?;
        Ok(query)
    }
}

impl CreateReportInput {
    /// Run a payload that bypassed the builder through the same checks,
    /// returning what the builder would have submitted.
    pub fn normalize(self) -> Result<Self> {
        let draft = ReportDraft {
            name: self.name,
            description: self.description,
            report_type: self.report_type,
            metrics: self.metrics,
            filters: self.filters,
            visualization: self.visualization,
            schedule: self.schedule,
        };
        draft.submit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::TransactionStatus;
    use crate::models::{ExportFormat, ScheduleFrequency};
    use serde_json::json;

    fn toggle(id: &str, checked: bool) -> DraftAction {
        DraftAction::ToggleMetric {
            id: id.into(),
            checked,
        }
    }

    #[test]
    fn test_empty_metrics_blocks_submit_and_preview() {
        let mut draft = ReportDraft::default();
        draft
            .apply(DraftAction::SetName {
                name: "Daily volume".into(),
            })
            .unwrap();

        assert!(matches!(draft.submit(), Err(AppError::Validation(_))));
        assert!(matches!(draft.preview(Utc::now()), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_toggle_metric_keeps_order_and_uniqueness() {
        let mut draft = ReportDraft::default();
        draft
            .apply_all([
                toggle("total_amount", true),
                toggle("fraud_rate", true),
                toggle("total_amount", true),
                toggle("total_transactions", true),
                toggle("fraud_rate", false),
            ])
            .unwrap();
        assert_eq!(draft.metrics, vec!["total_amount", "total_transactions"]);
    }

    #[test]
    fn test_filters_through_actions() {
        let mut draft = ReportDraft::default();
        draft
            .apply(DraftAction::SetFilter {
                key: "status".into(),
                value: json!("pending"),
            })
            .unwrap();
        draft
            .apply(DraftAction::SetFilter {
                key: "merchant".into(),
                value: json!("ACME"),
            })
            .unwrap();
        assert_eq!(draft.filters.status, Some(TransactionStatus::Pending));

        let before = draft.clone();
        let rejected = draft.apply(DraftAction::SetFilter {
            key: "timeRange".into(),
            value: json!("fortnight"),
        });
        assert!(rejected.is_err());
        assert_eq!(draft, before);

        draft
            .apply(DraftAction::RemoveFilter {
                key: "merchant".into(),
            })
            .unwrap();
        assert_eq!(draft.filters.len(), 1);
    }

    #[test]
    fn test_schedule_toggle_uses_defaults() {
        let mut draft = ReportDraft::default();
        draft.apply(DraftAction::EnableSchedule).unwrap();
        let schedule = draft.schedule.clone().unwrap();
        assert_eq!(schedule.frequency, ScheduleFrequency::Weekly);
        assert_eq!(schedule.time, "09:00");
        assert_eq!(schedule.format, ExportFormat::Pdf);
        assert!(schedule.recipients.is_empty());

        draft.apply(DraftAction::DisableSchedule).unwrap();
        assert!(draft.schedule.is_none());
    }

    #[test]
    fn test_submit_and_preview() {
        let mut draft = ReportDraft::default();
        draft
            .apply_all([
                DraftAction::SetName {
                    name: "  Fraud overview ".into(),
                },
                DraftAction::SetType {
                    report_type: ReportType::Fraud,
                },
                toggle("fraud_rate", true),
                DraftAction::SetChartType {
                    chart_type: ChartType::Line,
                },
            ])
            .unwrap();

        let input = draft.submit().unwrap();
        assert_eq!(input.name, "Fraud overview");
        assert_eq!(input.visualization.chart_type, ChartType::Line);

        let now = Utc::now();
        let query = draft.preview(now).unwrap();
        assert_eq!(query.dimensions, vec!["date"]);
        assert_eq!(query.date_range.to, now);
        assert_eq!(
            query.date_range.to - query.date_range.from,
            chrono::Duration::days(PREVIEW_DAYS)
        );
    }

    #[test]
    fn test_preview_uses_preset_time_range() {
        let mut draft = ReportDraft::default();
        draft
            .apply_all([
                toggle("total_transactions", true),
                DraftAction::SetFilter {
                    key: "timeRange".into(),
                    value: json!("last_7d"),
                },
            ])
            .unwrap();

        let now = Utc::now();
        let query = draft.preview(now).unwrap();
        assert_eq!(query.date_range, DateRange::last_days(now, 7));
    }

    #[test]
    fn test_normalize_matches_builder_output() {
        let mut draft = ReportDraft::default();
        draft
            .apply_all([
                DraftAction::SetName {
                    name: "  Chargebacks ".into(),
                },
                toggle("total_amount", true),
            ])
            .unwrap();
        let submitted = draft.submit().unwrap();

        let raw = CreateReportInput {
            name: "  Chargebacks ".into(),
            ..submitted.clone()
        };
        assert_eq!(raw.normalize().unwrap(), submitted);

        let duplicated = CreateReportInput {
            metrics: vec!["total_amount".into(), "total_amount".into()],
            ..submitted
        };
        assert!(matches!(duplicated.normalize(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut draft = ReportDraft::default();
        draft.apply(toggle("fraud_rate", true)).unwrap();
        draft.apply(DraftAction::Reset).unwrap();
        assert_eq!(draft, ReportDraft::default());
    }

    #[test]
    fn test_actions_deserialize() {
        let action: DraftAction = serde_json::from_value(json!({
            "action": "toggleMetric",
            "id": "fraud_rate",
            "checked": true
        }))
        .unwrap();
        assert_eq!(action, toggle("fraud_rate", true));
    }
}
