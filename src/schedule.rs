//! Recurrence rules for scheduled reports

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::error::{AppError, Result};
use crate::models::{ReportSchedule, ScheduleFrequency};

/// Weekly schedules without an explicit day run on Mondays.
const DEFAULT_DAY_OF_WEEK: u8 = 1;
/// Monthly and quarterly schedules without an explicit day run on the 1st.
const DEFAULT_DAY_OF_MONTH: u8 = 1;

impl ReportSchedule {
    pub fn validate(&self) -> Result<()> {
        parse_time(&self.time).ok_or_else(|| {
            AppError::validation(format!("schedule time '{}' is not HH:MM", self.time))
        })?;

        if let Some(day) = self.day_of_week {
            if day > 6 {
                return Err(AppError::validation("dayOfWeek must be between 0 and 6"));
            }
        }
        if let Some(day) = self.day_of_month {
            if !(1..=28).contains(&day) {
                return Err(AppError::validation("dayOfMonth must be between 1 and 28"));
            }
        }
        for recipient in &self.recipients {
            if !looks_like_address(recipient) {
                return Err(AppError::validation(format!(
                    "'{}' is not a valid recipient address",
                    recipient
                )));
            }
        }
        Ok(())
    }

    /// First run strictly after `now`, or `None` if the time is malformed.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let time = parse_time(&self.time)?;
        let today = now.date_naive();
        let at = |date: NaiveDate| Utc.from_utc_datetime(&date.and_time(time));

        match self.frequency {
            ScheduleFrequency::Daily => {
                let candidate = at(today);
                Some(if candidate > now {
                    candidate
                } else {
                    at(today + Duration::days(1))
                })
            }
            ScheduleFrequency::Weekly => {
                let target = u32::from(self.day_of_week.unwrap_or(DEFAULT_DAY_OF_WEEK) % 7);
                (0..=7)
                    .map(|offset| today + Duration::days(offset))
                    .filter(|date| date.weekday().num_days_from_sunday() == target)
                    .map(at)
                    .find(|candidate| *candidate > now)
            }
            ScheduleFrequency::Monthly => self.next_in_months(now, time, |_| true),
            ScheduleFrequency::Quarterly => {
                self.next_in_months(now, time, |month| (month - 1) % 3 == 0)
            }
        }
    }

    fn next_in_months<F>(
        &self,
        now: DateTime<Utc>,
        time: NaiveTime,
        eligible: F,
    ) -> Option<DateTime<Utc>>
    where
        F: Fn(u32) -> bool,
    {
        let day = u32::from(self.day_of_month.unwrap_or(DEFAULT_DAY_OF_MONTH).clamp(1, 28));
        let (mut year, mut month) = (now.year(), now.month());

        // A quarterly rule is satisfied within 4 months, monthly within 2.
        for _ in 0..13 {
            if eligible(month) {
                let candidate = NaiveDate::from_ymd_opt(year, month, day)
                    .map(|date| Utc.from_utc_datetime(&date.and_time(time)))?;
                if candidate > now {
                    return Some(candidate);
                }
            }
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        None
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").ok()
}

fn looks_like_address(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExportFormat;

    fn schedule(frequency: ScheduleFrequency) -> ReportSchedule {
        ReportSchedule {
            frequency,
            time: "09:00".into(),
            day_of_week: None,
            day_of_month: None,
            recipients: vec!["risk@example.com".into()],
            format: ExportFormat::Pdf,
        }
    }

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_daily_rolls_to_tomorrow_after_time() {
        let s = schedule(ScheduleFrequency::Daily);
        assert_eq!(s.next_run_after(ts(2024, 3, 5, 8, 0)), Some(ts(2024, 3, 5, 9, 0)));
        assert_eq!(s.next_run_after(ts(2024, 3, 5, 9, 0)), Some(ts(2024, 3, 6, 9, 0)));
    }

    #[test]
    fn test_weekly_targets_day_of_week() {
        // 2024-03-05 is a Tuesday
        let mut s = schedule(ScheduleFrequency::Weekly);
        s.day_of_week = Some(5);
        assert_eq!(s.next_run_after(ts(2024, 3, 5, 12, 0)), Some(ts(2024, 3, 8, 9, 0)));

        s.day_of_week = Some(2);
        assert_eq!(s.next_run_after(ts(2024, 3, 5, 12, 0)), Some(ts(2024, 3, 12, 9, 0)));
    }

    #[test]
    fn test_monthly_and_quarterly() {
        let mut monthly = schedule(ScheduleFrequency::Monthly);
        monthly.day_of_month = Some(15);
        assert_eq!(
            monthly.next_run_after(ts(2024, 12, 20, 0, 0)),
            Some(ts(2025, 1, 15, 9, 0))
        );

        let quarterly = schedule(ScheduleFrequency::Quarterly);
        assert_eq!(
            quarterly.next_run_after(ts(2024, 2, 10, 0, 0)),
            Some(ts(2024, 4, 1, 9, 0))
        );
    }

    #[test]
    fn test_validation() {
        assert!(schedule(ScheduleFrequency::Daily).validate().is_ok());

        let mut bad_time = schedule(ScheduleFrequency::Daily);
        bad_time.time = "9am".into();
        assert!(bad_time.validate().is_err());
        assert!(bad_time.next_run_after(Utc::now()).is_none());

        let mut bad_recipient = schedule(ScheduleFrequency::Daily);
        bad_recipient.recipients.push("not-an-address".into());
        assert!(bad_recipient.validate().is_err());

        let mut bad_day = schedule(ScheduleFrequency::Monthly);
        bad_day.day_of_month = Some(31);
        assert!(bad_day.validate().is_err());
    }
}
