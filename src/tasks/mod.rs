//! Background tasks

pub mod dashboard_poll;
pub mod report_scheduler;
