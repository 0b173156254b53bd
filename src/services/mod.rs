//! Outbound services: query execution, export, transactions, fraud alerts
//! and the upstream client

pub mod alerts;
pub mod executor;
pub mod exporter;
pub mod transactions;
pub mod upstream;
