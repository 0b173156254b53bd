//! Fraud analytics query & report service library exports

pub mod builder;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filters;
pub mod models;
pub mod pagination;
pub mod render;
pub mod routes;
pub mod schedule;
pub mod services;
pub mod single_flight;
pub mod state;
pub mod store;
pub mod tasks;
