//! Process configuration read from the environment

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Where analytics data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Synthetic rows and fixtures generated in-process
    Mock,
    /// Pass-through to the upstream REST service
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub data_source: DataSource,
    pub upstream_url: Option<String>,
    pub database_url: Option<String>,
    /// `None` disables dashboard polling
    pub dashboard_poll: Option<Duration>,
    /// `None` disables the report scheduler
    pub scheduler_interval: Option<Duration>,
    pub broadcast_capacity: usize,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            data_source: DataSource::Mock,
            upstream_url: None,
            database_url: None,
            dashboard_poll: Some(Duration::from_secs(30)),
            scheduler_interval: Some(Duration::from_secs(60)),
            broadcast_capacity: 64,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid LISTEN_ADDR '{}'", raw)))?,
            None => defaults.listen_addr,
        };

        let data_source = match (lookup("DATA_SOURCE"), lookup("USE_MOCK_DATA")) {
            (Some(raw), _) => parse_data_source(&raw)?,
            (None, Some(flag)) => match flag.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => DataSource::Mock,
                "false" | "0" => DataSource::Remote,
                _ => {
                    return Err(AppError::Config(format!(
                        "Invalid USE_MOCK_DATA '{}'",
                        flag
                    )))
                }
            },
            (None, None) => defaults.data_source,
        };

        let upstream_url = lookup("UPSTREAM_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        if data_source == DataSource::Remote && upstream_url.is_none() {
            return Err(AppError::Config(
                "UPSTREAM_URL is required when DATA_SOURCE=remote".into(),
            ));
        }

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());

        let dashboard_poll = parse_interval(&lookup, "DASHBOARD_POLL_SECS", 30)?;
        let scheduler_interval = parse_interval(&lookup, "SCHEDULER_INTERVAL_SECS", 60)?;

        let broadcast_capacity = match lookup("BROADCAST_CAPACITY") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|cap| *cap > 0)
                .ok_or_else(|| AppError::Config(format!("Invalid BROADCAST_CAPACITY '{}'", raw)))?,
            None => defaults.broadcast_capacity,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(AppError::Config(format!("Invalid LOG_FORMAT '{}'", other)))
            }
        };

        Ok(Self {
            listen_addr,
            data_source,
            upstream_url,
            database_url,
            dashboard_poll,
            scheduler_interval,
            broadcast_capacity,
            log_format,
        })
    }
}

fn parse_data_source(raw: &str) -> Result<DataSource> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mock" => Ok(DataSource::Mock),
        "remote" => Ok(DataSource::Remote),
        _ => Err(AppError::Config(format!(
            "Invalid DATA_SOURCE '{}'. Valid options: mock, remote",
            raw
        ))),
    }
}

fn parse_interval<F>(lookup: &F, key: &str, default_secs: u64) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| AppError::Config(format!("Invalid {} '{}'", key, raw)))?,
        None => default_secs,
    };
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
