//! Application state shared across handlers

use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::MetricCatalog;
use crate::config::{Config, DataSource};
use crate::dashboard::{DashboardFeed, DashboardSource, MockDashboard, RemoteDashboard};
use crate::error::{AppError, Result};
use crate::render::Renderer;
use crate::routes::metrics::Metrics;
use crate::services::alerts::{AlertSource, MockAlerts, RemoteAlerts};
use crate::services::executor::{MockExecutor, QueryExecutor, RemoteExecutor};
use crate::services::exporter::{MockExporter, RemoteExporter, ReportExporter};
use crate::services::transactions::{MockTransactions, RemoteTransactions, TransactionSource};
use crate::services::upstream::UpstreamClient;
use crate::store::{MemoryReportStore, PgReportStore, RemoteReportStore, ReportStore};

/// Backends behind the handlers, chosen once at startup
#[derive(Clone)]
pub struct Backends {
    pub executor: Arc<dyn QueryExecutor>,
    pub store: Arc<dyn ReportStore>,
    pub exporter: Arc<dyn ReportExporter>,
    pub dashboard: Arc<dyn DashboardSource>,
    pub transactions: Arc<dyn TransactionSource>,
    pub alerts: Arc<dyn AlertSource>,
}

impl Backends {
    /// Fully in-process: synthetic data, memory store, placeholder exports.
    /// A seed makes every generator deterministic.
    pub fn mock(seed: Option<u64>) -> Self {
        let (executor, transactions, alerts) = match seed {
            Some(seed) => (
                MockExecutor::with_seed(seed),
                MockTransactions::with_seed(seed),
                MockAlerts::with_seed(seed),
            ),
            None => (MockExecutor::new(), MockTransactions::new(), MockAlerts::new()),
        };
        Self {
            executor: Arc::new(executor),
            store: Arc::new(MemoryReportStore::new()),
            exporter: Arc::new(MockExporter),
            dashboard: Arc::new(MockDashboard),
            transactions: Arc::new(transactions),
            alerts: Arc::new(alerts),
        }
    }

    /// Everything except report storage goes to the upstream service.
    fn remote(upstream: UpstreamClient, store: Arc<dyn ReportStore>) -> Self {
        Self {
            executor: Arc::new(RemoteExecutor::new(upstream.clone())),
            store,
            exporter: Arc::new(RemoteExporter::new(upstream.clone())),
            dashboard: Arc::new(RemoteDashboard::new(upstream.clone())),
            transactions: Arc::new(RemoteTransactions::new(upstream.clone())),
            alerts: Arc::new(RemoteAlerts::new(upstream)),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub executor: Arc<dyn QueryExecutor>,
    pub store: Arc<dyn ReportStore>,
    pub exporter: Arc<dyn ReportExporter>,
    pub dashboard: Arc<dyn DashboardSource>,
    pub transactions: Arc<dyn TransactionSource>,
    pub alerts: Arc<dyn AlertSource>,
    /// Formats values using the executor's metric catalog
    pub renderer: Arc<Renderer>,
    /// Latest analytics dashboard snapshot and its WebSocket subscribers
    pub feed: DashboardFeed,
    /// Application metrics for Prometheus
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, backends: Backends, renderer: Renderer) -> Self {
        let feed = DashboardFeed::new(config.broadcast_capacity);
        Self {
            config: Arc::new(config),
            executor: backends.executor,
            store: backends.store,
            exporter: backends.exporter,
            dashboard: backends.dashboard,
            transactions: backends.transactions,
            alerts: backends.alerts,
            renderer: Arc::new(renderer),
            feed,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// In-process state seeded for reproducible data.
    pub fn mock(config: Config, seed: u64) -> Self {
        Self::new(
            config,
            Backends::mock(Some(seed)),
            Renderer::with_catalog(&MetricCatalog::builtin()),
        )
    }

    /// Pick backends according to `config`.
    ///
    /// Reports live in Postgres when `DATABASE_URL` is set, upstream in remote
    /// mode, and in memory otherwise.
    pub async fn from_config(config: Config) -> Result<Self> {
        let upstream = match config.data_source {
            DataSource::Mock => None,
            DataSource::Remote => {
                let url = config.upstream_url.as_deref().ok_or_else(|| {
                    AppError::Config("UPSTREAM_URL is required when DATA_SOURCE=remote".into())
                })?;
                Some(UpstreamClient::new(url))
            }
        };

        let backends = match (&config.database_url, upstream) {
            (Some(database_url), upstream) => {
                let store = Arc::new(PgReportStore::connect(database_url).await?);
                match upstream {
                    Some(upstream) => Backends::remote(upstream, store),
                    None => Backends {
                        store,
                        ..Backends::mock(None)
                    },
                }
            }
            (None, Some(upstream)) => {
                let store = Arc::new(RemoteReportStore::new(upstream.clone()));
                Backends::remote(upstream, store)
            }
            (None, None) => Backends::mock(None),
        };

        let renderer = match backends.executor.catalog().await {
            Ok(catalog) => Renderer::with_catalog(&catalog),
            Err(e) => {
                warn!(error = %e, "Metric catalog unavailable, formatting by key name");
                Renderer::default()
            }
        };

        info!(
            executor = backends.executor.name(),
            store = backends.store.name(),
            transactions = backends.transactions.name(),
            "Analytics backends selected"
        );

        Ok(Self::new(config, backends, renderer))
    }
}
