//! Dashboard poll task - refreshes the live analytics snapshot

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::dashboard::Refresh;
use crate::state::AppState;

/// Background task that re-executes the dashboard query every `period`.
///
/// Each fetch runs in its own task so a slow executor never delays the
/// timer. A tick that finds the previous fetch still running is skipped.
pub async fn dashboard_poll_task(state: AppState, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Dashboard poll task started ({}s interval)", period.as_secs());

    loop {
        interval.tick().await;

        let state = state.clone();
        tokio::spawn(async move {
            poll_once(&state).await;
        });
    }
}

/// One refresh attempt with its bookkeeping.
pub async fn poll_once(state: &AppState) -> Option<Refresh> {
    match state.feed.refresh(state.executor.as_ref()).await {
        Ok(Refresh::Published(snapshot)) => {
            state.metrics.inc_dashboard_polls();
            debug!(
                rows = snapshot.result.data.len(),
                subscribers = state.feed.subscribers(),
                "Dashboard snapshot published"
            );
            Some(Refresh::Published(snapshot))
        }
        Ok(Refresh::Skipped) => {
            state.metrics.inc_dashboard_polls_skipped();
            info!("Previous dashboard fetch still running, tick skipped");
            Some(Refresh::Skipped)
        }
        Err(e) => {
            error!(error = %e, "Dashboard refresh failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_poll_once_publishes_snapshot() {
        let state = AppState::mock(Config::default(), 2);
        let mut rx = state.feed.subscribe();

        let outcome = poll_once(&state).await;
        assert!(matches!(outcome, Some(Refresh::Published(_))));
        assert!(state.feed.latest().is_some());
        assert_eq!(rx.recv().await.unwrap(), state.feed.latest().unwrap());
        assert_eq!(state.metrics.snapshot().dashboard_polls_total, 1);
    }
}
