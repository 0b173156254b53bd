//! Dashboard overview, live analytics snapshot and its WebSocket stream

use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    Json,
};
use chrono::Utc;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::dashboard::{dashboard_query, DashboardData, DashboardSnapshot, Refresh};
use crate::error::Result;
use crate::routes::analytics::run_query;
use crate::state::AppState;

/// GET /api/dashboard
///
/// Fraud overview: metric cards, trends, recent alerts and pattern insights.
pub async fn overview(State(state): State<AppState>) -> Result<Json<DashboardData>> {
    state.dashboard.overview().await.map(Json).map_err(|e| {
        error!(error = %e, "Failed to load dashboard overview");
        e
    })
}

/// GET /api/analytics/dashboard
///
/// Latest polled snapshot. Before the first poll completes the dashboard
/// query is executed on demand.
pub async fn snapshot(State(state): State<AppState>) -> Result<Json<DashboardSnapshot>> {
    if let Some(snapshot) = state.feed.latest() {
        return Ok(Json(snapshot));
    }

    match state.feed.refresh(state.executor.as_ref()).await {
        Ok(Refresh::Published(snapshot)) => {
            state.metrics.inc_dashboard_polls();
            Ok(Json(snapshot))
        }
        // A poll is already fetching; answer without waiting for it
        Ok(Refresh::Skipped) => {
            let result = run_query(&state, &dashboard_query(Utc::now())).await?;
            Ok(Json(DashboardSnapshot::new(result, Utc::now())))
        }
        Err(e) => {
            error!(error = %e, "Dashboard query failed");
            Err(e)
        }
    }
}

/// GET /api/analytics/dashboard/ws
///
/// Upgrades connection to WebSocket. The current snapshot, if any, is sent
/// immediately, followed by every snapshot the poller publishes.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("Dashboard WebSocket client connected");
    state.metrics.inc_ws_connections();

    let (mut sender, mut receiver) = socket.split();
    // Subscribe before reading the latest snapshot so nothing published in
    // between is missed
    let mut snapshots = state.feed.subscribe();
    let initial = state.feed.latest();

    let mut send_task = tokio::spawn(async move {
        if let Some(snapshot) = initial {
            if send_snapshot(&mut sender, &snapshot).await.is_err() {
                return;
            }
        }
        loop {
            match snapshots.recv().await {
                Ok(snapshot) => {
                    if send_snapshot(&mut sender, &snapshot).await.is_err() {
                        // Client disconnected
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(lagged = count, "Dashboard subscriber lagged, snapshots dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Drain client frames until it goes away
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.metrics.dec_ws_connections();
    info!("Dashboard WebSocket client disconnected");
}

async fn send_snapshot<S>(
    sender: &mut S,
    snapshot: &DashboardSnapshot,
) -> std::result::Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(snapshot) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize dashboard snapshot");
            return Ok(());
        }
    };
    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
