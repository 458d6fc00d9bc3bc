use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, RwLock};

use crate::models::TripSnapshot;
use crate::providers::ProviderRequestSender;
use crate::session::SessionManager;

#[derive(Clone)]
pub struct TripWsState {
    pub session: SessionManager,
}

/// Server message sent to trip subscribers
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ServerMessage {
    /// Initial connection acknowledgment
    Connected { message: String },
    /// One snapshot per applied feed update
    Snapshot { trip: TripSnapshot },
}

/// WebSocket endpoint for trip snapshot pushes
pub async fn ws_trip(ws: WebSocketUpgrade, State(state): State<TripWsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_trip_socket(socket, state))
}

async fn handle_trip_socket(socket: WebSocket, state: TripWsState) {
    let (mut sender, mut receiver) = socket.split();
    let mut snapshot_rx = state.session.subscribe();

    let connected_msg = ServerMessage::Connected {
        message: "Connected to trip updates".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Catch the client up with the current trip before streaming updates.
    if let Some(snapshot) = state.session.snapshot().await {
        let msg = ServerMessage::Snapshot { trip: snapshot };
        if let Ok(json) = serde_json::to_string(&msg) {
            let _ = sender.send(Message::Text(json.into())).await;
        }
    }

    // Forward broadcast snapshots to the WebSocket
    let forward_task = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(snapshot) => {
                    let msg = ServerMessage::Snapshot { trip: snapshot };
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                // A slow client just misses intermediate snapshots.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    });

    // Handle incoming messages (just wait for close)
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Ping(_)) => {
                // Axum handles pong automatically
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    forward_task.abort();
}

// ============================================================================
// Backend Diagnostics WebSocket
// ============================================================================

/// One recorded provider request inside the rolling window.
struct RecordedRequest {
    at: Instant,
    provider: String,
    duration_ms: u64,
    is_error: bool,
}

/// Rolling 60-second window of provider requests, reported per provider.
///
/// The provider key is the endpoint prefix before the first `/`, so
/// `nominatim/search`, `osrm/route` and `live/location` each get their own
/// row in the stats message.
struct RequestStats {
    recent: VecDeque<RecordedRequest>,
}

impl RequestStats {
    fn new() -> Self {
        Self {
            recent: VecDeque::new(),
        }
    }

    fn record(&mut self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let provider = endpoint
            .split('/')
            .next()
            .unwrap_or(endpoint)
            .to_string();
        self.recent.push_back(RecordedRequest {
            at: Instant::now(),
            provider,
            duration_ms,
            is_error,
        });
        self.cleanup();
    }

    fn cleanup(&mut self) {
        let cutoff = Instant::now() - std::time::Duration::from_secs(60);
        while let Some(front) = self.recent.front() {
            if front.at < cutoff {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    fn get_stats(&mut self) -> Vec<ProviderStats> {
        self.cleanup();

        // (count, summed latency, errors) per provider, in stable order
        let mut grouped: BTreeMap<&str, (u32, u64, u32)> = BTreeMap::new();
        for request in &self.recent {
            let entry = grouped.entry(request.provider.as_str()).or_default();
            entry.0 += 1;
            entry.1 += request.duration_ms;
            if request.is_error {
                entry.2 += 1;
            }
        }

        grouped
            .into_iter()
            .map(|(provider, (total, latency_sum, errors))| ProviderStats {
                provider: provider.to_string(),
                requests_per_minute: total,
                avg_latency_ms: latency_sum as f64 / total as f64,
                errors_per_minute: errors,
            })
            .collect()
    }
}

/// State for backend diagnostics WebSocket
#[derive(Clone)]
pub struct DiagnosticsWsState {
    stats: Arc<RwLock<RequestStats>>,
}

impl DiagnosticsWsState {
    pub fn new(provider_requests_tx: ProviderRequestSender) -> Self {
        let stats = Arc::new(RwLock::new(RequestStats::new()));

        // Collect statistics from outbound provider requests
        let stats_clone = stats.clone();
        let mut rx = provider_requests_tx.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(log) => {
                        let mut stats = stats_clone.write().await;
                        stats.record(&log.endpoint, log.duration_ms, log.error.is_some());
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });

        Self { stats }
    }
}

/// Per-provider request statistics
#[derive(Debug, Serialize)]
struct ProviderStats {
    /// Provider name, e.g. "nominatim", "osrm", "live"
    provider: String,
    /// Requests in the last 60 seconds
    requests_per_minute: u32,
    /// Average latency in milliseconds
    avg_latency_ms: f64,
    /// Number of errors in the last 60 seconds
    errors_per_minute: u32,
}

/// Server message for backend diagnostics
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum DiagnosticsServerMessage {
    /// Periodic statistics update, one entry per provider
    Stats { providers: Vec<ProviderStats> },
}

/// WebSocket endpoint for backend diagnostics
pub async fn ws_backend_diagnostics(
    ws: WebSocketUpgrade,
    State(state): State<DiagnosticsWsState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_diagnostics_socket(socket, state))
}

async fn handle_diagnostics_socket(socket: WebSocket, state: DiagnosticsWsState) {
    let (mut sender, mut receiver) = socket.split();

    // Send stats every second
    let stats = state.stats.clone();
    let forward_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(1));

        loop {
            interval.tick().await;

            let providers = {
                let mut stats = stats.write().await;
                stats.get_stats()
            };

            let msg = DiagnosticsServerMessage::Stats { providers };

            if let Ok(json) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages (just wait for close)
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Ping(_)) => {
                // Axum handles pong automatically
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    forward_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_stats_groups_by_provider() {
        let mut stats = RequestStats::new();
        stats.record("nominatim/search", 100, false);
        stats.record("nominatim/search", 300, true);
        stats.record("osrm/route", 50, false);

        let providers = stats.get_stats();
        assert_eq!(providers.len(), 2);

        let nominatim = &providers[0];
        assert_eq!(nominatim.provider, "nominatim");
        assert_eq!(nominatim.requests_per_minute, 2);
        assert_eq!(nominatim.errors_per_minute, 1);
        assert!((nominatim.avg_latency_ms - 200.0).abs() < f64::EPSILON);

        let osrm = &providers[1];
        assert_eq!(osrm.provider, "osrm");
        assert_eq!(osrm.requests_per_minute, 1);
        assert_eq!(osrm.errors_per_minute, 0);
    }

    #[test]
    fn request_stats_empty_window() {
        let mut stats = RequestStats::new();
        assert!(stats.get_stats().is_empty());
    }
}
