//! Live position subscription.
//!
//! The upstream realtime store exposes the last reported position of a bus
//! at `{base}/buses/{bus_number}/location`. This client polls it and turns
//! the samples into a push stream; consumers hold a [`LiveSubscription`]
//! whose drop tears the poll task down.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{ProviderClient, ProviderError};
use crate::config::LiveFeedConfig;
use crate::geo::GeoPoint;

/// One message from a live subscription.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// A validated position report
    Position(GeoPoint),
    /// The subscription hit repeated transport failures
    Error(String),
}

/// Handle to a running live subscription. Dropping it cancels the poll task.
pub struct LiveSubscription {
    pub rx: mpsc::Receiver<LiveEvent>,
    task: JoinHandle<()>,
}

impl LiveSubscription {
    pub(crate) fn from_parts(rx: mpsc::Receiver<LiveEvent>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Raw payload published by the realtime store. Extra fields (speed,
/// direction, timestamp) are ignored.
#[derive(Debug, Clone, Deserialize)]
struct LivePayload {
    lat: f64,
    lng: f64,
}

#[derive(Clone)]
pub struct LiveClient {
    client: ProviderClient,
    base_url: String,
    poll_interval: Duration,
    max_consecutive_failures: u32,
}

impl LiveClient {
    pub fn new(client: ProviderClient, config: &LiveFeedConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }

    /// Start polling the live position of `bus_number`.
    ///
    /// Well-formed samples become [`LiveEvent::Position`]; after
    /// `max_consecutive_failures` transport errors a single
    /// [`LiveEvent::Error`] is sent and the task ends. Malformed payloads
    /// are skipped, so a store that never publishes valid data looks like
    /// silence to the consumer.
    pub fn subscribe(&self, bus_number: &str) -> LiveSubscription {
        let (tx, rx) = mpsc::channel(16);
        let client = self.client.clone();
        let url = format!("{}/buses/{}/location.json", self.base_url, bus_number);
        let endpoint = "live/location";
        let poll_interval = self.poll_interval;
        let max_failures = self.max_consecutive_failures;
        let bus = bus_number.to_string();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            let mut consecutive_failures: u32 = 0;
            let mut last_sent: Option<GeoPoint> = None;

            loop {
                interval.tick().await;

                let mut params = HashMap::new();
                params.insert("bus_number".to_string(), bus.clone());

                match client.get_json::<Option<LivePayload>>(endpoint, &url, params).await {
                    Ok(Some(payload)) => {
                        consecutive_failures = 0;
                        let point = GeoPoint::new(payload.lat, payload.lng);
                        if !point.is_valid() {
                            warn!(bus = %bus, lat = payload.lat, lng = payload.lng, "Discarding malformed live position");
                            continue;
                        }
                        // Unchanged samples are not re-sent; the store keeps
                        // the last value even when the bus is parked.
                        if last_sent == Some(point) {
                            continue;
                        }
                        last_sent = Some(point);
                        if tx.send(LiveEvent::Position(point)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        // No data published yet for this bus.
                        consecutive_failures = 0;
                    }
                    Err(ProviderError::ParseError(e)) => {
                        consecutive_failures = 0;
                        debug!(bus = %bus, error = %e, "Malformed live payload, skipping");
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        debug!(bus = %bus, error = %e, consecutive_failures, "Live poll failed");
                        if consecutive_failures >= max_failures {
                            let _ = tx.send(LiveEvent::Error(e.to_string())).await;
                            break;
                        }
                    }
                }
            }
        });

        LiveSubscription { rx, task }
    }
}
