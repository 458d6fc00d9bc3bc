//! Dual-mode position feed.
//!
//! A trip's position comes from exactly one of two sources at any instant:
//! the live subscription, or a simulated walk along the route. The feed is
//! a single spawned task that moves through the phases of [`FeedState`] and
//! reports everything it does as [`FeedEnvelope`] messages tagged with the
//! generation it was started for. The session pump on the other end of the
//! channel discards envelopes from torn-down generations, so a late
//! callback can never mutate a newer trip.

use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::config::TripConfig;
use crate::geo::GeoPoint;
use crate::providers::live::{LiveEvent, LiveSubscription};

/// Mode of the position source for an active trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FeedState {
    Idle,
    AwaitingLive,
    Live,
    Simulated,
    Stopped,
}

impl FeedState {
    /// The legal transition table. Anything not listed is rejected by the
    /// session pump.
    pub fn can_transition(self, next: FeedState) -> bool {
        use FeedState::*;
        matches!(
            (self, next),
            (Idle, AwaitingLive)
                | (Idle, Simulated)
                | (Idle, Stopped)
                | (AwaitingLive, Live)
                | (AwaitingLive, Simulated)
                | (AwaitingLive, Stopped)
                | (Live, Simulated)
                | (Live, Stopped)
                | (Simulated, Stopped)
                | (Stopped, AwaitingLive)
                | (Stopped, Simulated)
        )
    }

}

/// One message from a feed task to the session pump.
#[derive(Debug, Clone)]
pub enum FeedUpdate {
    State(FeedState),
    Position(GeoPoint),
}

#[derive(Debug, Clone)]
pub struct FeedEnvelope {
    pub generation: u64,
    pub update: FeedUpdate,
}

/// How a feed should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Try the live subscription first, fall back to simulation
    AwaitLive,
    /// Simulate immediately without touching the live source
    SimulateOnly,
}

/// Timer settings for a feed task.
#[derive(Debug, Clone, Copy)]
pub struct FeedSettings {
    pub live_wait_timeout: Duration,
    pub live_stale_after: Duration,
    pub simulation_tick: Duration,
    /// Amplitude of the random offset applied to simulated positions, in
    /// degrees. Zero disables jitter.
    pub jitter_deg: f64,
}

impl From<&TripConfig> for FeedSettings {
    fn from(config: &TripConfig) -> Self {
        Self {
            live_wait_timeout: Duration::from_millis(config.live_wait_timeout_ms),
            live_stale_after: Duration::from_millis(config.live_stale_after_ms),
            simulation_tick: Duration::from_millis(config.simulation_tick_ms),
            jitter_deg: 0.0005,
        }
    }
}

/// Handle to a running feed task. Exactly one exists per active trip; the
/// session aborts it before starting a successor.
pub struct FeedHandle {
    task: JoinHandle<()>,
}

impl FeedHandle {
    /// Synchronously cancel the feed task. Envelopes already in the channel
    /// are filtered out by generation on the receiving side.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the feed task for one trip generation.
///
/// `live` must be `Some` for [`FeedMode::AwaitLive`]; when it is `None` the
/// feed goes straight to simulation. `start_index` is where the simulated
/// walk begins (the route index nearest the last known position on resume).
pub fn spawn_feed(
    generation: u64,
    route: Vec<GeoPoint>,
    start_index: usize,
    mode: FeedMode,
    settings: FeedSettings,
    live: Option<LiveSubscription>,
    tx: mpsc::UnboundedSender<FeedEnvelope>,
) -> FeedHandle {
    let task = tokio::spawn(run_feed(
        generation,
        route,
        start_index,
        mode,
        settings,
        live,
        tx,
    ));
    FeedHandle { task }
}

async fn run_feed(
    generation: u64,
    route: Vec<GeoPoint>,
    start_index: usize,
    mode: FeedMode,
    settings: FeedSettings,
    live: Option<LiveSubscription>,
    tx: mpsc::UnboundedSender<FeedEnvelope>,
) {
    let send = |update: FeedUpdate| {
        tx.send(FeedEnvelope { generation, update }).is_ok()
    };

    let live = match mode {
        FeedMode::SimulateOnly => None,
        FeedMode::AwaitLive => live,
    };

    if let Some(mut subscription) = live {
        if !send(FeedUpdate::State(FeedState::AwaitingLive)) {
            return;
        }

        // Bounded wait for the first well-formed live report.
        let first = tokio::select! {
            event = subscription.rx.recv() => event,
            _ = tokio::time::sleep(settings.live_wait_timeout) => None,
        };

        if let Some(LiveEvent::Position(point)) = first {
            if !send(FeedUpdate::State(FeedState::Live)) || !send(FeedUpdate::Position(point)) {
                return;
            }
            // Stay live until the subscription errors, closes, or goes
            // silent past the staleness window.
            loop {
                let event = tokio::select! {
                    event = subscription.rx.recv() => event,
                    _ = tokio::time::sleep(settings.live_stale_after) => None,
                };
                match event {
                    Some(LiveEvent::Position(point)) => {
                        if !send(FeedUpdate::Position(point)) {
                            return;
                        }
                    }
                    Some(LiveEvent::Error(reason)) => {
                        tracing::warn!(generation, reason, "Live feed errored, simulating");
                        break;
                    }
                    None => {
                        tracing::info!(generation, "Live feed silent or closed, simulating");
                        break;
                    }
                }
            }
        } else {
            tracing::info!(
                generation,
                timeout_ms = settings.live_wait_timeout.as_millis() as u64,
                "No live data within wait window, simulating"
            );
        }
        // The subscription handle drops here, cancelling its poll task
        // before the simulation timer starts.
        drop(subscription);
    }

    if !send(FeedUpdate::State(FeedState::Simulated)) {
        return;
    }
    simulate(generation, &route, start_index, settings, tx).await;
}

/// Closed-loop demo motion: one route index per tick, wrapping to the start
/// after the last point. Jitter only decorates the emitted position; it
/// never feeds back into distance or ETA math.
async fn simulate(
    generation: u64,
    route: &[GeoPoint],
    start_index: usize,
    settings: FeedSettings,
    tx: mpsc::UnboundedSender<FeedEnvelope>,
) {
    if route.is_empty() {
        tracing::warn!(generation, "Cannot simulate an empty route");
        return;
    }

    let mut index = start_index.min(route.len() - 1);
    let mut interval = tokio::time::interval(settings.simulation_tick);

    loop {
        interval.tick().await;

        let base = route[index];
        let position = if settings.jitter_deg > 0.0 {
            let mut rng = rand::rng();
            GeoPoint::new(
                base.lat + rng.random_range(-settings.jitter_deg..=settings.jitter_deg),
                base.lng + rng.random_range(-settings.jitter_deg..=settings.jitter_deg),
            )
        } else {
            base
        };

        let envelope = FeedEnvelope {
            generation,
            update: FeedUpdate::Position(position),
        };
        if tx.send(envelope).is_err() {
            return;
        }

        index = (index + 1) % route.len();
    }
}
