//! Trip session orchestration.
//!
//! [`SessionManager`] owns the single active trip. All state mutation goes
//! through it: commands (start, pause, resume, reset, clear) take the write
//! lock directly, while feed tasks send [`FeedEnvelope`] messages that a
//! single pump task applies in arrival order. Every envelope carries the
//! generation it was produced for; the pump drops anything from a
//! generation that has since been torn down, so a replaced feed can never
//! write into its successor's trip.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::BusRecord;
use crate::config::TripConfig;
use crate::feed::{self, FeedEnvelope, FeedHandle, FeedMode, FeedSettings, FeedState, FeedUpdate};
use crate::geo::{self, GeoPoint};
use crate::models::TripSnapshot;
use crate::progress;
use crate::providers::live::LiveClient;
use crate::resolver::{ResolveWarning, ResolvedRoute};
use crate::timeline::{self, TimelineEntry};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No active trip")]
    NoActiveTrip,
    #[error("Trip is not paused")]
    NotPaused,
}

/// The active trip. Private to this module; the outside world only ever
/// sees [`TripSnapshot`] values derived from it.
struct TripState {
    generation: u64,
    route: Vec<GeoPoint>,
    /// Prefix sums of the route length, aligned with `route`
    profile: Vec<f64>,
    timeline: Vec<TimelineEntry>,
    route_id: Option<String>,
    origin: String,
    destination: String,
    highlights: Vec<String>,
    bus: Option<BusRecord>,
    warning: Option<ResolveWarning>,
    simulate_only: bool,
    started_at: DateTime<Utc>,
    position: Option<GeoPoint>,
    feed_state: FeedState,
    /// Aborts the feed task when dropped or replaced
    feed: Option<FeedHandle>,
}

struct Inner {
    trip: RwLock<Option<TripState>>,
    /// Monotonic source of feed generations; the authoritative value for
    /// the live trip is `TripState::generation`
    generation: AtomicU64,
    snapshot_tx: broadcast::Sender<TripSnapshot>,
    settings: FeedSettings,
    average_speed_kmh: f64,
    live_client: Option<LiveClient>,
}

#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
    update_tx: mpsc::UnboundedSender<FeedEnvelope>,
}

impl SessionManager {
    /// Create the manager and spawn its update pump. `live_client` is
    /// `None` when no realtime store is available; every trip then
    /// simulates.
    pub fn new(config: &TripConfig, live_client: Option<LiveClient>) -> Self {
        let (snapshot_tx, _) = broadcast::channel(64);
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            trip: RwLock::new(None),
            generation: AtomicU64::new(0),
            snapshot_tx,
            settings: FeedSettings::from(config),
            average_speed_kmh: config.average_speed_kmh,
            live_client,
        });
        tokio::spawn(pump(inner.clone(), update_rx));
        Self { inner, update_tx }
    }

    /// Receiver for snapshot broadcasts, one per applied feed update.
    pub fn subscribe(&self) -> broadcast::Receiver<TripSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Install a resolved route as the active trip, replacing any previous
    /// one. The old feed is aborted before the new trip becomes visible.
    pub async fn start_trip(&self, resolved: ResolvedRoute, simulate_only: bool) -> TripSnapshot {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started_at = Utc::now();
        let timeline = timeline::build_timeline(
            &resolved.points,
            &resolved.highlights,
            &resolved.origin,
            &resolved.destination,
            started_at,
            self.inner.average_speed_kmh,
        );

        let trip = TripState {
            generation,
            profile: geo::cumulative_profile(&resolved.points),
            route: resolved.points,
            timeline,
            route_id: resolved.route_id,
            origin: resolved.origin,
            destination: resolved.destination,
            highlights: resolved.highlights,
            bus: resolved.bus,
            warning: resolved.warning,
            simulate_only,
            started_at,
            position: None,
            feed_state: FeedState::Idle,
            feed: None,
        };

        info!(
            generation,
            origin = %trip.origin,
            destination = %trip.destination,
            points = trip.route.len(),
            simulate_only,
            "Trip started"
        );

        // Install first, launch second, all under the write lock: dropping
        // the old state aborts its feed before the new one exists, and the
        // new feed's first envelope cannot reach the pump until the trip it
        // belongs to is in place.
        let mut guard = self.inner.trip.write().await;
        let trip = guard.insert(trip);
        trip.feed = Some(self.launch_feed(trip, 0));

        let snapshot = build_snapshot(trip, self.inner.average_speed_kmh);
        let _ = self.inner.snapshot_tx.send(snapshot.clone());
        snapshot
    }

    /// Stop position updates, keeping the trip and its last position.
    pub async fn pause(&self) -> Result<TripSnapshot, SessionError> {
        let mut guard = self.inner.trip.write().await;
        let trip = guard.as_mut().ok_or(SessionError::NoActiveTrip)?;
        // Every non-Stopped state has a legal edge to Stopped.
        if trip.feed_state.can_transition(FeedState::Stopped) {
            trip.generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            trip.feed = None;
            trip.feed_state = FeedState::Stopped;
            info!(generation = trip.generation, "Trip paused");
        }
        let snapshot = build_snapshot(trip, self.inner.average_speed_kmh);
        let _ = self.inner.snapshot_tx.send(snapshot.clone());
        Ok(snapshot)
    }

    /// Restart the feed of a paused trip from the route point nearest its
    /// last position.
    pub async fn resume(&self) -> Result<TripSnapshot, SessionError> {
        let mut guard = self.inner.trip.write().await;
        let trip = guard.as_mut().ok_or(SessionError::NoActiveTrip)?;
        if trip.feed_state != FeedState::Stopped {
            return Err(SessionError::NotPaused);
        }
        let start_index = trip
            .position
            .and_then(|p| geo::nearest_index(p, &trip.route))
            .unwrap_or(0);
        trip.generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        trip.feed = Some(self.launch_feed(trip, start_index));
        info!(generation = trip.generation, start_index, "Trip resumed");

        let snapshot = build_snapshot(trip, self.inner.average_speed_kmh);
        let _ = self.inner.snapshot_tx.send(snapshot.clone());
        Ok(snapshot)
    }

    /// Restart the trip from the origin with a fresh start time.
    pub async fn reset(&self) -> Result<TripSnapshot, SessionError> {
        let mut guard = self.inner.trip.write().await;
        let trip = guard.as_mut().ok_or(SessionError::NoActiveTrip)?;
        trip.generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        trip.started_at = Utc::now();
        trip.position = None;
        trip.feed_state = FeedState::Idle;
        trip.timeline = timeline::build_timeline(
            &trip.route,
            &trip.highlights,
            &trip.origin,
            &trip.destination,
            trip.started_at,
            self.inner.average_speed_kmh,
        );
        trip.feed = Some(self.launch_feed(trip, 0));
        info!(generation = trip.generation, "Trip reset");

        let snapshot = build_snapshot(trip, self.inner.average_speed_kmh);
        let _ = self.inner.snapshot_tx.send(snapshot.clone());
        Ok(snapshot)
    }

    /// Tear down the active trip entirely. Idempotent.
    pub async fn clear(&self) -> bool {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.inner.trip.write().await;
        let existed = guard.take().is_some();
        if existed {
            info!("Trip cleared");
        }
        existed
    }

    /// Current view of the active trip, if any.
    pub async fn snapshot(&self) -> Option<TripSnapshot> {
        let guard = self.inner.trip.read().await;
        guard
            .as_ref()
            .map(|trip| build_snapshot(trip, self.inner.average_speed_kmh))
    }

    fn launch_feed(&self, trip: &TripState, start_index: usize) -> FeedHandle {
        let live = match (&self.inner.live_client, &trip.bus, trip.simulate_only) {
            (Some(client), Some(bus), false) => Some(client.subscribe(&bus.bus_number)),
            _ => None,
        };
        let mode = if live.is_some() {
            FeedMode::AwaitLive
        } else {
            FeedMode::SimulateOnly
        };
        feed::spawn_feed(
            trip.generation,
            trip.route.clone(),
            start_index,
            mode,
            self.inner.settings,
            live,
            self.update_tx.clone(),
        )
    }
}

/// Applies feed envelopes to the trip, strictly in arrival order.
async fn pump(inner: Arc<Inner>, mut rx: mpsc::UnboundedReceiver<FeedEnvelope>) {
    while let Some(envelope) = rx.recv().await {
        let snapshot = {
            let mut guard = inner.trip.write().await;
            let Some(trip) = guard.as_mut() else {
                continue;
            };
            if envelope.generation != trip.generation {
                debug!(
                    envelope_generation = envelope.generation,
                    trip_generation = trip.generation,
                    "Discarding stale feed envelope"
                );
                continue;
            }
            match envelope.update {
                FeedUpdate::State(next) => {
                    if trip.feed_state.can_transition(next) {
                        debug!(from = ?trip.feed_state, to = ?next, "Feed state transition");
                        trip.feed_state = next;
                    } else {
                        warn!(
                            from = ?trip.feed_state,
                            to = ?next,
                            "Rejected illegal feed state transition"
                        );
                        continue;
                    }
                }
                FeedUpdate::Position(point) => {
                    if !point.is_valid() {
                        warn!(lat = point.lat, lng = point.lng, "Dropped invalid position");
                        continue;
                    }
                    trip.position = Some(point);
                }
            }
            build_snapshot(trip, inner.average_speed_kmh)
        };
        let _ = inner.snapshot_tx.send(snapshot);
    }
}

fn build_snapshot(trip: &TripState, average_speed_kmh: f64) -> TripSnapshot {
    let total_distance_km = trip.profile.last().copied().unwrap_or(0.0);
    let covered_distance_km = trip
        .position
        .and_then(|p| geo::nearest_index(p, &trip.route))
        .map(|i| trip.profile[i])
        .unwrap_or(0.0);
    let eta_minutes = if average_speed_kmh > 0.0 {
        ((total_distance_km - covered_distance_km) / average_speed_kmh * 60.0).max(0.0)
    } else {
        0.0
    };

    TripSnapshot {
        route_id: trip.route_id.clone(),
        origin: trip.origin.clone(),
        destination: trip.destination.clone(),
        bus: trip.bus.clone(),
        warning: trip.warning.clone(),
        feed_state: trip.feed_state,
        current_position: trip.position,
        progress_index: progress::current_entry_index(trip.position, &trip.timeline),
        total_distance_km,
        covered_distance_km,
        eta_minutes,
        average_speed_kmh,
        started_at: trip.started_at,
        timeline: trip.timeline.clone(),
        route: trip.route.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use approx::assert_relative_eq;
    use std::time::Duration;

    fn manager() -> SessionManager {
        let config = TripConfig {
            average_speed_kmh: 40.0,
            live_wait_timeout_ms: 3000,
            simulation_tick_ms: 1000,
            live_stale_after_ms: 10_000,
        };
        SessionManager::new(&config, None)
    }

    fn amritsar_wagah() -> ResolvedRoute {
        let route = catalog::default_route();
        ResolvedRoute {
            points: route.points(),
            origin: route.origin.clone(),
            destination: route.destination.clone(),
            highlights: route.highlights.clone(),
            bus: None,
            route_id: Some(route.id.clone()),
            warning: None,
        }
    }

    fn direct_amritsar_wagah() -> ResolvedRoute {
        // A near-straight Amritsar to Wagah polyline of about 29 km.
        ResolvedRoute {
            points: vec![
                GeoPoint::new(31.6340, 74.8723),
                GeoPoint::new(31.6200, 74.8000),
                GeoPoint::new(31.6050, 74.7300),
                GeoPoint::new(31.5950, 74.6500),
                GeoPoint::new(31.5820, 74.5730),
            ],
            origin: "Amritsar".to_string(),
            destination: "Wagah Border".to_string(),
            highlights: Vec::new(),
            bus: None,
            route_id: None,
            warning: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_trip_projects_eta_from_route_length_and_speed() {
        let manager = manager();
        let snapshot = manager.start_trip(direct_amritsar_wagah(), true).await;

        // About 29 km at 40 km/h lands the initial ETA in the low-to-mid
        // forties of minutes.
        assert!(
            (28.0..30.0).contains(&snapshot.total_distance_km),
            "total was {} km",
            snapshot.total_distance_km
        );
        assert!(
            (41.0..=46.0).contains(&snapshot.eta_minutes),
            "eta was {}",
            snapshot.eta_minutes
        );
        assert_relative_eq!(
            snapshot.eta_minutes,
            snapshot.total_distance_km / 40.0 * 60.0,
            max_relative = 1e-12
        );
        assert_eq!(snapshot.covered_distance_km, 0.0);
        assert_eq!(snapshot.progress_index, -1);
        assert!(snapshot.current_position.is_none());
        assert!(!snapshot.timeline.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_trip_progresses_and_eta_shrinks() {
        let manager = manager();
        let initial = manager.start_trip(amritsar_wagah(), true).await;

        // Walk a few simulated ticks into the route.
        tokio::time::sleep(Duration::from_millis(3500)).await;
        tokio::task::yield_now().await;

        let snapshot = manager.snapshot().await.unwrap();
        assert_eq!(snapshot.feed_state, FeedState::Simulated);
        assert!(snapshot.current_position.is_some());
        assert!(snapshot.progress_index >= 0);
        assert!(snapshot.covered_distance_km <= snapshot.total_distance_km);
        assert!(snapshot.eta_minutes <= initial.eta_minutes);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_position_and_resume_continues() {
        let manager = manager();
        manager.start_trip(amritsar_wagah(), true).await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        tokio::task::yield_now().await;

        let paused = manager.pause().await.unwrap();
        assert_eq!(paused.feed_state, FeedState::Stopped);
        let frozen = paused.current_position;
        assert!(frozen.is_some());

        // No motion while paused.
        tokio::time::sleep(Duration::from_millis(5000)).await;
        tokio::task::yield_now().await;
        let still = manager.snapshot().await.unwrap();
        assert_eq!(still.current_position, frozen);
        assert_eq!(still.feed_state, FeedState::Stopped);

        manager.resume().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        tokio::task::yield_now().await;
        let resumed = manager.snapshot().await.unwrap();
        assert_eq!(resumed.feed_state, FeedState::Simulated);
        assert!(resumed.current_position.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_immediately_after_start_lands_stopped() {
        let manager = manager();
        manager.start_trip(amritsar_wagah(), true).await;
        // No delay: the feed's first envelope may not have been applied yet.
        let paused = manager.pause().await.unwrap();
        assert_eq!(paused.feed_state, FeedState::Stopped);

        tokio::time::sleep(Duration::from_millis(3000)).await;
        tokio::task::yield_now().await;
        let still = manager.snapshot().await.unwrap();
        assert_eq!(still.feed_state, FeedState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_requires_a_paused_trip() {
        let manager = manager();
        assert!(matches!(
            manager.resume().await,
            Err(SessionError::NoActiveTrip)
        ));

        manager.start_trip(amritsar_wagah(), true).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        tokio::task::yield_now().await;
        assert!(matches!(manager.resume().await, Err(SessionError::NotPaused)));
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_the_trip_discards_late_updates_from_the_old_feed() {
        let manager = manager();
        manager.start_trip(amritsar_wagah(), true).await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        tokio::task::yield_now().await;

        // Start a second trip on a different catalog route.
        let other = catalog::find_route("PB002").unwrap();
        let replacement = ResolvedRoute {
            points: other.points(),
            origin: other.origin.clone(),
            destination: other.destination.clone(),
            highlights: other.highlights.clone(),
            bus: None,
            route_id: Some(other.id.clone()),
            warning: None,
        };
        manager.start_trip(replacement, true).await;
        tokio::time::sleep(Duration::from_millis(2500)).await;
        tokio::task::yield_now().await;

        // Every position after the swap belongs to the new route.
        let snapshot = manager.snapshot().await.unwrap();
        assert_eq!(snapshot.route_id.as_deref(), Some("PB002"));
        let position = snapshot.current_position.unwrap();
        let nearest_new = snapshot
            .route
            .iter()
            .map(|p| crate::geo::distance_km(position, *p))
            .fold(f64::INFINITY, f64::min);
        assert!(nearest_new < 1.0, "position {position:?} strayed off-route");
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_from_origin_with_fresh_timeline() {
        let manager = manager();
        let initial = manager.start_trip(amritsar_wagah(), true).await;
        tokio::time::sleep(Duration::from_millis(3500)).await;
        tokio::task::yield_now().await;

        let reset = manager.reset().await.unwrap();
        assert!(reset.current_position.is_none());
        assert_eq!(reset.progress_index, -1);
        assert!(reset.started_at >= initial.started_at);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        tokio::task::yield_now().await;
        let moving = manager.snapshot().await.unwrap();
        assert_eq!(moving.feed_state, FeedState::Simulated);
        // The restarted simulator ticks immediately at route[0] and again at
        // the 1000 ms mark, so 1500 ms in it sits at route[1] (plus jitter).
        let position = moving.current_position.unwrap();
        assert!(crate::geo::distance_km(position, moving.route[1]) < 0.2);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_is_idempotent_and_removes_the_trip() {
        let manager = manager();
        assert!(!manager.clear().await);

        manager.start_trip(amritsar_wagah(), true).await;
        assert!(manager.clear().await);
        assert!(manager.snapshot().await.is_none());
        assert!(!manager.clear().await);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshots_are_broadcast_per_update() {
        let manager = manager();
        let mut rx = manager.subscribe();
        manager.start_trip(amritsar_wagah(), true).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;
        tokio::task::yield_now().await;

        // The install itself is announced before any feed envelope lands.
        let first = rx.recv().await.unwrap();
        assert_eq!(first.feed_state, FeedState::Idle);
        assert!(first.current_position.is_none());

        let second = rx.recv().await.unwrap();
        assert_eq!(second.feed_state, FeedState::Simulated);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_restarts_never_strand_feed_state_at_idle() {
        let manager = manager();
        // Each restart replaces the trip while the previous feed's first
        // envelopes may still be in flight; a position must never be
        // applied to a trip whose state is still Idle.
        for _ in 0..5 {
            manager.start_trip(amritsar_wagah(), true).await;
            tokio::time::sleep(Duration::from_millis(30)).await;
            tokio::task::yield_now().await;
            let snapshot = manager.snapshot().await.unwrap();
            if snapshot.current_position.is_some() {
                assert_ne!(snapshot.feed_state, FeedState::Idle);
            }
        }

        tokio::time::sleep(Duration::from_millis(1500)).await;
        tokio::task::yield_now().await;
        let snapshot = manager.snapshot().await.unwrap();
        assert_eq!(snapshot.feed_state, FeedState::Simulated);
        assert!(snapshot.current_position.is_some());
    }
}
