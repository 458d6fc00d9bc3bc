//! API-facing data models shared between the session layer and handlers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::BusRecord;
use crate::feed::FeedState;
use crate::geo::GeoPoint;
use crate::resolver::ResolveWarning;
use crate::timeline::TimelineEntry;

/// Complete view of the active trip at one instant.
///
/// Everything a client needs to render the map, the timeline, and the ETA
/// card in a single message. Produced only by the session layer, so all
/// derived quantities are consistent with each other.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripSnapshot {
    /// Catalog route id when the trip was resolved by vehicle
    pub route_id: Option<String>,
    pub origin: String,
    pub destination: String,
    /// Catalog metadata for the tracked bus, if any
    pub bus: Option<BusRecord>,
    /// Non-terminal conditions from route resolution, e.g. an unknown
    /// vehicle that was substituted with the default route
    pub warning: Option<ResolveWarning>,
    pub feed_state: FeedState,
    /// Last accepted position; `None` until the feed produces one
    pub current_position: Option<GeoPoint>,
    /// Index into `timeline` of the entry nearest the current position,
    /// -1 when no position or no timeline exists
    pub progress_index: i32,
    pub total_distance_km: f64,
    pub covered_distance_km: f64,
    pub eta_minutes: f64,
    pub average_speed_kmh: f64,
    pub started_at: DateTime<Utc>,
    pub timeline: Vec<TimelineEntry>,
    /// Full route polyline for map rendering
    pub route: Vec<GeoPoint>,
}

/// Request body for starting a trip.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StartTripRequest {
    /// Track a catalog vehicle by bus number
    pub by_vehicle: Option<ByVehicle>,
    /// Track a free-text place pair via geocoding and routing
    pub by_places: Option<ByPlaces>,
    /// Skip the live feed and simulate immediately
    #[serde(default)]
    pub simulate: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ByVehicle {
    pub bus_number: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ByPlaces {
    pub from: String,
    pub to: String,
}
