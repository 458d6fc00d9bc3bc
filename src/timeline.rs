//! Route timeline generation.
//!
//! Samples a handful of representative stops from a route and projects an
//! arrival time for each from the assumed average speed.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::geo::{self, GeoPoint};

/// A sampled waypoint with its along-route distance and projected arrival.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TimelineEntry {
    pub index: usize,
    pub coords: GeoPoint,
    pub cumulative_km: f64,
    pub estimated_arrival: DateTime<Utc>,
    pub label: String,
}

fn arrival_at(start_time: DateTime<Utc>, cumulative_km: f64, speed_kmh: f64) -> DateTime<Utc> {
    // A speed that is zero, negative, or NaN cannot project an arrival.
    if !(speed_kmh > 0.0) {
        return start_time;
    }
    let travel_secs = (cumulative_km / speed_kmh * 3600.0).round() as i64;
    start_time + Duration::seconds(travel_secs)
}

/// Pick a highlight label proportional to position along the route, or a
/// generic stop label when none apply.
fn label_for(route_index: usize, route_len: usize, highlights: &[String], entry_count: usize) -> String {
    if !highlights.is_empty() {
        let idx = route_index * highlights.len() / route_len;
        if let Some(name) = highlights.get(idx) {
            return name.clone();
        }
    }
    // entry_count is the zero-based slot of this entry; stops read 1-based.
    format!("Stop {}", entry_count + 1)
}

/// Build the timeline for a route.
///
/// The first entry is the origin at `start_time` with zero kilometres; the
/// last is the destination at the full `cumulative_distance` of the route.
/// Intermediate entries are sampled every `max(1, N / 6)` points, skipping
/// the final partial segment. Routes with fewer than two points produce an
/// empty timeline, which callers treat as "no timeline available".
pub fn build_timeline(
    route: &[GeoPoint],
    highlights: &[String],
    origin_label: &str,
    destination_label: &str,
    start_time: DateTime<Utc>,
    average_speed_kmh: f64,
) -> Vec<TimelineEntry> {
    let n = route.len();
    if n < 2 {
        return Vec::new();
    }

    let profile = geo::cumulative_profile(route);
    let total_km = profile[n - 1];
    let mut entries = Vec::new();

    entries.push(TimelineEntry {
        index: 0,
        coords: route[0],
        cumulative_km: 0.0,
        estimated_arrival: start_time,
        label: if origin_label.is_empty() {
            "Start".to_string()
        } else {
            origin_label.to_string()
        },
    });

    let step = (n / 6).max(1);
    let mut i = step;
    while i + step <= n - 1 {
        let cumulative_km = profile[i];
        entries.push(TimelineEntry {
            index: entries.len(),
            coords: route[i],
            cumulative_km,
            estimated_arrival: arrival_at(start_time, cumulative_km, average_speed_kmh),
            label: label_for(i, n, highlights, entries.len()),
        });
        i += step;
    }

    entries.push(TimelineEntry {
        index: entries.len(),
        coords: route[n - 1],
        cumulative_km: total_km,
        estimated_arrival: arrival_at(start_time, total_km, average_speed_kmh),
        label: if destination_label.is_empty() {
            "Destination".to_string()
        } else {
            destination_label.to_string()
        },
    });

    entries
}
