use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius in kilometres, used for haversine distances.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether the coordinates are finite and inside the valid WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Great-circle distance between two points in kilometres (haversine).
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let sin_d_lat = (d_lat / 2.0).sin();
    let sin_d_lng = (d_lng / 2.0).sin();
    let h = sin_d_lat * sin_d_lat + lat1.cos() * lat2.cos() * sin_d_lng * sin_d_lng;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Total polyline length in kilometres. Zero for routes with fewer than two points.
pub fn cumulative_distance(route: &[GeoPoint]) -> f64 {
    route
        .windows(2)
        .map(|pair| distance_km(pair[0], pair[1]))
        .sum()
}

/// Prefix sums of the polyline length, one entry per route point.
///
/// `profile[i]` is the distance travelled along the route from the origin to
/// point `i`, so `profile[0] == 0.0` and the last entry equals
/// `cumulative_distance(route)`.
pub fn cumulative_profile(route: &[GeoPoint]) -> Vec<f64> {
    let mut profile = Vec::with_capacity(route.len());
    let mut acc = 0.0;
    for (i, point) in route.iter().enumerate() {
        if i > 0 {
            acc += distance_km(route[i - 1], *point);
        }
        profile.push(acc);
    }
    profile
}

/// Index of the candidate nearest to `point`, ties broken by lowest index.
/// `None` for an empty candidate list.
pub fn nearest_index(point: GeoPoint, candidates: &[GeoPoint]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        let d = distance_km(point, *candidate);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const AMRITSAR: GeoPoint = GeoPoint {
        lat: 31.6340,
        lng: 74.8723,
    };
    const WAGAH: GeoPoint = GeoPoint {
        lat: 31.5820,
        lng: 74.5730,
    };

    #[test]
    fn distance_is_zero_for_identical_points() {
        assert_eq!(distance_km(AMRITSAR, AMRITSAR), 0.0);
        let p = GeoPoint::new(-45.0, 170.0);
        assert_eq!(distance_km(p, p), 0.0);
    }

    #[test]
    fn distance_is_symmetric_and_positive() {
        let ab = distance_km(AMRITSAR, WAGAH);
        let ba = distance_km(WAGAH, AMRITSAR);
        assert!(ab > 0.0);
        assert_relative_eq!(ab, ba, max_relative = 1e-12);
    }

    #[test]
    fn amritsar_to_wagah_is_about_29_km() {
        let d = distance_km(AMRITSAR, WAGAH);
        assert!((28.5..29.5).contains(&d), "got {d} km");
    }

    #[test]
    fn cumulative_distance_degenerate_routes() {
        assert_eq!(cumulative_distance(&[]), 0.0);
        assert_eq!(cumulative_distance(&[AMRITSAR]), 0.0);
    }

    #[test]
    fn cumulative_profile_matches_total() {
        let route = vec![
            AMRITSAR,
            GeoPoint::new(31.6200, 74.8000),
            GeoPoint::new(31.6050, 74.7300),
            WAGAH,
        ];
        let profile = cumulative_profile(&route);
        assert_eq!(profile.len(), route.len());
        assert_eq!(profile[0], 0.0);
        assert_relative_eq!(
            *profile.last().unwrap(),
            cumulative_distance(&route),
            max_relative = 1e-12
        );
        assert!(profile.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn nearest_index_picks_closest_with_lowest_index_on_tie() {
        let candidates = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 2.0),
            GeoPoint::new(0.0, 2.0),
        ];
        let probe = GeoPoint::new(0.0, 1.9);
        assert_eq!(nearest_index(probe, &candidates), Some(1));

        // Equidistant from both ends: lowest index wins.
        let midpoint = GeoPoint::new(0.0, 1.0);
        let ends = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 2.0)];
        assert_eq!(nearest_index(midpoint, &ends), Some(0));
    }

    #[test]
    fn nearest_index_empty_input() {
        assert_eq!(nearest_index(AMRITSAR, &[]), None);
    }

    #[test]
    fn geopoint_validity_ranges() {
        assert!(GeoPoint::new(90.0, 180.0).is_valid());
        assert!(GeoPoint::new(-90.0, -180.0).is_valid());
        assert!(!GeoPoint::new(90.1, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
