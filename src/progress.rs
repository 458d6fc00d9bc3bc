//! Progress indexing: maps a raw position to the nearest timeline entry.

use crate::geo::{self, GeoPoint};
use crate::timeline::TimelineEntry;

/// Index of the timeline entry nearest to `position`, or -1 when there is
/// no position or no timeline. UI consumers classify entries before the
/// index as reached, the entry at it as current, and the rest as upcoming.
pub fn current_entry_index(position: Option<GeoPoint>, timeline: &[TimelineEntry]) -> i32 {
    let Some(position) = position else {
        return -1;
    };
    let coords: Vec<GeoPoint> = timeline.iter().map(|e| e.coords).collect();
    match geo::nearest_index(position, &coords) {
        Some(i) => i as i32,
        None => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::build_timeline;
    use chrono::Utc;

    fn timeline() -> Vec<TimelineEntry> {
        let route = vec![
            GeoPoint::new(31.6340, 74.8723),
            GeoPoint::new(31.6100, 74.7700),
            GeoPoint::new(31.5950, 74.6700),
            GeoPoint::new(31.5820, 74.5730),
        ];
        build_timeline(&route, &[], "A", "B", Utc::now(), 40.0)
    }

    #[test]
    fn missing_position_or_timeline_is_minus_one() {
        assert_eq!(current_entry_index(None, &timeline()), -1);
        assert_eq!(
            current_entry_index(Some(GeoPoint::new(31.6, 74.7)), &[]),
            -1
        );
    }

    #[test]
    fn index_stays_in_bounds() {
        let tl = timeline();
        let probes = [
            GeoPoint::new(31.6340, 74.8723),
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(-31.0, -74.0),
        ];
        for probe in probes {
            let idx = current_entry_index(Some(probe), &tl);
            assert!(idx >= -1 && (idx as i64) < tl.len() as i64);
        }
    }

    #[test]
    fn position_at_destination_maps_to_last_entry() {
        let tl = timeline();
        let idx = current_entry_index(Some(GeoPoint::new(31.5820, 74.5730)), &tl);
        assert_eq!(idx as usize, tl.len() - 1);
    }

    #[test]
    fn position_near_origin_maps_to_first_entry() {
        let tl = timeline();
        let idx = current_entry_index(Some(GeoPoint::new(31.6345, 74.8720)), &tl);
        assert_eq!(idx, 0);
    }
}
