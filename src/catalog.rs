//! Static route and vehicle catalog.
//!
//! A read-only, in-memory catalog of well-known Punjab bus routes. Vehicle
//! metadata is carried verbatim so API consumers see exactly what the
//! catalog records.

use serde::Serialize;
use std::sync::OnceLock;
use utoipa::ToSchema;

use crate::geo::GeoPoint;

/// A scheduled stop on a catalogued route.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CatalogStop {
    pub name: String,
    pub coords: GeoPoint,
    /// Scheduled departure from this stop, "HH:MM" local time
    pub scheduled: String,
}

/// A bus operating on a catalogued route.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BusRecord {
    pub bus_number: String,
    pub name: String,
    pub bus_type: String,
    pub capacity: u32,
    pub fare: String,
    pub driver: String,
    pub phone: String,
}

/// A catalogued route with its ordered stop list and operating buses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteRecord {
    pub id: String,
    pub name: String,
    pub origin: String,
    pub destination: String,
    /// Named points of interest along the route, in travel order
    pub highlights: Vec<String>,
    pub stops: Vec<CatalogStop>,
    pub buses: Vec<BusRecord>,
}

impl RouteRecord {
    /// The route geometry as a bare point sequence.
    pub fn points(&self) -> Vec<GeoPoint> {
        self.stops.iter().map(|s| s.coords).collect()
    }
}

fn stop(name: &str, lat: f64, lng: f64, scheduled: &str) -> CatalogStop {
    CatalogStop {
        name: name.to_string(),
        coords: GeoPoint::new(lat, lng),
        scheduled: scheduled.to_string(),
    }
}

fn bus(
    bus_number: &str,
    name: &str,
    bus_type: &str,
    capacity: u32,
    fare: &str,
    driver: &str,
    phone: &str,
) -> BusRecord {
    BusRecord {
        bus_number: bus_number.to_string(),
        name: name.to_string(),
        bus_type: bus_type.to_string(),
        capacity,
        fare: fare.to_string(),
        driver: driver.to_string(),
        phone: phone.to_string(),
    }
}

fn build_catalog() -> Vec<RouteRecord> {
    vec![
        RouteRecord {
            id: "PB001".to_string(),
            name: "Amritsar → Wagah Border".to_string(),
            origin: "Amritsar Bus Stand".to_string(),
            destination: "Wagah Border".to_string(),
            highlights: vec![
                "Golden Temple".to_string(),
                "Kapurthala architecture".to_string(),
                "Jalandhar sports hub".to_string(),
                "Wagah Border ceremony".to_string(),
            ],
            stops: vec![
                stop("Amritsar Bus Stand", 31.6340, 74.8723, "05:00"),
                stop("Golden Temple", 31.6200, 74.8765, "05:15"),
                stop("Jallianwala Bagh", 31.6206, 74.8769, "05:20"),
                stop("Partition Museum", 31.6210, 74.8770, "05:25"),
                stop("Attari Railway Station", 31.6000, 74.6000, "05:45"),
                stop("Wagah Border", 31.5820, 74.5730, "06:00"),
            ],
            buses: vec![
                bus(
                    "PB20480001",
                    "Heritage Express",
                    "AC Deluxe",
                    50,
                    "₹25",
                    "Rajinder Singh",
                    "+91 98765 43210",
                ),
                bus(
                    "PB20480002",
                    "Golden Temple Special",
                    "Non-AC",
                    60,
                    "₹15",
                    "Gurpreet Singh",
                    "+91 98765 43211",
                ),
                bus(
                    "PB20480003",
                    "Border Express",
                    "AC Semi-Sleeper",
                    40,
                    "₹35",
                    "Harjinder Singh",
                    "+91 98765 43212",
                ),
            ],
        },
        RouteRecord {
            id: "PB002".to_string(),
            name: "Chandigarh → Amritsar".to_string(),
            origin: "Chandigarh ISBT".to_string(),
            destination: "Amritsar Bus Stand".to_string(),
            highlights: vec![
                "Mohali IT hub".to_string(),
                "Jalandhar Devi Talab Mandir".to_string(),
                "Pushpa Gujral Science City".to_string(),
                "Golden Temple".to_string(),
            ],
            stops: vec![
                stop("Chandigarh ISBT", 30.7333, 76.7794, "04:00"),
                stop("Mohali", 30.7046, 76.7179, "04:30"),
                stop("Ropar", 30.9685, 76.5262, "05:30"),
                stop("Jalandhar", 31.3260, 75.5762, "07:00"),
                stop("Kapurthala", 31.3800, 75.3800, "07:45"),
                stop("Amritsar Bus Stand", 31.6340, 74.8723, "08:30"),
            ],
            buses: vec![
                bus(
                    "PB20480004",
                    "Chandigarh Express",
                    "AC Volvo",
                    50,
                    "₹450",
                    "Manpreet Singh",
                    "+91 98765 43213",
                ),
                bus(
                    "PB20480005",
                    "Punjab Superfast",
                    "AC Deluxe",
                    45,
                    "₹380",
                    "Jasbir Singh",
                    "+91 98765 43214",
                ),
                bus(
                    "PB20480006",
                    "Golden Express",
                    "Non-AC",
                    60,
                    "₹280",
                    "Sukhdev Singh",
                    "+91 98765 43215",
                ),
            ],
        },
        RouteRecord {
            id: "PB003".to_string(),
            name: "Heritage Street, Amritsar".to_string(),
            origin: "Golden Temple".to_string(),
            destination: "Jallianwala Bagh".to_string(),
            highlights: vec![
                "Jallianwala Bagh".to_string(),
                "Partition Museum".to_string(),
                "Heritage architecture".to_string(),
            ],
            stops: vec![
                stop("Golden Temple", 31.6200, 74.8765, "06:00"),
                stop("Heritage Street", 31.6203, 74.8767, "06:05"),
                stop("Partition Museum", 31.6205, 74.8768, "06:10"),
                stop("Jallianwala Bagh", 31.6206, 74.8769, "06:15"),
            ],
            buses: vec![
                bus(
                    "PB20480007",
                    "Heritage Shuttle",
                    "Electric Bus",
                    30,
                    "₹10",
                    "Balwinder Singh",
                    "+91 98765 43216",
                ),
                bus(
                    "PB20480008",
                    "Temple Express",
                    "Mini Bus",
                    25,
                    "₹8",
                    "Gurdeep Singh",
                    "+91 98765 43217",
                ),
            ],
        },
        RouteRecord {
            id: "PB004".to_string(),
            name: "Guru Gobind Singh Marg".to_string(),
            origin: "Anandpur Sahib".to_string(),
            destination: "Talwandi Sabo".to_string(),
            highlights: vec![
                "Anandpur Sahib".to_string(),
                "Chamkaur Sahib".to_string(),
                "Muktsar".to_string(),
                "Talwandi Sabo".to_string(),
            ],
            stops: vec![
                stop("Anandpur Sahib", 31.2360, 76.4997, "05:00"),
                stop("Chamkaur Sahib", 30.9000, 76.4000, "06:30"),
                stop("Muktsar", 30.4740, 74.5160, "10:00"),
                stop("Talwandi Sabo", 29.9850, 75.0910, "12:00"),
            ],
            buses: vec![
                bus(
                    "PB20480009",
                    "Guru Marg Express",
                    "AC Sleeper",
                    40,
                    "₹650",
                    "Harbhajan Singh",
                    "+91 98765 43218",
                ),
                bus(
                    "PB20480010",
                    "Sikh Heritage",
                    "AC Deluxe",
                    45,
                    "₹580",
                    "Kuldeep Singh",
                    "+91 98765 43219",
                ),
            ],
        },
        RouteRecord {
            id: "PB005".to_string(),
            name: "Chandigarh → Shimla".to_string(),
            origin: "Chandigarh ISBT".to_string(),
            destination: "Shimla ISBT".to_string(),
            highlights: vec![
                "Mall Road Shimla".to_string(),
                "Jakhoo Temple".to_string(),
                "Kasauli sunset points".to_string(),
                "Parwanoo Timber Trail".to_string(),
            ],
            stops: vec![
                stop("Chandigarh ISBT", 30.7333, 76.7794, "05:30"),
                stop("Zirakpur", 30.6426, 76.8173, "06:00"),
                stop("Parwanoo", 30.8372, 76.9614, "06:45"),
                stop("Kasauli", 30.9000, 76.9600, "07:30"),
                stop("Shimla ISBT", 31.1048, 77.1734, "09:00"),
            ],
            buses: vec![
                bus(
                    "PB20480011",
                    "Himalayan Express",
                    "AC Volvo",
                    50,
                    "₹320",
                    "Ravinder Singh",
                    "+91 98765 43220",
                ),
                bus(
                    "PB20480012",
                    "Hill Station Special",
                    "AC Deluxe",
                    45,
                    "₹280",
                    "Narinder Singh",
                    "+91 98765 43221",
                ),
            ],
        },
        RouteRecord {
            id: "PB006".to_string(),
            name: "Himalayan Expressway".to_string(),
            origin: "Zirakpur".to_string(),
            destination: "Parwanoo".to_string(),
            highlights: vec![
                "Smooth modern highway".to_string(),
                "Gateway to Himachal hills".to_string(),
            ],
            stops: vec![
                stop("Zirakpur", 30.6426, 76.8173, "06:00"),
                stop("Expressway Toll", 30.7000, 76.8500, "06:15"),
                stop("Parwanoo", 30.8372, 76.9614, "06:30"),
            ],
            buses: vec![
                bus(
                    "PB20480013",
                    "Expressway Express",
                    "AC Deluxe",
                    40,
                    "₹45",
                    "Jagtar Singh",
                    "+91 98765 43222",
                ),
                bus(
                    "PB20480014",
                    "Highway Shuttle",
                    "Non-AC",
                    50,
                    "₹35",
                    "Gurmeet Singh",
                    "+91 98765 43223",
                ),
            ],
        },
    ]
}

/// All catalogued routes, built once on first access.
pub fn all_routes() -> &'static [RouteRecord] {
    static CATALOG: OnceLock<Vec<RouteRecord>> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Look up a route by its catalog id (e.g. "PB001").
pub fn find_route(id: &str) -> Option<&'static RouteRecord> {
    all_routes().iter().find(|r| r.id.eq_ignore_ascii_case(id))
}

/// Look up a bus across all routes by its registration number.
pub fn find_bus(bus_number: &str) -> Option<(&'static BusRecord, &'static RouteRecord)> {
    for route in all_routes() {
        if let Some(bus) = route
            .buses
            .iter()
            .find(|b| b.bus_number.eq_ignore_ascii_case(bus_number))
        {
            return Some((bus, route));
        }
    }
    None
}

/// The fallback route used when an unknown vehicle is requested:
/// Amritsar Bus Stand to Wagah Border.
pub fn default_route() -> &'static RouteRecord {
    // PB001 doubles as the documented fallback.
    &all_routes()[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_routes_have_valid_geometry() {
        for route in all_routes() {
            assert!(route.stops.len() >= 2, "route {} too short", route.id);
            assert!(
                route.stops.iter().all(|s| s.coords.is_valid()),
                "route {} has invalid coordinates",
                route.id
            );
            assert!(!route.buses.is_empty());
        }
    }

    #[test]
    fn find_route_is_case_insensitive() {
        assert!(find_route("pb001").is_some());
        assert!(find_route("PB001").is_some());
        assert!(find_route("PB999").is_none());
    }

    #[test]
    fn find_bus_returns_owning_route() {
        let (bus, route) = find_bus("PB20480004").expect("known bus");
        assert_eq!(bus.name, "Chandigarh Express");
        assert_eq!(route.id, "PB002");
        assert!(find_bus("XX00000000").is_none());
    }

    #[test]
    fn default_route_is_amritsar_wagah() {
        let route = default_route();
        assert_eq!(route.id, "PB001");
        assert_eq!(route.stops.len(), 6);
    }
}
