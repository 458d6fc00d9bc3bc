//! Route acquisition.
//!
//! Turns a tracking request (a known bus number, or a pair of place names)
//! into an ordered point sequence plus whatever catalog metadata applies.
//! Nothing is committed anywhere until a non-empty route exists; terminal
//! failures leave no trace.

use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::catalog::{self, BusRecord};
use crate::geo::GeoPoint;
use crate::providers::geocode::GeocodeClient;
use crate::providers::routing::RoutingClient;
use crate::providers::ProviderError;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No coordinates found for place '{place}'")]
    GeocodeNotFound { place: String },
    #[error("No route found between the given locations")]
    RouteNotFound,
    #[error("Route data is unusable: {0}")]
    InvalidRouteData(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Non-terminal conditions the caller must be told about.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveWarning {
    /// The requested vehicle is not in the catalog; the default route was
    /// substituted so tracking stays usable.
    UnknownVehicle { requested: String },
}

/// A committed route, ready to back a trip session.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub points: Vec<GeoPoint>,
    pub origin: String,
    pub destination: String,
    /// Named points of interest used for timeline labels
    pub highlights: Vec<String>,
    /// Catalog metadata when resolved by vehicle, passed through untouched
    pub bus: Option<BusRecord>,
    pub route_id: Option<String>,
    pub warning: Option<ResolveWarning>,
}

/// External lookup from place name to coordinate.
pub trait PlaceLookup {
    async fn lookup(&self, place: &str) -> Result<Option<GeoPoint>, ProviderError>;
}

impl PlaceLookup for GeocodeClient {
    async fn lookup(&self, place: &str) -> Result<Option<GeoPoint>, ProviderError> {
        GeocodeClient::lookup(self, place).await
    }
}

/// External lookup from a coordinate pair to an ordered polyline.
pub trait RouteLookup {
    async fn fetch_route(&self, from: GeoPoint, to: GeoPoint)
        -> Result<Vec<GeoPoint>, ProviderError>;
}

impl RouteLookup for RoutingClient {
    async fn fetch_route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<Vec<GeoPoint>, ProviderError> {
        RoutingClient::fetch_route(self, from, to).await
    }
}

pub struct RouteResolver<G = GeocodeClient, R = RoutingClient> {
    geocoder: G,
    router: R,
}

impl<G: PlaceLookup, R: RouteLookup> RouteResolver<G, R> {
    pub fn new(geocoder: G, router: R) -> Self {
        Self { geocoder, router }
    }

    /// Resolve a trip by bus number from the static catalog.
    ///
    /// Unknown vehicles fall back to the documented default route and carry
    /// an explicit [`ResolveWarning::UnknownVehicle`]; the fallback is never
    /// silent.
    pub fn resolve_vehicle(&self, bus_number: &str) -> ResolvedRoute {
        match catalog::find_bus(bus_number) {
            Some((bus, route)) => ResolvedRoute {
                points: route.points(),
                origin: route.origin.clone(),
                destination: route.destination.clone(),
                highlights: route.highlights.clone(),
                bus: Some(bus.clone()),
                route_id: Some(route.id.clone()),
                warning: None,
            },
            None => {
                warn!(bus_number, "Vehicle not in catalog, using default route");
                let fallback = catalog::default_route();
                ResolvedRoute {
                    points: fallback.points(),
                    origin: fallback.origin.clone(),
                    destination: fallback.destination.clone(),
                    highlights: fallback.highlights.clone(),
                    bus: None,
                    route_id: Some(fallback.id.clone()),
                    warning: Some(ResolveWarning::UnknownVehicle {
                        requested: bus_number.to_string(),
                    }),
                }
            }
        }
    }

    /// Resolve a trip from two free-text place names via the external
    /// geocoder and router. Terminal on any miss: the caller gets the error
    /// and no route exists.
    pub async fn resolve_places(
        &self,
        from: &str,
        to: &str,
    ) -> Result<ResolvedRoute, ResolveError> {
        let from_point =
            self.geocoder
                .lookup(from)
                .await?
                .ok_or_else(|| ResolveError::GeocodeNotFound {
                    place: from.to_string(),
                })?;
        let to_point =
            self.geocoder
                .lookup(to)
                .await?
                .ok_or_else(|| ResolveError::GeocodeNotFound {
                    place: to.to_string(),
                })?;

        let polyline = self.router.fetch_route(from_point, to_point).await?;
        if polyline.is_empty() {
            return Err(ResolveError::RouteNotFound);
        }
        if polyline.len() < 2 {
            return Err(ResolveError::InvalidRouteData(format!(
                "Router returned {} point(s)",
                polyline.len()
            )));
        }

        Ok(ResolvedRoute {
            points: polyline,
            origin: from.to_string(),
            destination: to.to_string(),
            highlights: Vec::new(),
            bus: None,
            route_id: None,
            warning: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubGeocoder {
        known: Vec<(&'static str, GeoPoint)>,
    }

    impl PlaceLookup for StubGeocoder {
        async fn lookup(&self, place: &str) -> Result<Option<GeoPoint>, ProviderError> {
            Ok(self
                .known
                .iter()
                .find(|(name, _)| *name == place)
                .map(|(_, p)| *p))
        }
    }

    struct StubRouter {
        polyline: Vec<GeoPoint>,
    }

    impl RouteLookup for StubRouter {
        async fn fetch_route(
            &self,
            _from: GeoPoint,
            _to: GeoPoint,
        ) -> Result<Vec<GeoPoint>, ProviderError> {
            Ok(self.polyline.clone())
        }
    }

    fn resolver(
        known: Vec<(&'static str, GeoPoint)>,
        polyline: Vec<GeoPoint>,
    ) -> RouteResolver<StubGeocoder, StubRouter> {
        RouteResolver::new(StubGeocoder { known }, StubRouter { polyline })
    }

    #[test]
    fn known_vehicle_gets_catalog_route_and_metadata() {
        let r = resolver(vec![], vec![]);
        let resolved = r.resolve_vehicle("PB20480001");
        assert_eq!(resolved.route_id.as_deref(), Some("PB001"));
        assert_eq!(resolved.points.len(), 6);
        assert!(resolved.warning.is_none());
        assert_eq!(resolved.bus.as_ref().unwrap().name, "Heritage Express");
    }

    #[test]
    fn unknown_vehicle_falls_back_with_explicit_warning() {
        let r = resolver(vec![], vec![]);
        let resolved = r.resolve_vehicle("XX123");
        assert_eq!(resolved.route_id.as_deref(), Some("PB001"));
        assert!(resolved.bus.is_none());
        assert!(matches!(
            resolved.warning,
            Some(ResolveWarning::UnknownVehicle { ref requested }) if requested == "XX123"
        ));
    }

    #[tokio::test]
    async fn unrecognized_place_is_terminal() {
        let r = resolver(
            vec![("Amritsar", GeoPoint::new(31.6340, 74.8723))],
            vec![GeoPoint::new(31.0, 74.0), GeoPoint::new(31.1, 74.1)],
        );
        let err = r.resolve_places("Amritsar", "Atlantis").await.unwrap_err();
        assert!(matches!(
            err,
            ResolveError::GeocodeNotFound { ref place } if place == "Atlantis"
        ));
    }

    #[tokio::test]
    async fn empty_polyline_is_route_not_found() {
        let r = resolver(
            vec![
                ("Amritsar", GeoPoint::new(31.6340, 74.8723)),
                ("Wagah", GeoPoint::new(31.5820, 74.5730)),
            ],
            vec![],
        );
        let err = r.resolve_places("Amritsar", "Wagah").await.unwrap_err();
        assert!(matches!(err, ResolveError::RouteNotFound));
    }

    #[tokio::test]
    async fn place_pair_returns_polyline() {
        let polyline = vec![
            GeoPoint::new(31.6340, 74.8723),
            GeoPoint::new(31.6000, 74.7000),
            GeoPoint::new(31.5820, 74.5730),
        ];
        let r = resolver(
            vec![
                ("Amritsar", GeoPoint::new(31.6340, 74.8723)),
                ("Wagah", GeoPoint::new(31.5820, 74.5730)),
            ],
            polyline.clone(),
        );
        let resolved = r.resolve_places("Amritsar", "Wagah").await.unwrap();
        assert_eq!(resolved.points, polyline);
        assert_eq!(resolved.origin, "Amritsar");
        assert_eq!(resolved.destination, "Wagah");
        assert!(resolved.bus.is_none());
    }
}
