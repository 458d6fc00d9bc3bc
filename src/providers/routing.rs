//! OSRM driving-route lookup.

use serde::Deserialize;
use std::collections::HashMap;

use super::{ProviderClient, ProviderError};
use crate::config::RouterConfig;
use crate::geo::GeoPoint;

/// Routing client backed by an OSRM-compatible HTTP server.
#[derive(Clone)]
pub struct RoutingClient {
    client: ProviderClient,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
}

/// GeoJSON LineString: coordinates are [longitude, latitude] pairs.
#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

impl RoutingClient {
    pub fn new(client: ProviderClient, config: &RouterConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch an ordered driving polyline between two points.
    ///
    /// Returns an empty vector when the router finds no path; callers decide
    /// whether that is terminal.
    pub async fn fetch_route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
    ) -> Result<Vec<GeoPoint>, ProviderError> {
        let mut params = HashMap::new();
        params.insert("from".to_string(), format!("{},{}", from.lat, from.lng));
        params.insert("to".to_string(), format!("{},{}", to.lat, to.lng));

        // OSRM's coordinate order is lng,lat.
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, from.lng, from.lat, to.lng, to.lat
        );

        let response: OsrmResponse = self.client.get_json("osrm/route", &url, params).await?;

        let Some(route) = response.routes.into_iter().next() else {
            return Ok(Vec::new());
        };

        let polyline: Vec<GeoPoint> = route
            .geometry
            .coordinates
            .into_iter()
            .map(|[lng, lat]| GeoPoint::new(lat, lng))
            .collect();

        if polyline.iter().any(|p| !p.is_valid()) {
            return Err(ProviderError::ParseError(
                "Route polyline contains out-of-range coordinates".to_string(),
            ));
        }

        Ok(polyline)
    }
}
