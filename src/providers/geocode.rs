//! Nominatim place-name lookup.

use serde::Deserialize;
use std::collections::HashMap;

use super::{ProviderClient, ProviderError};
use crate::config::GeocoderConfig;
use crate::geo::GeoPoint;

/// Geocoding client backed by a Nominatim-compatible search endpoint.
#[derive(Clone)]
pub struct GeocodeClient {
    client: ProviderClient,
    base_url: String,
    country_codes: String,
}

/// One Nominatim search result. Coordinates arrive as strings.
#[derive(Debug, Clone, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

impl GeocodeClient {
    pub fn new(client: ProviderClient, config: &GeocoderConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            country_codes: config.country_codes.clone(),
        }
    }

    /// Resolve a free-text place name to a coordinate.
    ///
    /// Returns `Ok(None)` when the name matches nothing; transport and
    /// malformed-response failures surface as errors.
    pub async fn lookup(&self, place: &str) -> Result<Option<GeoPoint>, ProviderError> {
        let mut params = HashMap::new();
        params.insert("q".to_string(), place.to_string());
        params.insert("countrycodes".to_string(), self.country_codes.clone());

        let url = format!(
            "{}/search?format=json&q={}&limit=1&addressdetails=1&countrycodes={}",
            self.base_url,
            urlencoding::encode(place),
            self.country_codes
        );

        let results: Vec<SearchResult> = self
            .client
            .get_json("nominatim/search", &url, params)
            .await?;

        let Some(first) = results.into_iter().next() else {
            return Ok(None);
        };

        let lat: f64 = first
            .lat
            .parse()
            .map_err(|e| ProviderError::ParseError(format!("Bad latitude '{}': {}", first.lat, e)))?;
        let lng: f64 = first
            .lon
            .parse()
            .map_err(|e| ProviderError::ParseError(format!("Bad longitude '{}': {}", first.lon, e)))?;

        let point = GeoPoint::new(lat, lng);
        if !point.is_valid() {
            return Err(ProviderError::ParseError(format!(
                "Coordinates out of range: {}, {}",
                lat, lng
            )));
        }

        Ok(Some(point))
    }
}
