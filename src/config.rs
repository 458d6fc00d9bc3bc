use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Allowed CORS origins. Required unless cors_permissive is true.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    #[serde(default)]
    pub cors_permissive: bool,
    /// Trip engine tuning
    #[serde(default)]
    pub trip: TripConfig,
    /// Geocoding provider
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    /// Routing provider
    #[serde(default)]
    pub router: RouterConfig,
    /// Live position feed
    #[serde(default)]
    pub live_feed: LiveFeedConfig,
}

/// Tuning for position feeds and ETA computation
#[derive(Debug, Clone, Deserialize)]
pub struct TripConfig {
    /// Assumed average speed used for ETA and timeline projection (default: 40 km/h)
    #[serde(default = "TripConfig::default_average_speed_kmh")]
    pub average_speed_kmh: f64,
    /// How long to wait for the first live position before falling back
    /// to simulation (default: 3000 ms)
    #[serde(default = "TripConfig::default_live_wait_timeout_ms")]
    pub live_wait_timeout_ms: u64,
    /// Interval between simulated position ticks (default: 2000 ms)
    #[serde(default = "TripConfig::default_simulation_tick_ms")]
    pub simulation_tick_ms: u64,
    /// How long a live feed may stay silent before it is considered dead
    /// and simulation takes over (default: 10000 ms)
    #[serde(default = "TripConfig::default_live_stale_after_ms")]
    pub live_stale_after_ms: u64,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            average_speed_kmh: Self::default_average_speed_kmh(),
            live_wait_timeout_ms: Self::default_live_wait_timeout_ms(),
            simulation_tick_ms: Self::default_simulation_tick_ms(),
            live_stale_after_ms: Self::default_live_stale_after_ms(),
        }
    }
}

impl TripConfig {
    fn default_average_speed_kmh() -> f64 {
        40.0
    }
    fn default_live_wait_timeout_ms() -> u64 {
        3000
    }
    fn default_simulation_tick_ms() -> u64 {
        2000
    }
    fn default_live_stale_after_ms() -> u64 {
        10_000
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    /// Nominatim-compatible base URL
    #[serde(default = "GeocoderConfig::default_base_url")]
    pub base_url: String,
    /// Comma-separated country codes the search is scoped to
    #[serde(default = "GeocoderConfig::default_country_codes")]
    pub country_codes: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            country_codes: Self::default_country_codes(),
        }
    }
}

impl GeocoderConfig {
    fn default_base_url() -> String {
        "https://nominatim.openstreetmap.org".to_string()
    }
    fn default_country_codes() -> String {
        "in".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// OSRM-compatible base URL
    #[serde(default = "RouterConfig::default_base_url")]
    pub base_url: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
        }
    }
}

impl RouterConfig {
    fn default_base_url() -> String {
        "https://router.project-osrm.org".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveFeedConfig {
    /// Base URL of the realtime position store; positions are read from
    /// {base_url}/buses/{bus_number}/location
    #[serde(default = "LiveFeedConfig::default_base_url")]
    pub base_url: String,
    /// Poll interval for the live position endpoint (default: 1000 ms)
    #[serde(default = "LiveFeedConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive transport failures before the subscription reports an
    /// error to its consumer (default: 3)
    #[serde(default = "LiveFeedConfig::default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            base_url: Self::default_base_url(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            max_consecutive_failures: Self::default_max_consecutive_failures(),
        }
    }
}

impl LiveFeedConfig {
    fn default_base_url() -> String {
        "https://digimarg-default-rtdb.firebaseio.com".to_string()
    }
    fn default_poll_interval_ms() -> u64 {
        1000
    }
    fn default_max_consecutive_failures() -> u32 {
        3
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.trip.average_speed_kmh > 0.0) {
            return Err(ConfigError::InvalidValue(format!(
                "trip.average_speed_kmh must be positive, got {}",
                self.trip.average_speed_kmh
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.trip.average_speed_kmh, 40.0);
        assert_eq!(config.trip.live_wait_timeout_ms, 3000);
        assert_eq!(config.trip.simulation_tick_ms, 2000);
        assert_eq!(config.geocoder.country_codes, "in");
        assert!(!config.cors_permissive);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let yaml = r#"
cors_permissive: true
trip:
  average_speed_kmh: 55.5
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.cors_permissive);
        assert_eq!(config.trip.average_speed_kmh, 55.5);
        assert_eq!(config.trip.live_wait_timeout_ms, 3000);
        assert_eq!(config.live_feed.poll_interval_ms, 1000);
    }

    #[test]
    fn nonpositive_speed_is_rejected() {
        let zero: Config = serde_yaml::from_str("trip:\n  average_speed_kmh: 0").unwrap();
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidValue(_))
        ));

        let negative: Config = serde_yaml::from_str("trip:\n  average_speed_kmh: -5").unwrap();
        assert!(negative.validate().is_err());

        let valid: Config = serde_yaml::from_str("{}").unwrap();
        assert!(valid.validate().is_ok());
    }
}
