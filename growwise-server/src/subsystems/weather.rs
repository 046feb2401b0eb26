use std::sync::Arc;

use growwise_core::error::{GrowError, Result};
use growwise_core::models::{Location, WeatherReport};
use growwise_core::store::RecordStore;
use growwise_core::OpenWeatherClient;

/// Pick the lookup target. A non-blank city wins over coordinates; coordinates
/// need both halves and must be in range.
pub fn resolve_location(city: Option<&str>, lat: Option<f64>, lon: Option<f64>) -> Result<Location> {
    if let Some(city) = city.map(str::trim).filter(|c| !c.is_empty()) {
        return Ok(Location::City(city.to_string()));
    }

    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(GrowError::validation("lat must be between -90 and 90"));
            }
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                return Err(GrowError::validation("lon must be between -180 and 180"));
            }
            Ok(Location::Coordinates { lat, lon })
        }
        (Some(_), None) => Err(GrowError::validation("lon is required when lat is given")),
        (None, Some(_)) => Err(GrowError::validation("lat is required when lon is given")),
        (None, None) => Err(GrowError::validation("City name or coordinates are required")),
    }
}

/// Provider lookup followed by one logged row.
#[derive(Clone)]
pub struct WeatherService {
    client: Option<OpenWeatherClient>,
    store: Arc<dyn RecordStore>,
}

impl WeatherService {
    /// `client` is `None` when no API key is configured; lookups then fail as
    /// provider-unavailable.
    pub fn new(client: Option<OpenWeatherClient>, store: Arc<dyn RecordStore>) -> Self {
        Self { client, store }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub async fn lookup(&self, location: &Location) -> Result<WeatherReport> {
        let client = self.client.as_ref().ok_or_else(|| GrowError::ProviderUnavailable {
            status: None,
            message: "Weather provider is not configured".to_string(),
        })?;

        let report = client.current(location).await.map_err(|e| {
            tracing::warn!(location = %location.describe(), error = %e, "Weather lookup failed");
            GrowError::from(e)
        })?;

        self.store.insert_weather_query(location, &report).await?;
        Ok(report)
    }
}
