//! OpenWeatherMap client for GrowWise
//!
//! Calls the "current weather" endpoint once per lookup and maps the provider
//! payload into a `WeatherReport`. There is no retry: a failed call surfaces as
//! a `WeatherError` and the caller decides what to do with it.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

use crate::config::WeatherConfig;
use crate::error::GrowError;
use crate::models::{Location, WeatherReport};

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("Missing API key")]
    MissingApiKey,
}

impl WeatherError {
    /// Provider HTTP status, when the provider answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            WeatherError::Api { code, .. } => Some(*code),
            WeatherError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<WeatherError> for GrowError {
    fn from(e: WeatherError) -> Self {
        GrowError::ProviderUnavailable {
            status: e.status(),
            message: e.to_string(),
        }
    }
}

// ============================================================================
// Provider payload (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    name: String,
    main: ProviderMain,
    wind: ProviderWind,
    #[serde(default)]
    weather: Vec<ProviderCondition>,
    #[serde(default)]
    sys: Option<ProviderSys>,
}

#[derive(Debug, Deserialize)]
struct ProviderMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct ProviderWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct ProviderCondition {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ProviderSys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorResponse {
    message: Option<String>,
}

// ============================================================================
// OpenWeatherClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    units: String,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::with_base_url(config, config.base_url.clone())
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: &WeatherConfig, base_url: String) -> Result<Self, WeatherError> {
        let api_key = config.resolved_api_key();
        if api_key.is_empty() {
            return Err(WeatherError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key,
            units: config.units.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_url(&self, location: &Location) -> Result<Url, WeatherError> {
        let endpoint = format!("{}/weather", self.base_url);
        let mut params: Vec<(&str, String)> = match location {
            Location::City(city) => vec![("q", city.clone())],
            Location::Coordinates { lat, lon } => {
                vec![("lat", lat.to_string()), ("lon", lon.to_string())]
            }
        };
        params.push(("appid", self.api_key.clone()));
        params.push(("units", self.units.clone()));

        Url::parse_with_params(&endpoint, &params)
            .map_err(|e| WeatherError::InvalidUrl(format!("{}: {}", endpoint, e)))
    }

    /// Fetch current conditions for `location`. Single attempt.
    pub async fn current(&self, location: &Location) -> Result<WeatherReport, WeatherError> {
        let url = self.request_url(location)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(code = status.as_u16(), detail = %message, "Weather provider error");

            return Err(WeatherError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let payload: ProviderResponse = serde_json::from_str(&body)
            .map_err(|e| WeatherError::Malformed(e.to_string()))?;

        into_report(payload)
    }
}

fn into_report(payload: ProviderResponse) -> Result<WeatherReport, WeatherError> {
    let temperature = payload.main.temp;
    if !temperature.is_finite() {
        return Err(WeatherError::Malformed(format!(
            "temperature is not finite: {}",
            temperature
        )));
    }

    let humidity = payload.main.humidity.round();
    if !(0.0..=100.0).contains(&humidity) {
        return Err(WeatherError::Malformed(format!(
            "humidity outside [0, 100]: {}",
            humidity
        )));
    }

    let description = payload
        .weather
        .first()
        .map(|w| title_case(&w.description))
        .unwrap_or_default();

    Ok(WeatherReport {
        city: payload.name,
        country: payload.sys.and_then(|s| s.country).unwrap_or_default(),
        temperature,
        humidity: humidity as i32,
        wind_speed: payload.wind.speed,
        description,
    })
}

/// "scattered clouds" -> "Scattered Clouds"
pub fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> WeatherConfig {
        WeatherConfig {
            api_key: Some("test-api-key".to_string()),
            base_url: "http://unused".to_string(),
            units: "metric".to_string(),
            timeout_seconds: 5,
        }
    }

    fn mock_weather_response() -> serde_json::Value {
        serde_json::json!({
            "name": "Chennai",
            "main": { "temp": 31.4, "humidity": 74 },
            "wind": { "speed": 4.1 },
            "weather": [{ "description": "scattered clouds" }],
            "sys": { "country": "IN" }
        })
    }

    #[tokio::test]
    async fn test_city_lookup_maps_provider_fields() {
        let mock_server = MockServer::start().await;
        let client = OpenWeatherClient::with_base_url(&test_config(), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Chennai"))
            .and(query_param("appid", "test-api-key"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_weather_response()))
            .mount(&mock_server)
            .await;

        let report = client
            .current(&Location::City("Chennai".to_string()))
            .await
            .expect("lookup should succeed");

        assert_eq!(report.city, "Chennai");
        assert_eq!(report.country, "IN");
        assert_eq!(report.humidity, 74);
        assert!(report.temperature.is_finite());
        assert_eq!(report.description, "Scattered Clouds");
    }

    #[tokio::test]
    async fn test_coordinate_lookup_sends_lat_lon() {
        let mock_server = MockServer::start().await;
        let client = OpenWeatherClient::with_base_url(&test_config(), mock_server.uri()).unwrap();

        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("lat", "13.08"))
            .and(query_param("lon", "80.27"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_weather_response()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client
            .current(&Location::Coordinates { lat: 13.08, lon: 80.27 })
            .await;
        assert!(result.is_ok(), "Expected Ok, got {:?}", result.err());
    }

    #[tokio::test]
    async fn test_non_200_is_api_error_with_status() {
        let mock_server = MockServer::start().await;
        let client = OpenWeatherClient::with_base_url(&test_config(), mock_server.uri()).unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "cod": "404",
                "message": "city not found"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client.current(&Location::City("Atlantis".to_string())).await;
        match result {
            Err(WeatherError::Api { code, message }) => {
                assert_eq!(code, 404);
                assert_eq!(message, "city not found");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_out_of_range_humidity_is_malformed() {
        let mock_server = MockServer::start().await;
        let client = OpenWeatherClient::with_base_url(&test_config(), mock_server.uri()).unwrap();

        let mut body = mock_weather_response();
        body["main"]["humidity"] = serde_json::json!(140);

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let result = client.current(&Location::City("Chennai".to_string())).await;
        assert!(matches!(result, Err(WeatherError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_missing_fields_is_malformed() {
        let mock_server = MockServer::start().await;
        let client = OpenWeatherClient::with_base_url(&test_config(), mock_server.uri()).unwrap();

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "Nowhere" })),
            )
            .mount(&mock_server)
            .await;

        let result = client.current(&Location::City("Nowhere".to_string())).await;
        assert!(matches!(result, Err(WeatherError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_unreachable_provider_maps_to_provider_unavailable() {
        // Nothing listens on port 9 (discard) in the test environment.
        let client =
            OpenWeatherClient::with_base_url(&test_config(), "http://127.0.0.1:9".to_string())
                .unwrap();

        let err = client
            .current(&Location::City("Chennai".to_string()))
            .await
            .expect_err("connection should fail");
        assert!(matches!(err, WeatherError::Http(_)));

        let grow: GrowError = err.into();
        assert!(matches!(
            grow,
            GrowError::ProviderUnavailable { status: None, .. }
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let config = WeatherConfig {
            api_key: Some(String::new()),
            ..test_config()
        };
        // An explicit empty key does not fall back to the environment.
        let result = OpenWeatherClient::new(&config);
        assert!(matches!(result, Err(WeatherError::MissingApiKey)));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("light RAIN"), "Light Rain");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("clear  sky"), "Clear Sky");
    }
}
