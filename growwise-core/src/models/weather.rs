use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a weather lookup points.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl Location {
    /// Text stored in the `location` column.
    pub fn describe(&self) -> String {
        match self {
            Location::City(name) => name.clone(),
            Location::Coordinates { lat, lon } => format!("{:.4},{:.4}", lat, lon),
        }
    }
}

/// Current conditions as returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WeatherQueryRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub location: String,
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub humidity: i32,
    pub wind_speed: f64,
    pub description: String,
}
