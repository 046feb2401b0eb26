pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;
pub mod weather;

pub use api::ApiResponse;
pub use config::GrowConfig;
pub use error::GrowError;
pub use store::{MemoryStore, PgStore, RecordStore};
pub use weather::{OpenWeatherClient, WeatherError};
