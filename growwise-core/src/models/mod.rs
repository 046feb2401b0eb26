pub mod market;
pub mod prediction;
pub mod stats;
pub mod voice;
pub mod weather;

pub use market::{Category, MarketPrice, MarketPriceRecord};
pub use prediction::{NewPrediction, PredictionRecord};
pub use stats::{AppStats, DiseaseCount};
pub use voice::VoiceQueryRecord;
pub use weather::{Location, WeatherQueryRecord, WeatherReport};
