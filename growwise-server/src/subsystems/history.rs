use std::sync::Arc;

use growwise_core::error::Result;
use growwise_core::models::{AppStats, PredictionRecord, VoiceQueryRecord, WeatherQueryRecord};
use growwise_core::store::RecordStore;

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Missing limit uses the default; anything else is clamped to [1, MAX].
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

/// Read side over the log tables.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn RecordStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn predictions(&self, limit: Option<i64>) -> Result<Vec<PredictionRecord>> {
        self.store.recent_predictions(clamp_limit(limit)).await
    }

    pub async fn weather(&self, limit: Option<i64>) -> Result<Vec<WeatherQueryRecord>> {
        self.store.recent_weather_queries(clamp_limit(limit)).await
    }

    pub async fn voice(&self, limit: Option<i64>) -> Result<Vec<VoiceQueryRecord>> {
        self.store.recent_voice_queries(clamp_limit(limit)).await
    }

    pub async fn stats(&self) -> Result<AppStats> {
        self.store.stats().await
    }
}
