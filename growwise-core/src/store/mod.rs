//! Persistence for the four GrowWise log tables.
//!
//! `RecordStore` is the seam between the services and the database. Two
//! implementations exist:
//! - **PgStore**: PostgreSQL through a sqlx pool; every write runs in its own
//!   transaction, so an early return rolls back when the handle is dropped.
//! - **MemoryStore**: process-local tables, used when no database URL is
//!   configured and by the HTTP tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{
    AppStats, Category, Location, MarketPrice, MarketPriceRecord, NewPrediction,
    PredictionRecord, VoiceQueryRecord, WeatherQueryRecord, WeatherReport,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Number of entries in `AppStats::common_diseases`.
pub const COMMON_DISEASE_LIMIT: usize = 5;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name for health output and logging.
    fn backend(&self) -> &'static str;

    /// Round-trip to the backend. Returns a version string.
    async fn ping(&self) -> Result<String>;

    async fn insert_prediction(&self, prediction: &NewPrediction) -> Result<PredictionRecord>;

    async fn insert_weather_query(
        &self,
        location: &Location,
        report: &WeatherReport,
    ) -> Result<WeatherQueryRecord>;

    async fn insert_voice_query(
        &self,
        query: &str,
        intent: &str,
        response: &str,
    ) -> Result<VoiceQueryRecord>;

    /// Newest first.
    async fn recent_predictions(&self, limit: i64) -> Result<Vec<PredictionRecord>>;

    /// Newest first.
    async fn recent_weather_queries(&self, limit: i64) -> Result<Vec<WeatherQueryRecord>>;

    /// Newest first.
    async fn recent_voice_queries(&self, limit: i64) -> Result<Vec<VoiceQueryRecord>>;

    async fn stats(&self) -> Result<AppStats>;

    /// Ordered by category, then name. `None` returns every category.
    async fn market_prices(&self, category: Option<Category>) -> Result<Vec<MarketPriceRecord>>;

    /// Replace every category named in `sheets` with its rows, all or nothing.
    /// Each row is stored under its sheet's category regardless of the entry's
    /// own field. Categories not named are left alone. Returns rows written.
    async fn replace_market_catalog(&self, sheets: &[(Category, Vec<MarketPrice>)])
        -> Result<usize>;

    /// Single-category form of `replace_market_catalog`.
    async fn replace_market_prices(
        &self,
        category: Category,
        prices: &[MarketPrice],
    ) -> Result<usize> {
        self.replace_market_catalog(&[(category, prices.to_vec())])
            .await
    }
}

/// Open the configured store: PostgreSQL when a URL resolves, otherwise in-memory.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn RecordStore>> {
    match config.resolved_url() {
        Some(url) => {
            let pool = crate::db::create_pool(config, &url).await?;
            crate::db::run_migrations(&pool).await?;
            tracing::info!("Connected to PostgreSQL, migrations applied");
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            tracing::warn!("No database URL configured, using in-memory store (records are not persisted)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
