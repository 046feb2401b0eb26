use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecordStore, COMMON_DISEASE_LIMIT};
use crate::error::{GrowError, Result};
use crate::models::{
    AppStats, Category, DiseaseCount, Location, MarketPrice, MarketPriceRecord, NewPrediction,
    PredictionRecord, VoiceQueryRecord, WeatherQueryRecord, WeatherReport,
};

#[derive(Default)]
struct Tables {
    predictions: Vec<PredictionRecord>,
    weather_queries: Vec<WeatherQueryRecord>,
    voice_queries: Vec<VoiceQueryRecord>,
    market_prices: Vec<MarketPriceRecord>,
}

/// Process-local store. Rows are kept in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T: Clone>(rows: &[T], limit: i64) -> Vec<T> {
    let limit = usize::try_from(limit).unwrap_or(0);
    rows.iter().rev().take(limit).cloned().collect()
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<String> {
        Ok("in-memory".to_string())
    }

    async fn insert_prediction(&self, prediction: &NewPrediction) -> Result<PredictionRecord> {
        if !(0.0..=100.0).contains(&prediction.confidence) {
            return Err(GrowError::Internal(format!(
                "confidence {} outside [0, 100]",
                prediction.confidence
            )));
        }

        let record = PredictionRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            image_name: prediction.image_name.clone(),
            image_bytes: prediction.image_bytes,
            disease: prediction.disease.clone(),
            formatted_name: prediction.formatted_name.clone(),
            confidence: prediction.confidence,
            treatment: prediction.treatment.clone(),
        };
        self.tables.write().await.predictions.push(record.clone());
        Ok(record)
    }

    async fn insert_weather_query(
        &self,
        location: &Location,
        report: &WeatherReport,
    ) -> Result<WeatherQueryRecord> {
        let record = WeatherQueryRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            location: location.describe(),
            city: report.city.clone(),
            country: report.country.clone(),
            temperature: report.temperature,
            humidity: report.humidity,
            wind_speed: report.wind_speed,
            description: report.description.clone(),
        };
        self.tables.write().await.weather_queries.push(record.clone());
        Ok(record)
    }

    async fn insert_voice_query(
        &self,
        query: &str,
        intent: &str,
        response: &str,
    ) -> Result<VoiceQueryRecord> {
        let record = VoiceQueryRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            query: query.to_string(),
            intent: intent.to_string(),
            response: response.to_string(),
        };
        self.tables.write().await.voice_queries.push(record.clone());
        Ok(record)
    }

    async fn recent_predictions(&self, limit: i64) -> Result<Vec<PredictionRecord>> {
        Ok(newest_first(&self.tables.read().await.predictions, limit))
    }

    async fn recent_weather_queries(&self, limit: i64) -> Result<Vec<WeatherQueryRecord>> {
        Ok(newest_first(&self.tables.read().await.weather_queries, limit))
    }

    async fn recent_voice_queries(&self, limit: i64) -> Result<Vec<VoiceQueryRecord>> {
        Ok(newest_first(&self.tables.read().await.voice_queries, limit))
    }

    async fn stats(&self) -> Result<AppStats> {
        let tables = self.tables.read().await;

        let mut counts: HashMap<&str, i64> = HashMap::new();
        for p in &tables.predictions {
            *counts.entry(p.disease.as_str()).or_insert(0) += 1;
        }
        let mut common_diseases: Vec<DiseaseCount> = counts
            .into_iter()
            .map(|(disease, count)| DiseaseCount {
                disease: disease.to_string(),
                count,
            })
            .collect();
        common_diseases.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.disease.cmp(&b.disease)));
        common_diseases.truncate(COMMON_DISEASE_LIMIT);

        Ok(AppStats {
            total_predictions: tables.predictions.len() as i64,
            weather_queries: tables.weather_queries.len() as i64,
            voice_queries: tables.voice_queries.len() as i64,
            common_diseases,
        })
    }

    async fn market_prices(&self, category: Option<Category>) -> Result<Vec<MarketPriceRecord>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<MarketPriceRecord> = tables
            .market_prices
            .iter()
            .filter(|r| category.map_or(true, |c| r.category == c))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.category
                .as_str()
                .cmp(b.category.as_str())
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(rows)
    }

    async fn replace_market_catalog(
        &self,
        sheets: &[(Category, Vec<MarketPrice>)],
    ) -> Result<usize> {
        if let Some(bad) = sheets
            .iter()
            .flat_map(|(_, prices)| prices)
            .find(|p| !p.has_valid_prices())
        {
            return Err(GrowError::Internal(format!(
                "invalid price for '{}': {} / {:?}",
                bad.name, bad.price, bad.price_max
            )));
        }

        let now = Utc::now();
        let mut tables = self.tables.write().await;
        let mut written = 0;
        for (category, prices) in sheets {
            let category = *category;
            tables.market_prices.retain(|r| r.category != category);
            tables
                .market_prices
                .extend(prices.iter().map(|p| MarketPriceRecord {
                    id: Uuid::new_v4(),
                    name: p.name.clone(),
                    category,
                    price: p.price,
                    price_max: p.price_max,
                    unit: p.unit.clone(),
                    updated_at: now,
                }));
            written += prices.len();
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(disease: &str, confidence: f64) -> NewPrediction {
        NewPrediction {
            image_name: "leaf.png".to_string(),
            image_bytes: 1024,
            disease: disease.to_string(),
            formatted_name: disease.to_string(),
            confidence,
            treatment: "water".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recent_predictions_newest_first_and_limited() {
        let store = MemoryStore::new();
        for d in ["healthy", "brown_spots", "dark_patches"] {
            store.insert_prediction(&prediction(d, 70.0)).await.unwrap();
        }

        let recent = store.recent_predictions(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].disease, "dark_patches");
        assert_eq!(recent[1].disease, "brown_spots");
    }

    #[tokio::test]
    async fn test_negative_limit_returns_nothing() {
        let store = MemoryStore::new();
        store.insert_voice_query("hi", "greeting", "hello").await.unwrap();
        assert!(store.recent_voice_queries(-1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_rejected() {
        let store = MemoryStore::new();
        assert!(store.insert_prediction(&prediction("healthy", 100.5)).await.is_err());
        assert_eq!(store.stats().await.unwrap().total_predictions, 0);
    }

    #[tokio::test]
    async fn test_stats_counts_and_common_diseases() {
        let store = MemoryStore::new();
        for d in ["healthy", "healthy", "brown_spots", "healthy", "brown_spots", "white_patches"] {
            store.insert_prediction(&prediction(d, 60.0)).await.unwrap();
        }
        store.insert_voice_query("rain?", "weather", "see weather").await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_predictions, 6);
        assert_eq!(stats.voice_queries, 1);
        assert_eq!(stats.weather_queries, 0);
        assert_eq!(stats.common_diseases[0].disease, "healthy");
        assert_eq!(stats.common_diseases[0].count, 3);
        assert_eq!(stats.common_diseases[1].disease, "brown_spots");
        assert_eq!(stats.common_diseases.len(), 3);
    }

    #[tokio::test]
    async fn test_replace_market_prices_only_touches_category() {
        let store = MemoryStore::new();
        store
            .replace_market_prices(
                Category::Vegetable,
                &[MarketPrice::new("Tomato", Category::Vegetable, 30.0, None, "kg")],
            )
            .await
            .unwrap();
        store
            .replace_market_prices(
                Category::Fruit,
                &[MarketPrice::new("Apple", Category::Fruit, 120.0, Some(150.0), "kg")],
            )
            .await
            .unwrap();
        store
            .replace_market_prices(
                Category::Vegetable,
                &[
                    MarketPrice::new("Onion", Category::Vegetable, 30.0, Some(40.0), "kg"),
                    MarketPrice::new("Carrot", Category::Vegetable, 35.0, Some(45.0), "kg"),
                ],
            )
            .await
            .unwrap();

        let all = store.market_prices(None).await.unwrap();
        let names: Vec<&str> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "Carrot", "Onion"]);

        let veg = store.market_prices(Some(Category::Vegetable)).await.unwrap();
        assert!(veg.iter().all(|r| r.category == Category::Vegetable));
        assert_eq!(veg.len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_replace_is_all_or_nothing() {
        let store = MemoryStore::new();
        store
            .replace_market_prices(
                Category::Vegetable,
                &[MarketPrice::new("Tomato", Category::Vegetable, 30.0, None, "kg")],
            )
            .await
            .unwrap();

        let sheets = vec![
            (
                Category::Vegetable,
                vec![MarketPrice::new("Onion", Category::Vegetable, 20.0, Some(30.0), "kg")],
            ),
            (
                Category::Fruit,
                vec![MarketPrice::new("Apple", Category::Fruit, -5.0, None, "kg")],
            ),
        ];
        assert!(store.replace_market_catalog(&sheets).await.is_err());

        let all = store.market_prices(None).await.unwrap();
        let names: Vec<&str> = all.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Tomato"]);
    }
}
