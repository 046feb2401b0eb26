use std::sync::Arc;

use growwise_core::error::{GrowError, Result};
use growwise_core::models::NewPrediction;
use growwise_core::store::RecordStore;
use growwise_core::{GrowConfig, OpenWeatherClient, WeatherError};
use serde_json::{json, Value};

use crate::subsystems::disease::{DiseaseDetector, ImageUpload};
use crate::subsystems::history::HistoryService;
use crate::subsystems::market::MarketService;
use crate::subsystems::voice::VoiceResponder;
use crate::subsystems::weather::{resolve_location, WeatherService};

/// Services built once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: GrowConfig,
    pub store: Arc<dyn RecordStore>,
    pub weather: WeatherService,
    pub disease: DiseaseDetector,
    pub market: MarketService,
    pub voice: VoiceResponder,
    pub history: HistoryService,
}

impl AppState {
    pub fn new(config: GrowConfig, store: Arc<dyn RecordStore>) -> Result<Self> {
        let client = match OpenWeatherClient::new(&config.weather) {
            Ok(c) => Some(c),
            Err(WeatherError::MissingApiKey) => {
                tracing::warn!("No OpenWeather API key configured, weather lookups will fail");
                None
            }
            Err(e) => return Err(GrowError::Internal(format!("weather client: {}", e))),
        };

        Ok(Self {
            weather: WeatherService::new(client, store.clone()),
            disease: DiseaseDetector::new(&config.disease, config.http.max_upload_bytes),
            market: MarketService::new(store.clone(), &config.market)?,
            voice: VoiceResponder::new(),
            history: HistoryService::new(store.clone()),
            store,
            config,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Predictions,
    Weather,
    Voice,
}

/// One validated call into exactly one service.
#[derive(Debug)]
pub enum AppRequest {
    Weather {
        city: Option<String>,
        lat: Option<f64>,
        lon: Option<f64>,
    },
    Predict {
        upload: ImageUpload,
    },
    Prices {
        category: Option<String>,
    },
    RefreshPrices,
    Voice {
        query: String,
    },
    History {
        kind: HistoryKind,
        limit: Option<i64>,
    },
    Stats,
    Help,
}

impl AppRequest {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppRequest::Weather { .. } => "weather",
            AppRequest::Predict { .. } => "predict",
            AppRequest::Prices { .. } => "prices",
            AppRequest::RefreshPrices => "refresh_prices",
            AppRequest::Voice { .. } => "voice",
            AppRequest::History { .. } => "history",
            AppRequest::Stats => "stats",
            AppRequest::Help => "help",
        }
    }
}

/// Run a request against its service and return the `data` payload.
pub async fn handle_request(request: AppRequest, state: &AppState) -> Result<Value> {
    match request {
        AppRequest::Weather { city, lat, lon } => {
            let location = resolve_location(city.as_deref(), lat, lon)?;
            let report = state.weather.lookup(&location).await?;
            to_value(&report)
        }
        AppRequest::Predict { upload } => handle_predict(upload, state).await,
        AppRequest::Prices { category } => {
            let prices = state.market.list(category.as_deref()).await?;
            to_value(&prices)
        }
        AppRequest::RefreshPrices => {
            let report = state.market.refresh().await?;
            to_value(&report)
        }
        AppRequest::Voice { query } => {
            let query = query.trim();
            if query.is_empty() {
                return Err(GrowError::validation("Query is required"));
            }
            let reply = state.voice.respond(query);
            state
                .store
                .insert_voice_query(query, reply.intent.as_str(), reply.response)
                .await?;
            Ok(json!({
                "query": query,
                "intent": reply.intent,
                "response": reply.response,
            }))
        }
        AppRequest::History { kind, limit } => match kind {
            HistoryKind::Predictions => to_value(&state.history.predictions(limit).await?),
            HistoryKind::Weather => to_value(&state.history.weather(limit).await?),
            HistoryKind::Voice => to_value(&state.history.voice(limit).await?),
        },
        AppRequest::Stats => to_value(&state.history.stats().await?),
        AppRequest::Help => Ok(state.voice.help()),
    }
}

async fn handle_predict(upload: ImageUpload, state: &AppState) -> Result<Value> {
    state.disease.check_upload(&upload)?;

    // Decoding and resizing are CPU bound.
    let detector = state.disease.clone();
    let data = upload.bytes.clone();
    let diagnosis = tokio::task::spawn_blocking(move || detector.analyze(&data))
        .await
        .map_err(|e| GrowError::Internal(format!("analysis task failed: {}", e)))??;

    let record = NewPrediction {
        image_name: upload.reference(),
        image_bytes: upload.bytes.len() as i64,
        disease: diagnosis.disease.as_str().to_string(),
        formatted_name: diagnosis.formatted_name.to_string(),
        confidence: diagnosis.confidence,
        treatment: diagnosis.treatment.to_string(),
    };
    state.store.insert_prediction(&record).await?;

    tracing::info!(
        image = %record.image_name,
        disease = %record.disease,
        confidence = record.confidence,
        "Prediction logged"
    );

    to_value(&diagnosis)
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| GrowError::Internal(format!("serialize: {}", e)))
}
