//! GrowWise HTTP API
//!
//! Axum server exposing the GrowWise services as JSON endpoints. Each endpoint
//! has a thin axum handler that turns extractor output into an `AppRequest`
//! and delegates to an inner function returning `(StatusCode, Value)`. The
//! inner functions are directly testable without axum dispatch.
//!
//! Every body is an envelope: `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}`.
//!
//! Endpoints (legacy path, then `/api` path):
//! - POST /weather,     /api/weather:              current conditions
//! - POST /predict,     /api/disease-detection:    leaf image analysis
//! - GET  /prices,      /api/market-prices:        market prices, `?category=`
//! - POST               /api/market-prices/refresh
//! - POST /voice-query, /api/voice-query:          canned farming answers
//! - GET  /api/history/{predictions,weather,voice}?limit=
//! - GET  /api/stats, /api/help
//! - GET  /health, /version

use std::sync::Arc;

use anyhow::Result;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::header::ALLOW;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use growwise_core::{ApiResponse, GrowError};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::router::{handle_request, AppRequest, AppState, HistoryKind};
use crate::subsystems::disease::ImageUpload;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.http.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/weather", post(weather_handler))
        .route("/api/weather", post(weather_handler))
        .route("/predict", post(predict_handler))
        .route("/api/disease-detection", post(predict_handler))
        .route("/prices", get(prices_handler))
        .route("/api/market-prices", get(prices_handler))
        .route("/api/market-prices/refresh", post(refresh_prices_handler))
        .route("/voice-query", post(voice_handler))
        .route("/api/voice-query", post(voice_handler))
        .route("/api/history/predictions", get(prediction_history_handler))
        .route("/api/history/weather", get(weather_history_handler))
        .route("/api/history/voice", get(voice_history_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/help", get(help_handler))
        .fallback(not_found_handler)
        .layer(middleware::map_response(method_not_allowed_envelope))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("GrowWise HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct WeatherRequest {
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PricesQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Status code and client-facing message for a failed request. Internal
/// details are logged here and never returned.
pub fn error_response(kind: &str, err: &GrowError) -> (StatusCode, Value) {
    let (status, message) = match err {
        GrowError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        GrowError::InvalidImage(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        GrowError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        GrowError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        GrowError::ProviderUnavailable { status, message } => {
            tracing::warn!(kind, provider_status = ?status, detail = %message, "Provider unavailable");
            (
                StatusCode::BAD_GATEWAY,
                "Upstream service is temporarily unavailable, please try again later".to_string(),
            )
        }
        _ => {
            tracing::error!(kind, error = %err, "Request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };

    (status, ApiResponse::err(message).to_json())
}

fn json_rejection(rejection: JsonRejection) -> GrowError {
    GrowError::validation(format!("Invalid JSON body: {}", rejection.body_text()))
}

fn query_rejection(rejection: QueryRejection) -> GrowError {
    GrowError::validation(format!("Invalid query string: {}", rejection.body_text()))
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Run one request through the router and wrap the outcome in the envelope.
pub async fn dispatch(state: &AppState, request: AppRequest) -> (StatusCode, Value) {
    let kind = request.kind();
    match handle_request(request, state).await {
        Ok(data) => (StatusCode::OK, ApiResponse::ok(data).to_json()),
        Err(e) => error_response(kind, &e),
    }
}

/// Liveness. Always 200; a failing database shows up in `database`.
pub async fn health_inner(state: &AppState) -> (StatusCode, Value) {
    let (status, database) = match state.store.ping().await {
        Ok(v) => ("healthy", v),
        Err(e) => {
            tracing::warn!(error = %e, "Store ping failed");
            ("degraded", format!("unavailable: {}", e))
        }
    };

    (
        StatusCode::OK,
        json!({
            "success": true,
            "status": status,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": state.config.service.name,
            "version": env!("CARGO_PKG_VERSION"),
            "store": state.store.backend(),
            "database": database,
            "weather_configured": state.weather.is_configured(),
        }),
    )
}

/// Version info (pure, no IO).
pub fn version_inner(state: &AppState) -> Value {
    json!({
        "success": true,
        "version": env!("CARGO_PKG_VERSION"),
        "service": state.config.service.name,
    })
}

pub async fn weather_inner(state: &AppState, req: WeatherRequest) -> (StatusCode, Value) {
    dispatch(
        state,
        AppRequest::Weather {
            city: req.city,
            lat: req.lat,
            lon: req.lon,
        },
    )
    .await
}

pub async fn voice_inner(state: &AppState, req: VoiceRequest) -> (StatusCode, Value) {
    match req.query {
        Some(query) => dispatch(state, AppRequest::Voice { query }).await,
        None => error_response("voice", &GrowError::validation("Query is required")),
    }
}

/// Pull the `image` (or `file`) part out of a multipart body.
pub async fn read_upload(mut multipart: Multipart, limit: usize) -> Result<ImageUpload, GrowError> {
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GrowError::PayloadTooLarge { limit }
        } else {
            GrowError::validation(format!("Malformed multipart body: {}", e.body_text()))
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if !matches!(field.name(), Some("image") | Some("file")) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(ImageUpload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(GrowError::validation("No image file provided"))
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner(&state)))
}

pub async fn weather_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<WeatherRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => weather_inner(&state, req).await,
        Err(rejection) => error_response("weather", &json_rejection(rejection)),
    };
    (status, Json(body))
}

pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> impl IntoResponse {
    let upload = match multipart {
        Ok(multipart) => read_upload(multipart, state.config.http.max_upload_bytes).await,
        Err(rejection) => Err(GrowError::validation(format!(
            "Expected a multipart upload: {}",
            rejection.body_text()
        ))),
    };

    let (status, body) = match upload {
        Ok(upload) => dispatch(&state, AppRequest::Predict { upload }).await,
        Err(e) => error_response("predict", &e),
    };
    (status, Json(body))
}

pub async fn prices_handler(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<PricesQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (status, body) = match query {
        Ok(Query(q)) => {
            dispatch(
                &state,
                AppRequest::Prices {
                    category: q.category,
                },
            )
            .await
        }
        Err(rejection) => error_response("prices", &query_rejection(rejection)),
    };
    (status, Json(body))
}

pub async fn refresh_prices_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = dispatch(&state, AppRequest::RefreshPrices).await;
    (status, Json(body))
}

pub async fn voice_handler(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<VoiceRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => voice_inner(&state, req).await,
        Err(rejection) => error_response("voice", &json_rejection(rejection)),
    };
    (status, Json(body))
}

async fn history_response(
    state: &AppState,
    kind: HistoryKind,
    query: std::result::Result<Query<HistoryQuery>, QueryRejection>,
) -> (StatusCode, Value) {
    match query {
        Ok(Query(q)) => dispatch(state, AppRequest::History { kind, limit: q.limit }).await,
        Err(rejection) => error_response("history", &query_rejection(rejection)),
    }
}

pub async fn prediction_history_handler(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<HistoryQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (status, body) = history_response(&state, HistoryKind::Predictions, query).await;
    (status, Json(body))
}

pub async fn weather_history_handler(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<HistoryQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (status, body) = history_response(&state, HistoryKind::Weather, query).await;
    (status, Json(body))
}

pub async fn voice_history_handler(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<HistoryQuery>, QueryRejection>,
) -> impl IntoResponse {
    let (status, body) = history_response(&state, HistoryKind::Voice, query).await;
    (status, Json(body))
}

pub async fn stats_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = dispatch(&state, AppRequest::Stats).await;
    (status, Json(body))
}

pub async fn help_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = dispatch(&state, AppRequest::Help).await;
    (status, Json(body))
}

pub async fn not_found_handler() -> impl IntoResponse {
    let (status, body) = error_response("route", &GrowError::NotFound("route".to_string()));
    (status, Json(body))
}

/// Axum answers a known path with the wrong method with an empty 405; give it
/// the envelope and keep the `Allow` header.
async fn method_not_allowed_envelope(response: Response) -> Response {
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let allow = response.headers().get(ALLOW).cloned();
    let mut enveloped = (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ApiResponse::err("Method not allowed").to_json()),
    )
        .into_response();
    if let Some(allow) = allow {
        enveloped.headers_mut().insert(ALLOW, allow);
    }
    enveloped
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use growwise_core::store::MemoryStore;
    use growwise_core::GrowConfig;

    fn make_state() -> AppState {
        let mut config = GrowConfig::default();
        config.weather.api_key = Some(String::new());
        AppState::new(config, Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (GrowError::validation("bad"), StatusCode::BAD_REQUEST),
            (GrowError::InvalidImage("x".into()), StatusCode::BAD_REQUEST),
            (GrowError::PayloadTooLarge { limit: 1 }, StatusCode::PAYLOAD_TOO_LARGE),
            (GrowError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                GrowError::ProviderUnavailable {
                    status: Some(500),
                    message: "down".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (GrowError::Internal("secret detail".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            let (status, body) = error_response("test", &err);
            assert_eq!(status, expected, "{:?}", err);
            assert_eq!(body["success"], false);
            assert!(body["error"].is_string());
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let (_, body) = error_response("test", &GrowError::Internal("password=hunter2".into()));
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn test_validation_message_is_passed_through() {
        let (_, body) = error_response("test", &GrowError::validation("City name or coordinates are required"));
        assert_eq!(body["error"], "City name or coordinates are required");
    }

    #[tokio::test]
    async fn test_health_inner_reports_memory_store() {
        let (status, body) = health_inner(&make_state()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "memory");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["weather_configured"], false);
    }

    #[test]
    fn test_version_inner() {
        let body = version_inner(&make_state());
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["service"], "GrowWise API");
    }

    #[tokio::test]
    async fn test_weather_inner_unconfigured_is_bad_gateway() {
        let req = WeatherRequest {
            city: Some("Delhi".into()),
            ..WeatherRequest::default()
        };
        let (status, body) = weather_inner(&make_state(), req).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_voice_inner_missing_query() {
        let (status, body) = voice_inner(&make_state(), VoiceRequest { query: None }).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Query is required");
    }

    #[tokio::test]
    async fn test_voice_inner_fallback() {
        let req = VoiceRequest {
            query: Some("tell me a joke".into()),
        };
        let (status, body) = voice_inner(&make_state(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["intent"], "fallback");
    }
}
