use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub image_name: String,
    pub image_bytes: i64,
    pub disease: String,
    pub formatted_name: String,
    pub confidence: f64,
    pub treatment: String,
}

/// A completed analysis, before it is logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub image_name: String,
    pub image_bytes: i64,
    pub disease: String,
    pub formatted_name: String,
    pub confidence: f64,
    pub treatment: String,
}
