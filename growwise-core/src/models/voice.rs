use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoiceQueryRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub query: String,
    pub intent: String,
    pub response: String,
}
