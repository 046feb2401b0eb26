use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppStats {
    pub total_predictions: i64,
    pub weather_queries: i64,
    pub voice_queries: i64,
    pub common_diseases: Vec<DiseaseCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiseaseCount {
    pub disease: String,
    pub count: i64,
}
