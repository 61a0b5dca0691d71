use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SaliencyAnalysisRow {
    pub id: Uuid,
    pub video_id: Uuid,
    pub scene_id: Option<Uuid>,
    pub data_path: String,
    pub heatmap_path: Option<String>,
    pub roi_data: Value,
    pub frame_count: i32,
    pub sample_rate: i32,
    pub model_version: String,
    pub processing_time: f64,
    pub created_at: DateTime<Utc>,
}

/// Validated input for a new analysis record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSaliencyAnalysis {
    pub video_id: Uuid,
    pub scene_id: Option<Uuid>,
    pub data_path: String,
    pub heatmap_path: Option<String>,
    pub roi_data: Value,
    pub frame_count: i32,
    pub sample_rate: i32,
    pub model_version: String,
    pub processing_time: f64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ModelVersionCount {
    pub version: String,
    pub count: i64,
}
