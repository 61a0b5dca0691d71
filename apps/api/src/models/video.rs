use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoStatus {
    Uploaded,
    Analyzing,
    Analyzed,
    Error,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "UPLOADED",
            VideoStatus::Analyzing => "ANALYZING",
            VideoStatus::Analyzed => "ANALYZED",
            VideoStatus::Error => "ERROR",
        }
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPLOADED" => Ok(VideoStatus::Uploaded),
            "ANALYZING" => Ok(VideoStatus::Analyzing),
            "ANALYZED" => Ok(VideoStatus::Analyzed),
            "ERROR" => Ok(VideoStatus::Error),
            other => Err(format!("unknown video status '{other}'")),
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VideoRow {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub file_size: i64,
    pub mime_type: String,
    pub duration: Option<f64>,
    pub status: String,
    pub folder_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Compact video projection embedded in saliency responses.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub duration: Option<f64>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SceneRow {
    pub id: Uuid,
    pub video_id: Uuid,
    pub start_time: f64,
    pub end_time: f64,
    pub keyframe_path: Option<String>,
    pub vision_data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SceneSummary {
    pub id: Uuid,
    pub video_id: Uuid,
    pub start_time: f64,
    pub end_time: f64,
    pub keyframe_path: Option<String>,
}
