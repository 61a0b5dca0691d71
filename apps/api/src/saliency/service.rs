use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::saliency::{ModelVersionCount, NewSaliencyAnalysis, SaliencyAnalysisRow};
use crate::models::share::ShareKind;
use crate::models::user::UserRow;
use crate::models::video::{SceneSummary, VideoSummary};
use crate::sharing::service::{authorize_edit, authorize_view};
use crate::sharing::store::ShareStore;

const REQUIRED_FIELDS: [&str; 6] = [
    "videoId",
    "dataPath",
    "roiData",
    "frameCount",
    "modelVersion",
    "processingTime",
];

const DEFAULT_SAMPLE_RATE: i32 = 1;

// ────────────────────────────────────────────────────────────────────────────
// Request validation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaliencyRequest {
    pub video_id: Option<Uuid>,
    pub scene_id: Option<Uuid>,
    pub data_path: Option<String>,
    pub heatmap_path: Option<String>,
    pub roi_data: Option<Value>,
    pub frame_count: Option<i32>,
    pub sample_rate: Option<i32>,
    pub model_version: Option<String>,
    pub processing_time: Option<f64>,
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// The analyzer posts ROI data either inline or as a JSON-encoded string.
fn normalize_roi(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => serde_json::from_str(&s).ok(),
        other => Some(other),
    }
}

impl CreateSaliencyRequest {
    pub fn validate(self) -> Result<NewSaliencyAnalysis, AppError> {
        let missing = || {
            AppError::Validation(format!(
                "Missing required fields (required: {})",
                REQUIRED_FIELDS.join(", ")
            ))
        };

        let video_id = self.video_id.ok_or_else(missing)?;
        let data_path = non_blank(self.data_path).ok_or_else(missing)?;
        let roi_data = self.roi_data.and_then(normalize_roi).ok_or_else(missing)?;
        let frame_count = self.frame_count.filter(|n| *n > 0).ok_or_else(missing)?;
        let model_version = non_blank(self.model_version).ok_or_else(missing)?;
        let processing_time = self
            .processing_time
            .filter(|t| t.is_finite() && *t >= 0.0)
            .ok_or_else(missing)?;

        let sample_rate = match self.sample_rate {
            None => DEFAULT_SAMPLE_RATE,
            Some(n) if n > 0 => n,
            Some(n) => {
                return Err(AppError::Validation(format!(
                    "sampleRate must be positive, got {n}"
                )))
            }
        };

        Ok(NewSaliencyAnalysis {
            video_id,
            scene_id: self.scene_id,
            data_path,
            heatmap_path: non_blank(self.heatmap_path),
            roi_data,
            frame_count,
            sample_rate,
            model_version,
            processing_time,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Access
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Analyses inherit the access rules of the video they belong to.
pub async fn authorize_video_access(
    store: &dyn ShareStore,
    video_id: Uuid,
    user: &UserRow,
    access: Access,
) -> Result<(), AppError> {
    match access {
        Access::Read => authorize_view(store, ShareKind::Video, video_id, user).await,
        Access::Write => authorize_edit(store, ShareKind::Video, video_id, user).await,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Status summary
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatestAnalysis {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub frame_count: i32,
    pub sample_rate: i32,
    pub model_version: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SaliencyStatus {
    pub has_analysis: bool,
    pub analysis_count: usize,
    pub latest_analysis: Option<LatestAnalysis>,
}

/// Summarises a video's analyses. Picks the newest by `created_at`
/// regardless of input order.
pub fn summarize_status(analyses: &[SaliencyAnalysisRow]) -> SaliencyStatus {
    let latest = analyses.iter().max_by_key(|a| a.created_at).map(|a| LatestAnalysis {
        id: a.id,
        created_at: a.created_at,
        frame_count: a.frame_count,
        sample_rate: a.sample_rate,
        model_version: a.model_version.clone(),
    });
    SaliencyStatus {
        has_analysis: !analyses.is_empty(),
        analysis_count: analyses.len(),
        latest_analysis: latest,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaliencyStats {
    pub total_analyses: i64,
    pub video_analyses: i64,
    pub scene_analyses: i64,
    pub model_versions: Vec<ModelVersionCount>,
    pub average_processing_time: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Persistence
// ────────────────────────────────────────────────────────────────────────────

pub async fn video_summary(pool: &PgPool, video_id: Uuid) -> Result<Option<VideoSummary>, AppError> {
    Ok(sqlx::query_as(
        "SELECT id, filename, original_name, duration, status FROM videos WHERE id = $1",
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn scene_summary(pool: &PgPool, scene_id: Uuid) -> Result<Option<SceneSummary>, AppError> {
    Ok(sqlx::query_as(
        "SELECT id, video_id, start_time, end_time, keyframe_path FROM scenes WHERE id = $1",
    )
    .bind(scene_id)
    .fetch_optional(pool)
    .await?)
}

/// Inserts a validated analysis after checking the referenced video and scene exist.
pub async fn create_analysis(
    pool: &PgPool,
    new: &NewSaliencyAnalysis,
) -> Result<SaliencyAnalysisRow, AppError> {
    if video_summary(pool, new.video_id).await?.is_none() {
        return Err(AppError::NotFound("Video not found".to_string()));
    }
    if let Some(scene_id) = new.scene_id {
        match scene_summary(pool, scene_id).await? {
            None => return Err(AppError::NotFound("Scene not found".to_string())),
            Some(scene) if scene.video_id != new.video_id => {
                return Err(AppError::Validation(
                    "Scene does not belong to the given video".to_string(),
                ))
            }
            Some(_) => {}
        }
    }

    let row: SaliencyAnalysisRow = sqlx::query_as(
        r#"
        INSERT INTO saliency_analyses
            (video_id, scene_id, data_path, heatmap_path, roi_data,
             frame_count, sample_rate, model_version, processing_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(new.video_id)
    .bind(new.scene_id)
    .bind(&new.data_path)
    .bind(&new.heatmap_path)
    .bind(&new.roi_data)
    .bind(new.frame_count)
    .bind(new.sample_rate)
    .bind(&new.model_version)
    .bind(new.processing_time)
    .fetch_one(pool)
    .await?;

    info!(
        "Created saliency analysis {} for video {} (scene {:?}, model {})",
        row.id, row.video_id, row.scene_id, row.model_version
    );
    Ok(row)
}

/// The canonical video-wide analysis: the newest row without a scene.
pub async fn latest_video_analysis(
    pool: &PgPool,
    video_id: Uuid,
) -> Result<Option<SaliencyAnalysisRow>, AppError> {
    Ok(sqlx::query_as(
        r#"
        SELECT * FROM saliency_analyses
        WHERE video_id = $1 AND scene_id IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(video_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn latest_scene_analysis(
    pool: &PgPool,
    scene_id: Uuid,
) -> Result<Option<SaliencyAnalysisRow>, AppError> {
    Ok(sqlx::query_as(
        "SELECT * FROM saliency_analyses WHERE scene_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(scene_id)
    .fetch_optional(pool)
    .await?)
}

/// All analyses of a video, newest first.
pub async fn list_video_analyses(
    pool: &PgPool,
    video_id: Uuid,
) -> Result<Vec<SaliencyAnalysisRow>, AppError> {
    Ok(sqlx::query_as(
        "SELECT * FROM saliency_analyses WHERE video_id = $1 ORDER BY created_at DESC",
    )
    .bind(video_id)
    .fetch_all(pool)
    .await?)
}

pub async fn find_analysis(
    pool: &PgPool,
    analysis_id: Uuid,
) -> Result<Option<SaliencyAnalysisRow>, AppError> {
    Ok(sqlx::query_as("SELECT * FROM saliency_analyses WHERE id = $1")
        .bind(analysis_id)
        .fetch_optional(pool)
        .await?)
}

pub async fn delete_analysis_row(pool: &PgPool, analysis_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM saliency_analyses WHERE id = $1")
        .bind(analysis_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_heatmap_path(
    pool: &PgPool,
    analysis_id: Uuid,
    heatmap_path: &str,
) -> Result<SaliencyAnalysisRow, AppError> {
    let row: Option<SaliencyAnalysisRow> = sqlx::query_as(
        "UPDATE saliency_analyses SET heatmap_path = $1 WHERE id = $2 RETURNING *",
    )
    .bind(heatmap_path)
    .bind(analysis_id)
    .fetch_optional(pool)
    .await?;
    row.ok_or_else(|| AppError::NotFound("Saliency analysis not found".to_string()))
}

/// Analysis used for ROI suggestions: the scene's when given, else the video-wide one.
pub async fn roi_source(
    pool: &PgPool,
    video_id: Uuid,
    scene_id: Option<Uuid>,
) -> Result<Option<SaliencyAnalysisRow>, AppError> {
    match scene_id {
        None => latest_video_analysis(pool, video_id).await,
        Some(scene_id) => Ok(sqlx::query_as(
            r#"
            SELECT * FROM saliency_analyses
            WHERE video_id = $1 AND scene_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(video_id)
        .bind(scene_id)
        .fetch_optional(pool)
        .await?),
    }
}

pub async fn collect_stats(pool: &PgPool) -> Result<SaliencyStats, AppError> {
    let (total, video_wide, avg): (i64, i64, Option<f64>) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(*) FILTER (WHERE scene_id IS NULL),
               AVG(processing_time)
        FROM saliency_analyses
        "#,
    )
    .fetch_one(pool)
    .await?;

    let model_versions: Vec<ModelVersionCount> = sqlx::query_as(
        r#"
        SELECT model_version AS version, COUNT(*) AS count
        FROM saliency_analyses
        GROUP BY model_version
        ORDER BY count DESC, version ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(SaliencyStats {
        total_analyses: total,
        video_analyses: video_wide,
        scene_analyses: total - video_wide,
        model_versions,
        average_processing_time: avg.unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn complete_request() -> CreateSaliencyRequest {
        CreateSaliencyRequest {
            video_id: Some(Uuid::new_v4()),
            scene_id: None,
            data_path: Some("/storage/saliency/abc.json".into()),
            heatmap_path: None,
            roi_data: Some(json!([{"x": 0.1, "y": 0.2, "w": 0.5, "h": 0.5}])),
            frame_count: Some(240),
            sample_rate: None,
            model_version: Some("robust-saliency".into()),
            processing_time: Some(12.5),
        }
    }

    fn row(created_at: DateTime<Utc>, model: &str) -> SaliencyAnalysisRow {
        SaliencyAnalysisRow {
            id: Uuid::new_v4(),
            video_id: Uuid::new_v4(),
            scene_id: None,
            data_path: "/tmp/a.json".into(),
            heatmap_path: None,
            roi_data: json!([]),
            frame_count: 100,
            sample_rate: 25,
            model_version: model.into(),
            processing_time: 3.0,
            created_at,
        }
    }

    #[test]
    fn test_validate_defaults_sample_rate() {
        let new = complete_request().validate().unwrap();
        assert_eq!(new.sample_rate, 1);
        assert_eq!(new.frame_count, 240);
        assert!(new.heatmap_path.is_none());
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let mut req = complete_request();
        req.data_path = Some("   ".into());
        let err = req.validate().unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("dataPath")));

        let mut req = complete_request();
        req.frame_count = Some(0);
        assert!(req.validate().is_err());

        let req = CreateSaliencyRequest::default();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_roi_data_accepts_encoded_string() {
        let mut req = complete_request();
        req.roi_data = Some(Value::String(r#"{"crop":[0,0,100,100]}"#.into()));
        let new = req.validate().unwrap();
        assert_eq!(new.roi_data, json!({"crop":[0,0,100,100]}));

        let mut req = complete_request();
        req.roi_data = Some(Value::String("not json".into()));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_negative_sample_rate_rejected() {
        let mut req = complete_request();
        req.sample_rate = Some(-5);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_status_without_analyses() {
        let status = summarize_status(&[]);
        assert_eq!(
            status,
            SaliencyStatus {
                has_analysis: false,
                analysis_count: 0,
                latest_analysis: None,
            }
        );
    }

    #[test]
    fn test_status_picks_newest() {
        let now = Utc::now();
        let older = row(now - Duration::hours(2), "v1");
        let newer = row(now, "v2");
        let status = summarize_status(&[older, newer.clone()]);
        assert!(status.has_analysis);
        assert_eq!(status.analysis_count, 2);
        let latest = status.latest_analysis.unwrap();
        assert_eq!(latest.id, newer.id);
        assert_eq!(latest.model_version, "v2");
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let value = serde_json::to_value(summarize_status(&[])).unwrap();
        assert_eq!(
            value,
            json!({"hasAnalysis": false, "analysisCount": 0, "latestAnalysis": null})
        );
    }

    #[tokio::test]
    async fn test_analysis_access_follows_video_shares() {
        use crate::models::share::ShareRole;
        use crate::sharing::memory::{user, MemoryStore};

        let owner = user("owner@example.com", "USER");
        let viewer = user("viewer@example.com", "USER");
        let stranger = user("stranger@example.com", "USER");
        let video_id = Uuid::new_v4();
        let store = MemoryStore::default().with_resource(
            ShareKind::Video,
            video_id,
            "interview.mp4",
            Some(owner.id),
        );
        store.grant(ShareKind::Video, video_id, viewer.id, ShareRole::Viewer);

        for access in [Access::Read, Access::Write] {
            authorize_video_access(&store, video_id, &owner, access).await.unwrap();
            let err = authorize_video_access(&store, video_id, &stranger, access)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }

        authorize_video_access(&store, video_id, &viewer, Access::Read).await.unwrap();
        let err = authorize_video_access(&store, video_id, &viewer, Access::Write)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        store.grant(ShareKind::Video, video_id, viewer.id, ShareRole::Editor);
        authorize_video_access(&store, video_id, &viewer, Access::Write).await.unwrap();
    }

    #[tokio::test]
    async fn test_analysis_access_on_missing_video() {
        use crate::sharing::memory::{user, MemoryStore};

        let err = authorize_video_access(
            &MemoryStore::default(),
            Uuid::new_v4(),
            &user("owner@example.com", "USER"),
            Access::Write,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg == "Video not found"));
    }
}
