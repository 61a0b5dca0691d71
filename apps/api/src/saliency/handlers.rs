//! Axum route handlers for the Saliency API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::saliency::SaliencyAnalysisRow;
use crate::models::video::{SceneSummary, VideoSummary};
use crate::saliency::files::load_saliency_data;
use crate::saliency::service::{
    self, authorize_video_access, summarize_status, Access, CreateSaliencyRequest, SaliencyStats,
    SaliencyStatus,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaliencyResponse {
    pub id: Uuid,
    pub message: String,
    pub saliency_analysis: SaliencyAnalysisRow,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaliencyDetailResponse {
    #[serde(flatten)]
    pub analysis: SaliencyAnalysisRow,
    pub video: Option<VideoSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<SceneSummary>,
    pub saliency_data: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAnalysesResponse {
    pub video_id: Uuid,
    pub analyses: Vec<SaliencyAnalysisRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSaliencyResponse {
    pub message: String,
    pub analysis_id: Uuid,
    pub files_removed: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapUpdate {
    pub heatmap_path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapUpdateResponse {
    pub message: String,
    pub saliency_analysis: SaliencyAnalysisRow,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiQuery {
    pub scene_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoiSuggestionsResponse {
    pub video_id: Uuid,
    pub scene_id: Option<Uuid>,
    pub roi_suggestions: Value,
    pub frame_count: i32,
    pub model_version: String,
}

fn analysis_not_found() -> AppError {
    AppError::NotFound("Saliency analysis not found".to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/saliency-analyses
pub async fn handle_create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateSaliencyRequest>,
) -> Result<(StatusCode, Json<CreateSaliencyResponse>), AppError> {
    let new = req.validate()?;
    authorize_video_access(state.shares.as_ref(), new.video_id, &user, Access::Write).await?;
    let row = service::create_analysis(&state.db, &new).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreateSaliencyResponse {
            id: row.id,
            message: "Saliency analysis created successfully".to_string(),
            saliency_analysis: row,
        }),
    ))
}

/// GET /api/videos/:id/saliency
pub async fn handle_video_saliency(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<Uuid>,
) -> Result<Json<SaliencyDetailResponse>, AppError> {
    authorize_video_access(state.shares.as_ref(), video_id, &user, Access::Read).await?;
    let analysis = service::latest_video_analysis(&state.db, video_id)
        .await?
        .ok_or_else(analysis_not_found)?;
    let video = service::video_summary(&state.db, video_id).await?;
    let saliency_data = load_saliency_data(&state.storage, &analysis.data_path).await;

    Ok(Json(SaliencyDetailResponse {
        analysis,
        video,
        scene: None,
        saliency_data,
    }))
}

/// GET /api/scenes/:id/saliency
pub async fn handle_scene_saliency(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(scene_id): Path<Uuid>,
) -> Result<Json<SaliencyDetailResponse>, AppError> {
    let analysis = service::latest_scene_analysis(&state.db, scene_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Scene saliency analysis not found".to_string()))?;
    authorize_video_access(state.shares.as_ref(), analysis.video_id, &user, Access::Read).await?;
    let (video, scene) = tokio::try_join!(
        service::video_summary(&state.db, analysis.video_id),
        service::scene_summary(&state.db, scene_id),
    )?;
    let saliency_data = load_saliency_data(&state.storage, &analysis.data_path).await;

    Ok(Json(SaliencyDetailResponse {
        analysis,
        video,
        scene,
        saliency_data,
    }))
}

/// GET /api/videos/:id/saliency/all
pub async fn handle_all_video_saliency(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<Uuid>,
) -> Result<Json<VideoAnalysesResponse>, AppError> {
    authorize_video_access(state.shares.as_ref(), video_id, &user, Access::Read).await?;
    let analyses = service::list_video_analyses(&state.db, video_id).await?;
    Ok(Json(VideoAnalysesResponse { video_id, analyses }))
}

/// GET /api/videos/:id/saliency/status
pub async fn handle_saliency_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<Uuid>,
) -> Result<Json<SaliencyStatus>, AppError> {
    authorize_video_access(state.shares.as_ref(), video_id, &user, Access::Read).await?;
    let analyses = service::list_video_analyses(&state.db, video_id).await?;
    Ok(Json(summarize_status(&analyses)))
}

/// DELETE /api/saliency-analyses/:id
///
/// Artifacts are removed before the row; file failures are logged, not returned.
pub async fn handle_delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<DeleteSaliencyResponse>, AppError> {
    let analysis = service::find_analysis(&state.db, analysis_id)
        .await?
        .ok_or_else(analysis_not_found)?;
    authorize_video_access(state.shares.as_ref(), analysis.video_id, &user, Access::Write).await?;

    let paths: Vec<String> = std::iter::once(analysis.data_path)
        .chain(analysis.heatmap_path)
        .collect();
    let files_removed = state.storage.remove_files(&paths).await;

    service::delete_analysis_row(&state.db, analysis_id).await?;
    info!("Deleted saliency analysis {analysis_id} ({files_removed} files removed)");

    Ok(Json(DeleteSaliencyResponse {
        message: "Saliency analysis deleted successfully".to_string(),
        analysis_id,
        files_removed,
    }))
}

/// PATCH /api/saliency-analyses/:id/heatmap
pub async fn handle_update_heatmap(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(analysis_id): Path<Uuid>,
    Json(req): Json<HeatmapUpdate>,
) -> Result<Json<HeatmapUpdateResponse>, AppError> {
    let heatmap_path = req
        .heatmap_path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::Validation("heatmapPath is required".to_string()))?;
    let analysis = service::find_analysis(&state.db, analysis_id)
        .await?
        .ok_or_else(analysis_not_found)?;
    authorize_video_access(state.shares.as_ref(), analysis.video_id, &user, Access::Write).await?;
    let row = service::update_heatmap_path(&state.db, analysis_id, &heatmap_path).await?;
    Ok(Json(HeatmapUpdateResponse {
        message: "Heatmap path updated successfully".to_string(),
        saliency_analysis: row,
    }))
}

/// GET /api/saliency/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<SaliencyStats>, AppError> {
    Ok(Json(service::collect_stats(&state.db).await?))
}

/// GET /api/videos/:id/roi-suggestions
pub async fn handle_roi_suggestions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<Uuid>,
    Query(query): Query<RoiQuery>,
) -> Result<Json<RoiSuggestionsResponse>, AppError> {
    authorize_video_access(state.shares.as_ref(), video_id, &user, Access::Read).await?;
    let analysis = service::roi_source(&state.db, video_id, query.scene_id)
        .await?
        .ok_or_else(analysis_not_found)?;
    Ok(Json(RoiSuggestionsResponse {
        video_id,
        scene_id: analysis.scene_id,
        roi_suggestions: analysis.roi_data,
        frame_count: analysis.frame_count,
        model_version: analysis.model_version,
    }))
}
