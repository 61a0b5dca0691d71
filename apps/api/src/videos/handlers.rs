use std::path::PathBuf;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::share::ShareKind;
use crate::models::user::UserRow;
use crate::models::video::{SceneRow, VideoRow, VideoStatus};
use crate::sharing::service::{authorize_edit, authorize_owner, authorize_view};
use crate::state::AppState;
use crate::videos::format::{format_duration, format_size};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListQuery {
    pub folder_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    #[serde(flatten)]
    pub video: VideoRow,
    pub duration_label: Option<String>,
    pub size_label: String,
}

impl From<VideoRow> for VideoResponse {
    fn from(video: VideoRow) -> Self {
        VideoResponse {
            duration_label: video.duration.map(format_duration),
            size_label: format_size(video.file_size.max(0) as u64),
            video,
        }
    }
}

/// Videos in a folder (root when `folder_id` is `None`). Admins see every
/// user's videos, everyone else only their own.
pub async fn videos_in_folder(
    pool: &PgPool,
    folder_id: Option<Uuid>,
    user: &UserRow,
) -> Result<Vec<VideoRow>, AppError> {
    Ok(sqlx::query_as(
        r#"
        SELECT * FROM videos
        WHERE folder_id IS NOT DISTINCT FROM $1
          AND ($2 OR user_id = $3)
        ORDER BY created_at DESC
        "#,
    )
    .bind(folder_id)
    .bind(user.is_admin())
    .bind(user.id)
    .fetch_all(pool)
    .await?)
}

pub async fn fetch_video(pool: &PgPool, id: Uuid) -> Result<VideoRow, AppError> {
    let video: Option<VideoRow> = sqlx::query_as("SELECT * FROM videos WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    video.ok_or_else(|| AppError::NotFound("Video not found".to_string()))
}

/// GET /api/videos?folderId=
pub async fn handle_list_videos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<VideoListQuery>,
) -> Result<Json<Vec<VideoResponse>>, AppError> {
    let videos = videos_in_folder(&state.db, query.folder_id, &user).await?;
    Ok(Json(videos.into_iter().map(VideoResponse::from).collect()))
}

/// GET /api/videos/:id
pub async fn handle_get_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<VideoResponse>, AppError> {
    authorize_view(state.shares.as_ref(), ShareKind::Video, id, &user).await?;
    let video = fetch_video(&state.db, id).await?;
    Ok(Json(video.into()))
}

/// GET /api/videos/:id/scenes
pub async fn handle_video_scenes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SceneRow>>, AppError> {
    authorize_view(state.shares.as_ref(), ShareKind::Video, id, &user).await?;
    let scenes: Vec<SceneRow> =
        sqlx::query_as("SELECT * FROM scenes WHERE video_id = $1 ORDER BY start_time ASC")
            .bind(id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(scenes))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: VideoStatus,
}

/// PATCH /api/videos/:id/status
pub async fn handle_update_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> Result<Json<VideoResponse>, AppError> {
    authorize_edit(state.shares.as_ref(), ShareKind::Video, id, &user).await?;
    let video: VideoRow = sqlx::query_as(
        "UPDATE videos SET status = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(req.status.as_str())
    .bind(id)
    .fetch_one(&state.db)
    .await?;
    info!("Video {id} status set to {}", req.status);
    Ok(Json(video.into()))
}

/// Directory holding the files of videos in `folder_id`; the storage root
/// for videos at the root.
async fn folder_dir(state: &AppState, folder_id: Option<Uuid>) -> Result<PathBuf, AppError> {
    let Some(folder_id) = folder_id else {
        return Ok(state.storage.path().to_path_buf());
    };
    let path: Option<String> = sqlx::query_scalar("SELECT path FROM folders WHERE id = $1")
        .bind(folder_id)
        .fetch_optional(&state.db)
        .await?;
    Ok(path
        .map(PathBuf::from)
        .unwrap_or_else(|| state.storage.path().to_path_buf()))
}

/// Moves a video into `target` (root when `None`). The file moves first so
/// a failed move leaves the row untouched.
pub async fn move_video(
    state: &AppState,
    video: &VideoRow,
    target: Option<Uuid>,
) -> Result<VideoRow, AppError> {
    let from = folder_dir(state, video.folder_id).await?.join(&video.filename);
    let to = folder_dir(state, target).await?.join(&video.filename);
    if from != to {
        state.storage.relocate(&from, &to).await?;
    }
    let moved: VideoRow = sqlx::query_as(
        "UPDATE videos SET folder_id = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(target)
    .bind(video.id)
    .fetch_one(&state.db)
    .await?;
    info!(
        "Moved video {} to {}",
        video.original_name,
        target.map_or_else(|| "root".to_string(), |id| id.to_string())
    );
    Ok(moved)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameVideoRequest {
    pub original_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveVideoRequest {
    pub folder_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteVideoResponse {
    pub success: bool,
    pub files_removed: usize,
    pub scenes: usize,
}

/// PATCH /api/videos/:id
pub async fn handle_rename_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameVideoRequest>,
) -> Result<Json<VideoResponse>, AppError> {
    let name = req.original_name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("originalName is required".to_string()));
    }
    authorize_edit(state.shares.as_ref(), ShareKind::Video, id, &user).await?;
    let video: VideoRow = sqlx::query_as(
        "UPDATE videos SET original_name = $1, updated_at = now() WHERE id = $2 RETURNING *",
    )
    .bind(name)
    .bind(id)
    .fetch_one(&state.db)
    .await?;
    info!("Video {id} renamed to {name}");
    Ok(Json(video.into()))
}

/// PUT /api/videos/:id/move
pub async fn handle_move_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveVideoRequest>,
) -> Result<Json<VideoResponse>, AppError> {
    authorize_edit(state.shares.as_ref(), ShareKind::Video, id, &user).await?;
    if let Some(folder_id) = req.folder_id {
        authorize_edit(state.shares.as_ref(), ShareKind::Folder, folder_id, &user).await?;
    }
    let video = fetch_video(&state.db, id).await?;
    let moved = move_video(&state, &video, req.folder_id).await?;
    Ok(Json(moved.into()))
}

/// DELETE /api/videos/:id
///
/// Removes the video file, keyframes and saliency artifacts, then the row.
/// Scenes and analyses go with the row through the foreign key cascade.
pub async fn handle_delete_video(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteVideoResponse>, AppError> {
    authorize_owner(state.shares.as_ref(), ShareKind::Video, id, &user, "delete").await?;
    let video = fetch_video(&state.db, id).await?;

    let keyframes: Vec<Option<String>> =
        sqlx::query_scalar("SELECT keyframe_path FROM scenes WHERE video_id = $1")
            .bind(id)
            .fetch_all(&state.db)
            .await?;
    let artifacts: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT data_path, heatmap_path FROM saliency_analyses WHERE video_id = $1")
            .bind(id)
            .fetch_all(&state.db)
            .await?;

    let video_path = folder_dir(&state, video.folder_id).await?.join(&video.filename);
    let scenes = keyframes.len();
    let paths: Vec<String> = std::iter::once(video_path.display().to_string())
        .chain(keyframes.into_iter().flatten())
        .chain(
            artifacts
                .into_iter()
                .flat_map(|(data, heatmap)| std::iter::once(data).chain(heatmap)),
        )
        .collect();
    let files_removed = state.storage.remove_files(&paths).await;

    sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    info!("Deleted video {id} ({files_removed} files removed, {scenes} scenes)");
    Ok(Json(DeleteVideoResponse {
        success: true,
        files_removed,
        scenes,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_response_labels() {
        let now = Utc::now();
        let video = VideoRow {
            id: Uuid::new_v4(),
            filename: "a1b2.mp4".into(),
            original_name: "interview.mp4".into(),
            file_size: 1024 * 1024,
            mime_type: "video/mp4".into(),
            duration: Some(3665.0),
            status: "ANALYZED".into(),
            folder_id: None,
            user_id: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(VideoResponse::from(video)).unwrap();
        assert_eq!(value["durationLabel"], "1:01:05");
        assert_eq!(value["sizeLabel"], "1 MB");
        assert_eq!(value["originalName"], "interview.mp4");
    }

    #[test]
    fn test_status_update_accepts_known_states_only() {
        let req: StatusUpdate = serde_json::from_str(r#"{"status":"ANALYZING"}"#).unwrap();
        assert_eq!(req.status, VideoStatus::Analyzing);
        assert!(serde_json::from_str::<StatusUpdate>(r#"{"status":"DONE"}"#).is_err());
    }

    #[test]
    fn test_move_request_null_folder_means_root() {
        let req: MoveVideoRequest = serde_json::from_str(r#"{"folderId":null}"#).unwrap();
        assert!(req.folder_id.is_none());
        let req: MoveVideoRequest = serde_json::from_str("{}").unwrap();
        assert!(req.folder_id.is_none());

        let id = Uuid::new_v4();
        let req: MoveVideoRequest =
            serde_json::from_str(&format!(r#"{{"folderId":"{id}"}}"#)).unwrap();
        assert_eq!(req.folder_id, Some(id));
    }

    #[test]
    fn test_delete_response_shape() {
        let value = serde_json::to_value(DeleteVideoResponse {
            success: true,
            files_removed: 4,
            scenes: 3,
        })
        .unwrap();
        assert_eq!(value["filesRemoved"], 4);
        assert_eq!(value["scenes"], 3);
    }
}
