use std::path::{Path as FsPath, PathBuf};

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::folders::breadcrumbs::{build_breadcrumbs, Breadcrumb};
use crate::models::folder::{FolderLink, FolderRow};
use crate::models::share::ShareKind;
use crate::models::video::VideoRow;
use crate::sharing::service::{authorize_edit, authorize_view};
use crate::state::AppState;
use crate::storage::is_valid_folder_name;
use crate::videos::handlers::{fetch_video, move_video, VideoResponse};

/// Guards against cycles in hand-edited hierarchies.
const MAX_FOLDER_DEPTH: i32 = 64;

const FOLDER_EXISTS: &str = "A folder with this name already exists here";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderListQuery {
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveVideosRequest {
    pub video_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveVideosResponse {
    pub success: bool,
    pub moved_videos: usize,
}

#[derive(Debug, Serialize)]
pub struct FolderContents {
    #[serde(flatten)]
    pub folder: FolderRow,
    pub folders: Vec<FolderRow>,
    pub videos: Vec<VideoResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFolderResponse {
    pub success: bool,
    pub moved_videos: u64,
}

/// Child folders of `parent_id`. `owner` restricts to one user's folders.
async fn child_folders(
    pool: &PgPool,
    parent_id: Option<Uuid>,
    owner: Option<Uuid>,
) -> Result<Vec<FolderRow>, AppError> {
    Ok(sqlx::query_as(
        r#"
        SELECT f.*, (SELECT COUNT(*) FROM videos v WHERE v.folder_id = f.id) AS video_count
        FROM folders f
        WHERE f.parent_id IS NOT DISTINCT FROM $1
          AND ($2::uuid IS NULL OR f.user_id = $2)
        ORDER BY f.name ASC
        "#,
    )
    .bind(parent_id)
    .bind(owner)
    .fetch_all(pool)
    .await?)
}

fn validated_name(name: &str) -> Result<&str, AppError> {
    if is_valid_folder_name(name) {
        Ok(name.trim())
    } else {
        Err(AppError::Validation(
            "Folder name must be a single non-empty path component".to_string(),
        ))
    }
}

/// Directory a folder moves to when renamed: same parent, new last component.
fn renamed_path(current: &str, name: &str) -> PathBuf {
    FsPath::new(current)
        .parent()
        .map_or_else(|| PathBuf::from(name), |parent| parent.join(name))
}

async fn fetch_folder(pool: &PgPool, id: Uuid) -> Result<FolderRow, AppError> {
    let folder: Option<FolderRow> = sqlx::query_as(
        r#"
        SELECT f.*, (SELECT COUNT(*) FROM videos v WHERE v.folder_id = f.id) AS video_count
        FROM folders f
        WHERE f.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    folder.ok_or_else(|| AppError::NotFound("Folder not found".to_string()))
}

/// GET /api/folders?parentId=
pub async fn handle_list_folders(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<FolderListQuery>,
) -> Result<Json<Vec<FolderRow>>, AppError> {
    let owner = (!user.is_admin()).then_some(user.id);
    Ok(Json(child_folders(&state.db, query.parent_id, owner).await?))
}

/// GET /api/folders/:id
pub async fn handle_get_folder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FolderContents>, AppError> {
    authorize_view(state.shares.as_ref(), ShareKind::Folder, id, &user).await?;
    let folder = fetch_folder(&state.db, id).await?;
    let folders = child_folders(&state.db, Some(id), None).await?;
    let videos: Vec<VideoResponse> =
        sqlx::query_as::<_, VideoRow>("SELECT * FROM videos WHERE folder_id = $1 ORDER BY created_at DESC")
        .bind(id)
        .fetch_all(&state.db)
        .await?
        .into_iter()
        .map(VideoResponse::from)
        .collect();
    Ok(Json(FolderContents {
        folder,
        folders,
        videos,
    }))
}

/// GET /api/folders/:id/breadcrumbs
pub async fn handle_breadcrumbs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Breadcrumb>>, AppError> {
    authorize_view(state.shares.as_ref(), ShareKind::Folder, id, &user).await?;
    let chain: Vec<FolderLink> = sqlx::query_as(
        r#"
        WITH RECURSIVE chain AS (
            SELECT id, name, parent_id, path, 0 AS depth
            FROM folders WHERE id = $1
            UNION ALL
            SELECT f.id, f.name, f.parent_id, f.path, c.depth + 1
            FROM folders f
            JOIN chain c ON f.id = c.parent_id
            WHERE c.depth < $2
        )
        SELECT id, name, parent_id, path FROM chain ORDER BY depth DESC
        "#,
    )
    .bind(id)
    .bind(MAX_FOLDER_DEPTH)
    .fetch_all(&state.db)
    .await?;

    let root = state.storage.path().display().to_string();
    Ok(Json(build_breadcrumbs(&chain, &root)))
}

/// POST /api/folders
///
/// The row is inserted first and the directory created inside the same
/// transaction, so a failed insert never leaves a directory behind.
pub async fn handle_create_folder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<FolderRow>), AppError> {
    let name = validated_name(&req.name)?;

    let parent_path: PathBuf = match req.parent_id {
        Some(parent_id) => {
            authorize_edit(state.shares.as_ref(), ShareKind::Folder, parent_id, &user)
                .await
                .map_err(|e| match e {
                    AppError::NotFound(_) => {
                        AppError::NotFound("Parent folder not found".to_string())
                    }
                    other => other,
                })?;
            PathBuf::from(fetch_folder(&state.db, parent_id).await?.path)
        }
        None => state.storage.path().to_path_buf(),
    };
    let folder_path = parent_path.join(name);

    let mut tx = state.db.begin().await?;
    let folder: FolderRow = sqlx::query_as(
        r#"
        INSERT INTO folders (name, parent_id, path, user_id)
        VALUES ($1, $2, $3, $4)
        RETURNING *, 0::bigint AS video_count
        "#,
    )
    .bind(name)
    .bind(req.parent_id)
    .bind(folder_path.display().to_string())
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, FOLDER_EXISTS))?;

    tokio::fs::create_dir_all(&folder_path)
        .await
        .with_context(|| format!("cannot create folder directory {}", folder_path.display()))?;
    if let Err(e) = tx.commit().await {
        let _ = tokio::fs::remove_dir(&folder_path).await;
        return Err(e.into());
    }

    info!("Created folder: {} at {}", folder.name, folder.path);
    Ok((StatusCode::CREATED, Json(folder)))
}

/// PUT /api/folders/:id
///
/// Renames the folder and its directory. Descendant paths are rewritten in
/// the same transaction.
pub async fn handle_rename_folder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RenameFolderRequest>,
) -> Result<Json<FolderRow>, AppError> {
    let name = validated_name(&req.name)?;
    authorize_edit(state.shares.as_ref(), ShareKind::Folder, id, &user).await?;
    let folder = fetch_folder(&state.db, id).await?;

    let new_path = renamed_path(&folder.path, name);
    let new_path_str = new_path.display().to_string();
    if new_path_str == folder.path {
        return Ok(Json(folder));
    }
    if tokio::fs::try_exists(&new_path).await.unwrap_or(false) {
        return Err(AppError::Conflict(FOLDER_EXISTS.to_string()));
    }

    let mut tx = state.db.begin().await?;
    let renamed: FolderRow = sqlx::query_as(
        r#"
        UPDATE folders SET name = $1, path = $2, updated_at = now()
        WHERE id = $3
        RETURNING *, $4::bigint AS video_count
        "#,
    )
    .bind(name)
    .bind(&new_path_str)
    .bind(id)
    .bind(folder.video_count)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, FOLDER_EXISTS))?;

    let descendants = sqlx::query(
        r#"
        UPDATE folders SET path = $2 || substr(path, length($1) + 1), updated_at = now()
        WHERE starts_with(path, $1 || '/')
        "#,
    )
    .bind(&folder.path)
    .bind(&new_path_str)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let old_path = FsPath::new(&folder.path);
    let moved_dir = state.storage.relocate(old_path, &new_path).await?;
    if let Err(e) = tx.commit().await {
        if moved_dir {
            let _ = state.storage.relocate(&new_path, old_path).await;
        }
        return Err(e.into());
    }

    info!(
        "Renamed folder {id}: {} -> {} ({descendants} descendants updated)",
        folder.path, renamed.path
    );
    Ok(Json(renamed))
}

/// POST /api/folders/:id/move-videos
///
/// Every video is checked before any of them moves.
pub async fn handle_move_videos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveVideosRequest>,
) -> Result<Json<MoveVideosResponse>, AppError> {
    let mut video_ids = req.video_ids;
    video_ids.sort();
    video_ids.dedup();
    if video_ids.is_empty() {
        return Err(AppError::Validation("videoIds must not be empty".to_string()));
    }

    authorize_edit(state.shares.as_ref(), ShareKind::Folder, id, &user).await?;
    for video_id in &video_ids {
        authorize_edit(state.shares.as_ref(), ShareKind::Video, *video_id, &user).await?;
    }

    for video_id in &video_ids {
        let video = fetch_video(&state.db, *video_id).await?;
        move_video(&state, &video, Some(id)).await?;
    }

    info!("Moved {} videos to folder {id}", video_ids.len());
    Ok(Json(MoveVideosResponse {
        success: true,
        moved_videos: video_ids.len(),
    }))
}

/// DELETE /api/folders/:id
///
/// Videos inside move to the root; folders with subfolders are refused.
pub async fn handle_delete_folder(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteFolderResponse>, AppError> {
    let folder = fetch_folder(&state.db, id).await?;
    if !user.is_admin() && folder.user_id != Some(user.id) {
        return Err(AppError::Forbidden(
            "Only the owner can delete this folder".to_string(),
        ));
    }

    let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE parent_id = $1")
        .bind(id)
        .fetch_one(&state.db)
        .await?;
    if children > 0 {
        return Err(AppError::Validation(
            "Folder contains subfolders; delete or move them first".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;
    let moved = sqlx::query("UPDATE videos SET folder_id = NULL, updated_at = now() WHERE folder_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    sqlx::query("DELETE FROM folders WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    // Only removes the directory when it is empty; files stay on disk otherwise.
    if let Err(e) = tokio::fs::remove_dir(&folder.path).await {
        warn!("Kept directory {} after deleting folder {id}: {e}", folder.path);
    }

    info!("Deleted folder {id} ({moved} videos moved to root)");
    Ok(Json(DeleteFolderResponse {
        success: true,
        moved_videos: moved,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_parent_is_optional() {
        let req: CreateFolderRequest = serde_json::from_str(r#"{"name":"Raw Footage"}"#).unwrap();
        assert_eq!(req.name, "Raw Footage");
        assert!(req.parent_id.is_none());

        let parent = Uuid::new_v4();
        let req: CreateFolderRequest =
            serde_json::from_str(&format!(r#"{{"name":"B-Roll","parentId":"{parent}"}}"#)).unwrap();
        assert_eq!(req.parent_id, Some(parent));
    }

    #[test]
    fn test_delete_response_shape() {
        let value = serde_json::to_value(DeleteFolderResponse {
            success: true,
            moved_videos: 3,
        })
        .unwrap();
        assert_eq!(value["movedVideos"], 3);
    }

    #[test]
    fn test_renamed_path_keeps_parent() {
        assert_eq!(
            renamed_path("/storage/Clients/Acme", "Acme Corp"),
            PathBuf::from("/storage/Clients/Acme Corp")
        );
        assert_eq!(renamed_path("/storage/Raw", "Edited"), PathBuf::from("/storage/Edited"));
    }

    #[test]
    fn test_validated_name_trims_and_rejects_paths() {
        assert_eq!(validated_name("  Interviews ").unwrap(), "Interviews");
        for bad in ["", "..", "a/b", "/etc"] {
            assert!(matches!(validated_name(bad), Err(AppError::Validation(_))), "{bad}");
        }
    }

    #[test]
    fn test_move_videos_request_shape() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let req: MoveVideosRequest =
            serde_json::from_str(&format!(r#"{{"videoIds":["{a}","{b}"]}}"#)).unwrap();
        assert_eq!(req.video_ids, [a, b]);
        assert!(serde_json::from_str::<MoveVideosRequest>("{}").is_err());
    }
}
