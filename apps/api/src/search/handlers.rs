use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::db::like_pattern;
use crate::errors::AppError;
use crate::models::video::VideoRow;
use crate::state::AppState;
use crate::videos::handlers::VideoResponse;

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub results: Vec<VideoResponse>,
}

/// Validated search input.
#[derive(Debug, PartialEq)]
struct SearchInput {
    term: String,
    limit: i64,
}

fn parse_params(params: SearchParams) -> Result<SearchInput, AppError> {
    let term = params
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::Validation("Query parameter \"q\" is required".to_string()))?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(SearchInput { term, limit })
}

/// GET /api/search?q=&limit=
///
/// Matches a video's original name or the vision data of any of its scenes.
pub async fn handle_search(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let input = parse_params(params)?;

    let videos: Vec<VideoRow> = sqlx::query_as(
        r#"
        SELECT v.* FROM videos v
        WHERE ($2 OR v.user_id = $3
               OR EXISTS (SELECT 1 FROM video_shares s WHERE s.video_id = v.id AND s.user_id = $3))
          AND (v.original_name ILIKE $1
               OR EXISTS (SELECT 1 FROM scenes sc
                          WHERE sc.video_id = v.id AND sc.vision_data::text ILIKE $1))
        ORDER BY v.created_at DESC
        LIMIT $4
        "#,
    )
    .bind(like_pattern(&input.term))
    .bind(user.is_admin())
    .bind(user.id)
    .bind(input.limit)
    .fetch_all(&state.db)
    .await?;

    let results: Vec<VideoResponse> = videos.into_iter().map(VideoResponse::from).collect();
    Ok(Json(SearchResponse {
        query: input.term,
        total: results.len(),
        results,
    }))
}
