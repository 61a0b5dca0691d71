use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::auth::{AdminUser, CurrentUser};
use crate::db::like_pattern;
use crate::errors::AppError;
use crate::models::user::{UserRole, UserSummary};
use crate::sharing::service::normalize_email;
use crate::state::AppState;
use crate::users::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};

const SEARCH_MIN_CHARS: usize = 2;
const SEARCH_LIMIT: i64 = 10;

const SUMMARY_COLUMNS: &str = "id, email, name, role, provider, avatar_url, created_at";

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// GET /api/users/search?q=
pub async fn handle_search_users(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let term = query.q.unwrap_or_default();
    let term = term.trim();
    if term.chars().count() < SEARCH_MIN_CHARS {
        return Ok(Json(Vec::new()));
    }

    let sql = format!(
        r#"
        SELECT {SUMMARY_COLUMNS} FROM users
        WHERE id <> $1 AND (email ILIKE $2 OR name ILIKE $2)
        ORDER BY name ASC
        LIMIT $3
        "#
    );
    let users: Vec<UserSummary> = sqlx::query_as(&sql)
        .bind(user.id())
        .bind(like_pattern(term))
        .bind(SEARCH_LIMIT)
        .fetch_all(&state.db)
        .await?;
    Ok(Json(users))
}

/// GET /api/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let sql = format!("SELECT {SUMMARY_COLUMNS} FROM users ORDER BY created_at DESC");
    let users: Vec<UserSummary> = sqlx::query_as(&sql).fetch_all(&state.db).await?;
    Ok(Json(users))
}

/// POST /api/users
pub async fn handle_create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserSummary>), AppError> {
    let (Some(email), Some(password), Some(name)) = (
        req.email.as_deref().map(normalize_email).filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
        req.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
    ) else {
        return Err(AppError::Validation("Missing required fields".to_string()));
    };
    if !email.contains('@') {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE lower(email) = $1)")
        .bind(&email)
        .fetch_one(&state.db)
        .await?;
    if exists {
        return Err(AppError::Validation("User already exists".to_string()));
    }

    let password_hash = hash_password(&password)?;
    let role = req.role.unwrap_or_default();

    let sql = format!(
        r#"
        INSERT INTO users (email, password_hash, name, role, provider)
        VALUES ($1, $2, $3, $4, 'LOCAL')
        RETURNING {SUMMARY_COLUMNS}
        "#
    );
    let created: UserSummary = sqlx::query_as(&sql)
        .bind(&email)
        .bind(&password_hash)
        .bind(&name)
        .bind(role.as_str())
        .fetch_one(&state.db)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "User already exists"))?;

    info!("Admin {} created user: {}", admin.email, created.email);
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /api/users/:id
pub async fn handle_delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if admin.id == id {
        return Err(AppError::Validation(
            "Cannot delete your own account".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    info!("Admin {} deleted user: {id}", admin.email);
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

/// PUT /api/users/me/password
pub async fn handle_change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<StatusCode, AppError> {
    let Some(current_hash) = user.password_hash.as_deref() else {
        return Err(AppError::Validation(format!(
            "Password login is not enabled for {} accounts",
            user.provider
        )));
    };
    if !verify_password(&req.current_password, current_hash)? {
        return Err(AppError::Validation("Current password is incorrect".to_string()));
    }
    if req.new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let new_hash = hash_password(&req.new_password)?;
    sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
        .bind(new_hash)
        .bind(user.id)
        .execute(&state.db)
        .await?;
    info!("User {} changed password", user.id);
    Ok(StatusCode::NO_CONTENT)
}
