use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::project::ProjectRow;
use crate::models::share::ShareKind;
use crate::sharing::service::{authorize_owner, authorize_view};
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 200;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Validated form of [`CreateProjectRequest`].
#[derive(Debug, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
}

impl CreateProjectRequest {
    pub fn validate(self) -> Result<NewProject, AppError> {
        let name = self.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(AppError::Validation("Project name is required".to_string()));
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(AppError::Validation(format!(
                "Project name must be at most {MAX_NAME_LENGTH} characters"
            )));
        }
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(NewProject {
            name: name.to_string(),
            description,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteProjectResponse {
    pub success: bool,
}

/// POST /api/projects
pub async fn handle_create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectRow>), AppError> {
    let new = req.validate()?;
    let project: ProjectRow = sqlx::query_as(
        r#"
        INSERT INTO projects (name, description, user_id)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(&new.name)
    .bind(&new.description)
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    info!("User {} created project {} ({})", user.email, project.id, project.name);
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects
///
/// Own projects, newest first. Admins see every project.
pub async fn handle_list_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<ProjectRow>>, AppError> {
    let projects: Vec<ProjectRow> = sqlx::query_as(
        r#"
        SELECT * FROM projects
        WHERE $1 OR user_id = $2
        ORDER BY updated_at DESC
        "#,
    )
    .bind(user.is_admin())
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(projects))
}

/// GET /api/projects/:id
pub async fn handle_get_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectRow>, AppError> {
    authorize_view(state.shares.as_ref(), ShareKind::Project, id, &user).await?;
    let project: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    project
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

/// DELETE /api/projects/:id
///
/// Shares go with the project through the foreign key cascade.
pub async fn handle_delete_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteProjectResponse>, AppError> {
    authorize_owner(state.shares.as_ref(), ShareKind::Project, id, &user, "delete").await?;
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Project not found".to_string()));
    }
    info!("User {} deleted project {id}", user.email);
    Ok(Json(DeleteProjectResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: Option<&str>, description: Option<&str>) -> CreateProjectRequest {
        CreateProjectRequest {
            name: name.map(String::from),
            description: description.map(String::from),
        }
    }

    #[test]
    fn test_name_is_required() {
        for name in [None, Some(""), Some("   ")] {
            let err = request(name, None).validate().unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "name {name:?}");
        }
    }

    #[test]
    fn test_name_and_description_are_trimmed() {
        let new = request(Some("  Launch cut "), Some("  ")).validate().unwrap();
        assert_eq!(
            new,
            NewProject {
                name: "Launch cut".to_string(),
                description: None,
            }
        );

        let new = request(Some("Promo"), Some(" 30s teaser ")).validate().unwrap();
        assert_eq!(new.description.as_deref(), Some("30s teaser"));
    }

    #[test]
    fn test_overlong_name_rejected() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(request(Some(&long), None).validate().is_err());
        let max = "x".repeat(MAX_NAME_LENGTH);
        assert!(request(Some(&max), None).validate().is_ok());
    }
}
