use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::models::share::{Collaborator, ShareKind, ShareOutcome, ShareRole};
use crate::sharing::service::{self, SharedWithMe};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub success: bool,
    pub message: String,
    pub outcome: ShareOutcome,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveShareRequest {
    pub user_id: Option<Uuid>,
}

/// Both fields must be present and non-blank; the role must be VIEWER or EDITOR.
fn parse_share_request(req: ShareRequest) -> Result<(String, ShareRole), AppError> {
    let email = req.email.filter(|e| !e.trim().is_empty());
    let role = req.role.filter(|r| !r.trim().is_empty());
    match (email, role) {
        (Some(email), Some(role)) => {
            let role = role.trim().parse::<ShareRole>().map_err(AppError::Validation)?;
            Ok((email, role))
        }
        _ => Err(AppError::Validation("Email and role are required".to_string())),
    }
}

/// POST /api/sharing/:kind/:id/share
pub async fn handle_share(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((kind, resource_id)): Path<(ShareKind, Uuid)>,
    Json(req): Json<ShareRequest>,
) -> Result<Json<ShareResponse>, AppError> {
    let (email, role) = parse_share_request(req)?;
    let outcome =
        service::share_resource(state.shares.as_ref(), kind, resource_id, &email, role, &user.0)
            .await?;
    Ok(Json(ShareResponse {
        success: true,
        message: format!("{} shared successfully", kind.label()),
        outcome,
    }))
}

/// DELETE /api/sharing/:kind/:id/share
pub async fn handle_remove_share(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((kind, resource_id)): Path<(ShareKind, Uuid)>,
    Json(req): Json<RemoveShareRequest>,
) -> Result<Json<Value>, AppError> {
    let target = req
        .user_id
        .ok_or_else(|| AppError::Validation("Target userId required".to_string()))?;
    service::remove_share(state.shares.as_ref(), kind, resource_id, target, &user.0).await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/sharing/:kind/:id/collaborators
pub async fn handle_collaborators(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((kind, resource_id)): Path<(ShareKind, Uuid)>,
) -> Result<Json<Vec<Collaborator>>, AppError> {
    let collaborators =
        service::get_collaborators(state.shares.as_ref(), kind, resource_id, &user.0).await?;
    Ok(Json(collaborators))
}

/// GET /api/sharing/shared-with-me
pub async fn handle_shared_with_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<SharedWithMe>, AppError> {
    Ok(Json(
        service::get_shared_with_me(state.shares.as_ref(), user.id()).await?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_rejected() {
        let err = parse_share_request(ShareRequest {
            email: Some("a@b.c".into()),
            role: None,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg == "Email and role are required"));

        let err = parse_share_request(ShareRequest {
            email: Some("  ".into()),
            role: Some("VIEWER".into()),
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_invalid_role_rejected() {
        let err = parse_share_request(ShareRequest {
            email: Some("a@b.c".into()),
            role: Some("OWNER".into()),
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("VIEWER or EDITOR")));
    }

    #[test]
    fn test_valid_request() {
        let (email, role) = parse_share_request(ShareRequest {
            email: Some("editor@example.com".into()),
            role: Some("EDITOR".into()),
        })
        .unwrap();
        assert_eq!(email, "editor@example.com");
        assert_eq!(role, ShareRole::Editor);
    }
}
