//! Request identity.
//!
//! Sessions and login live in the upstream auth layer, which forwards the
//! authenticated user id in `x-user-id`. This module gates non-public paths
//! on that header and resolves it to a user row.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

const PUBLIC_ROUTES: [&str; 3] = ["/login", "/register", "/health"];

/// Base-aware: `/videon/login` and `/login` are both public.
pub fn is_path_public(path: &str) -> bool {
    if path.is_empty() {
        return false;
    }
    PUBLIC_ROUTES.iter().any(|route| {
        let with_slash = format!("{route}/");
        path.ends_with(route) || path.ends_with(&with_slash)
    })
}

pub fn user_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
}

/// Rejects non-public requests that carry no identity.
pub async fn require_identity(req: Request, next: Next) -> Result<Response, AppError> {
    if !is_path_public(req.uri().path()) && user_id_from_headers(req.headers()).is_none() {
        return Err(AppError::Unauthorized);
    }
    Ok(next.run(req).await)
}

/// The authenticated user, loaded from the database.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = user_id_from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;
        let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
        user.map(CurrentUser).ok_or(AppError::Unauthorized)
    }
}

/// A `CurrentUser` with the ADMIN role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRow);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden(
                "Access denied. Admin rights required.".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    #[test]
    fn test_login_and_register_are_public() {
        assert!(is_path_public("/login"));
        assert!(is_path_public("/login/"));
        assert!(is_path_public("/register"));
        assert!(is_path_public("/register/"));
    }

    #[test]
    fn test_base_prefixed_paths_are_public() {
        assert!(is_path_public("/videon/login"));
        assert!(is_path_public("/videon/login/"));
        assert!(is_path_public("/videon/register"));
    }

    #[test]
    fn test_protected_paths() {
        assert!(!is_path_public("/"));
        assert!(!is_path_public("/search"));
        assert!(!is_path_public("/search/"));
        assert!(!is_path_public("/videos"));
        assert!(!is_path_public("/videos/123"));
        assert!(!is_path_public("/settings"));
        assert!(!is_path_public(""));
    }

    #[test]
    fn test_user_id_header_parsing() {
        let mut headers = HeaderMap::new();
        assert!(user_id_from_headers(&headers).is_none());
        headers.insert(USER_ID_HEADER, "not-a-uuid".parse().unwrap());
        assert!(user_id_from_headers(&headers).is_none());
        let id = Uuid::new_v4();
        headers.insert(USER_ID_HEADER, id.to_string().parse().unwrap());
        assert_eq!(user_id_from_headers(&headers), Some(id));
    }

    fn gated_router() -> Router {
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route("/api/videos", get(|| async { "videos" }))
            .layer(middleware::from_fn(require_identity))
    }

    #[tokio::test]
    async fn test_gate_rejects_anonymous_protected_request() {
        let response = gated_router()
            .oneshot(Request::builder().uri("/api/videos").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_gate_allows_public_and_identified_requests() {
        let response = gated_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = gated_router()
            .oneshot(
                Request::builder()
                    .uri("/api/videos")
                    .header(USER_ID_HEADER, Uuid::new_v4().to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
