use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::USER_ID_HEADER;
use crate::errors::AppError;
use crate::search::handlers::DEFAULT_LIMIT;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub q: Option<String>,
}

fn backend_search_url(base: &str) -> String {
    format!("{}/api/search", base.trim_end_matches('/'))
}

/// GET /proxy/search?q=
///
/// Relays the backend's status and body unchanged.
pub async fn handle_proxy_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ProxyParams>,
) -> Result<Response, AppError> {
    let q = params
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::Validation("Missing query parameter \"q\"".to_string()))?;

    let url = backend_search_url(&state.config.search_backend_url);
    let limit = DEFAULT_LIMIT.to_string();
    let mut request = state
        .http
        .get(&url)
        .query(&[("q", q.as_str()), ("limit", limit.as_str())]);
    if let Some(user_id) = headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok()) {
        request = request.header(USER_ID_HEADER, user_id);
    }

    info!("Proxying search for {q:?} to {url}");
    let upstream = request.send().await.map_err(|e| {
        warn!("Search backend unreachable at {url}: {e}");
        AppError::BadGateway {
            message: "Backend not reachable".to_string(),
            details: e.to_string(),
        }
    })?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body: Bytes = upstream.bytes().await.map_err(|e| AppError::BadGateway {
        message: "Backend response could not be read".to_string(),
        details: e.to_string(),
    })?;

    Ok((status, [(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_url_joins_cleanly() {
        assert_eq!(
            backend_search_url("http://127.0.0.1:4001/"),
            "http://127.0.0.1:4001/api/search"
        );
        assert_eq!(
            backend_search_url("http://search.internal"),
            "http://search.internal/api/search"
        );
    }

    async fn call(state: AppState, uri: &str) -> Response {
        use axum::{body::Body, http::Request, routing::get, Router};
        use tower::ServiceExt;

        Router::new()
            .route("/proxy/search", get(handle_proxy_search))
            .with_state(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_query_is_bad_request() {
        let response = call(AppState::for_tests("http://127.0.0.1:1"), "/proxy/search").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_bad_gateway() {
        let response = call(AppState::for_tests("http://127.0.0.1:1"), "/proxy/search?q=beach").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Backend not reachable");
        assert!(json["details"].is_string());
    }
}
