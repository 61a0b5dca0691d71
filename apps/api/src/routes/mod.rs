pub mod health;

use axum::{
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};

use crate::auth::require_identity;
use crate::folders::handlers as folders;
use crate::projects::handlers as projects;
use crate::saliency::handlers as saliency;
use crate::search::{handlers as search, proxy};
use crate::sharing::handlers as sharing;
use crate::state::AppState;
use crate::users::handlers as users;
use crate::videos::handlers as videos;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Sharing
        .route("/api/sharing/shared-with-me", get(sharing::handle_shared_with_me))
        .route(
            "/api/sharing/:kind/:id/share",
            post(sharing::handle_share).delete(sharing::handle_remove_share),
        )
        .route(
            "/api/sharing/:kind/:id/collaborators",
            get(sharing::handle_collaborators),
        )
        // Projects
        .route(
            "/api/projects",
            get(projects::handle_list_projects).post(projects::handle_create_project),
        )
        .route(
            "/api/projects/:id",
            get(projects::handle_get_project).delete(projects::handle_delete_project),
        )
        // Saliency
        .route("/api/saliency-analyses", post(saliency::handle_create))
        .route("/api/saliency-analyses/:id", delete(saliency::handle_delete))
        .route(
            "/api/saliency-analyses/:id/heatmap",
            patch(saliency::handle_update_heatmap),
        )
        .route("/api/saliency/stats", get(saliency::handle_stats))
        .route("/api/videos/:id/saliency", get(saliency::handle_video_saliency))
        .route(
            "/api/videos/:id/saliency/all",
            get(saliency::handle_all_video_saliency),
        )
        .route(
            "/api/videos/:id/saliency/status",
            get(saliency::handle_saliency_status),
        )
        .route(
            "/api/videos/:id/roi-suggestions",
            get(saliency::handle_roi_suggestions),
        )
        .route("/api/scenes/:id/saliency", get(saliency::handle_scene_saliency))
        // Users
        .route("/api/users/search", get(users::handle_search_users))
        .route(
            "/api/users",
            get(users::handle_list_users).post(users::handle_create_user),
        )
        .route("/api/users/me/password", put(users::handle_change_password))
        .route("/api/users/:id", delete(users::handle_delete_user))
        // Videos
        .route("/api/videos", get(videos::handle_list_videos))
        .route(
            "/api/videos/:id",
            get(videos::handle_get_video)
                .patch(videos::handle_rename_video)
                .delete(videos::handle_delete_video),
        )
        .route("/api/videos/:id/move", put(videos::handle_move_video))
        .route("/api/videos/:id/scenes", get(videos::handle_video_scenes))
        .route("/api/videos/:id/status", patch(videos::handle_update_status))
        // Folders
        .route(
            "/api/folders",
            get(folders::handle_list_folders).post(folders::handle_create_folder),
        )
        .route(
            "/api/folders/:id",
            get(folders::handle_get_folder)
                .put(folders::handle_rename_folder)
                .delete(folders::handle_delete_folder),
        )
        .route("/api/folders/:id/move-videos", post(folders::handle_move_videos))
        .route("/api/folders/:id/breadcrumbs", get(folders::handle_breadcrumbs))
        // Search
        .route("/api/search", get(search::handle_search))
        .route("/proxy/search", get(proxy::handle_proxy_search))
        .layer(middleware::from_fn(require_identity))
        .with_state(state)
}
