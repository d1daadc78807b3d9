pub mod health;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::conversation::handlers as conversation;
use crate::errors::AppError;
use crate::models::job_role::JobRoleSummary;
use crate::session::handlers as session;
use crate::state::AppState;

/// GET /api/v1/job-roles
async fn handle_list_job_roles(
    State(state): State<AppState>,
) -> Result<Json<Vec<JobRoleSummary>>, AppError> {
    Ok(Json(state.job_roles.list_job_roles().await?))
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/job-roles", get(handle_list_job_roles))
        // Session
        .route("/api/v1/session", get(session::handle_get_session))
        .route("/api/v1/session/reset", post(session::handle_reset))
        .route("/api/v1/session/mode", put(session::handle_switch_mode))
        .route(
            "/api/v1/session/job-role",
            put(session::handle_select_job_role),
        )
        .route(
            "/api/v1/session/files",
            post(session::handle_add_files)
                .delete(session::handle_clear_files)
                // per-file size is judged by intake; this caps the whole request
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/v1/session/files/:id",
            delete(session::handle_remove_file),
        )
        .route(
            "/api/v1/session/files/:id/progress",
            put(session::handle_set_progress),
        )
        .route("/api/v1/session/upload", post(session::handle_start_upload))
        .route("/api/v1/session/analyze", post(session::handle_analyze))
        // Conversations
        .route(
            "/api/v1/conversations",
            get(conversation::handle_list_conversations)
                .post(conversation::handle_create_conversation),
        )
        .route(
            "/api/v1/conversations/:id/activate",
            post(conversation::handle_activate_conversation),
        )
        .route(
            "/api/v1/conversations/:id/messages",
            get(conversation::handle_get_messages).delete(conversation::handle_clear_messages),
        )
        .route("/api/v1/chat", post(conversation::handle_chat))
        .with_state(state)
}
