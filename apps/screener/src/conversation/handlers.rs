use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::{ConversationSummary, Message};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct CreateConversationRequest {
    pub seed: Option<String>,
}

#[derive(Serialize)]
pub struct CreatedConversation {
    pub id: Uuid,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

#[derive(Serialize)]
pub struct ClearedResponse {
    pub removed: usize,
}

/// GET /api/v1/conversations
pub async fn handle_list_conversations(
    State(state): State<AppState>,
) -> Json<Vec<ConversationSummary>> {
    Json(state.session.conversation_summaries())
}

/// POST /api/v1/conversations
pub async fn handle_create_conversation(
    State(state): State<AppState>,
    body: Option<Json<CreateConversationRequest>>,
) -> (StatusCode, Json<CreatedConversation>) {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let seed = req.seed.filter(|s| !s.trim().is_empty());
    let id = state.session.create_conversation(seed);
    (StatusCode::CREATED, Json(CreatedConversation { id }))
}

/// POST /api/v1/conversations/:id/activate
pub async fn handle_activate_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.session.activate_conversation(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/conversations/:id/messages
pub async fn handle_get_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, AppError> {
    let conversation = state.session.conversation(id)?;
    Ok(Json(conversation.messages().to_vec()))
}

/// DELETE /api/v1/conversations/:id/messages
pub async fn handle_clear_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClearedResponse>, AppError> {
    let removed = state.session.clear_conversation(id)?;
    Ok(Json(ClearedResponse { removed }))
}

/// POST /api/v1/chat
///
/// Appends the user's text to the active conversation and returns the reply.
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Message>, AppError> {
    state
        .session
        .chat(&req.text)
        .map(Json)
        .ok_or_else(|| AppError::Validation("Message text must not be blank".to_string()))
}
