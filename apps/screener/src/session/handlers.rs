use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Path, State,
    },
    http::StatusCode,
    Json,
};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::intake::{AddOutcome, FileCandidate, FileKey, IntakeFile};
use crate::models::score::Mode;
use crate::session::machine::{AnalysisOutcome, SessionSnapshot};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ModeRequest {
    pub mode: Mode,
}

#[derive(Deserialize)]
pub struct JobRoleRequest {
    pub job_role_id: String,
}

#[derive(Serialize)]
pub struct AddFilesResponse {
    #[serde(flatten)]
    pub outcome: AddOutcome,
    pub files: Vec<IntakeFile>,
}

#[derive(Deserialize)]
pub struct ProgressRequest {
    pub percent: u8,
}

#[derive(Serialize)]
pub struct RemoveFileResponse {
    pub removed: bool,
}

#[derive(Serialize)]
pub struct ClearFilesResponse {
    pub removed: usize,
}

#[derive(Serialize)]
pub struct UploadStartedResponse {
    pub files: usize,
}

/// GET /api/v1/session
pub async fn handle_get_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.snapshot())
}

/// POST /api/v1/session/reset
pub async fn handle_reset(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.reset())
}

/// PUT /api/v1/session/mode
pub async fn handle_switch_mode(
    State(state): State<AppState>,
    Json(req): Json<ModeRequest>,
) -> Json<SessionSnapshot> {
    Json(state.session.switch_mode(req.mode))
}

/// PUT /api/v1/session/job-role
pub async fn handle_select_job_role(
    State(state): State<AppState>,
    Json(req): Json<JobRoleRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let role = state
        .job_roles
        .get(&req.job_role_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job role {} not found", req.job_role_id)))?;
    Ok(Json(state.session.select_job_role(role)))
}

/// POST /api/v1/session/files
///
/// Multipart body. Every part with a file name is a resume; a text part
/// named `last_modified` (epoch millis) applies to the file parts after it.
pub async fn handle_add_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AddFilesResponse>, AppError> {
    let mut candidates = Vec::new();
    let mut last_modified_ms: i64 = 0;
    let max_file_size = state.config.max_file_size_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Malformed multipart body", e))?
    {
        let file_name = field.file_name().map(str::to_string);
        match file_name {
            Some(name) => {
                let candidate = read_file(field, name, last_modified_ms, max_file_size).await?;
                candidates.push(candidate);
            }
            None if field.name() == Some("last_modified") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Unreadable last_modified", e))?;
                last_modified_ms = raw.trim().parse().map_err(|_| {
                    AppError::Validation(format!("last_modified must be epoch millis, got '{raw}'"))
                })?;
            }
            None => debug!("Ignoring multipart field {:?}", field.name()),
        }
    }

    if candidates.is_empty() {
        return Err(AppError::Validation(
            "Request contained no files".to_string(),
        ));
    }

    let outcome = state.session.add_files(candidates);
    Ok(Json(AddFilesResponse {
        outcome,
        files: state.session.snapshot().files,
    }))
}

/// Streams one file part. Content is buffered only up to `max_file_size`;
/// past that the rest is counted and dropped.
async fn read_file(
    mut field: Field<'_>,
    name: String,
    last_modified_ms: i64,
    max_file_size: u64,
) -> Result<FileCandidate, AppError> {
    let mut buffer = BytesMut::new();
    let mut size_bytes: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(&format!("Could not read file '{name}'"), e))?
    {
        size_bytes += chunk.len() as u64;
        if size_bytes <= max_file_size {
            buffer.extend_from_slice(&chunk);
        } else if !buffer.is_empty() {
            buffer = BytesMut::new();
        }
    }

    if size_bytes > max_file_size {
        debug!("'{name}' exceeds the size limit; content dropped");
        return Ok(FileCandidate::oversized(name, size_bytes, last_modified_ms));
    }
    Ok(FileCandidate::new(name, buffer.freeze(), last_modified_ms))
}

fn multipart_error(context: &str, err: MultipartError) -> AppError {
    let message = format!("{context}: {}", err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::Validation(message)
    }
}

/// DELETE /api/v1/session/files
pub async fn handle_clear_files(State(state): State<AppState>) -> Json<ClearFilesResponse> {
    Json(ClearFilesResponse {
        removed: state.session.clear_files(),
    })
}

/// DELETE /api/v1/session/files/:id
///
/// Removing a file that is not staged is a no-op.
pub async fn handle_remove_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<RemoveFileResponse> {
    Json(RemoveFileResponse {
        removed: state.session.remove_file(&FileKey::from(id)),
    })
}

/// PUT /api/v1/session/files/:id/progress
///
/// Progress reported by an external transfer. It may only grow.
pub async fn handle_set_progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> Result<StatusCode, AppError> {
    state.session.set_progress(&FileKey::from(id), req.percent)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/session/upload
///
/// Starts the simulated upload in the background; progress is observable
/// through the session snapshot and the event stream.
pub async fn handle_start_upload(
    State(state): State<AppState>,
) -> (StatusCode, Json<UploadStartedResponse>) {
    let files = state
        .session
        .snapshot()
        .files
        .iter()
        .filter(|f| f.is_valid())
        .count();

    let session = state.session.clone();
    tokio::spawn(async move {
        let completed = session.upload_all().await;
        info!("Simulated upload finished for {completed} file(s)");
    });

    (StatusCode::ACCEPTED, Json(UploadStartedResponse { files }))
}

/// POST /api/v1/session/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
) -> Result<Json<AnalysisOutcome>, AppError> {
    let outcome = state.session.analyze().await?;
    Ok(Json(outcome))
}
