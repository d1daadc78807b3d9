//! Scoring: everything between a bound (mode, job role, files) triple and a
//! `ScoreResult`.
//!
//! The `ScoringOracle` is the external service that produces raw scores.
//! The `ScoringGateway` wraps it with validation, timeout and cancellation
//! policy and applies the fixed threshold / ranking contracts from `ranking`.

use bytes::Bytes;
use serde::Serialize;

use crate::intake::{FileKey, IntakeFile};
use crate::models::score::Mode;

pub mod gateway;
pub mod oracle;
pub mod ranking;

#[cfg(test)]
pub mod testing;

/// Reference to a staged file as sent to the oracle. The payload shares the
/// registry's buffer.
#[derive(Debug, Clone, Serialize)]
pub struct FileRef {
    pub id: FileKey,
    pub name: String,
    pub size_bytes: u64,
    #[serde(skip)]
    pub payload: Bytes,
}

impl From<&IntakeFile> for FileRef {
    fn from(file: &IntakeFile) -> Self {
        Self {
            id: file.id.clone(),
            name: file.name.clone(),
            size_bytes: file.size_bytes,
            payload: file.payload.clone(),
        }
    }
}

/// One logical scoring submission. Bulk mode batches every file into a
/// single request.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringRequest {
    /// Staleness sequence of the analysis that issued the request. Higher is
    /// newer.
    pub sequence: u64,
    pub mode: Mode,
    pub job_role_id: String,
    pub files: Vec<FileRef>,
}
