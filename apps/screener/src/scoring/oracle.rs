//! The external service that turns (job role, resumes) into raw scores.
//!
//! ARCHITECTURAL RULE: only the scoring gateway talks to an oracle. Session
//! code never calls one directly, so timeout, cancellation and the ranking
//! contracts are applied in exactly one place.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::score::Mode;
use crate::scoring::ScoringRequest;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Oracle error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Oracle returned empty content")]
    EmptyContent,
}

impl OracleError {
    /// Transient failures (network, 429, 5xx) are worth retrying; anything
    /// that produced an unreadable answer is not.
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::Http(e) => !e.is_decode(),
            OracleError::Api { status, .. } => *status == 429 || *status >= 500,
            OracleError::Parse(_) | OracleError::EmptyContent => false,
        }
    }
}

/// Raw oracle answer. Bulk: `{"scores": [{"label", "score"}]}`.
/// Single: `{"score", "narrative"}`.
///
/// Scores are kept as wide integers so out-of-range values can be rejected
/// rather than silently wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OracleResponse {
    Bulk {
        scores: Vec<OracleScore>,
    },
    Single {
        score: i64,
        #[serde(default)]
        narrative: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleScore {
    pub label: String,
    pub score: i64,
}

/// The oracle trait. Implement this to swap scoring backends without touching
/// the gateway or the session.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// "http" | "simulated" | ... for logs.
    fn backend(&self) -> &'static str;

    async fn score(&self, request: &ScoringRequest) -> Result<OracleResponse, OracleError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HttpOracle: real backing service
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OracleErrorBody {
    #[serde(alias = "detail")]
    error: Option<serde_json::Value>,
}

/// Posts one multipart request per submission: `mode` and `job_role_id`
/// text fields plus one `files` part per resume. The request carries no
/// server-side state, so re-sending it after a timeout is safe.
///
/// No retries here: retrying a failed analysis is the operator's call.
#[derive(Clone)]
pub struct HttpOracle {
    client: Client,
    url: String,
}

impl HttpOracle {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ScoringOracle for HttpOracle {
    fn backend(&self) -> &'static str {
        "http"
    }

    async fn score(&self, request: &ScoringRequest) -> Result<OracleResponse, OracleError> {
        let mut form = Form::new()
            .text("mode", request.mode.to_string())
            .text("job_role_id", request.job_role_id.clone());
        for file in &request.files {
            let part = Part::stream(Body::from(file.payload.clone())).file_name(file.name.clone());
            form = form.part("files", part);
        }

        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Scoring oracle returned {}: {}", status, body);
            let message = serde_json::from_str::<OracleErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or(body);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(OracleError::EmptyContent);
        }

        let parsed: OracleResponse = serde_json::from_str(&body)?;
        debug!(
            "Scoring oracle answered for job role {} ({} files)",
            request.job_role_id,
            request.files.len()
        );
        Ok(parsed)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimulatedOracle: randomized delayed scores for demos and local runs
// ────────────────────────────────────────────────────────────────────────────

/// Produces random scores after a jittered delay. Scores vary run-to-run;
/// nothing downstream may depend on them being stable.
pub struct SimulatedOracle {
    base_latency: Duration,
    jitter_ms: u64,
}

impl SimulatedOracle {
    pub fn new(base_latency: Duration, jitter_ms: u64) -> Self {
        Self {
            base_latency,
            jitter_ms,
        }
    }
}

#[async_trait]
impl ScoringOracle for SimulatedOracle {
    fn backend(&self) -> &'static str {
        "simulated"
    }

    async fn score(&self, request: &ScoringRequest) -> Result<OracleResponse, OracleError> {
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        tokio::time::sleep(self.base_latency + Duration::from_millis(jitter)).await;

        let mut rng = rand::thread_rng();
        let response = match request.mode {
            Mode::Single => {
                let score = rng.gen_range(40..=99u8);
                OracleResponse::Single {
                    score: i64::from(score),
                    narrative: Some(explain(score)),
                }
            }
            Mode::Bulk => OracleResponse::Bulk {
                scores: request
                    .files
                    .iter()
                    .map(|f| OracleScore {
                        label: f.name.clone(),
                        score: i64::from(rng.gen_range(30..=99u8)),
                    })
                    .collect(),
            },
        };
        Ok(response)
    }
}

/// Explain-match narrative from score bands: required skills, preferred
/// skills, experience.
pub fn explain(score: u8) -> String {
    let reasons = [
        if score >= 60 {
            "Has most core required skills."
        } else {
            "Missing several core required skills."
        },
        if score >= 80 {
            "Also has several preferred skills (plus)."
        } else {
            "Lacks many preferred skills (opportunity to upskill)."
        },
        if score >= 50 {
            "Experience level matches expectations."
        } else {
            "Insufficient experience for the stated requirement."
        },
    ];
    reasons.join(" ")
}
