// Deterministic oracle double and request builders shared by tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::intake::FileKey;
use crate::models::score::Mode;
use crate::scoring::oracle::{OracleError, OracleResponse, OracleScore, ScoringOracle};
use crate::scoring::{FileRef, ScoringRequest};

#[derive(Debug, Clone, Copy)]
enum Failure {
    Unavailable,
    Empty,
}

/// Fixed scores for fixed labels, with a call counter.
pub struct FixedOracle {
    scores: HashMap<String, i64>,
    default_score: i64,
    latency: Duration,
    failure: Option<Failure>,
    reversed: bool,
    drop_last: bool,
    calls: AtomicUsize,
}

impl FixedOracle {
    pub fn new(default_score: i64) -> Self {
        Self {
            scores: HashMap::new(),
            default_score,
            latency: Duration::ZERO,
            failure: None,
            reversed: false,
            drop_last: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_score(mut self, label: &str, score: i64) -> Self {
        self.scores.insert(label.to_string(), score);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_unavailable(mut self) -> Self {
        self.failure = Some(Failure::Unavailable);
        self
    }

    pub fn failing_empty(mut self) -> Self {
        self.failure = Some(Failure::Empty);
        self
    }

    /// Answers Bulk requests in reverse submission order.
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn dropping_last(mut self) -> Self {
        self.drop_last = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn score_for(&self, label: &str) -> i64 {
        self.scores.get(label).copied().unwrap_or(self.default_score)
    }
}

#[async_trait]
impl ScoringOracle for FixedOracle {
    fn backend(&self) -> &'static str {
        "fixed"
    }

    async fn score(&self, request: &ScoringRequest) -> Result<OracleResponse, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.failure {
            Some(Failure::Unavailable) => {
                return Err(OracleError::Api {
                    status: 503,
                    message: "scoring backend down".to_string(),
                })
            }
            Some(Failure::Empty) => return Err(OracleError::EmptyContent),
            None => {}
        }

        let response = match request.mode {
            Mode::Single => {
                let label = request.files.first().map(|f| f.name.as_str()).unwrap_or("");
                OracleResponse::Single {
                    score: self.score_for(label),
                    narrative: Some(format!("fixed narrative for {label}")),
                }
            }
            Mode::Bulk => {
                let mut scores: Vec<OracleScore> = request
                    .files
                    .iter()
                    .map(|f| OracleScore {
                        label: f.name.clone(),
                        score: self.score_for(&f.name),
                    })
                    .collect();
                if self.reversed {
                    scores.reverse();
                }
                if self.drop_last {
                    scores.pop();
                }
                OracleResponse::Bulk { scores }
            }
        };
        Ok(response)
    }
}

pub fn file_ref(name: &str) -> FileRef {
    FileRef {
        id: FileKey::derive(name, 4, 0),
        name: name.to_string(),
        size_bytes: 4,
        payload: Bytes::from_static(b"body"),
    }
}

/// A request at sequence 1. Override `sequence` to order several.
pub fn request(mode: Mode, job_role_id: &str, names: &[&str]) -> ScoringRequest {
    ScoringRequest {
        sequence: 1,
        mode,
        job_role_id: job_role_id.to_string(),
        files: names.iter().map(|n| file_ref(n)).collect(),
    }
}
