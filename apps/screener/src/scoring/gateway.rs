//! Validated, bounded, cancellable access to a scoring oracle.
//!
//! One logical request per submission. Requests carry the sequence of the
//! analysis that issued them: a newer submission cancels an older outstanding
//! one, and a submission older than the newest seen is refused outright.
//! Cancellation is advisory: the session's staleness token decides whether a
//! completed call is applied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::score::{Mode, RankedEntry, ScoreResult};
use crate::scoring::oracle::{OracleResponse, OracleScore, ScoringOracle};
use crate::scoring::ranking::{judge, rank};
use crate::scoring::ScoringRequest;
use crate::session::ScreeningConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Invalid scoring request: {0}")]
    InvalidRequest(String),

    #[error("Scoring service unavailable: {0}")]
    Unavailable(String),

    #[error("Scoring timed out after {0:?}")]
    Timeout(Duration),

    #[error("Scoring service returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Scoring request was superseded")]
    Cancelled,
}

/// How a failed analysis is presented. A timeout is reported exactly like an
/// unavailable service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    GatewayUnavailable,
    InvalidResponse,
}

impl GatewayError {
    pub fn retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_) | GatewayError::Timeout(_))
    }

    /// `None` for a superseded call, which never surfaces as a failed analysis.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            GatewayError::Unavailable(_) | GatewayError::Timeout(_) => {
                Some(FailureKind::GatewayUnavailable)
            }
            GatewayError::InvalidResponse(_) => Some(FailureKind::InvalidResponse),
            GatewayError::InvalidRequest(_) => Some(FailureKind::InvalidRequest),
            GatewayError::Cancelled => None,
        }
    }
}

/// The gateway trait. The session only ever sees this.
#[async_trait]
pub trait ScoringGateway: Send + Sync {
    async fn submit(&self, request: ScoringRequest) -> Result<ScoreResult, GatewayError>;

    /// Advisory cancel of whatever submission is in flight.
    fn cancel_outstanding(&self);
}

struct InFlight {
    call_id: u64,
    sequence: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct Calls {
    /// Highest request sequence accepted so far.
    latest: u64,
    in_flight: Option<InFlight>,
}

/// Default gateway over any `ScoringOracle`.
pub struct OracleGateway {
    oracle: Arc<dyn ScoringOracle>,
    threshold: u8,
    timeout: Duration,
    calls: Mutex<Calls>,
    next_call: AtomicU64,
}

impl OracleGateway {
    /// Threshold and timeout come from the same `ScreeningConfig` the session
    /// is built from.
    pub fn new(oracle: Arc<dyn ScoringOracle>, config: &ScreeningConfig) -> Self {
        Self {
            oracle,
            threshold: config.threshold,
            timeout: config.scoring_timeout,
            calls: Mutex::new(Calls::default()),
            next_call: AtomicU64::new(1),
        }
    }

    /// `None` when a newer sequence has already been submitted.
    fn register_call(&self, sequence: u64) -> Option<(u64, CancellationToken)> {
        let mut calls = self.calls.lock();
        if sequence < calls.latest {
            debug!(
                "Refusing scoring request #{sequence}: #{} is newer",
                calls.latest
            );
            return None;
        }
        calls.latest = sequence;

        let call_id = self.next_call.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let prior = calls.in_flight.replace(InFlight {
            call_id,
            sequence,
            token: token.clone(),
        });
        if let Some(prior) = prior {
            debug!(
                "Scoring call {} (#{}) superseded by call {call_id} (#{sequence})",
                prior.call_id, prior.sequence
            );
            prior.token.cancel();
        }
        Some((call_id, token))
    }

    fn finish_call(&self, call_id: u64) {
        let mut calls = self.calls.lock();
        if matches!(calls.in_flight.as_ref(), Some(f) if f.call_id == call_id) {
            calls.in_flight = None;
        }
    }
}

#[async_trait]
impl ScoringGateway for OracleGateway {
    async fn submit(&self, request: ScoringRequest) -> Result<ScoreResult, GatewayError> {
        validate(&request)?;

        let Some((call_id, token)) = self.register_call(request.sequence) else {
            return Err(GatewayError::Cancelled);
        };
        info!(
            "Scoring call {call_id} (#{}): {} mode, job role {}, {} file(s) via {}",
            request.sequence,
            request.mode,
            request.job_role_id,
            request.files.len(),
            self.oracle.backend()
        );

        let outcome = tokio::select! {
            _ = token.cancelled() => Err(GatewayError::Cancelled),
            res = tokio::time::timeout(self.timeout, self.oracle.score(&request)) => match res {
                Err(_) => Err(GatewayError::Timeout(self.timeout)),
                Ok(Err(e)) if e.is_transient() => Err(GatewayError::Unavailable(e.to_string())),
                Ok(Err(e)) => Err(GatewayError::InvalidResponse(e.to_string())),
                Ok(Ok(response)) => map_response(&request, response, self.threshold),
            },
        };

        self.finish_call(call_id);

        if let Err(e) = &outcome {
            warn!("Scoring call {call_id} failed: {e}");
        }
        outcome
    }

    fn cancel_outstanding(&self) {
        if let Some(call) = self.calls.lock().in_flight.take() {
            debug!("Cancelling scoring call {} (#{})", call.call_id, call.sequence);
            call.token.cancel();
        }
    }
}

/// Fails fast, before any oracle contact.
fn validate(request: &ScoringRequest) -> Result<(), GatewayError> {
    if request.job_role_id.trim().is_empty() {
        return Err(GatewayError::InvalidRequest(
            "a job role must be selected".to_string(),
        ));
    }
    if request.files.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "at least one resume is required".to_string(),
        ));
    }
    if request.mode == Mode::Single && request.files.len() > 1 {
        return Err(GatewayError::InvalidRequest(
            "single mode scores exactly one resume".to_string(),
        ));
    }
    Ok(())
}

fn checked_score(raw: i64) -> Result<u8, GatewayError> {
    u8::try_from(raw)
        .ok()
        .filter(|s| *s <= 100)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("score {raw} is outside 0-100")))
}

/// Maps a raw oracle answer onto a `ScoreResult`, applying the threshold and
/// ranking rules.
fn map_response(
    request: &ScoringRequest,
    response: OracleResponse,
    threshold: u8,
) -> Result<ScoreResult, GatewayError> {
    match (request.mode, response) {
        (Mode::Single, OracleResponse::Single { score, narrative }) => {
            let score = checked_score(score)?;
            let label = request
                .files
                .first()
                .map(|f| f.name.clone())
                .unwrap_or_default();
            let narrative = narrative
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Scored {score}/100 against the role requirements."));
            Ok(ScoreResult::Single(judge(label, score, narrative, threshold)))
        }
        (Mode::Bulk, OracleResponse::Bulk { scores }) => {
            let entries = in_submission_order(request, scores)?;
            Ok(ScoreResult::Bulk(rank(entries, threshold)))
        }
        (mode, _) => Err(GatewayError::InvalidResponse(format!(
            "response shape does not match {mode} mode"
        ))),
    }
}

/// Matches each oracle score to a submitted file (by name or id) and returns
/// entries in submission order, so that tie-breaking never depends on the
/// order the oracle answered in.
fn in_submission_order(
    request: &ScoringRequest,
    scores: Vec<OracleScore>,
) -> Result<Vec<RankedEntry>, GatewayError> {
    if scores.len() != request.files.len() {
        return Err(GatewayError::InvalidResponse(format!(
            "expected {} scores, got {}",
            request.files.len(),
            scores.len()
        )));
    }

    let mut slots: Vec<Option<RankedEntry>> = vec![None; request.files.len()];
    for OracleScore { label, score } in scores {
        let score = checked_score(score)?;
        let index = request
            .files
            .iter()
            .enumerate()
            .position(|(i, f)| slots[i].is_none() && (f.name == label || f.id.as_str() == label))
            .ok_or_else(|| {
                GatewayError::InvalidResponse(format!("unexpected candidate label '{label}'"))
            })?;
        slots[index] = Some(RankedEntry {
            candidate_label: request.files[index].name.clone(),
            score,
        });
    }

    // every slot is filled: counts match and each label claimed a distinct slot
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::score::Verdict;
    use crate::scoring::testing::{request, FixedOracle};

    fn gateway(oracle: Arc<FixedOracle>) -> OracleGateway {
        OracleGateway::new(oracle, &ScreeningConfig::default())
    }

    #[tokio::test]
    async fn test_empty_job_role_fails_without_calling_oracle() {
        let oracle = Arc::new(FixedOracle::new(80));
        let gw = gateway(oracle.clone());

        let err = gw
            .submit(request(Mode::Single, " ", &["a.pdf"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert!(!err.retryable());
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_files_fails_without_calling_oracle() {
        let oracle = Arc::new(FixedOracle::new(80));
        let gw = gateway(oracle.clone());

        let err = gw.submit(request(Mode::Bulk, "1", &[])).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_applies_threshold() {
        let oracle = Arc::new(FixedOracle::new(74));
        let result = gateway(oracle)
            .submit(request(Mode::Single, "1", &["a.pdf"]))
            .await
            .unwrap();
        match result {
            ScoreResult::Single(s) => {
                assert_eq!(s.candidate_label, "a.pdf");
                assert_eq!(s.score, 74);
                assert_eq!(s.verdict, Verdict::NotSuitable);
                assert!(!s.narrative.is_empty());
            }
            other => panic!("expected single, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bulk_is_one_batched_call_and_ranked() {
        let oracle = Arc::new(
            FixedOracle::new(0)
                .with_score("a.pdf", 74)
                .with_score("b.pdf", 90)
                .with_score("c.pdf", 50)
                .with_score("d.pdf", 75),
        );
        let result = gateway(oracle.clone())
            .submit(request(Mode::Bulk, "1", &["a.pdf", "b.pdf", "c.pdf", "d.pdf"]))
            .await
            .unwrap();

        assert_eq!(oracle.calls(), 1);
        match result {
            ScoreResult::Bulk(b) => {
                let short: Vec<_> = b.shortlisted.iter().map(|e| e.score).collect();
                let rejected: Vec<_> = b.rejected.iter().map(|e| e.score).collect();
                assert_eq!(short, vec![90, 75]);
                assert_eq!(rejected, vec![74, 50]);
            }
            other => panic!("expected bulk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bulk_ties_follow_submission_not_oracle_order() {
        let oracle = Arc::new(FixedOracle::new(80).reversed());
        let result = gateway(oracle)
            .submit(request(Mode::Bulk, "1", &["first.pdf", "second.pdf", "third.pdf"]))
            .await
            .unwrap();
        match result {
            ScoreResult::Bulk(b) => {
                let labels: Vec<_> = b
                    .entries
                    .iter()
                    .map(|e| e.candidate_label.as_str())
                    .collect();
                assert_eq!(labels, vec!["first.pdf", "second.pdf", "third.pdf"]);
            }
            other => panic!("expected bulk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unavailable_oracle_is_retryable() {
        let oracle = Arc::new(FixedOracle::new(80).failing_unavailable());
        let err = gateway(oracle)
            .submit(request(Mode::Single, "1", &["a.pdf"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
        assert!(err.retryable());
        assert_eq!(err.failure_kind(), Some(FailureKind::GatewayUnavailable));
    }

    #[tokio::test]
    async fn test_empty_oracle_response_is_not_retryable() {
        let oracle = Arc::new(FixedOracle::new(80).failing_empty());
        let err = gateway(oracle)
            .submit(request(Mode::Single, "1", &["a.pdf"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_invalid_response() {
        let oracle = Arc::new(FixedOracle::new(101));
        let err = gateway(oracle)
            .submit(request(Mode::Single, "1", &["a.pdf"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_bulk_score_count_mismatch_is_invalid_response() {
        let oracle = Arc::new(FixedOracle::new(80).dropping_last());
        let err = gateway(oracle)
            .submit(request(Mode::Bulk, "1", &["a.pdf", "b.pdf"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_as_unavailable() {
        let oracle = Arc::new(FixedOracle::new(80).with_latency(Duration::from_secs(60)));
        let config = ScreeningConfig {
            scoring_timeout: Duration::from_secs(2),
            ..ScreeningConfig::default()
        };
        let gw = OracleGateway::new(oracle, &config);
        let err = gw
            .submit(request(Mode::Single, "1", &["a.pdf"]))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Timeout(Duration::from_secs(2)));
        assert!(err.retryable());
        assert_eq!(err.failure_kind(), Some(FailureKind::GatewayUnavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_submit_cancels_outstanding_one() {
        let oracle = Arc::new(FixedOracle::new(80).with_latency(Duration::from_secs(1)));
        let gw = Arc::new(gateway(oracle.clone()));

        let first = {
            let gw = gw.clone();
            tokio::spawn(async move { gw.submit(request(Mode::Single, "1", &["a.pdf"])).await })
        };
        while oracle.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let newer = ScoringRequest {
            sequence: 2,
            ..request(Mode::Single, "1", &["b.pdf"])
        };
        let second = gw.submit(newer).await;
        let first = first.await.unwrap();

        assert_eq!(first.unwrap_err(), GatewayError::Cancelled);
        assert!(second.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_submit_never_cancels_newer_one() {
        let oracle = Arc::new(FixedOracle::new(80).with_latency(Duration::from_secs(1)));
        let gw = Arc::new(gateway(oracle.clone()));

        let newer = {
            let gw = gw.clone();
            let req = ScoringRequest {
                sequence: 2,
                ..request(Mode::Single, "1", &["b.pdf"])
            };
            tokio::spawn(async move { gw.submit(req).await })
        };
        while oracle.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let older = gw.submit(request(Mode::Single, "1", &["a.pdf"])).await;
        assert_eq!(older.unwrap_err(), GatewayError::Cancelled);

        let newer = newer.await.unwrap();
        assert!(newer.is_ok());
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_outstanding_aborts_in_flight_call() {
        let oracle = Arc::new(FixedOracle::new(80).with_latency(Duration::from_secs(10)));
        let gw = Arc::new(gateway(oracle.clone()));

        let call = {
            let gw = gw.clone();
            tokio::spawn(async move { gw.submit(request(Mode::Single, "1", &["a.pdf"])).await })
        };
        while oracle.calls() == 0 {
            tokio::task::yield_now().await;
        }
        gw.cancel_outstanding();

        assert_eq!(call.await.unwrap().unwrap_err(), GatewayError::Cancelled);
        assert_eq!(GatewayError::Cancelled.failure_kind(), None);
    }
}
