//! Synchronous core of a screening session.
//!
//! Every operation here is atomic with respect to the others. The only
//! suspension point (the scoring call) lives outside, in `engine`, bracketed
//! by `begin_analysis` and `complete_analysis`.
//!
//! Staleness: each analysis gets a fresh `StalenessToken` and records the
//! (mode, job role, file set) binding it was issued for. A completion is
//! applied only if its token is still the pending one AND the binding still
//! matches; anything else is dropped without touching state or conversation.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conversation::{Conversation, ConversationSummary, ConversationStore, Message, ResponseSynthesizer};
use crate::intake::{AddOutcome, FileCandidate, FileKey, IntakeError, IntakeFile, IntakeRegistry};
use crate::models::job_role::JobRole;
use crate::models::score::{Mode, ScoreResult};
use crate::scoring::gateway::{FailureKind, GatewayError, ScoringGateway};
use crate::scoring::{FileRef, ScoringRequest};
use crate::session::events::{EventBus, SessionEvent};
use crate::session::{ScreeningConfig, ScreeningError};

pub const WELCOME_TITLE: &str = "Screening assistant";
pub const WELCOME_MESSAGE: &str = "Hello! Select a job role and add resumes to screen. Once the analysis is ready, ask me why a candidate scored the way they did.";

/// Identifies the analysis a scoring call was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StalenessToken(u64);

impl fmt::Display for StalenessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    mode: Mode,
    job_role_id: String,
    files: Vec<FileKey>,
}

#[derive(Debug)]
struct PendingAnalysis {
    token: StalenessToken,
    binding: Binding,
}

/// A failed analysis as the operator sees it. `message` is user-safe; the
/// diagnostic detail only goes to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
    pub retryable: bool,
}

impl Failure {
    fn from_gateway(err: &GatewayError) -> Option<Self> {
        let kind = err.failure_kind()?;
        let message = match kind {
            FailureKind::GatewayUnavailable => {
                "The scoring service is unavailable right now, so no score was recorded. You can retry the analysis."
            }
            FailureKind::InvalidResponse => {
                "The scoring service returned a result that could not be read, so no score was recorded. Retrying unchanged is unlikely to help."
            }
            FailureKind::InvalidRequest => {
                "The analysis request was rejected. Check the job role and resumes, then try again."
            }
        };
        Some(Self {
            kind,
            message: message.to_string(),
            retryable: err.retryable(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisState {
    None,
    Pending { token: StalenessToken },
    Ready { result: ScoreResult },
    Failed { failure: Failure },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Configured,
    Pending,
    Ready,
    Failed,
}

/// What happened to a completed scoring call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Ready { result: ScoreResult },
    Failed { failure: Failure },
    /// The call was superseded; nothing was applied.
    Discarded,
}

/// Handed out by `begin_analysis`; carries the request to submit and the
/// token to complete with.
#[derive(Debug, Clone)]
pub struct AnalysisTicket {
    pub token: StalenessToken,
    pub request: ScoringRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub mode: Mode,
    pub job_role: Option<JobRole>,
    pub files: Vec<IntakeFile>,
    pub analysis: AnalysisState,
    pub active_conversation_id: Uuid,
}

pub struct SessionState {
    mode: Mode,
    job_role: Option<Arc<JobRole>>,
    intake: IntakeRegistry,
    analysis: AnalysisState,
    pending: Option<PendingAnalysis>,
    last_token: u64,
    conversations: ConversationStore,
    responder: Arc<dyn ResponseSynthesizer>,
    gateway: Arc<dyn ScoringGateway>,
    events: EventBus,
}

impl SessionState {
    pub fn new(
        config: &ScreeningConfig,
        gateway: Arc<dyn ScoringGateway>,
        responder: Arc<dyn ResponseSynthesizer>,
        events: EventBus,
    ) -> Self {
        Self {
            mode: Mode::default(),
            job_role: None,
            intake: IntakeRegistry::new(config.max_file_size_bytes),
            analysis: AnalysisState::None,
            pending: None,
            last_token: 0,
            conversations: ConversationStore::new(WELCOME_TITLE, WELCOME_MESSAGE),
            responder,
            gateway,
            events,
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Read model
    // ────────────────────────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        match self.analysis {
            AnalysisState::Pending { .. } => SessionPhase::Pending,
            AnalysisState::Ready { .. } => SessionPhase::Ready,
            AnalysisState::Failed { .. } => SessionPhase::Failed,
            AnalysisState::None if self.job_role.is_none() => SessionPhase::Idle,
            AnalysisState::None => SessionPhase::Configured,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            mode: self.mode,
            job_role: self.job_role.as_deref().cloned(),
            files: self.intake.files().to_vec(),
            analysis: self.analysis.clone(),
            active_conversation_id: self.conversations.active_id(),
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Configuration transitions
    // ────────────────────────────────────────────────────────────────────

    /// Hard reset into `mode`: files and result are dropped, the job role stays.
    pub fn switch_mode(&mut self, mode: Mode) {
        self.invalidate();
        let dropped = self.intake.clear_all();
        self.mode = mode;
        info!("Switched to {mode} mode ({dropped} staged file(s) dropped)");
        self.events.emit(SessionEvent::ModeSwitched { mode });
    }

    /// Binds a job role. Re-selecting the bound role changes nothing.
    pub fn select_job_role(&mut self, role: Arc<JobRole>) {
        if self.job_role.as_ref().is_some_and(|r| r.id == role.id) {
            return;
        }
        self.invalidate();
        info!("Selected job role {} ({})", role.id, role.title);
        self.events.emit(SessionEvent::JobRoleSelected {
            job_role_id: role.id.clone(),
        });
        self.post_system(format!(
            "I'm ready to help you with the \"{}\" role.",
            role.title
        ));
        self.job_role = Some(role);
    }

    pub fn add_files(&mut self, candidates: Vec<FileCandidate>) -> AddOutcome {
        let outcome = self.intake.add_files(self.mode, candidates);
        info!(
            "Intake: {} added, {} duplicate(s), {} oversized",
            outcome.added.len(),
            outcome.duplicates,
            outcome.oversized
        );
        if outcome.changed() {
            self.files_changed();
        }
        outcome
    }

    pub fn remove_file(&mut self, id: &FileKey) -> bool {
        let removed = self.intake.remove_file(id);
        if removed {
            self.files_changed();
        }
        removed
    }

    pub fn clear_files(&mut self) -> usize {
        let removed = self.intake.clear_all();
        if removed > 0 {
            self.files_changed();
        }
        removed
    }

    /// Back to the idle equivalent: job role, files and result are discarded.
    /// Mode and conversations are kept.
    pub fn reset(&mut self) {
        self.invalidate();
        self.job_role = None;
        self.intake.clear_all();
        info!("Session reset");
        self.events.emit(SessionEvent::SessionReset);
    }

    fn files_changed(&mut self) {
        self.invalidate();
        self.events.emit(SessionEvent::FilesChanged {
            file_count: self.intake.len(),
        });
    }

    /// Drops the current result and supersedes any pending analysis.
    fn invalidate(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("Analysis {} superseded", pending.token);
            self.gateway.cancel_outstanding();
        }
        self.analysis = AnalysisState::None;
    }

    fn current_binding(&self) -> Option<Binding> {
        self.job_role.as_ref().map(|role| Binding {
            mode: self.mode,
            job_role_id: role.id.clone(),
            files: self.intake.snapshot(),
        })
    }

    // ────────────────────────────────────────────────────────────────────
    // Upload progress
    // ────────────────────────────────────────────────────────────────────

    pub fn set_progress(&mut self, id: &FileKey, percent: u8) -> Result<(), IntakeError> {
        self.intake.set_progress(id, percent)?;
        self.events.emit(SessionEvent::UploadProgress {
            file_id: id.to_string(),
            percent,
        });
        Ok(())
    }

    pub fn begin_upload_cycle(&mut self) -> (u64, Vec<FileKey>) {
        self.intake.begin_upload_cycle()
    }

    pub fn advance_upload(
        &mut self,
        cycle: u64,
        id: &FileKey,
        percent: u8,
    ) -> Result<bool, IntakeError> {
        let applied = self.intake.advance_upload(cycle, id, percent)?;
        if applied {
            self.events.emit(SessionEvent::UploadProgress {
                file_id: id.to_string(),
                percent,
            });
        }
        Ok(applied)
    }

    // ────────────────────────────────────────────────────────────────────
    // Analysis
    // ────────────────────────────────────────────────────────────────────

    /// Validates preconditions, supersedes any pending analysis and moves to
    /// `Pending`. On error nothing changes and the gateway must not be called.
    pub fn begin_analysis(&mut self) -> Result<AnalysisTicket, ScreeningError> {
        let role = self.job_role.clone().ok_or_else(|| {
            ScreeningError::InvalidRequest("select a job role before analyzing".to_string())
        })?;
        if self.intake.is_empty() {
            return Err(ScreeningError::InvalidRequest(
                "add at least one resume before analyzing".to_string(),
            ));
        }
        let files: Vec<FileRef> = self.intake.valid_files().map(FileRef::from).collect();
        if files.is_empty() {
            return Err(ScreeningError::InvalidRequest(
                "every staged resume has a validation error; remove them and add valid files"
                    .to_string(),
            ));
        }

        self.invalidate();
        self.last_token += 1;
        let token = StalenessToken(self.last_token);
        let binding = Binding {
            mode: self.mode,
            job_role_id: role.id.clone(),
            files: self.intake.snapshot(),
        };
        self.pending = Some(PendingAnalysis { token, binding });
        self.analysis = AnalysisState::Pending { token };

        info!(
            "Analysis {token} started: {} mode, job role {}, {} file(s)",
            self.mode,
            role.id,
            files.len()
        );
        self.events.emit(SessionEvent::AnalysisStarted { token });

        Ok(AnalysisTicket {
            token,
            request: ScoringRequest {
                sequence: token.0,
                mode: self.mode,
                job_role_id: role.id.clone(),
                files,
            },
        })
    }

    /// Applies a completed scoring call, or discards it if it is stale.
    pub fn complete_analysis(
        &mut self,
        token: StalenessToken,
        outcome: Result<ScoreResult, GatewayError>,
    ) -> AnalysisOutcome {
        let is_current = matches!(&self.pending, Some(p) if p.token == token);
        let binding_holds = self
            .pending
            .as_ref()
            .map(|p| Some(&p.binding) == self.current_binding().as_ref())
            .unwrap_or(false);
        if !is_current || !binding_holds {
            debug!("Discarding stale scoring result for analysis {token}");
            return AnalysisOutcome::Discarded;
        }
        self.pending = None;

        let outcome = match outcome {
            Ok(result) if result.mode() != self.mode => Err(GatewayError::InvalidResponse(
                format!("{} result for a {} session", result.mode(), self.mode),
            )),
            other => other,
        };

        match outcome {
            Ok(result) => {
                let summary = result.summary();
                info!("Analysis {token} ready: {summary}");
                self.analysis = AnalysisState::Ready {
                    result: result.clone(),
                };
                self.events.emit(SessionEvent::AnalysisReady {
                    token,
                    summary: summary.clone(),
                });
                self.post_system(summary);
                AnalysisOutcome::Ready { result }
            }
            Err(err) => match Failure::from_gateway(&err) {
                Some(failure) => {
                    warn!("Analysis {token} failed: {err}");
                    self.analysis = AnalysisState::Failed {
                        failure: failure.clone(),
                    };
                    self.events.emit(SessionEvent::AnalysisFailed {
                        token,
                        failure: failure.clone(),
                    });
                    self.post_system(failure.message.clone());
                    AnalysisOutcome::Failed { failure }
                }
                None => {
                    debug!("Analysis {token} was cancelled");
                    self.analysis = AnalysisState::None;
                    AnalysisOutcome::Discarded
                }
            },
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Conversations
    // ────────────────────────────────────────────────────────────────────

    fn post_system(&mut self, text: String) {
        let conversation_id = self.conversations.active_id();
        let message_id = self.conversations.append_system(text).id;
        self.events.emit(SessionEvent::MessageAppended {
            conversation_id,
            message_id,
        });
    }

    /// Appends the user's message to the active conversation and answers it
    /// from the result bound right now. Blank input is ignored.
    pub fn chat(&mut self, text: &str) -> Option<Message> {
        let conversation_id = self.conversations.active_id();
        let user_message_id = self.conversations.append_user(text)?.id;
        self.events.emit(SessionEvent::MessageAppended {
            conversation_id,
            message_id: user_message_id,
        });

        let bound = match &self.analysis {
            AnalysisState::Ready { result } => Some(result),
            _ => None,
        };
        let reply = self.responder.reply(conversation_id, text.trim(), bound);
        self.post_system(reply);
        self.conversations.active().messages().last().cloned()
    }

    pub fn create_conversation(&mut self, seed: Option<String>) -> Uuid {
        let id = self.conversations.create_conversation(seed);
        info!("Started conversation {id}");
        self.events.emit(SessionEvent::ConversationActivated {
            conversation_id: id,
        });
        id
    }

    pub fn activate_conversation(&mut self, id: Uuid) -> Result<(), ScreeningError> {
        self.conversations.activate(id)?;
        self.events.emit(SessionEvent::ConversationActivated {
            conversation_id: id,
        });
        Ok(())
    }

    pub fn clear_conversation(&mut self, id: Uuid) -> Result<usize, ScreeningError> {
        let removed = self.conversations.clear(id)?;
        self.events.emit(SessionEvent::ConversationCleared {
            conversation_id: id,
        });
        Ok(removed)
    }

    pub fn conversation(&self, id: Uuid) -> Result<Conversation, ScreeningError> {
        Ok(self.conversations.get(id)?.clone())
    }

    pub fn conversation_summaries(&self) -> Vec<ConversationSummary> {
        self.conversations.summaries()
    }
}
