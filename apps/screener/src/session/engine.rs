use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::conversation::{Conversation, ConversationSummary, Message, ResponseSynthesizer};
use crate::intake::{AddOutcome, FileCandidate, FileKey, IntakeError};
use crate::models::job_role::JobRole;
use crate::models::score::Mode;
use crate::scoring::gateway::{GatewayError, ScoringGateway};
use crate::session::events::{EventBus, SessionEvent};
use crate::session::machine::{AnalysisOutcome, SessionSnapshot, SessionState};
use crate::session::{ScreeningConfig, ScreeningError};

const UPLOAD_STEP_PERCENT: u8 = 10;

/// Shareable handle onto one screening session.
///
/// All state lives in a `SessionState` behind a mutex that is never held
/// across an await; the scoring call runs unlocked and re-enters through
/// `complete_analysis`, which drops the result if anything moved meanwhile.
#[derive(Clone)]
pub struct ScreeningSession {
    state: Arc<Mutex<SessionState>>,
    gateway: Arc<dyn ScoringGateway>,
    events: EventBus,
    upload_step: Duration,
}

impl ScreeningSession {
    pub fn new(
        config: &ScreeningConfig,
        gateway: Arc<dyn ScoringGateway>,
        responder: Arc<dyn ResponseSynthesizer>,
        events: EventBus,
    ) -> Self {
        let state = SessionState::new(config, gateway.clone(), responder, events.clone());
        Self {
            state: Arc::new(Mutex::new(state)),
            gateway,
            events,
            upload_step: config.upload_step,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().snapshot()
    }

    pub fn switch_mode(&self, mode: Mode) -> SessionSnapshot {
        let mut state = self.state.lock();
        state.switch_mode(mode);
        state.snapshot()
    }

    pub fn select_job_role(&self, role: Arc<JobRole>) -> SessionSnapshot {
        let mut state = self.state.lock();
        state.select_job_role(role);
        state.snapshot()
    }

    pub fn add_files(&self, candidates: Vec<FileCandidate>) -> AddOutcome {
        self.state.lock().add_files(candidates)
    }

    /// Returns false when the file was not staged; that is not an error.
    pub fn remove_file(&self, id: &FileKey) -> bool {
        self.state.lock().remove_file(id)
    }

    pub fn clear_files(&self) -> usize {
        self.state.lock().clear_files()
    }

    pub fn set_progress(&self, id: &FileKey, percent: u8) -> Result<(), ScreeningError> {
        Ok(self.state.lock().set_progress(id, percent)?)
    }

    pub fn reset(&self) -> SessionSnapshot {
        let mut state = self.state.lock();
        state.reset();
        state.snapshot()
    }

    /// Runs one analysis end to end. Precondition failures come back as
    /// `Err` without contacting the gateway; scoring failures come back as
    /// `AnalysisOutcome::Failed`.
    ///
    /// The scoring call and its completion run on their own task, so a caller
    /// that stops waiting never leaves the session stuck in `Pending`.
    pub async fn analyze(&self) -> Result<AnalysisOutcome, ScreeningError> {
        let ticket = self.state.lock().begin_analysis()?;
        let token = ticket.token;

        let state = self.state.clone();
        let gateway = self.gateway.clone();
        let task = tokio::spawn(async move {
            let outcome = gateway.submit(ticket.request).await;
            let mut state = state.lock();
            state.complete_analysis(ticket.token, outcome)
        });

        match task.await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Analysis {token} task failed: {e}");
                let failed = Err(GatewayError::Unavailable("scoring task failed".to_string()));
                Ok(self.state.lock().complete_analysis(token, failed))
            }
        }
    }

    /// Simulated upload: steps every valid file from 0 to 100 in tens.
    /// A newer cycle, a file removal or a mode switch silently ends this one.
    pub async fn upload_all(&self) -> usize {
        let (cycle, targets) = self.state.lock().begin_upload_cycle();
        debug!("Upload cycle {cycle}: {} file(s)", targets.len());

        let mut completed = 0;
        'files: for id in &targets {
            for percent in (0..=100).step_by(UPLOAD_STEP_PERCENT as usize) {
                tokio::time::sleep(self.upload_step).await;
                let applied = self.state.lock().advance_upload(cycle, id, percent as u8);
                match applied {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!("Upload cycle {cycle} superseded");
                        return completed;
                    }
                    Err(IntakeError::UnknownFile(_)) => continue 'files,
                    Err(e) => {
                        warn!("Upload progress for {id} rejected: {e}");
                        continue 'files;
                    }
                }
            }
            completed += 1;
        }
        completed
    }

    pub fn chat(&self, text: &str) -> Option<Message> {
        self.state.lock().chat(text)
    }

    pub fn create_conversation(&self, seed: Option<String>) -> Uuid {
        self.state.lock().create_conversation(seed)
    }

    pub fn activate_conversation(&self, id: Uuid) -> Result<(), ScreeningError> {
        self.state.lock().activate_conversation(id)
    }

    pub fn clear_conversation(&self, id: Uuid) -> Result<usize, ScreeningError> {
        self.state.lock().clear_conversation(id)
    }

    pub fn conversation(&self, id: Uuid) -> Result<Conversation, ScreeningError> {
        self.state.lock().conversation(id)
    }

    pub fn conversation_summaries(&self) -> Vec<ConversationSummary> {
        self.state.lock().conversation_summaries()
    }
}
