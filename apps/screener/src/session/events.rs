//! Session event types and the broadcast bus collaborators subscribe to.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::score::Mode;
use crate::session::machine::{Failure, StalenessToken};

/// State-change notifications published by the session.
///
/// Stale scoring results are deliberately absent: they are internal and never
/// observable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    ModeSwitched { mode: Mode },
    JobRoleSelected { job_role_id: String },
    FilesChanged { file_count: usize },
    UploadProgress { file_id: String, percent: u8 },
    AnalysisStarted { token: StalenessToken },
    AnalysisReady { token: StalenessToken, summary: String },
    AnalysisFailed { token: StalenessToken, failure: Failure },
    ConversationActivated { conversation_id: Uuid },
    ConversationCleared { conversation_id: Uuid },
    MessageAppended { conversation_id: Uuid, message_id: u64 },
    SessionReset,
}

/// Fan-out of `SessionEvent`s over `tokio::sync::broadcast`.
///
/// Publishing never blocks; subscribers that fall behind observe `Lagged`.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receives every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Emits to current subscribers; having none is fine.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}
