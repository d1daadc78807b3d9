// Screening session: mode, job role, staged files and the analysis result,
// plus the conversation log that narrates them.

use std::time::Duration;

use thiserror::Error;

use crate::conversation::ConversationError;
use crate::intake::IntakeError;

pub mod engine;
pub mod events;
pub mod handlers;
pub mod machine;

pub use engine::ScreeningSession;
pub use events::EventBus;

/// Engine tunables, resolved once from `Config`.
#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    pub threshold: u8,
    pub max_file_size_bytes: u64,
    pub scoring_timeout: Duration,
    pub upload_step: Duration,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            threshold: 75,
            max_file_size_bytes: 1024 * 1024 * 1024,
            scoring_timeout: Duration::from_secs(30),
            upload_step: Duration::from_millis(25),
        }
    }
}

/// Errors that leave the engine. Scoring failures never do: they become a
/// `Failed` analysis plus a conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScreeningError {
    /// Preconditions for an analysis are not met; the gateway was not called.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}
