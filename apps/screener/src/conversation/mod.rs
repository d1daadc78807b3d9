// Conversational layer: per-conversation message logs and the responder that
// answers from the active screening result.

pub mod handlers;
pub mod store;
pub mod synthesizer;

pub use store::{Conversation, ConversationError, ConversationStore, ConversationSummary, Message};
pub use synthesizer::{CannedResponder, ResponseSynthesizer};
