use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub const NEW_CONVERSATION_TITLE: &str = "New conversation";
pub const NEW_CONVERSATION_SEED: &str = "New chat started. How can I help?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    System,
}

/// Immutable once appended. `id` is the store-wide append sequence and is the
/// only authority on ordering; `timestamp` is informational.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: u64,
    pub author: Author,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    messages: Vec<Message>,
    pub last_activity: DateTime<Utc>,
}

impl Conversation {
    fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            messages: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Text of the latest message, shown in conversation listings.
    pub fn preview(&self) -> Option<&str> {
        self.messages.last().map(|m| m.text.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub preview: Option<String>,
    pub message_count: usize,
    pub last_activity: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("Conversation {0} not found")]
    NotFound(Uuid),
}

/// Ordered collection of conversations with exactly one active at any time.
///
/// Newest conversations sit at the front. Conversations are never removed;
/// `clear` empties the log and keeps the conversation.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    conversations: Vec<Conversation>,
    active: Uuid,
    next_message_id: u64,
}

impl ConversationStore {
    /// Creates the store with one active conversation seeded with a welcome message.
    pub fn new(title: impl Into<String>, welcome: impl Into<String>) -> Self {
        let first = Conversation::new(title);
        let active = first.id;
        let mut store = Self {
            conversations: vec![first],
            active,
            next_message_id: 1,
        };
        store.append_system(welcome);
        store
    }

    /// "Start new": inserts a conversation at the front, seeds it and makes it active.
    pub fn create_conversation(&mut self, seed: Option<String>) -> Uuid {
        let conversation = Conversation::new(NEW_CONVERSATION_TITLE);
        let id = conversation.id;
        self.conversations.insert(0, conversation);
        self.active = id;
        self.append_system(seed.unwrap_or_else(|| NEW_CONVERSATION_SEED.to_string()));
        id
    }

    pub fn activate(&mut self, id: Uuid) -> Result<(), ConversationError> {
        if !self.conversations.iter().any(|c| c.id == id) {
            return Err(ConversationError::NotFound(id));
        }
        self.active = id;
        Ok(())
    }

    /// Empties a conversation's log; returns how many messages were dropped.
    pub fn clear(&mut self, id: Uuid) -> Result<usize, ConversationError> {
        let conversation = self.get_mut(id)?;
        let removed = conversation.messages.len();
        conversation.messages.clear();
        conversation.last_activity = Utc::now();
        Ok(removed)
    }

    /// Appends a user message to the active conversation. Blank input is a
    /// no-op and returns `None`.
    pub fn append_user(&mut self, text: &str) -> Option<&Message> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(self.push(Author::User, text.to_string()))
    }

    pub fn append_system(&mut self, text: impl Into<String>) -> &Message {
        self.push(Author::System, text.into())
    }

    fn push(&mut self, author: Author, text: String) -> &Message {
        let id = self.next_message_id;
        self.next_message_id += 1;

        let now = Utc::now();
        let active = self.active;
        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| c.id == active)
            .expect("active conversation always exists");
        conversation.messages.push(Message {
            id,
            author,
            text,
            timestamp: now,
        });
        conversation.last_activity = now;
        conversation
            .messages
            .last()
            .expect("message was just pushed")
    }

    pub fn active_id(&self) -> Uuid {
        self.active
    }

    pub fn active(&self) -> &Conversation {
        self.conversations
            .iter()
            .find(|c| c.id == self.active)
            .expect("active conversation always exists")
    }

    pub fn get(&self, id: Uuid) -> Result<&Conversation, ConversationError> {
        self.conversations
            .iter()
            .find(|c| c.id == id)
            .ok_or(ConversationError::NotFound(id))
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut Conversation, ConversationError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ConversationError::NotFound(id))
    }

    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .map(|c| ConversationSummary {
                id: c.id,
                title: c.title.clone(),
                preview: c.preview().map(str::to_string),
                message_count: c.messages.len(),
                last_activity: c.last_activity,
                active: c.id == self.active,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ConversationStore {
        ConversationStore::new("Screening assistant", "Welcome")
    }

    #[test]
    fn test_new_store_has_seeded_active_conversation() {
        let store = store();
        assert_eq!(store.summaries().len(), 1);
        let active = store.active();
        assert_eq!(active.messages().len(), 1);
        assert_eq!(active.messages()[0].author, Author::System);
        assert_eq!(active.preview(), Some("Welcome"));
    }

    #[test]
    fn test_append_order_is_preserved() {
        let mut store = store();
        store.append_user("first");
        store.append_user("second");
        store.append_user("third");

        let texts: Vec<_> = store
            .active()
            .messages()
            .iter()
            .skip(1)
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);

        let ids: Vec<_> = store.active().messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_identical_messages_are_not_deduplicated() {
        let mut store = store();
        store.append_user("same");
        store.append_user("same");
        assert_eq!(store.active().messages().len(), 3);
    }

    #[test]
    fn test_blank_user_text_is_noop() {
        let mut store = store();
        assert!(store.append_user("").is_none());
        assert!(store.append_user("   \n\t").is_none());
        assert_eq!(store.active().messages().len(), 1);
    }

    #[test]
    fn test_user_text_is_trimmed() {
        let mut store = store();
        let message = store.append_user("  hello  ").unwrap();
        assert_eq!(message.text, "hello");
        assert_eq!(message.author, Author::User);
    }

    #[test]
    fn test_create_conversation_goes_first_and_becomes_active() {
        let mut store = store();
        let original = store.active_id();
        let created = store.create_conversation(None);

        assert_eq!(store.active_id(), created);
        let summaries = store.summaries();
        assert_eq!(summaries[0].id, created);
        assert_eq!(summaries[0].title, NEW_CONVERSATION_TITLE);
        assert_eq!(summaries[0].preview.as_deref(), Some(NEW_CONVERSATION_SEED));
        assert!(summaries[0].active);
        assert_eq!(summaries[1].id, original);
        assert!(!summaries[1].active);
    }

    #[test]
    fn test_messages_go_to_active_conversation_only() {
        let mut store = store();
        let original = store.active_id();
        let created = store.create_conversation(Some("Seed".to_string()));
        store.append_user("for the new one");

        assert_eq!(store.get(created).unwrap().messages().len(), 2);
        assert_eq!(store.get(original).unwrap().messages().len(), 1);

        store.activate(original).unwrap();
        store.append_user("back to the first");
        assert_eq!(store.get(original).unwrap().messages().len(), 2);
    }

    #[test]
    fn test_clear_keeps_conversation() {
        let mut store = store();
        let id = store.active_id();
        store.append_user("hello");

        assert_eq!(store.clear(id), Ok(2));
        assert!(store.get(id).unwrap().messages().is_empty());
        assert_eq!(store.summaries().len(), 1);
        assert_eq!(store.active_id(), id);
        assert_eq!(store.active().preview(), None);
    }

    #[test]
    fn test_unknown_conversation_errors_and_keeps_active() {
        let mut store = store();
        let active = store.active_id();
        let missing = Uuid::new_v4();

        assert_eq!(
            store.activate(missing),
            Err(ConversationError::NotFound(missing))
        );
        assert_eq!(store.clear(missing), Err(ConversationError::NotFound(missing)));
        assert_eq!(store.active_id(), active);
    }
}
