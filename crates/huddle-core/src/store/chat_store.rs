use std::collections::HashMap;

use tracing::warn;

use crate::models::ChatMessage;
use crate::protocol::{ChatEnvelope, ClientFrame};
use crate::session::Session;

/// Sub-store for chat transcripts, one per event channel.
///
/// Transcripts are append-only. The one exception is the history
/// snapshot, accepted as a bulk replacement only while the transcript
/// is untouched; a snapshot arriving after messages have landed is a
/// protocol violation and is ignored. No deduplication is done - the
/// protocol carries no message identity.
pub struct ChatStore {
    transcripts: HashMap<String, Transcript>,
}

#[derive(Default)]
struct Transcript {
    messages: Vec<ChatMessage>,
    history_loaded: bool,
}

impl ChatStore {
    pub fn new() -> Self {
        Self {
            transcripts: HashMap::new(),
        }
    }

    pub fn messages(&self, event_id: &str) -> &[ChatMessage] {
        self.transcripts
            .get(event_id)
            .map(|t| t.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Seed the transcript from a history snapshot. Accepted only as
    /// the first frame on a fresh channel; returns whether it landed.
    pub fn load_history(&mut self, event_id: &str, snapshot: Vec<ChatMessage>) -> bool {
        let transcript = self.transcripts.entry(event_id.to_string()).or_default();
        if transcript.history_loaded || !transcript.messages.is_empty() {
            warn!(event_id, "ignoring late history snapshot");
            return false;
        }
        transcript.messages = snapshot;
        transcript.history_loaded = true;
        true
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.transcripts
            .entry(message.event_id.clone())
            .or_default()
            .messages
            .push(message);
    }

    /// Drop the transcript for a freshly reopened channel so its
    /// incoming snapshot is accepted again.
    pub fn reset(&mut self, event_id: &str) {
        self.transcripts.remove(event_id);
    }

    pub fn clear(&mut self) {
        self.transcripts.clear();
    }

    /// Build the outbound chat frame for the current user. Empty or
    /// whitespace-only text composes nothing.
    pub fn compose(&self, event_id: &str, text: &str, session: &Session) -> Option<ClientFrame> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(ClientFrame::Chat(ChatEnvelope::new(
            event_id, session, trimmed,
        )))
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(event_id: &str, user_id: &str, text: &str) -> ChatMessage {
        ChatMessage {
            event_id: event_id.into(),
            user_id: user_id.into(),
            name: user_id.to_lowercase(),
            message: text.into(),
        }
    }

    #[test]
    fn test_history_then_append() {
        let mut store = ChatStore::new();
        assert!(store.load_history(
            "E123",
            vec![msg("E123", "U1", "m1"), msg("E123", "U1", "m2")]
        ));
        store.append(msg("E123", "U2", "hi"));

        let transcript = store.messages("E123");
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0].message, "m1");
        assert_eq!(transcript[1].message, "m2");
        assert_eq!(transcript[2].message, "hi");
        assert_eq!(transcript[2].user_id, "U2");
    }

    #[test]
    fn test_late_snapshot_is_ignored() {
        let mut store = ChatStore::new();
        store.append(msg("E123", "U2", "hi"));
        assert!(!store.load_history("E123", vec![msg("E123", "U1", "m1")]));
        assert_eq!(store.messages("E123").len(), 1);
        assert_eq!(store.messages("E123")[0].message, "hi");
    }

    #[test]
    fn test_second_snapshot_is_ignored_even_when_first_was_empty() {
        let mut store = ChatStore::new();
        assert!(store.load_history("E123", vec![]));
        assert!(!store.load_history("E123", vec![msg("E123", "U1", "replay")]));
        assert!(store.messages("E123").is_empty());
    }

    #[test]
    fn test_reset_allows_fresh_snapshot() {
        let mut store = ChatStore::new();
        store.append(msg("E123", "U2", "old"));
        store.reset("E123");
        assert!(store.load_history("E123", vec![msg("E123", "U1", "m1")]));
        assert_eq!(store.messages("E123").len(), 1);
    }

    #[test]
    fn test_compose_rejects_blank_text() {
        let store = ChatStore::new();
        let session = Session::new("U1", "ana", "tok");
        assert!(store.compose("E123", "", &session).is_none());
        assert!(store.compose("E123", "   \n\t", &session).is_none());
    }

    #[test]
    fn test_compose_uses_session_identity() {
        let store = ChatStore::new();
        let session = Session::new("U1", "ana", "tok");
        match store.compose("E123", "  hello  ", &session) {
            Some(ClientFrame::Chat(env)) => {
                assert_eq!(env.event_id, "E123");
                assert_eq!(env.user_id, "U1");
                assert_eq!(env.name, "ana");
                assert_eq!(env.message, "hello");
            }
            other => panic!("expected chat frame, got {other:?}"),
        }
    }
}
