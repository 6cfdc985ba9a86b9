use crate::connection::{ChannelTarget, ConnectionState};
use crate::models::ChatMessage;

/// Events emitted by the core for the UI layer to react to.
#[derive(Debug)]
pub enum CoreEvent {
    ConnectionChanged {
        target: ChannelTarget,
        state: ConnectionState,
    },
    /// A chat channel's history snapshot landed.
    HistoryLoaded { event_id: String },
    MessageAppended {
        event_id: String,
        message: ChatMessage,
    },
    NotificationArrived { entry_id: u64 },
    /// One-shot alert that an event expired; surfaced to the UI and
    /// not persisted to any store.
    EventExpired { event_id: String },
}
