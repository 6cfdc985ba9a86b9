use serde::{Deserialize, Serialize};

/// One chat message in an event's chat room, as it travels on the
/// wire and as it is stored in the transcript. History snapshots are
/// bare arrays of this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub event_id: String,
    pub user_id: String,
    pub name: String,
    pub message: String,
}
