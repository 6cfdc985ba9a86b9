use serde::{Deserialize, Serialize};

/// A reminder notification pushed on the user channel.
///
/// `seen` is optional on the wire: the server omits it on fresh
/// notifications, and the seen-ack echoes the object back with
/// `seen: true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub event_id: String,
    pub event_title: String,
    pub reminder_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seen: Option<bool>,
}

impl Notification {
    /// The same notification with `seen: true`, used for the ack echo.
    pub fn as_seen(&self) -> Self {
        Self {
            seen: Some(true),
            ..self.clone()
        }
    }
}
