use serde_json::Value;

use crate::error::RealtimeError;
use crate::models::{ChatMessage, Notification};
use crate::session::Session;

/// An inbound frame, decoded exactly once at the transport boundary.
///
/// The wire discriminates by shape: a bare array is always a chat
/// history snapshot; objects carry an optional `type` field, and a
/// typeless object is a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Prior chat history, sent once when a chat channel is loaded.
    History(Vec<ChatMessage>),
    Chat(ChatMessage),
    Notification(Notification),
    /// Transient alert that an event has expired; not stored.
    Expiration { event_id: String },
}

impl ServerFrame {
    pub fn decode(raw: &str) -> Result<Self, RealtimeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| RealtimeError::Protocol(e.to_string()))?;

        if value.is_array() {
            let messages: Vec<ChatMessage> = serde_json::from_value(value)
                .map_err(|e| RealtimeError::Protocol(format!("bad history snapshot: {e}")))?;
            return Ok(ServerFrame::History(messages));
        }

        if !value.is_object() {
            return Err(RealtimeError::Protocol(format!(
                "frame is neither array nor object: {raw}"
            )));
        }

        match value.get("type").and_then(Value::as_str) {
            Some("message") => {
                let message: ChatMessage = serde_json::from_value(value)
                    .map_err(|e| RealtimeError::Protocol(format!("bad chat message: {e}")))?;
                Ok(ServerFrame::Chat(message))
            }
            Some("expiration") => {
                let event_id = value
                    .get("event_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        RealtimeError::Protocol("expiration frame missing event_id".into())
                    })?;
                Ok(ServerFrame::Expiration {
                    event_id: event_id.to_string(),
                })
            }
            Some(other) => Err(RealtimeError::Protocol(format!(
                "unrecognized frame type {other:?}"
            ))),
            None => {
                let notification: Notification = serde_json::from_value(value)
                    .map_err(|e| RealtimeError::Protocol(format!("bad notification: {e}")))?;
                Ok(ServerFrame::Notification(notification))
            }
        }
    }
}

/// An outbound frame. Chat frames carry an explicit `type` on the
/// wire; the seen-ack is the notification object echoed back verbatim
/// with `seen: true`.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    /// One-time request for chat history, sent when a chat channel opens.
    Load(ChatEnvelope),
    Chat(ChatEnvelope),
    SeenAck(Notification),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ChatEnvelope {
    pub event_id: String,
    pub user_id: String,
    pub name: String,
    pub message: String,
}

impl ChatEnvelope {
    pub fn new(event_id: &str, session: &Session, message: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            user_id: session.user_id.clone(),
            name: session.username.clone(),
            message: message.to_string(),
        }
    }
}

impl ClientFrame {
    pub fn load(event_id: &str, session: &Session) -> Self {
        ClientFrame::Load(ChatEnvelope::new(event_id, session, ""))
    }

    pub fn to_wire(&self) -> Result<String, RealtimeError> {
        let value = match self {
            ClientFrame::Load(env) => tagged(env, "load"),
            ClientFrame::Chat(env) => tagged(env, "message"),
            ClientFrame::SeenAck(notification) => serde_json::to_value(notification),
        }
        .map_err(|e| RealtimeError::Protocol(e.to_string()))?;
        serde_json::to_string(&value).map_err(|e| RealtimeError::Protocol(e.to_string()))
    }
}

fn tagged(env: &ChatEnvelope, kind: &str) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(env)?;
    value["type"] = Value::String(kind.to_string());
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_decodes_as_history() {
        let raw = r#"[
            {"event_id": "E123", "user_id": "U1", "name": "ana", "message": "m1"},
            {"event_id": "E123", "user_id": "U2", "name": "bo", "message": "m2"}
        ]"#;
        match ServerFrame::decode(raw).unwrap() {
            ServerFrame::History(messages) => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[1].message, "m2");
            }
            other => panic!("expected history, got {other:?}"),
        }
    }

    #[test]
    fn test_typed_message_decodes_as_chat() {
        let raw = r#"{"event_id": "E123", "user_id": "U2", "name": "bo", "message": "hi", "type": "message"}"#;
        match ServerFrame::decode(raw).unwrap() {
            ServerFrame::Chat(message) => assert_eq!(message.message, "hi"),
            other => panic!("expected chat, got {other:?}"),
        }
    }

    #[test]
    fn test_typeless_object_decodes_as_notification() {
        let raw = r#"{"event_id": "E1", "event_title": "standup", "reminder_text": "soon"}"#;
        match ServerFrame::decode(raw).unwrap() {
            ServerFrame::Notification(n) => {
                assert_eq!(n.event_title, "standup");
                assert_eq!(n.seen, None);
            }
            other => panic!("expected notification, got {other:?}"),
        }
    }

    #[test]
    fn test_expiration_decodes() {
        let raw = r#"{"type": "expiration", "event_id": "E9"}"#;
        assert_eq!(
            ServerFrame::decode(raw).unwrap(),
            ServerFrame::Expiration {
                event_id: "E9".into()
            }
        );
    }

    #[test]
    fn test_malformed_frames_are_protocol_errors() {
        assert!(matches!(
            ServerFrame::decode("not json"),
            Err(RealtimeError::Protocol(_))
        ));
        assert!(matches!(
            ServerFrame::decode(r#"{"type": "mystery"}"#),
            Err(RealtimeError::Protocol(_))
        ));
        assert!(matches!(
            ServerFrame::decode(r#""just a string""#),
            Err(RealtimeError::Protocol(_))
        ));
    }

    #[test]
    fn test_load_frame_wire_shape() {
        let session = Session::new("U1", "ana", "tok");
        let wire = ClientFrame::load("E123", &session).to_wire().unwrap();
        let value: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(
            value,
            json!({
                "event_id": "E123",
                "user_id": "U1",
                "name": "ana",
                "message": "",
                "type": "load"
            })
        );
    }

    #[test]
    fn test_seen_ack_echoes_without_type() {
        let notification = Notification {
            event_id: "E1".into(),
            event_title: "standup".into(),
            reminder_text: "soon".into(),
            seen: None,
        };
        let wire = ClientFrame::SeenAck(notification.as_seen())
            .to_wire()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value.get("type"), None);
        assert_eq!(value["seen"], json!(true));
        assert_eq!(value["reminder_text"], json!("soon"));
    }
}
