use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled event, as served by the event data provider.
/// Read-only to the core; `start_time <= end_time` is enforced by the
/// event-editing collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_time: DateTime<Utc>,
    pub reminder_text: String,
}

/// Temporal status of an event relative to a reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Current,
    Past,
}

impl EventStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Current => "current",
            Self::Past => "past",
        }
    }
}

/// Classify an instant against an event window. Total for any
/// well-formed window; both boundaries count as `Current`.
pub fn classify(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> EventStatus {
    if now < start {
        EventStatus::Upcoming
    } else if now > end {
        EventStatus::Past
    } else {
        EventStatus::Current
    }
}

/// Whether an event warrants an active expiration-alert subscription.
/// Only upcoming events do; once an event is running or over, alerts
/// for it are useless and its channel should be closed.
pub fn should_monitor(event: &Event, now: DateTime<Utc>) -> bool {
    classify(now, event.start_time, event.end_time) == EventStatus::Upcoming
}

impl Event {
    pub fn status(&self, now: DateTime<Utc>) -> EventStatus {
        classify(now, self.start_time, self.end_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn event(start: i64, end: i64) -> Event {
        Event {
            id: "E1".into(),
            title: "standup".into(),
            description: String::new(),
            start_time: t(start),
            end_time: t(end),
            owner_id: "U1".into(),
            attendees: vec![],
            reminders: vec![],
        }
    }

    #[test]
    fn test_classify_partitions_timeline() {
        assert_eq!(classify(t(99), t(100), t(200)), EventStatus::Upcoming);
        assert_eq!(classify(t(150), t(100), t(200)), EventStatus::Current);
        assert_eq!(classify(t(201), t(100), t(200)), EventStatus::Past);
    }

    #[test]
    fn test_boundaries_are_current() {
        assert_eq!(classify(t(100), t(100), t(200)), EventStatus::Current);
        assert_eq!(classify(t(200), t(100), t(200)), EventStatus::Current);
        // Zero-length window: start == end == now
        assert_eq!(classify(t(100), t(100), t(100)), EventStatus::Current);
    }

    #[test]
    fn test_should_monitor_only_upcoming() {
        let e = event(100, 200);
        assert!(should_monitor(&e, t(50)));
        assert!(!should_monitor(&e, t(100)));
        assert!(!should_monitor(&e, t(150)));
        assert!(!should_monitor(&e, t(300)));
    }

    #[test]
    fn test_event_deserializes_provider_shape() {
        let raw = r#"{
            "_id": "679a",
            "title": "retro",
            "description": "sprint retro",
            "start_time": "2025-03-01T10:00:00Z",
            "end_time": "2025-03-01T11:00:00Z",
            "owner_id": "u42",
            "attendees": ["u42", "u43"],
            "reminders": [{"reminder_time": "2025-03-01T09:45:00Z", "reminder_text": "in 15 min"}]
        }"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert_eq!(event.id, "679a");
        assert_eq!(event.attendees.len(), 2);
        assert_eq!(event.reminders[0].reminder_text, "in 15 min");
    }
}
