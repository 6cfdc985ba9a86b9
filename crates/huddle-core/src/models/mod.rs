pub mod event;
pub mod message;
pub mod notification;

pub use event::{classify, should_monitor, Event, EventStatus, Reminder};
pub use message::ChatMessage;
pub use notification::Notification;
