pub mod chat_store;
pub mod inbox_store;

pub use chat_store::ChatStore;
pub use inbox_store::NotificationInbox;
