pub mod api;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod models;
pub mod protocol;
pub mod session;
pub mod store;

pub use client::RealtimeClient;
pub use config::CoreConfig;
pub use connection::{ChannelTarget, ConnectionState};
pub use error::RealtimeError;
pub use events::CoreEvent;
pub use session::Session;
