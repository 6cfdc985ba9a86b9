use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Transport-level connect or send failure. Surfaced as the
    /// connection's `Failed` state; recovery is a fresh `open()`.
    #[error("transport error: {0}")]
    Transport(String),

    /// Unparseable or unrecognized inbound frame. Logged and dropped;
    /// never mutates store state.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Send attempted on a connection that is not open. Rejected
    /// synchronously; nothing is buffered or retried.
    #[error("not connected to {0}")]
    NotConnected(String),
}
