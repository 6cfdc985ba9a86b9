use std::collections::HashMap;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

use crate::config::CoreConfig;
use crate::error::RealtimeError;
use crate::protocol::ClientFrame;

/// The logical addressee of a live connection.
///
/// An event owns two distinct channels with distinct endpoints: its
/// chat room and its expiration-alert stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelTarget {
    /// A user's notification stream.
    User(String),
    /// One event's chat room.
    EventChat(String),
    /// One event's expiration-alert stream.
    EventAlerts(String),
}

impl std::fmt::Display for ChannelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user/{id}"),
            Self::EventChat(id) => write!(f, "chat/{id}"),
            Self::EventAlerts(id) => write!(f, "alerts/{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Lifecycle and frame events forwarded from transport tasks into the
/// single event-processing loop. `conn_id` ties the event to one
/// connection instance so anything from a superseded or closed
/// instance is dropped.
#[derive(Debug)]
pub struct TransportEvent {
    pub conn_id: u64,
    pub target: ChannelTarget,
    pub kind: TransportEventKind,
}

#[derive(Debug)]
pub enum TransportEventKind {
    Opened,
    Frame(String),
    Closed,
    Failed(String),
}

struct Connection {
    id: u64,
    state: ConnectionState,
    outbound_tx: mpsc::UnboundedSender<String>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

/// Result of `ConnectionManager::open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opened {
    /// A fresh transport connection was started.
    New(u64),
    /// A live connection for the target already existed; no second
    /// transport connect is issued.
    Existing(u64),
}

impl Opened {
    pub fn conn_id(&self) -> u64 {
        match self {
            Self::New(id) | Self::Existing(id) => *id,
        }
    }
}

/// Owns the table of live connections, one per target. All mutation
/// of the table happens through this type on the event-processing
/// loop; transport tasks only feed the event channel.
pub struct ConnectionManager {
    config: CoreConfig,
    connections: HashMap<ChannelTarget, Connection>,
    next_conn_id: u64,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl ConnectionManager {
    pub fn new(config: CoreConfig, events_tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            config,
            connections: HashMap::new(),
            next_conn_id: 0,
            events_tx,
        }
    }

    fn endpoint(&self, target: &ChannelTarget) -> Result<Url, RealtimeError> {
        let raw = match target {
            ChannelTarget::User(user_id) => format!("{}{}", self.config.live_url, user_id),
            ChannelTarget::EventChat(event_id) => {
                format!("{}chat/{}", self.config.live_url, event_id)
            }
            ChannelTarget::EventAlerts(event_id) => {
                format!("{}{}", self.config.notify_url, event_id)
            }
        };
        Url::parse(&raw).map_err(|e| RealtimeError::Transport(format!("bad endpoint {raw}: {e}")))
    }

    /// Open a connection for `target`. Idempotent: a live (non-
    /// terminal) connection is returned as-is. A terminal entry is
    /// replaced by a fresh instance. Transport failures surface
    /// asynchronously as the `Failed` state, never as a panic here.
    pub fn open(&mut self, target: &ChannelTarget) -> Result<Opened, RealtimeError> {
        if let Some(conn) = self.connections.get(target) {
            if !conn.state.is_terminal() {
                return Ok(Opened::Existing(conn.id));
            }
        }

        let url = self.endpoint(target)?;
        self.next_conn_id += 1;
        let id = self.next_conn_id;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        debug!(chan = %target, conn_id = id, %url, "opening live connection");
        tokio::spawn(run_connection(
            id,
            target.clone(),
            url,
            outbound_rx,
            shutdown_rx,
            self.events_tx.clone(),
        ));

        self.connections.insert(
            target.clone(),
            Connection {
                id,
                state: ConnectionState::Connecting,
                outbound_tx,
                shutdown_tx: Some(shutdown_tx),
            },
        );
        Ok(Opened::New(id))
    }

    /// Close and remove the connection for `target`, if present.
    /// Idempotent. Removal is synchronous: any frame still in flight
    /// carries a conn id that no longer matches the table, so it is
    /// dropped instead of dispatched.
    pub fn close(&mut self, target: &ChannelTarget) -> bool {
        match self.connections.remove(target) {
            Some(mut conn) => {
                conn.state = ConnectionState::Closing;
                if let Some(shutdown) = conn.shutdown_tx.take() {
                    let _ = shutdown.send(());
                }
                debug!(chan = %target, conn_id = conn.id, "closed live connection");
                true
            }
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        let targets: Vec<ChannelTarget> = self.connections.keys().cloned().collect();
        for target in targets {
            self.close(&target);
        }
    }

    /// Queue a frame for transmission. Rejected with `NotConnected`
    /// unless the connection is open; nothing is buffered for later.
    pub fn send(&mut self, target: &ChannelTarget, frame: &ClientFrame) -> Result<(), RealtimeError> {
        let conn = self
            .connections
            .get(target)
            .filter(|c| c.state == ConnectionState::Open)
            .ok_or_else(|| RealtimeError::NotConnected(target.to_string()))?;
        let wire = frame.to_wire()?;
        conn.outbound_tx
            .send(wire)
            .map_err(|_| RealtimeError::Transport(format!("writer for {target} is gone")))
    }

    pub fn state(&self, target: &ChannelTarget) -> Option<ConnectionState> {
        self.connections.get(target).map(|c| c.state)
    }

    pub fn is_live(&self, target: &ChannelTarget) -> bool {
        self.connections
            .get(target)
            .map(|c| !c.state.is_terminal())
            .unwrap_or(false)
    }

    pub fn live_targets(&self) -> impl Iterator<Item = &ChannelTarget> {
        self.connections
            .iter()
            .filter(|(_, c)| !c.state.is_terminal())
            .map(|(t, _)| t)
    }

    /// Apply a transport event to the connection table. Returns the
    /// new state if the event belongs to the current instance for its
    /// target; `None` means the event is stale and must be dropped.
    pub fn apply(&mut self, event: &TransportEvent) -> Option<ConnectionState> {
        let conn = self.connections.get_mut(&event.target)?;
        if conn.id != event.conn_id {
            warn!(chan = %event.target, conn_id = event.conn_id, "dropping event from superseded connection");
            return None;
        }
        match &event.kind {
            TransportEventKind::Opened => {
                if conn.state == ConnectionState::Connecting {
                    conn.state = ConnectionState::Open;
                }
            }
            TransportEventKind::Frame(_) => {
                if conn.state != ConnectionState::Open {
                    return None;
                }
            }
            TransportEventKind::Closed => conn.state = ConnectionState::Closed,
            TransportEventKind::Failed(reason) => {
                warn!(chan = %event.target, conn_id = event.conn_id, %reason, "connection failed");
                conn.state = ConnectionState::Failed;
            }
        }
        Some(conn.state)
    }

    #[cfg(test)]
    pub(crate) fn conn_id(&self, target: &ChannelTarget) -> Option<u64> {
        self.connections.get(target).map(|c| c.id)
    }
}

fn emit(
    events: &mpsc::UnboundedSender<TransportEvent>,
    conn_id: u64,
    target: &ChannelTarget,
    kind: TransportEventKind,
) -> bool {
    events
        .send(TransportEvent {
            conn_id,
            target: target.clone(),
            kind,
        })
        .is_ok()
}

/// One transport task per connection instance: establish, then pump
/// inbound text frames to the event channel and outbound frames to
/// the socket until closed, failed, or shut down.
async fn run_connection(
    conn_id: u64,
    target: ChannelTarget,
    url: Url,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut shutdown_rx: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let ws = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((ws, _)) => ws,
            Err(e) => {
                emit(&events, conn_id, &target, TransportEventKind::Failed(e.to_string()));
                return;
            }
        },
        _ = &mut shutdown_rx => {
            emit(&events, conn_id, &target, TransportEventKind::Closed);
            return;
        }
    };

    if !emit(&events, conn_id, &target, TransportEventKind::Opened) {
        return;
    }

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if !emit(&events, conn_id, &target, TransportEventKind::Frame(text)) {
                        break;
                    }
                }
                // Control frames are handled by the transport.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | None => {
                    emit(&events, conn_id, &target, TransportEventKind::Closed);
                    break;
                }
                Some(Err(e)) => {
                    emit(&events, conn_id, &target, TransportEventKind::Failed(e.to_string()));
                    break;
                }
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        emit(&events, conn_id, &target, TransportEventKind::Failed(e.to_string()));
                        break;
                    }
                }
                None => {
                    let _ = sink.close().await;
                    emit(&events, conn_id, &target, TransportEventKind::Closed);
                    break;
                }
            },
            _ = &mut shutdown_rx => {
                let _ = sink.close().await;
                emit(&events, conn_id, &target, TransportEventKind::Closed);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ChatEnvelope;
    use crate::session::Session;

    fn manager() -> (ConnectionManager, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        // Port 9 (discard) is never listening; connects fail asynchronously.
        let config = CoreConfig::new("http://127.0.0.1:9", "ws://127.0.0.1:9/ws", "ws://127.0.0.1:9/ws/notification");
        (ConnectionManager::new(config, tx), rx)
    }

    fn chat_frame() -> ClientFrame {
        let session = Session::new("U1", "ana", "tok");
        ClientFrame::Chat(ChatEnvelope::new("E123", &session, "hi"))
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let (mut manager, _rx) = manager();
        let target = ChannelTarget::EventChat("E123".into());
        let first = manager.open(&target).unwrap();
        let second = manager.open(&target).unwrap();
        assert!(matches!(first, Opened::New(_)));
        assert_eq!(second, Opened::Existing(first.conn_id()));
        assert_eq!(manager.live_targets().count(), 1);
    }

    #[tokio::test]
    async fn test_send_while_connecting_is_rejected() {
        let (mut manager, _rx) = manager();
        let target = ChannelTarget::EventChat("E123".into());
        manager.open(&target).unwrap();
        assert_eq!(manager.state(&target), Some(ConnectionState::Connecting));
        assert!(matches!(
            manager.send(&target, &chat_frame()),
            Err(RealtimeError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_send_without_connection_is_rejected() {
        let (mut manager, _rx) = manager();
        let target = ChannelTarget::User("U1".into());
        assert!(matches!(
            manager.send(&target, &chat_frame()),
            Err(RealtimeError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_drops_in_flight_events() {
        let (mut manager, _rx) = manager();
        let target = ChannelTarget::EventChat("E123".into());
        let opened = manager.open(&target).unwrap();
        assert!(manager.close(&target));
        assert!(!manager.close(&target));

        // A frame already in flight from the closed instance is stale.
        let stale = TransportEvent {
            conn_id: opened.conn_id(),
            target: target.clone(),
            kind: TransportEventKind::Frame("{}".into()),
        };
        assert!(manager.apply(&stale).is_none());
    }

    #[tokio::test]
    async fn test_reopen_after_failure_is_a_new_instance() {
        let (mut manager, _rx) = manager();
        let target = ChannelTarget::EventAlerts("E7".into());
        let first = manager.open(&target).unwrap();
        manager.apply(&TransportEvent {
            conn_id: first.conn_id(),
            target: target.clone(),
            kind: TransportEventKind::Failed("refused".into()),
        });
        assert_eq!(manager.state(&target), Some(ConnectionState::Failed));

        let second = manager.open(&target).unwrap();
        assert!(matches!(second, Opened::New(_)));
        assert_ne!(second.conn_id(), first.conn_id());
    }

    #[tokio::test]
    async fn test_frames_ignored_until_open() {
        let (mut manager, _rx) = manager();
        let target = ChannelTarget::User("U1".into());
        let opened = manager.open(&target).unwrap();

        let early = TransportEvent {
            conn_id: opened.conn_id(),
            target: target.clone(),
            kind: TransportEventKind::Frame("{}".into()),
        };
        assert!(manager.apply(&early).is_none());

        manager.apply(&TransportEvent {
            conn_id: opened.conn_id(),
            target: target.clone(),
            kind: TransportEventKind::Opened,
        });
        assert_eq!(manager.state(&target), Some(ConnectionState::Open));
        assert_eq!(manager.apply(&early), Some(ConnectionState::Open));
    }
}
