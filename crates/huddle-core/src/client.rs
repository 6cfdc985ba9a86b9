use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::CoreConfig;
use crate::connection::{
    ChannelTarget, ConnectionManager, ConnectionState, Opened, TransportEvent, TransportEventKind,
};
use crate::error::RealtimeError;
use crate::events::CoreEvent;
use crate::models::{should_monitor, Event};
use crate::protocol::{ClientFrame, ServerFrame};
use crate::session::Session;
use crate::store::{ChatStore, NotificationInbox};

/// The realtime synchronization layer for one login session.
///
/// Owns the connection table and both stores; every inbound transport
/// event funnels through [`RealtimeClient::next_event`], which applies
/// it on this single logical loop and hands the UI a [`CoreEvent`] to
/// react to. No store is mutated anywhere else, so no locking is
/// needed.
pub struct RealtimeClient {
    session: Session,
    manager: ConnectionManager,
    pub chat: ChatStore,
    pub inbox: NotificationInbox,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl RealtimeClient {
    pub fn new(config: CoreConfig, session: Session) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session,
            manager: ConnectionManager::new(config, events_tx),
            chat: ChatStore::new(),
            inbox: NotificationInbox::new(),
            events_rx,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn connection_state(&self, target: &ChannelTarget) -> Option<ConnectionState> {
        self.manager.state(target)
    }

    pub fn is_connected(&self, target: &ChannelTarget) -> bool {
        self.manager.state(target) == Some(ConnectionState::Open)
    }

    /// Subscribe to the current user's notification stream.
    pub fn connect_inbox(&mut self) -> Result<(), RealtimeError> {
        let target = ChannelTarget::User(self.session.user_id.clone());
        self.manager.open(&target)?;
        Ok(())
    }

    /// Join an event's chat room. A brand-new connection starts from
    /// an empty transcript so the server's history snapshot lands;
    /// when the channel is already live this is a no-op.
    pub fn open_chat(&mut self, event_id: &str) -> Result<(), RealtimeError> {
        let target = ChannelTarget::EventChat(event_id.to_string());
        if let Opened::New(_) = self.manager.open(&target)? {
            self.chat.reset(event_id);
        }
        Ok(())
    }

    /// Leave an event's chat room. Safe on every exit path; closing
    /// an already-closed channel does nothing.
    pub fn close_chat(&mut self, event_id: &str) {
        self.manager
            .close(&ChannelTarget::EventChat(event_id.to_string()));
    }

    /// Send a chat message as the current user. Blank text is a
    /// silent no-op; an unopened channel rejects with `NotConnected`.
    pub fn send_chat(&mut self, event_id: &str, text: &str) -> Result<(), RealtimeError> {
        let Some(frame) = self.chat.compose(event_id, text, &self.session) else {
            return Ok(());
        };
        self.manager
            .send(&ChannelTarget::EventChat(event_id.to_string()), &frame)
    }

    /// Mark one notification seen. The local flag flips optimistically
    /// and the ack is best-effort: a failed send is logged, not rolled
    /// back (at-least-once intent).
    pub fn mark_seen(&mut self, entry_id: u64) {
        if let Some(ack) = self.inbox.mark_seen(entry_id) {
            self.send_ack(ack);
        }
    }

    pub fn mark_all_seen(&mut self) {
        for ack in self.inbox.mark_all_seen() {
            self.send_ack(ack);
        }
    }

    /// Clear the inbox. Local state only; the server is not asked to
    /// delete anything.
    pub fn clear_notifications(&mut self) {
        self.inbox.clear_all();
    }

    fn send_ack(&mut self, ack: ClientFrame) {
        let target = ChannelTarget::User(self.session.user_id.clone());
        if let Err(e) = self.manager.send(&target, &ack) {
            warn!(error = %e, "seen ack not delivered, keeping local state");
        }
    }

    /// Reconcile expiration-alert subscriptions with the event list:
    /// upcoming events get a live alert channel, everything else has
    /// its channel closed. Returns `(opened, closed)` counts.
    pub fn sync_alert_subscriptions(
        &mut self,
        events: &[Event],
        now: DateTime<Utc>,
    ) -> Result<(usize, usize), RealtimeError> {
        let wanted: HashSet<&str> = events
            .iter()
            .filter(|e| should_monitor(e, now))
            .map(|e| e.id.as_str())
            .collect();

        let mut opened = 0;
        for event_id in &wanted {
            let target = ChannelTarget::EventAlerts(event_id.to_string());
            if let Opened::New(_) = self.manager.open(&target)? {
                opened += 1;
            }
        }

        let stale: Vec<ChannelTarget> = self
            .manager
            .live_targets()
            .filter(|target| {
                matches!(target, ChannelTarget::EventAlerts(id) if !wanted.contains(id.as_str()))
            })
            .cloned()
            .collect();
        let mut closed = 0;
        for target in &stale {
            if self.manager.close(target) {
                closed += 1;
            }
        }
        Ok((opened, closed))
    }

    /// Wait for the next transport event, apply it, and surface the
    /// resulting core event. Stale, malformed, and out-of-protocol
    /// frames are consumed silently.
    pub async fn next_event(&mut self) -> Option<CoreEvent> {
        loop {
            let event = self.events_rx.recv().await?;
            if let Some(core_event) = self.process(event) {
                return Some(core_event);
            }
        }
    }

    /// Close all live connections. Also runs on drop, so navigating
    /// away from the session never leaks sockets.
    pub fn shutdown(&mut self) {
        self.manager.close_all();
    }

    fn process(&mut self, event: TransportEvent) -> Option<CoreEvent> {
        let state = self.manager.apply(&event)?;
        match event.kind {
            TransportEventKind::Opened => {
                // A chat channel requests its history exactly once,
                // as soon as the transport is open.
                if let ChannelTarget::EventChat(event_id) = &event.target {
                    let load = ClientFrame::load(event_id, &self.session);
                    if let Err(e) = self.manager.send(&event.target, &load) {
                        warn!(error = %e, event_id, "history load request not sent");
                    }
                }
                Some(CoreEvent::ConnectionChanged {
                    target: event.target,
                    state,
                })
            }
            TransportEventKind::Closed | TransportEventKind::Failed(_) => {
                Some(CoreEvent::ConnectionChanged {
                    target: event.target,
                    state,
                })
            }
            TransportEventKind::Frame(raw) => match ServerFrame::decode(&raw) {
                Ok(frame) => self.dispatch(&event.target, frame),
                Err(e) => {
                    warn!(chan = %event.target, error = %e, "dropping malformed frame");
                    None
                }
            },
        }
    }

    fn dispatch(&mut self, target: &ChannelTarget, frame: ServerFrame) -> Option<CoreEvent> {
        match frame {
            ServerFrame::History(snapshot) => {
                let ChannelTarget::EventChat(event_id) = target else {
                    warn!(chan = %target, "history snapshot on a non-chat channel");
                    return None;
                };
                if self.chat.load_history(event_id, snapshot) {
                    Some(CoreEvent::HistoryLoaded {
                        event_id: event_id.clone(),
                    })
                } else {
                    None
                }
            }
            ServerFrame::Chat(message) => {
                debug!(event_id = %message.event_id, from = %message.name, "chat message");
                let event_id = message.event_id.clone();
                self.chat.append(message.clone());
                Some(CoreEvent::MessageAppended { event_id, message })
            }
            ServerFrame::Notification(notification) => {
                let entry_id = self.inbox.ingest(notification);
                Some(CoreEvent::NotificationArrived { entry_id })
            }
            ServerFrame::Expiration { event_id } => Some(CoreEvent::EventExpired { event_id }),
        }
    }

    #[cfg(test)]
    fn fake_event(&self, target: &ChannelTarget, kind: TransportEventKind) -> TransportEvent {
        TransportEvent {
            conn_id: self.manager.conn_id(target).unwrap_or(u64::MAX),
            target: target.clone(),
            kind,
        }
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
