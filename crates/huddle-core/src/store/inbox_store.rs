use crate::models::Notification;
use crate::protocol::ClientFrame;

/// One notification held by the inbox. `id` is local to the session
/// and only identifies the entry for mark-seen; the wire carries no
/// identity, and identical notifications arriving twice stay two
/// distinct entries (delivery is at-least-once).
#[derive(Debug, Clone)]
pub struct InboxEntry {
    pub id: u64,
    pub notification: Notification,
    pub seen: bool,
}

/// Sub-store for the current user's notifications. RAM-resident,
/// scoped to one login session; arrival order is preserved.
pub struct NotificationInbox {
    entries: Vec<InboxEntry>,
    next_id: u64,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn entries(&self) -> &[InboxEntry] {
        &self.entries
    }

    pub fn unseen_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.seen).count()
    }

    /// Append a notification. Unseen unless the server already marked
    /// it seen. Returns the entry's local id.
    pub fn ingest(&mut self, notification: Notification) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        let seen = notification.seen.unwrap_or(false);
        self.entries.push(InboxEntry {
            id,
            notification,
            seen,
        });
        id
    }

    /// Mark one entry seen. Idempotent: the ack frame is produced
    /// only on the first transition, never for an already-seen or
    /// unknown entry. The local flip is optimistic and is not rolled
    /// back if the caller fails to deliver the ack.
    pub fn mark_seen(&mut self, id: u64) -> Option<ClientFrame> {
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        if entry.seen {
            return None;
        }
        entry.seen = true;
        Some(ClientFrame::SeenAck(entry.notification.as_seen()))
    }

    /// Mark every unseen entry seen, producing one ack per flip.
    pub fn mark_all_seen(&mut self) -> Vec<ClientFrame> {
        let ids: Vec<u64> = self
            .entries
            .iter()
            .filter(|e| !e.seen)
            .map(|e| e.id)
            .collect();
        ids.into_iter().filter_map(|id| self.mark_seen(id)).collect()
    }

    /// Remove all entries. Local state only: no server-side delete is
    /// issued, matching the observed behavior of the system.
    pub fn clear_all(&mut self) {
        self.entries.clear();
    }
}

impl Default for NotificationInbox {
    fn default() -> Self {
        Self::new()
    }
}
