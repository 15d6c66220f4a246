//! Room registry and presence tracker.
//!
//! One mutex guards all membership state so "who is in this room" is
//! always a consistent snapshot with respect to admits, removals, and
//! tab changes. Socket writes happen outside the lock through each
//! connection's queue; a failed queue push means the peer is gone and
//! evicts it inline.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{protocol, ConnectionId, ConnectionSender};

/// Tab shown when a connection does not name one.
pub const DEFAULT_TAB: &str = "wbs";

/// Metadata held for one admitted connection.
struct Session {
    proposal_id: String,
    user_name: String,
    tab: String,
    sender: ConnectionSender,
}

#[derive(Default)]
struct Inner {
    /// proposal_id -> connection ids in admission order.
    /// Invariant: a room with zero members is removed from the map.
    rooms: HashMap<String, Vec<ConnectionId>>,
    sessions: HashMap<ConnectionId, Session>,
}

/// Tracks which connections are viewing which proposal, their active
/// tabs, and fans edits out to room peers. Fully reconstructible from
/// the set of open connections — nothing here survives a restart.
#[derive(Default)]
pub struct RoomRegistry {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a process-unique id for a new connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Admit a connection to a proposal room and broadcast fresh presence.
    /// Idempotent per connection id: re-admitting is a no-op.
    pub fn admit(
        &self,
        conn_id: ConnectionId,
        proposal_id: &str,
        user_name: &str,
        tab: &str,
        sender: ConnectionSender,
    ) {
        {
            let mut inner = self.lock();
            if inner.sessions.contains_key(&conn_id) {
                return;
            }
            inner.sessions.insert(
                conn_id,
                Session {
                    proposal_id: proposal_id.to_string(),
                    user_name: user_name.to_string(),
                    tab: tab.to_string(),
                    sender,
                },
            );
            inner
                .rooms
                .entry(proposal_id.to_string())
                .or_default()
                .push(conn_id);
        }

        tracing::debug!(
            proposal_id = %proposal_id,
            conn_id = conn_id,
            user = %user_name,
            "Connection admitted"
        );
        self.broadcast_presence(proposal_id);
    }

    /// Remove a connection, dropping its room when it was the last
    /// member, and broadcast fresh presence to whoever remains.
    /// Unknown connection ids are a no-op — a disconnect can race with
    /// an eviction during a failed send.
    pub fn remove(&self, conn_id: ConnectionId) {
        let proposal_id = {
            let mut inner = self.lock();
            let Some(session) = inner.sessions.remove(&conn_id) else {
                return;
            };
            let proposal_id = session.proposal_id;
            if let Some(members) = inner.rooms.get_mut(&proposal_id) {
                members.retain(|id| *id != conn_id);
                if members.is_empty() {
                    inner.rooms.remove(&proposal_id);
                }
            }
            proposal_id
        };

        tracing::debug!(proposal_id = %proposal_id, conn_id = conn_id, "Connection removed");
        self.broadcast_presence(&proposal_id);
    }

    /// Record a tab switch for a connection and broadcast fresh presence.
    pub fn set_tab(&self, conn_id: ConnectionId, tab: &str) {
        let proposal_id = {
            let mut inner = self.lock();
            let Some(session) = inner.sessions.get_mut(&conn_id) else {
                return;
            };
            session.tab = tab.to_string();
            session.proposal_id.clone()
        };
        self.broadcast_presence(&proposal_id);
    }

    /// Connection ids currently in a room, in admission order.
    pub fn members_of(&self, proposal_id: &str) -> Vec<ConnectionId> {
        let inner = self.lock();
        inner.rooms.get(proposal_id).cloned().unwrap_or_default()
    }

    /// Derived presence view: tab -> user names in admission order.
    pub fn snapshot(&self, proposal_id: &str) -> BTreeMap<String, Vec<String>> {
        let inner = self.lock();
        let mut presence: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let Some(members) = inner.rooms.get(proposal_id) {
            for conn_id in members {
                if let Some(session) = inner.sessions.get(conn_id) {
                    presence
                        .entry(session.tab.clone())
                        .or_default()
                        .push(session.user_name.clone());
                }
            }
        }
        presence
    }

    /// Send a serialized frame to every connection in the room except
    /// `exclude`. A connection whose queue is closed is evicted from the
    /// registry mid-sweep; the sweep continues to the remaining peers.
    pub fn broadcast(&self, proposal_id: &str, payload: &str, exclude: Option<ConnectionId>) {
        // Snapshot the membership under the lock; send outside it.
        let targets: Vec<(ConnectionId, ConnectionSender)> = {
            let inner = self.lock();
            let Some(members) = inner.rooms.get(proposal_id) else {
                return;
            };
            members
                .iter()
                .filter(|id| Some(**id) != exclude)
                .filter_map(|id| {
                    inner
                        .sessions
                        .get(id)
                        .map(|s| (*id, s.sender.clone()))
                })
                .collect()
        };

        let mut dead: Vec<ConnectionId> = Vec::new();
        for (conn_id, sender) in targets {
            let msg = axum::extract::ws::Message::Text(payload.to_string().into());
            if sender.send(msg).is_err() {
                dead.push(conn_id);
            }
        }

        // Evict dead connections; each removal rebroadcasts presence to
        // the survivors.
        for conn_id in dead {
            tracing::debug!(
                proposal_id = %proposal_id,
                conn_id = conn_id,
                "Evicting dead connection during broadcast"
            );
            self.remove(conn_id);
        }
    }

    /// Broadcast the current presence view to everyone in the room.
    fn broadcast_presence(&self, proposal_id: &str) {
        let presence = self.snapshot(proposal_id);
        if presence.is_empty() {
            return;
        }
        let payload = protocol::presence_frame(&presence);
        self.broadcast(proposal_id, &payload, None);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning would mean a panic while holding the guard;
        // membership state is still structurally valid, so continue.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn channel() -> (
        ConnectionSender,
        mpsc::UnboundedReceiver<axum::extract::ws::Message>,
    ) {
        mpsc::unbounded_channel()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<axum::extract::ws::Message>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let axum::extract::ws::Message::Text(text) = msg {
                out.push(text.to_string());
            }
        }
        out
    }

    #[test]
    fn test_room_cleanup_after_last_member_leaves() {
        let registry = RoomRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();

        let a = registry.next_connection_id();
        let b = registry.next_connection_id();
        registry.admit(a, "p1", "Alice", "wbs", tx_a);
        registry.admit(b, "p1", "Bob", "pricing", tx_b);
        assert_eq!(registry.members_of("p1").len(), 2);

        registry.remove(a);
        assert_eq!(registry.members_of("p1"), vec![b]);

        registry.remove(b);
        assert!(registry.members_of("p1").is_empty());
        assert!(registry.snapshot("p1").is_empty());
    }

    #[test]
    fn test_admit_is_idempotent() {
        let registry = RoomRegistry::new();
        let (tx, _rx) = channel();
        let a = registry.next_connection_id();
        registry.admit(a, "p1", "Alice", "wbs", tx.clone());
        registry.admit(a, "p1", "Alice", "wbs", tx);
        assert_eq!(registry.members_of("p1").len(), 1);
    }

    #[test]
    fn test_remove_unknown_connection_is_noop() {
        let registry = RoomRegistry::new();
        registry.remove(42);
        assert!(registry.members_of("anything").is_empty());
    }

    #[test]
    fn test_snapshot_partitions_users_by_tab() {
        let registry = RoomRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let (tx_c, _rx_c) = channel();

        let a = registry.next_connection_id();
        let b = registry.next_connection_id();
        let c = registry.next_connection_id();
        registry.admit(a, "p1", "Alice", "wbs", tx_a);
        registry.admit(b, "p1", "Bob", "wbs", tx_b);
        // Same user on a second connection, different tab
        registry.admit(c, "p1", "Alice", "pricing", tx_c);

        let snap = registry.snapshot("p1");
        assert_eq!(snap["wbs"], vec!["Alice", "Bob"]);
        assert_eq!(snap["pricing"], vec!["Alice"]);

        registry.set_tab(b, "schedule");
        let snap = registry.snapshot("p1");
        assert_eq!(snap["wbs"], vec!["Alice"]);
        assert_eq!(snap["schedule"], vec!["Bob"]);
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let registry = RoomRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();

        let a = registry.next_connection_id();
        let b = registry.next_connection_id();
        registry.admit(a, "p1", "Alice", "wbs", tx_a);
        registry.admit(b, "p1", "Bob", "wbs", tx_b);
        drain(&mut rx_a);
        drain(&mut rx_b);

        registry.broadcast("p1", r#"{"type":"update"}"#, Some(a));
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![r#"{"type":"update"}"#.to_string()]);
    }

    #[test]
    fn test_dead_connection_evicted_without_breaking_sweep() {
        let registry = RoomRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, rx_b) = channel();
        let (tx_c, mut rx_c) = channel();

        let a = registry.next_connection_id();
        let b = registry.next_connection_id();
        let c = registry.next_connection_id();
        registry.admit(a, "p1", "Alice", "wbs", tx_a);
        registry.admit(b, "p1", "Bob", "wbs", tx_b);
        registry.admit(c, "p1", "Carol", "wbs", tx_c);

        // B's receiver is gone — the next send to it must fail.
        drop(rx_b);
        drain(&mut rx_a);
        drain(&mut rx_c);

        registry.broadcast("p1", r#"{"x":1}"#, None);

        let a_frames = drain(&mut rx_a);
        let c_frames = drain(&mut rx_c);
        // A and C still got the payload despite B's failure...
        assert!(a_frames.contains(&r#"{"x":1}"#.to_string()));
        assert!(c_frames.contains(&r#"{"x":1}"#.to_string()));
        // ...and the eviction triggered a presence rebroadcast without Bob.
        assert!(a_frames.iter().any(|f| f.contains("presence") && !f.contains("Bob")));
        // B is gone from the room.
        assert_eq!(registry.members_of("p1"), vec![a, c]);
    }
}
