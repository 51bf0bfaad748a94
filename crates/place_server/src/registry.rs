//! Open connections and the users bound to them.
//!
//! Every connection owns an outbound queue drained by its writer task.
//! Authenticated connections refer to a shared per-user entry keyed by
//! user id, so the ban flag and cooldown of a user are seen identically
//! by all of that user's connections.

use parking_lot::RwLock;
use place_protocol::Reply;
use place_storage::{UserId, UserRecord};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex as AsyncMutex;

/// Identifies one open connection for the lifetime of the process.
pub type ConnectionId = u64;

/// A frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text line.
    Text(Arc<str>),
    /// A binary frame (the canvas colors).
    Binary(Arc<[u8]>),
}

impl Outbound {
    /// Returns the text of a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Outbound::Text(text) => Some(text),
            Outbound::Binary(_) => None,
        }
    }
}

impl From<Reply> for Outbound {
    fn from(reply: Reply) -> Self {
        Outbound::Text(reply.to_string().into())
    }
}

impl From<&Reply> for Outbound {
    fn from(reply: &Reply) -> Self {
        Outbound::Text(reply.to_string().into())
    }
}

struct SessionEntry {
    outbox: UnboundedSender<Outbound>,
    user: Option<UserId>,
}

struct SharedUser {
    record: UserRecord,
    sessions: usize,
    place_lock: Arc<AsyncMutex<()>>,
}

#[derive(Default)]
struct RegistryState {
    sessions: BTreeMap<ConnectionId, SessionEntry>,
    users: HashMap<UserId, SharedUser>,
}

/// Process-wide table of connections.
///
/// The lock is never held across an `.await`; sends only enqueue.
#[derive(Default)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an anonymous connection writing to `outbox`.
    pub fn register(&self, outbox: UnboundedSender<Outbound>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.state
            .write()
            .sessions
            .insert(id, SessionEntry { outbox, user: None });
        id
    }

    /// Removes a connection, dropping the shared user once its last
    /// connection is gone. Unknown ids are ignored.
    pub fn unregister(&self, id: ConnectionId) {
        let mut state = self.state.write();
        let Some(entry) = state.sessions.remove(&id) else {
            return;
        };
        if let Some(user_id) = entry.user {
            if let Some(shared) = state.users.get_mut(&user_id) {
                shared.sessions -= 1;
                if shared.sessions == 0 {
                    state.users.remove(&user_id);
                }
            }
        }
    }

    /// Binds connection `id` to `record.id`.
    ///
    /// If the user already has a connection, the existing shared record
    /// wins and `record` is discarded. Returns the shared record, or
    /// `None` if the connection is no longer registered.
    pub fn authenticate(&self, id: ConnectionId, record: UserRecord) -> Option<UserRecord> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let entry = state.sessions.get_mut(&id)?;

        if let Some(existing) = entry.user {
            return state.users.get(&existing).map(|u| u.record.clone());
        }

        entry.user = Some(record.id);
        let shared = state.users.entry(record.id).or_insert_with(|| SharedUser {
            record,
            sessions: 0,
            place_lock: Arc::new(AsyncMutex::new(())),
        });
        shared.sessions += 1;
        Some(shared.record.clone())
    }

    /// The user id bound to connection `id`.
    pub fn user_id_of(&self, id: ConnectionId) -> Option<UserId> {
        self.state.read().sessions.get(&id).and_then(|e| e.user)
    }

    /// A copy of the shared record of the user bound to connection `id`.
    pub fn user_of(&self, id: ConnectionId) -> Option<UserRecord> {
        let state = self.state.read();
        let user_id = state.sessions.get(&id)?.user?;
        state.users.get(&user_id).map(|u| u.record.clone())
    }

    /// A copy of the shared record of `user_id`, if the user is connected.
    pub fn user(&self, user_id: UserId) -> Option<UserRecord> {
        self.state
            .read()
            .users
            .get(&user_id)
            .map(|u| u.record.clone())
    }

    /// Mutates the shared record of `user_id` in place.
    ///
    /// Returns `None` if the user has no connection.
    pub fn with_user_mut<R>(&self, user_id: UserId, f: impl FnOnce(&mut UserRecord) -> R) -> Option<R> {
        self.state
            .write()
            .users
            .get_mut(&user_id)
            .map(|u| f(&mut u.record))
    }

    /// Replaces the shared record of `record.id` if the user is connected.
    pub fn update_user(&self, record: UserRecord) -> bool {
        self.with_user_mut(record.id, |shared| *shared = record)
            .is_some()
    }

    /// The lock serializing placements of `user_id` across its connections.
    pub fn placement_lock(&self, user_id: UserId) -> Option<Arc<AsyncMutex<()>>> {
        self.state
            .read()
            .users
            .get(&user_id)
            .map(|u| Arc::clone(&u.place_lock))
    }

    /// Every connection bound to `user_id`, in connection order.
    pub fn sessions_for_user(&self, user_id: UserId) -> Vec<ConnectionId> {
        self.state
            .read()
            .sessions
            .iter()
            .filter(|(_, e)| e.user == Some(user_id))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Queues `message` for connection `id`. Returns false if the
    /// connection is gone or its writer has stopped.
    pub fn send_to(&self, id: ConnectionId, message: impl Into<Outbound>) -> bool {
        let message = message.into();
        self.state
            .read()
            .sessions
            .get(&id)
            .is_some_and(|e| e.outbox.send(message).is_ok())
    }

    /// Queues `message` for every connection of `user_id`. Returns how
    /// many connections accepted it.
    pub fn send_to_user(&self, user_id: UserId, message: impl Into<Outbound>) -> usize {
        let message = message.into();
        self.state
            .read()
            .sessions
            .values()
            .filter(|e| e.user == Some(user_id))
            .filter(|e| e.outbox.send(message.clone()).is_ok())
            .count()
    }

    /// Queues `message` for every connection except `exclude`.
    ///
    /// A closed connection is skipped without affecting the others.
    /// Returns how many connections accepted it.
    pub fn broadcast(&self, message: impl Into<Outbound>, exclude: Option<ConnectionId>) -> usize {
        let message = message.into();
        self.state
            .read()
            .sessions
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .filter(|(_, e)| e.outbox.send(message.clone()).is_ok())
            .count()
    }

    /// Copies of every connected user's shared record.
    pub fn authenticated_users(&self) -> Vec<UserRecord> {
        self.state
            .read()
            .users
            .values()
            .map(|u| u.record.clone())
            .collect()
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.state.read().sessions.len()
    }

    /// Returns true if no connection is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
