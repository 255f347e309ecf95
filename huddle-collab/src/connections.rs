use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use huddle_core::{Id, UserId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{Identity, ServerEvent};

pub type ConnectionId = Id<Connection>;
pub type EventSender = UnboundedSender<ServerEvent>;
pub type EventReceiver = UnboundedReceiver<ServerEvent>;

/// An open real-time connection, bound to one identity for its whole life
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub identity: Arc<Identity>,
    sender: EventSender,
    last_seen: Mutex<Instant>,
}

/// What a handler knows about the connection an event came from
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub identity: Arc<Identity>,
}

impl ConnectionContext {
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }
}

/// Returned when a connection is removed
#[derive(Debug)]
pub struct Disconnected {
    pub identity: Arc<Identity>,
    /// Whether this was the user's last open connection
    pub was_last: bool,
}

/// All open connections, addressable by id and by user.
///
/// The per-user index is each user's personal channel, used to reach
/// every device of a user at once.
#[derive(Debug, Default)]
pub struct Connections {
    table: RwLock<ConnectionTable>,
}

#[derive(Debug, Default)]
struct ConnectionTable {
    by_id: HashMap<ConnectionId, Connection>,
    by_user: HashMap<UserId, HashSet<ConnectionId>>,
}

impl Connection {
    fn send(&self, event: ServerEvent) -> bool {
        // The receiver is gone once the socket task ended, which is fine to ignore
        self.sender.send(event).is_ok()
    }
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks a new connection, returning its context and the stream of events sent to it
    pub fn register(&self, identity: Identity) -> (ConnectionContext, EventReceiver) {
        let (sender, receiver) = unbounded_channel();
        let id = ConnectionId::new();
        let identity = Arc::new(identity);

        let connection = Connection {
            id,
            identity: identity.clone(),
            sender,
            last_seen: Mutex::new(Instant::now()),
        };

        let mut table = self.table.write();
        table
            .by_user
            .entry(identity.user_id.clone())
            .or_default()
            .insert(id);
        table.by_id.insert(id, connection);

        (ConnectionContext { id, identity }, receiver)
    }

    /// Stops tracking a connection. Returns [None] if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> Option<Disconnected> {
        let mut table = self.table.write();
        let connection = table.by_id.remove(&id)?;
        let user_id = &connection.identity.user_id;

        let was_last = match table.by_user.get_mut(user_id) {
            Some(ids) => {
                ids.remove(&id);
                ids.is_empty()
            }
            None => true,
        };

        if was_last {
            table.by_user.remove(user_id);
        }

        Some(Disconnected {
            identity: connection.identity,
            was_last,
        })
    }

    /// Sends an event to a single connection
    pub fn send(&self, id: ConnectionId, event: ServerEvent) -> bool {
        self.table
            .read()
            .by_id
            .get(&id)
            .map(|c| c.send(event))
            .unwrap_or(false)
    }

    /// Sends an event to every connection of a user, returning how many were reached
    pub fn send_to_user(&self, user_id: &str, event: ServerEvent) -> usize {
        self.send_to_users([user_id], None, event)
    }

    /// Sends an event to every connection of the given users, optionally skipping one user
    pub fn send_to_users<'a, I>(&self, user_ids: I, except: Option<&str>, event: ServerEvent) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let table = self.table.read();

        user_ids
            .into_iter()
            .filter(|id| Some(*id) != except)
            .collect::<HashSet<_>>()
            .into_iter()
            .filter_map(|user_id| table.by_user.get(user_id))
            .flatten()
            .filter_map(|id| table.by_id.get(id))
            .filter(|c| c.send(event.clone()))
            .count()
    }

    /// Sends an event to every open connection
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        self.table
            .read()
            .by_id
            .values()
            .filter(|c| c.send(event.clone()))
            .count()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.table.read().by_user.contains_key(user_id)
    }

    /// Records that a connection was heard from
    pub fn touch(&self, id: ConnectionId) {
        if let Some(connection) = self.table.read().by_id.get(&id) {
            *connection.last_seen.lock() = Instant::now();
        }
    }

    /// Connections that have been silent for longer than `threshold`
    pub fn stale(&self, threshold: Duration) -> Vec<(ConnectionId, UserId)> {
        self.table
            .read()
            .by_id
            .values()
            .filter(|c| c.last_seen.lock().elapsed() > threshold)
            .map(|c| (c.id, c.identity.user_id.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many connections a user has open
    pub fn connections_of(&self, user_id: &str) -> usize {
        self.table
            .read()
            .by_user
            .get(user_id)
            .map(|ids| ids.len())
            .unwrap_or_default()
    }
}
