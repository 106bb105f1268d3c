use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::RwLock;

use crate::error::{BroadcasterError, Result};
use crate::topic::Topic;

/// Unique id of an accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Frame queued for a connection's writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Sending side of an open connection.
///
/// Sends never block: frames go into the connection's queue and its writer
/// task puts them on the wire.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    topic: Topic,
    peer: Option<SocketAddr>,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnectionId,
        topic: Topic,
        peer: Option<SocketAddr>,
        tx: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        Self { id, topic, peer, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Queue a text frame
    pub fn send(&self, message: &str) -> Result<()> {
        self.tx
            .send(Outbound::Text(message.to_string()))
            .map_err(|_| BroadcasterError::ConnectionClosed(self.id.value()))
    }

    /// Ask the writer task to send a close frame and stop
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    /// True once the writer task has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.peer {
            Some(peer) => write!(f, "{} ({} from {})", self.id, self.topic, peer),
            None => write!(f, "{} ({})", self.id, self.topic),
        }
    }
}

/// Topic membership of open connections.
///
/// Membership changes take the write lock; broadcasts copy the member list
/// under the read lock and send after releasing it.
pub struct ConnectionRegistry {
    topics: RwLock<HashMap<Topic, HashMap<ConnectionId, ConnectionHandle>>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        let topics = Topic::ALL.iter().map(|t| (*t, HashMap::new())).collect();
        Self {
            topics: RwLock::new(topics),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate an id for a new connection
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a connection to its topic
    pub async fn join(&self, handle: ConnectionHandle) {
        let mut topics = self.topics.write().await;
        let members = topics.entry(handle.topic()).or_default();
        tracing::info!("{} joined. Subscribers on {}: {}", handle, handle.topic(), members.len() + 1);
        members.insert(handle.id(), handle);
    }

    /// Remove a connection from every topic. Safe to call repeatedly.
    pub async fn leave(&self, id: ConnectionId) -> bool {
        let mut topics = self.topics.write().await;
        let mut removed = false;
        for (topic, members) in topics.iter_mut() {
            if members.remove(&id).is_some() {
                tracing::info!("Connection {} left {}. Remaining: {}", id, topic, members.len());
                removed = true;
            }
        }
        removed
    }

    /// Send `message` to every member of `topic`.
    ///
    /// Members whose send fails are removed. Returns the number of
    /// successful sends.
    pub async fn broadcast(&self, topic: Topic, message: &str) -> usize {
        let members = self.members(topic).await;
        let mut delivered = 0;
        let mut dead = Vec::new();

        for handle in &members {
            match handle.send(message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!("Failed to send to {}: {}", handle, e);
                    dead.push(handle.id());
                }
            }
        }

        for id in dead {
            self.leave(id).await;
        }

        delivered
    }

    /// Point-in-time copy of a topic's members
    pub async fn members(&self, topic: Topic) -> Vec<ConnectionHandle> {
        self.topics
            .read()
            .await
            .get(&topic)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Point-in-time copy of every open connection
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.topics
            .read()
            .await
            .values()
            .flat_map(|members| members.values().cloned())
            .collect()
    }

    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics.read().await.get(&topic).map_or(0, HashMap::len)
    }

    pub async fn connection_count(&self) -> usize {
        self.topics.read().await.values().map(HashMap::len).sum()
    }

    /// Drop members whose writer task has exited
    pub async fn sweep(&self) -> usize {
        let mut removed = 0;
        for handle in self.snapshot().await {
            if handle.is_closed() && self.leave(handle.id()).await {
                tracing::debug!("Swept closed connection {}", handle);
                removed += 1;
            }
        }
        removed
    }

    /// Close and forget every connection
    pub async fn close_all(&self) -> usize {
        let mut topics = self.topics.write().await;
        let mut closed = 0;
        for members in topics.values_mut() {
            for (_, handle) in members.drain() {
                handle.close();
                closed += 1;
            }
        }
        tracing::info!("Closed {} connections", closed);
        closed
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
