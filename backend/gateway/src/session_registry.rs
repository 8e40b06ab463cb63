//! Active WebSocket Session Registry.
//!
//! Tracks connected sessions in join order and fans messages out to their
//! outbound queues. Fan-out holds the read lock for the whole pass and `leave`
//! takes the write lock, so a session is either fully in a broadcast or fully
//! out of it. Each entry also carries a liveness flag that is cleared before
//! the entry is removed or its queue is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

use worldsync_core::{WorldError, WorldStore};

pub type SessionId = Uuid;

/// One outbound wire message, shared between every queue it is enqueued on.
pub type OutboundMessage = Arc<str>;

type QueueSender = mpsc::UnboundedSender<OutboundMessage>;

struct SessionEntry {
    id: SessionId,
    sender: QueueSender,
    alive: Arc<AtomicBool>,
}

/// Server-side half of one connected client: its identity and the receiving
/// end of its outbound FIFO queue.
///
/// Dropping a `Session` marks it dead; the registry stops delivering to it and
/// prunes the entry on the next broadcast.
pub struct Session {
    id: SessionId,
    queue: mpsc::UnboundedReceiver<OutboundMessage>,
    alive: Arc<AtomicBool>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Wait for the next queued message. `None` once the registry has dropped
    /// this session's sender.
    pub async fn recv(&mut self) -> Option<OutboundMessage> {
        self.queue.recv().await
    }

    /// Take the next queued message without waiting.
    pub fn try_recv(&mut self) -> Option<OutboundMessage> {
        self.queue.try_recv().ok()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Manages connected sessions.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    sessions: Arc<RwLock<Vec<SessionEntry>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session with an empty queue.
    pub async fn join(&self) -> Session {
        let mut sessions = self.sessions.write().await;
        Self::insert_locked(&mut sessions, None)
    }

    /// Register a new session whose first queued message is the serialized
    /// world snapshot.
    ///
    /// The snapshot is taken under the registry write lock: any update applied
    /// before it is part of the snapshot, and any broadcast issued after it is
    /// queued behind it.
    pub async fn join_with_snapshot(&self, store: &WorldStore) -> Result<Session, WorldError> {
        let mut sessions = self.sessions.write().await;
        let snapshot = store.world_json().await?;
        Ok(Self::insert_locked(&mut sessions, Some(Arc::from(snapshot))))
    }

    fn insert_locked(sessions: &mut Vec<SessionEntry>, first: Option<OutboundMessage>) -> Session {
        let id = Uuid::new_v4();
        let (sender, queue) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        if let Some(message) = first {
            // The receiver is alive in this scope; the send cannot fail.
            let _ = sender.send(message);
        }
        sessions.push(SessionEntry {
            id,
            sender,
            alive: Arc::clone(&alive),
        });
        info!(session = %id, connected = sessions.len(), "Session joined");
        Session { id, queue, alive }
    }

    /// Remove a session. Returns `false` if it was not registered, which makes
    /// repeated calls harmless.
    pub async fn leave(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let Some(pos) = sessions.iter().position(|entry| entry.id == id) else {
            debug!(session = %id, "Leave for unknown session ignored");
            return false;
        };
        let entry = sessions.remove(pos);
        entry.alive.store(false, Ordering::Release);
        info!(session = %id, connected = sessions.len(), "Session left");
        true
    }

    /// Enqueue `message` on every live session, in join order.
    ///
    /// Returns the number of sessions the message was delivered to. Entries
    /// whose queue has been dropped are pruned afterwards.
    pub async fn broadcast(&self, message: OutboundMessage) -> usize {
        let mut delivered = 0;
        let mut stale = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for entry in sessions.iter() {
                if !entry.alive.load(Ordering::Acquire) {
                    stale.push(entry.id);
                    continue;
                }
                match entry.sender.send(Arc::clone(&message)) {
                    Ok(()) => delivered += 1,
                    Err(_) => stale.push(entry.id),
                }
            }
        }

        if !stale.is_empty() {
            let mut sessions = self.sessions.write().await;
            sessions.retain(|entry| !stale.contains(&entry.id));
            debug!(pruned = stale.len(), "Pruned dead sessions after broadcast");
        }

        delivered
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.iter().any(|entry| entry.id == id)
    }

    /// Registered session ids in join order.
    pub async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.iter().map(|entry| entry.id).collect()
    }
}
