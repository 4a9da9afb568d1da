//! # Outbound Dispatcher
//!
//! The `Dispatcher` owns the send half of every live connection's outbound
//! queue. Handlers never see sockets: they get an [`Outbox`] and a
//! [`ConnectionId`], and the dispatcher turns that pair into a queued text
//! frame for the connection's own task to write.
//!
//! ## Design
//!
//! 1.  **One unbounded queue per connection**: `send` never blocks or awaits,
//!     so it is safe to call from synchronous handler code.
//! 2.  **Serialize before locking**: the JSON text is produced before the
//!     client table lock is taken; the lock only covers a map lookup and a
//!     channel push.
//! 3.  **Lazy cleanup**: a connection whose receiver is gone is pruned the
//!     first time a send to it fails.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

use super::response::OutboundResponse;

/// Identity of one transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Hands out process-unique ids, starting at 1.
    pub fn next() -> Self {
        static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a reply could not be queued.
#[derive(Debug, Error)]
pub enum SendError {
    /// No connection with this id is registered.
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    /// The connection's task has gone away.
    #[error("connection {0} is closed")]
    Closed(ConnectionId),
    /// The reply could not be serialized.
    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Send-back capability handed to request handlers.
pub trait Outbox: Send + Sync {
    /// Queues `response` for delivery on `connection`.
    fn send(&self, connection: ConnectionId, response: &OutboundResponse) -> Result<(), SendError>;
}

/// Registry of live connections and their outbound queues.
#[derive(Debug, Default)]
pub struct Dispatcher {
    clients: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<ConnectionId, mpsc::UnboundedSender<String>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a connection and returns the receiver its task drains.
    ///
    /// Registering an id twice replaces the earlier queue.
    pub fn add_client(&self, id: ConnectionId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.clients().insert(id, tx).is_some() {
            tracing::warn!(connection = %id, "Connection re-registered; previous queue dropped");
        }
        tracing::debug!(connection = %id, "Connection registered with dispatcher");
        rx
    }

    /// Forgets a connection. Unknown ids are ignored.
    pub fn remove_client(&self, id: ConnectionId) {
        if self.clients().remove(&id).is_some() {
            tracing::debug!(connection = %id, "Connection removed from dispatcher");
        }
    }

    /// Number of registered connections.
    pub fn client_count(&self) -> usize {
        self.clients().len()
    }

    /// Queues a raw text frame for `id`.
    pub fn send_text(&self, id: ConnectionId, text: String) -> Result<(), SendError> {
        let mut clients = self.clients();
        let sender = clients.get(&id).ok_or(SendError::UnknownConnection(id))?;
        if sender.send(text).is_err() {
            clients.remove(&id);
            return Err(SendError::Closed(id));
        }
        Ok(())
    }
}

impl Outbox for Dispatcher {
    fn send(&self, connection: ConnectionId, response: &OutboundResponse) -> Result<(), SendError> {
        let text = response.to_json()?;
        self.send_text(connection, text)
    }
}
