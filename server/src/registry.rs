//! Connection registry and broadcast fan-out
//!
//! The registry holds exactly the connections whose transport is open. Each
//! entry owns the sending half of that connection's bounded outbound queue;
//! delivery never waits on a receiver, so one slow or dead connection cannot
//! hold up the others.

use crate::error::ServerError;
use crate::session::Session;
use log::{debug, info, warn};
use shared::ServerMessage;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::Message;

/// Server-assigned handle for one transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An open connection and its protocol state
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub session: Session,
    sender: mpsc::Sender<Message>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            addr,
            session: Session::default(),
            sender,
        }
    }
}

/// Result of queueing one message for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The outbound queue was full; this message was dropped for this receiver.
    Dropped,
    /// The receiving side is gone; the connection has been unregistered.
    Closed,
    UnknownConnection,
}

/// Counts from one broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub queued: usize,
    pub dropped: usize,
    pub closed: usize,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: BTreeMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an open connection. Returns false if the id is already registered.
    pub fn register(&mut self, connection: Connection) -> bool {
        if self.connections.contains_key(&connection.id) {
            return false;
        }

        info!(
            "Connection {} opened from {}. Total connections: {}",
            connection.id,
            connection.addr,
            self.connections.len() + 1
        );
        self.connections.insert(connection.id, connection);
        true
    }

    /// Removes a connection, dropping its outbound queue sender
    pub fn unregister(&mut self, id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.remove(&id);
        if removed.is_some() {
            info!(
                "Connection {} closed. Total connections: {}",
                id,
                self.connections.len()
            );
        }
        removed
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Visits every registered connection in registration order
    pub fn for_each<F: FnMut(&Connection)>(&self, mut f: F) {
        for connection in self.connections.values() {
            f(connection);
        }
    }

    /// Queues a message for a single connection
    pub fn send_to(
        &mut self,
        id: ConnectionId,
        message: &ServerMessage,
    ) -> Result<Delivery, ServerError> {
        let frame = Message::text(message.to_json()?);
        let outcome = match self.connections.get(&id) {
            Some(connection) => Self::deliver(connection, frame),
            None => return Ok(Delivery::UnknownConnection),
        };

        if outcome == Delivery::Closed {
            self.unregister(id);
        }
        Ok(outcome)
    }

    /// Serializes `message` once and queues the same frame for every connection
    ///
    /// Connections found closed are unregistered after the pass; a full queue
    /// only costs that receiver this message.
    pub fn broadcast(&mut self, message: &ServerMessage) -> Result<BroadcastReport, ServerError> {
        let frame = Message::text(message.to_json()?);
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for connection in self.connections.values() {
            match Self::deliver(connection, frame.clone()) {
                Delivery::Queued => report.queued += 1,
                Delivery::Dropped => report.dropped += 1,
                Delivery::Closed => closed.push(connection.id),
                Delivery::UnknownConnection => {}
            }
        }

        report.closed = closed.len();
        for id in closed {
            self.unregister(id);
        }

        debug!(
            "Broadcast queued for {} connections ({} dropped, {} closed)",
            report.queued, report.dropped, report.closed
        );
        Ok(report)
    }

    fn deliver(connection: &Connection, frame: Message) -> Delivery {
        match connection.sender.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Outbound queue full for connection {}, dropping message",
                    connection.id
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} is closed", connection.id);
                Delivery::Closed
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Cell, CellKey};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    fn open(
        registry: &mut ConnectionRegistry,
        id: u64,
        capacity: usize,
    ) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(capacity);
        assert!(registry.register(Connection::new(ConnectionId(id), test_addr(), tx)));
        rx
    }

    fn update() -> ServerMessage {
        ServerMessage::CellUpdated(Cell::claimed(CellKey::new(1, 1), "x", "#010203", 5))
    }

    #[test]
    fn test_register_and_unregister() {
        let mut registry = ConnectionRegistry::new();
        let _rx = open(&mut registry, 1, 4);

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(ConnectionId(1)));

        assert!(registry.unregister(ConnectionId(1)).is_some());
        assert!(registry.is_empty());
        assert!(registry.unregister(ConnectionId(1)).is_none());
    }

    #[test]
    fn test_duplicate_register_rejected() {
        let mut registry = ConnectionRegistry::new();
        let _rx = open(&mut registry, 1, 4);

        let (tx, _rx2) = mpsc::channel(4);
        assert!(!registry.register(Connection::new(ConnectionId(1), test_addr(), tx)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_for_each_in_registration_order() {
        let mut registry = ConnectionRegistry::new();
        let _a = open(&mut registry, 3, 4);
        let _b = open(&mut registry, 1, 4);
        let _c = open(&mut registry, 2, 4);

        let mut seen = Vec::new();
        registry.for_each(|connection| seen.push(connection.id.0));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_broadcast_delivers_identical_frame() {
        let mut registry = ConnectionRegistry::new();
        let mut a = open(&mut registry, 1, 4);
        let mut b = open(&mut registry, 2, 4);

        let report = registry.broadcast(&update()).unwrap();
        assert_eq!(report.queued, 2);

        let frame_a = a.try_recv().unwrap();
        let frame_b = b.try_recv().unwrap();
        assert_eq!(frame_a, frame_b);

        let text = frame_a.into_text().unwrap();
        assert_eq!(ServerMessage::decode(text.as_str()).unwrap(), update());
    }

    #[test]
    fn test_closed_receiver_unregistered_without_stopping_fanout() {
        let mut registry = ConnectionRegistry::new();
        let closed = open(&mut registry, 1, 4);
        let mut alive = open(&mut registry, 2, 4);
        drop(closed);

        let report = registry.broadcast(&update()).unwrap();
        assert_eq!(report.queued, 1);
        assert_eq!(report.closed, 1);
        assert!(!registry.contains(ConnectionId(1)));
        assert!(alive.try_recv().is_ok());
    }

    #[test]
    fn test_full_queue_drops_only_for_slow_receiver() {
        let mut registry = ConnectionRegistry::new();
        let mut slow = open(&mut registry, 1, 1);
        let mut fast = open(&mut registry, 2, 8);

        registry.broadcast(&update()).unwrap();
        let report = registry.broadcast(&update()).unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(report.queued, 1);

        assert!(registry.contains(ConnectionId(1)));
        assert!(slow.try_recv().is_ok());
        assert!(slow.try_recv().is_err());
        assert!(fast.try_recv().is_ok());
        assert!(fast.try_recv().is_ok());
    }

    #[test]
    fn test_send_to_single_connection() {
        let mut registry = ConnectionRegistry::new();
        let mut a = open(&mut registry, 1, 4);
        let mut b = open(&mut registry, 2, 4);

        let outcome = registry.send_to(ConnectionId(1), &update()).unwrap();
        assert_eq!(outcome, Delivery::Queued);
        assert!(a.try_recv().is_ok());
        assert!(b.try_recv().is_err());

        let missing = registry.send_to(ConnectionId(9), &update()).unwrap();
        assert_eq!(missing, Delivery::UnknownConnection);
    }

    #[test]
    fn test_send_to_closed_connection_unregisters() {
        let mut registry = ConnectionRegistry::new();
        let rx = open(&mut registry, 1, 4);
        drop(rx);

        let outcome = registry.send_to(ConnectionId(1), &update()).unwrap();
        assert_eq!(outcome, Delivery::Closed);
        assert!(registry.is_empty());
    }
}
