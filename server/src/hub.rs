//! Owner of all shared server state
//!
//! The hub holds the grid store and the connection registry (which in turn
//! holds each connection's session). It is driven one [`HubEvent`] at a time
//! by the network event loop, which makes every grid `apply` and every
//! register/unregister atomic with respect to the others.

use crate::grid::GridStore;
use crate::registry::{Connection, ConnectionId, ConnectionRegistry, Delivery};
use crate::session::{IgnoreReason, SessionAction};
use log::{debug, error, info};
use shared::{Cell, ClientMessage, ServerMessage};
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Events sent from connection tasks to the event loop
#[derive(Debug)]
pub enum HubEvent {
    Connected {
        id: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<Message>,
    },
    Message {
        id: ConnectionId,
        message: ClientMessage,
    },
    Disconnected {
        id: ConnectionId,
    },
}

/// Result of handling one client message, mostly useful for tests and logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Identified { id: String },
    Accepted(Cell),
    Rejected,
    Ignored,
}

pub struct Hub {
    grid: GridStore,
    registry: ConnectionRegistry,
}

impl Hub {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            grid: GridStore::new(rows, cols),
            registry: ConnectionRegistry::new(),
        }
    }

    pub fn grid(&self) -> &GridStore {
        &self.grid
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Applies one event; `now` is the wall clock in milliseconds
    pub fn handle_event(&mut self, event: HubEvent, now: u64) {
        match event {
            HubEvent::Connected { id, addr, sender } => {
                self.connect(id, addr, sender);
            }
            HubEvent::Message { id, message } => {
                self.handle_message(id, message, now);
            }
            HubEvent::Disconnected { id } => {
                self.disconnect(id);
            }
        }
    }

    pub fn connect(&mut self, id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<Message>) {
        if !self.registry.register(Connection::new(id, addr, sender)) {
            error!("Connection {} registered twice", id);
        }
    }

    pub fn disconnect(&mut self, id: ConnectionId) {
        if let Some(connection) = self.registry.unregister(id) {
            if let Some(identity) = connection.session.identity() {
                debug!("Participant {}... left", identity.short_id());
            }
        }
    }

    pub fn handle_message(&mut self, id: ConnectionId, message: ClientMessage, now: u64) -> Outcome {
        // Messages from a connection that is already gone are not processed.
        let action = match self.registry.get_mut(id) {
            Some(connection) => connection.session.handle(message),
            None => return Outcome::Ignored,
        };

        match action {
            SessionAction::Identified(identity) => {
                info!(
                    "Connection {} identified as {}...",
                    id,
                    identity.short_id()
                );
                let snapshot = ServerMessage::GridState(self.grid.get_all());
                self.send(id, &ServerMessage::Hello(identity.confirmation()));
                self.send(id, &snapshot);
                Outcome::Identified { id: identity.id }
            }
            SessionAction::Claim { key, owner } => {
                let candidate = Cell::claimed(key, &owner.id, &owner.color, now);
                if !self.grid.apply(key, candidate.clone()) {
                    return Outcome::Rejected;
                }

                info!("Cell {} captured by {}...", key, owner.short_id());
                if let Err(e) = self
                    .registry
                    .broadcast(&ServerMessage::CellUpdated(candidate.clone()))
                {
                    error!("Failed to broadcast update for {}: {}", key, e);
                }
                Outcome::Accepted(candidate)
            }
            SessionAction::Ignore(IgnoreReason::NotIdentified) => {
                debug!("Ignoring claim from unidentified connection {}", id);
                Outcome::Ignored
            }
            SessionAction::Ignore(reason) => {
                debug!("Ignoring message from connection {}: {:?}", id, reason);
                Outcome::Ignored
            }
        }
    }

    fn send(&mut self, id: ConnectionId, message: &ServerMessage) {
        match self.registry.send_to(id, message) {
            Ok(Delivery::Queued) => {}
            Ok(outcome) => debug!("Message to connection {} not queued: {:?}", id, outcome),
            Err(e) => error!("Failed to send to connection {}: {}", id, e),
        }
    }
}
