//! Per-connection protocol state machine
//!
//! ```text
//! Unidentified --HELLO--> Identified (until close)
//! ```
//!
//! All transition logic lives in [`Session::handle`]; callers only carry out
//! the returned [`SessionAction`].

use crate::identity::{self, Identity};
use shared::{CellKey, ClientMessage};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Unidentified,
    Identified(Identity),
}

/// Why a message produced no effect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotIdentified,
    AlreadyIdentified,
    InvalidCellKey(String),
}

/// What the caller must do after a message has been handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Just identified: confirm the identity and send a snapshot to this connection.
    Identified(Identity),
    /// Offer a claim on `key` on behalf of `owner`.
    Claim { key: CellKey, owner: Identity },
    Ignore(IgnoreReason),
}

impl Session {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Session::Unidentified => None,
            Session::Identified(identity) => Some(identity),
        }
    }

    pub fn is_identified(&self) -> bool {
        self.identity().is_some()
    }

    pub fn handle(&mut self, message: ClientMessage) -> SessionAction {
        match message {
            ClientMessage::Hello { user_id } => {
                if self.is_identified() {
                    return SessionAction::Ignore(IgnoreReason::AlreadyIdentified);
                }
                let identity = identity::resolve(user_id);
                *self = Session::Identified(identity.clone());
                SessionAction::Identified(identity)
            }
            ClientMessage::CaptureCell { cell_id } => {
                let Some(owner) = self.identity() else {
                    return SessionAction::Ignore(IgnoreReason::NotIdentified);
                };
                match cell_id.parse::<CellKey>() {
                    Ok(key) => SessionAction::Claim {
                        key,
                        owner: owner.clone(),
                    },
                    Err(_) => SessionAction::Ignore(IgnoreReason::InvalidCellKey(cell_id)),
                }
            }
        }
    }
}
