//! Local derived copy of the grid
//!
//! The client applies its own claims immediately and reconciles with what
//! the server pushes. Updates use the same timestamp ordering as the server,
//! so once every broadcast has arrived the local grid matches the server's
//! even if an optimistic edit briefly disagreed.

use log::debug;
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{color_for, Cell, CellKey, ClientMessage, IdentityConfirmation, ServerMessage};
use std::collections::HashMap;

/// The identity this client claims cells with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub id: String,
    pub color: String,
    /// False until the server has confirmed the id
    pub confirmed: bool,
}

impl LocalIdentity {
    /// Unconfirmed identity used until the server answers
    pub fn provisional(id: &str) -> Self {
        Self {
            id: id.to_string(),
            color: color_for(id),
            confirmed: false,
        }
    }

    /// Random provisional identity for a participant with nothing stored
    pub fn generate() -> Self {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        Self::provisional(&id)
    }
}

pub struct ClientGrid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    identity: LocalIdentity,
}

impl ClientGrid {
    pub fn new(rows: usize, cols: usize, identity: LocalIdentity) -> Self {
        let cells = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| Cell::unclaimed(CellKey::new(row, col))))
            .collect();

        Self {
            rows,
            cols,
            cells,
            identity,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        CellKey::new(row, col)
            .index(self.rows, self.cols)
            .map(|index| &self.cells[index])
    }

    /// Claims a cell locally before the server has seen it
    ///
    /// Returns the message to send, or `None` if the position is off the grid.
    pub fn capture(&mut self, row: usize, col: usize, now: u64) -> Option<ClientMessage> {
        let key = CellKey::new(row, col);
        let index = key.index(self.rows, self.cols)?;

        self.cells[index] = Cell::claimed(key, &self.identity.id, &self.identity.color, now);
        Some(ClientMessage::CaptureCell {
            cell_id: key.to_string(),
        })
    }

    /// Replaces the cells present in a snapshot; absent cells keep their value
    pub fn apply_snapshot(&mut self, cells: Vec<Cell>) -> usize {
        let mut applied = 0;
        for cell in cells {
            match self.index_of(&cell) {
                Some(index) => {
                    self.cells[index] = cell;
                    applied += 1;
                }
                None => debug!("Skipping snapshot entry for unknown cell {:?}", cell.id),
            }
        }
        applied
    }

    /// Applies a pushed update unless it is older than what is held locally
    pub fn apply_update(&mut self, cell: Cell) -> bool {
        let Some(index) = self.index_of(&cell) else {
            debug!("Skipping update for unknown cell {:?}", cell.id);
            return false;
        };

        if cell.timestamp < self.cells[index].timestamp {
            return false;
        }
        self.cells[index] = cell;
        true
    }

    /// Adopts the server-confirmed identity in place of the provisional one
    pub fn confirm_identity(&mut self, confirmation: IdentityConfirmation) {
        self.identity = LocalIdentity {
            id: confirmation.id,
            color: confirmation.color,
            confirmed: true,
        };
    }

    pub fn apply_server_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Hello(confirmation) => self.confirm_identity(confirmation),
            ServerMessage::GridState(cells) => {
                self.apply_snapshot(cells);
            }
            ServerMessage::CellUpdated(cell) => {
                self.apply_update(cell);
            }
            ServerMessage::Error(payload) => debug!("Server reported error: {}", payload),
        }
    }

    /// Number of cells held by each owner
    pub fn scores(&self) -> HashMap<String, usize> {
        let mut scores = HashMap::new();
        for owner in self.cells.iter().filter_map(|cell| cell.owner_id.as_ref()) {
            *scores.entry(owner.clone()).or_insert(0) += 1;
        }
        scores
    }

    pub fn owned_by_me(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.owner_id.as_deref() == Some(self.identity.id.as_str()))
            .count()
    }

    pub fn claimed_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_claimed()).count()
    }

    fn index_of(&self, cell: &Cell) -> Option<usize> {
        cell.key().ok()?.index(self.rows, self.cols)
    }
}
