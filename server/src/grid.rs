//! Authoritative grid state
//!
//! The grid is a dense, fixed-size row-major array. Cells are never removed,
//! only replaced whole when a claim wins the last-write-wins comparison.

use log::debug;
use shared::{supersedes, Cell, CellKey};

/// Single source of truth for every cell of the grid
#[derive(Debug, Clone)]
pub struct GridStore {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    claimed: usize,
}

impl GridStore {
    /// Creates a grid with every cell unclaimed
    pub fn new(rows: usize, cols: usize) -> Self {
        let cells = (0..rows)
            .flat_map(|row| (0..cols).map(move |col| Cell::unclaimed(CellKey::new(row, col))))
            .collect();

        Self {
            rows,
            cols,
            cells,
            claimed: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, key: CellKey) -> Option<&Cell> {
        key.index(self.rows, self.cols).map(|index| &self.cells[index])
    }

    /// Snapshot of every claimed cell in row-major order
    ///
    /// Unclaimed cells are left out; clients keep their local default for
    /// anything absent from the snapshot.
    pub fn get_all(&self) -> Vec<Cell> {
        self.cells
            .iter()
            .filter(|cell| cell.is_claimed())
            .cloned()
            .collect()
    }

    /// Offers a candidate for `key`, replacing the stored cell if it wins
    ///
    /// Returns false for keys outside the grid and for candidates that are
    /// not strictly newer than the stored cell. The replacement is the whole
    /// candidate; fields are never merged.
    pub fn apply(&mut self, key: CellKey, mut candidate: Cell) -> bool {
        let Some(index) = key.index(self.rows, self.cols) else {
            debug!("Rejected claim for out-of-range cell {}", key);
            return false;
        };

        let stored = &mut self.cells[index];
        if !supersedes(&candidate, stored) {
            debug!(
                "Rejected stale claim for {} ({} <= {})",
                key, candidate.timestamp, stored.timestamp
            );
            return false;
        }

        candidate.id = key.to_string();
        match (stored.is_claimed(), candidate.is_claimed()) {
            (false, true) => self.claimed += 1,
            (true, false) => self.claimed -= 1,
            _ => {}
        }
        *stored = candidate;
        true
    }

    pub fn claimed_count(&self) -> usize {
        self.claimed
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{COLS, ROWS};

    fn claim(key: CellKey, owner: &str, timestamp: u64) -> Cell {
        Cell::claimed(key, owner, "#123456", timestamp)
    }

    #[test]
    fn test_new_grid_is_unclaimed() {
        let grid = GridStore::new(ROWS, COLS);
        assert_eq!(grid.len(), ROWS * COLS);
        assert!(!grid.is_empty());
        assert_eq!((grid.rows(), grid.cols()), (ROWS, COLS));
        assert_eq!(grid.claimed_count(), 0);
        assert!(grid.get_all().is_empty());

        let corner = grid.get(CellKey::new(ROWS - 1, COLS - 1)).unwrap();
        assert_eq!(corner.id, format!("{}-{}", ROWS - 1, COLS - 1));
        assert!(!corner.is_claimed());
    }

    #[test]
    fn test_apply_claims_unclaimed_cell() {
        let mut grid = GridStore::new(ROWS, COLS);
        let key = CellKey::new(2, 3);

        assert!(grid.apply(key, claim(key, "x", 10)));
        assert_eq!(grid.get(key).unwrap().owner_id.as_deref(), Some("x"));
        assert_eq!(grid.claimed_count(), 1);
        assert_eq!(grid.get_all().len(), 1);
    }

    #[test]
    fn test_newer_claim_replaces_older() {
        let mut grid = GridStore::new(ROWS, COLS);
        let key = CellKey::new(2, 3);

        assert!(grid.apply(key, claim(key, "x", 10)));
        assert!(grid.apply(key, claim(key, "y", 11)));

        let cell = grid.get(key).unwrap();
        assert_eq!(cell.owner_id.as_deref(), Some("y"));
        assert_eq!(cell.timestamp, 11);
        assert_eq!(grid.claimed_count(), 1);
    }

    #[test]
    fn test_tie_keeps_incumbent() {
        let mut grid = GridStore::new(ROWS, COLS);
        let key = CellKey::new(0, 0);

        assert!(grid.apply(key, claim(key, "x", 10)));
        assert!(!grid.apply(key, claim(key, "y", 10)));
        assert_eq!(grid.get(key).unwrap().owner_id.as_deref(), Some("x"));
    }

    #[test]
    fn test_older_claim_rejected() {
        let mut grid = GridStore::new(ROWS, COLS);
        let key = CellKey::new(0, 0);

        assert!(grid.apply(key, claim(key, "x", 10)));
        assert!(!grid.apply(key, claim(key, "y", 9)));
        assert_eq!(grid.get(key).unwrap().timestamp, 10);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut grid = GridStore::new(ROWS, COLS);
        let key = CellKey::new(99, 99);

        assert!(!grid.apply(key, claim(key, "x", 10)));
        assert_eq!(grid.claimed_count(), 0);
    }

    #[test]
    fn test_stored_id_follows_key() {
        let mut grid = GridStore::new(ROWS, COLS);
        let key = CellKey::new(1, 1);
        let mut candidate = claim(key, "x", 5);
        candidate.id = "01-01".to_string();

        assert!(grid.apply(key, candidate));
        assert_eq!(grid.get(key).unwrap().id, "1-1");
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let mut grid = GridStore::new(ROWS, COLS);
        let key = CellKey::new(4, 4);
        let mut highest = 0;

        for (i, timestamp) in [5u64, 3, 9, 9, 1, 12, 11, 20].into_iter().enumerate() {
            grid.apply(key, claim(key, &format!("p{}", i), timestamp));
            let current = grid.get(key).unwrap().timestamp;
            assert!(current >= highest);
            highest = current;
        }

        assert_eq!(highest, 20);
        assert_eq!(grid.get(key).unwrap().owner_id.as_deref(), Some("p7"));
    }

    #[test]
    fn test_convergence_independent_of_arrival_order() {
        let key = CellKey::new(2, 3);
        let claims = [("a", 30u64), ("b", 10), ("c", 50), ("d", 20)];

        let mut forward = GridStore::new(ROWS, COLS);
        for (owner, ts) in claims {
            forward.apply(key, claim(key, owner, ts));
        }

        let mut backward = GridStore::new(ROWS, COLS);
        for (owner, ts) in claims.into_iter().rev() {
            backward.apply(key, claim(key, owner, ts));
        }

        assert_eq!(forward.get(key), backward.get(key));
        assert_eq!(forward.get(key).unwrap().owner_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_snapshot_is_row_major() {
        let mut grid = GridStore::new(ROWS, COLS);
        for key in [CellKey::new(5, 1), CellKey::new(0, 7), CellKey::new(5, 0)] {
            grid.apply(key, claim(key, "x", 1));
        }

        let ids: Vec<String> = grid.get_all().into_iter().map(|cell| cell.id).collect();
        assert_eq!(ids, vec!["0-7", "5-0", "5-1"]);
    }
}
