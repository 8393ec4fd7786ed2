use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const ROWS: usize = 20;
pub const COLS: usize = 30;
pub const EMPTY_COLOR: &str = "#0f172a";

/// Hue increment in degrees; consecutive hash values land far apart on the wheel.
pub const GOLDEN_ANGLE_DEG: f64 = 137.507_764;
pub const COLOR_SATURATION: f64 = 0.70;
pub const COLOR_LIGHTNESS: f64 = 0.55;

#[derive(Debug, Error)]
pub enum CellKeyError {
    #[error("invalid cell key {0:?}, expected \"row-col\"")]
    Format(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown message type {0:?}")]
    UnknownType(String),
}

/// Position of a cell in the grid, rendered on the wire as `"row-col"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub row: usize,
    pub col: usize,
}

impl CellKey {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn in_bounds(&self, rows: usize, cols: usize) -> bool {
        self.row < rows && self.col < cols
    }

    /// Row-major index into a `rows x cols` grid, if the key is in range.
    pub fn index(&self, rows: usize, cols: usize) -> Option<usize> {
        if self.in_bounds(rows, cols) {
            Some(self.row * cols + self.col)
        } else {
            None
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row, self.col)
    }
}

impl FromStr for CellKey {
    type Err = CellKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (row, col) = s
            .split_once('-')
            .ok_or_else(|| CellKeyError::Format(s.to_string()))?;
        let row = row
            .parse()
            .map_err(|_| CellKeyError::Format(s.to_string()))?;
        let col = col
            .parse()
            .map_err(|_| CellKeyError::Format(s.to_string()))?;
        Ok(Self { row, col })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub id: String,
    pub owner_id: Option<String>,
    pub color: String,
    pub timestamp: u64,
}

impl Cell {
    pub fn unclaimed(key: CellKey) -> Self {
        Self {
            id: key.to_string(),
            owner_id: None,
            color: EMPTY_COLOR.to_string(),
            timestamp: 0,
        }
    }

    pub fn claimed(key: CellKey, owner_id: &str, color: &str, timestamp: u64) -> Self {
        Self {
            id: key.to_string(),
            owner_id: Some(owner_id.to_string()),
            color: color.to_string(),
            timestamp,
        }
    }

    pub fn is_claimed(&self) -> bool {
        self.owner_id.is_some()
    }

    pub fn key(&self) -> Result<CellKey, CellKeyError> {
        self.id.parse()
    }
}

/// Last-write-wins: only a strictly newer timestamp replaces the stored cell.
/// Equal timestamps keep the incumbent.
pub fn supersedes(candidate: &Cell, stored: &Cell) -> bool {
    candidate.timestamp > stored.timestamp
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct IdentityConfirmation {
    pub id: String,
    pub color: String,
}

/// Messages sent from a participant to the server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "HELLO")]
    Hello {
        #[serde(rename = "userId", default)]
        user_id: Option<String>,
    },
    #[serde(rename = "CAPTURE_CELL")]
    CaptureCell {
        #[serde(rename = "cellId")]
        cell_id: String,
    },
}

impl ClientMessage {
    pub const TYPES: [&'static str; 2] = ["HELLO", "CAPTURE_CELL"];

    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        decode_tagged(text, &Self::TYPES)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Messages sent from the server to participants
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "HELLO")]
    Hello(IdentityConfirmation),
    #[serde(rename = "GRID_STATE")]
    GridState(Vec<Cell>),
    #[serde(rename = "CELL_UPDATED")]
    CellUpdated(Cell),
    /// Reserved; the server never sends it.
    #[serde(rename = "ERROR")]
    Error(serde_json::Value),
}

impl ServerMessage {
    pub const TYPES: [&'static str; 4] = ["HELLO", "GRID_STATE", "CELL_UPDATED", "ERROR"];

    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        decode_tagged(text, &Self::TYPES)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn decode_tagged<T: DeserializeOwned>(text: &str, known: &[&str]) -> Result<T, DecodeError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if let Some(kind) = value.get("type").and_then(|kind| kind.as_str()) {
        if !known.contains(&kind) {
            return Err(DecodeError::UnknownType(kind.to_string()));
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// 32-bit FNV-1a over every byte of the input.
pub fn fnv1a(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

pub fn hue_for(id: &str) -> f64 {
    (fnv1a(id) as f64 * GOLDEN_ANGLE_DEG).rem_euclid(360.0)
}

/// Display color for an identity. Pure, so a returning participant always
/// recovers the same color.
pub fn color_for(id: &str) -> String {
    hsl_to_hex(hue_for(id), COLOR_SATURATION, COLOR_LIGHTNESS)
}

pub fn hsl_to_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue.rem_euclid(360.0) / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());

    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };

    let m = lightness - chroma / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

// Current wall-clock time in milliseconds
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
