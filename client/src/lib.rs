//! # Claim Grid Client Library
//!
//! Client-side counterpart of the claim grid server. It keeps a local copy of
//! the grid, applies the participant's own claims immediately, and merges the
//! server's pushed state into that copy.
//!
//! ## Architecture Overview
//!
//! ### Optimistic Claims
//! A claim is written into the local grid before it is sent, stamped with
//! the local identity, color and clock. The participant sees the result at
//! once instead of after a round trip.
//!
//! ### Reconciliation
//! The server answers identification with a snapshot of every claimed cell
//! and then pushes each accepted claim to everyone. Snapshot entries replace
//! local cells outright; pushed updates apply only if they are not older
//! than the local cell. A claim that lost a race is therefore overwritten by
//! the winner's update and the grids agree again.
//!
//! ### Identity
//! Until the server confirms an identity the client uses a provisional one.
//! The confirmed id can be saved to disk and replayed on the next connect,
//! which recovers the same color.
//!
//! ## Module Organization
//!
//! - `reconciler`: the local grid and its merge rules
//! - `identity_store`: persistence of the confirmed id
//! - `network`: WebSocket session driving the reconciler
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::{COLS, ROWS};
//!
//! # async fn demo() -> Result<(), client::network::ClientError> {
//! let mut client = Client::connect("ws://127.0.0.1:8080", ROWS, COLS, None).await?;
//! client.capture(2, 3).await?;
//!
//! while let Some(message) = client.next_message().await? {
//!     println!("{:?}", message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod identity_store;
pub mod network;
pub mod reconciler;
