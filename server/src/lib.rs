//! # Claim Grid Server Library
//!
//! Authoritative server for a shared grid whose cells are claimed by many
//! concurrent participants. It owns the canonical grid, identifies each
//! connection, resolves racing claims and fans accepted changes out to every
//! connected participant over WebSockets.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Grid
//! The [`grid::GridStore`] is the single source of truth. Claims replace a
//! cell only when their timestamp is strictly newer than the stored one
//! (last-write-wins, ties keep the incumbent).
//!
//! ### Connection Lifecycle
//! Every connection starts unidentified. The first `HELLO` resolves an
//! identity (fresh UUID or the participant's previous id), answers with the
//! identity and a snapshot of all claimed cells, and unlocks claiming.
//!
//! ### Fan-out
//! Accepted claims are serialized once and queued to every registered
//! connection. Each connection has its own bounded outbound queue so a slow
//! receiver only loses its own messages.
//!
//! ## Architecture Design
//!
//! ### Single Owner Event Loop
//! Per-connection tasks decode frames and forward [`hub::HubEvent`]s over a
//! channel to one event loop that owns the [`hub::Hub`]. All mutation of the
//! grid and the registry happens there, one event at a time, so no locks
//! guard shared state and a connection's own messages keep their order.
//!
//! ## Module Organization
//!
//! - `config`: command-line and environment configuration
//! - `error`: server error taxonomy
//! - `grid`: grid store and conflict rule application
//! - `identity`: identity resolution and color derivation
//! - `registry`: connection registry and broadcast fan-out
//! - `session`: per-connection protocol state machine
//! - `hub`: owner of grid, registry and sessions
//! - `network`: WebSocket listener, connection tasks and event loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = Server::bind(&config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod grid;
pub mod hub;
pub mod identity;
pub mod network;
pub mod registry;
pub mod session;
