//! # Presence Server Library
//!
//! This library provides the authoritative server for realtime presence
//! synchronization. It tracks every connected participant with a display
//! name, a color and a position, and pushes the complete participant list to
//! every connected client whenever anything changes.
//!
//! ## Core Responsibilities
//!
//! ### Connection Lifecycle
//! Each WebSocket connection gets an id that is never reused while the
//! process runs. A connection starts anonymous and becomes visible to other
//! clients once it registers a name with `setName`. Closing the socket is
//! the only way to leave; the entry is removed as soon as the disconnect is
//! processed.
//!
//! ### Position Updates
//! `move` events overwrite the stored position of a named participant.
//! There is no versioning or merging: the last event received wins. Moves
//! from anonymous connections are dropped.
//!
//! ### Full-State Broadcast
//! Every accepted change produces one `userList` event carrying the whole
//! participant set, sent to every connection including the one that caused
//! the change. Clients replace their local view wholesale.
//!
//! ## Architecture Design
//!
//! ### Single Dispatcher
//! Connection tasks only decode frames. All state lives in one
//! [`network::Dispatcher`] that consumes events from a channel in arrival
//! order, so the registry needs no locks and events from one connection are
//! applied in the order they were sent.
//!
//! ### Fire-and-Forget Writes
//! Outbound frames go through an unbounded queue per connection. A failed
//! send to one client is logged and never interrupts delivery to others.
//!
//! ## Module Organization
//!
//! - `registry`: connection records and the participant snapshot
//! - `handler`: event handlers returning an [`handler::Effect`]
//! - `broadcast`: per-session queues and snapshot fan-out
//! - `network`: WebSocket listener, connection tasks and the dispatcher
//! - `config`: [`config::ServerConfig`]
//! - `error`: [`error::SyncError`]
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod handler;
pub mod network;
pub mod registry;
