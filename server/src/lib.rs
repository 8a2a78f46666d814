//! # Snake Arena Server Library
//!
//! This library provides the authoritative referee for the multiplayer snake
//! arena. Clients simulate their own snake and report its state; the server
//! decides who died, who ate which apple, and when spawn protection ends, then
//! relays the outcome to everyone connected.
//!
//! ## Core Responsibilities
//!
//! ### Arbitration
//! Every state report is checked against the other snakes, the snake itself
//! and the arena walls. A head that runs into another body kills its owner
//! unless the owner is protected, and a head-to-body pair in both directions
//! kills both. Two protected snakes never interact.
//!
//! ### Apples
//! Apples live on grid cells strictly inside the walls. An eaten apple is moved
//! to a fresh cell under a new id before the next report is looked at, so no
//! two players can eat the same apple.
//!
//! ### Session Lifecycle
//! Handles the complete lifecycle of a participant:
//! - Admission with unique, bounded nicknames and a capacity limit
//! - Sequence tracking so late datagrams never resurrect an old position
//! - Spawn-protection timers that are cancelled on respawn and disconnect
//! - Idle timeout and cleanup
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All packets and timer expiries are funnelled through one channel into the
//! server loop, which owns the session table and the apple registry outright.
//! Each handler runs to completion before the next message is read, so no
//! locking is needed around game state.
//!
//! ### Effects Instead of I/O
//! Referee handlers return a list of effects (packets to send, timers to arm)
//! rather than touching the socket. The network layer resolves recipients to
//! addresses and performs them, which keeps the rules testable without a
//! socket.
//!
//! ## Module Organization
//!
//! ### Apples Module (`apples`)
//! Live apple positions, ids and random replacement.
//!
//! ### Config Module (`config`)
//! Capacity, apple count, protection length and idle timeout.
//!
//! ### Network Module (`network`)
//! UDP socket, receiver and sender tasks, protection timers and the main loop.
//!
//! ### Referee Module (`referee`)
//! One handler per session input, returning [`referee::Effect`]s.
//!
//! ### Sessions Module (`sessions`)
//! Per-participant state: address, nickname, snake, sequence and timer.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = ServerConfig {
//!         apple_count: 3,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Binds the socket; `run` then serves until a shutdown message arrives
//!     let mut server = Server::new("127.0.0.1:8080", config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod apples;
pub mod config;
pub mod network;
pub mod referee;
pub mod sessions;
