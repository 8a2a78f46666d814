//! # Snake Arena Client Library
//!
//! This library provides a headless participant for the multiplayer snake
//! arena. The client owns the simulation of its own snake: it advances the
//! snake every frame, reports the result to the server, and applies whatever
//! the server decides about deaths, apples and spawn protection.
//!
//! ## Architecture Overview
//!
//! ### Local Simulation
//! The local snake moves on the client's frame clock using the same simulator
//! the server uses for its checks. Turns take effect immediately; the server
//! only ever sees the resulting state.
//!
//! ### Server Authority
//! The client never decides that it died. A private respawn signal from the
//! server resets the snake to the spawn point, after which the client asks for
//! a respawn so the server reopens its protection window.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Local snake, remote snakes by nickname and the current apples, plus the
//! rules for applying each server packet.
//!
//! ### Input Module (`input`)
//! Key names, swipe deltas and stdin commands mapped to directions, a small
//! buffer for turns made too close to the previous corner, and the report
//! sequence counter.
//!
//! ### Network Module (`network`)
//! UDP socket, handshake, frame loop and stdin reader.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", "viper", 60).await?;
//!
//!     // Connects, then reports once per frame until `quit` is typed or the
//!     // server closes the session
//!     client.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
