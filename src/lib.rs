//! # Memory Scramble Server Library
//!
//! This library implements a multiplayer server for the card-matching game
//! Memory/Concentration. Many players share a single grid of face-down
//! cards through a request/response interface; the server enforces the
//! game's flip rules, serializes conflicting accesses to individual cards
//! fairly, and pushes state changes to observers promptly.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! The [`board::Board`] is the single source of truth for the game: the
//! grid of cards, which player holds what, and whose matched pairs await
//! removal. All rule decisions are made here; the transport only renders
//! results.
//!
//! ### Concurrency Control
//! Every mutation happens under one exclusive board mutex that is never
//! held across a suspension point. Players blocked on a contended card wait
//! in per-cell FIFO queues, so access to a popular card is granted in
//! arrival order. A versioned change channel wakes long-poll watchers the
//! moment anything observable happens.
//!
//! ### Turn Enforcement
//! A turn is two flips. Matched pairs stay under the player's control until
//! their next turn begins, at which point they are removed; mismatched
//! picks are relinquished face up and flipped back down at the same
//! boundary if nobody has claimed them since.
//!
//! ## Module Organization
//!
//! - [`board`]: the shared board ADT and its synchronization (the core).
//! - [`card`] / [`player`]: cell state machine and per-player turn context.
//! - [`render`]: pure textual snapshots from one player's perspective.
//! - [`parser`]: board-file format handling.
//! - [`network`]: the HTTP/1.1 long-poll transport.
//! - [`config`]: argument / environment / default resolution.
//! - [`error`]: the failure taxonomy shared with the transport.
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use memory_scramble::{Board, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let board = Arc::new(Board::load("boards/perfect.txt").await?);
//!     let server = Server::bind("localhost", 8080, Arc::clone(&board)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod board;
pub mod card;
pub mod config;
pub mod error;
pub mod network;
pub mod parser;
pub mod player;
pub mod render;

pub use board::{Board, Pos};
pub use config::Config;
pub use error::BoardError;
pub use network::Server;
pub use parser::{BoardTemplate, ParseError};
