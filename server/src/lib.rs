//! # Novaglide Server Library
//!
//! Authoritative server for Novaglide, a two-player arcade sport where each
//! player steers a disc, grapples toward the court walls with a hook and
//! bursts across the court with a dash to knock a ball into the opposing goal.
//!
//! ## Architecture
//!
//! ### One Task per Connection
//! Every TCP connection is served by a [`session::Session`]. Clients poll: each
//! request frame gets exactly one reply frame. Account queries (login, rating,
//! leaderboard, win rate, history) are answered from [`storage::Storage`].
//!
//! ### One Task per Match
//! When two queued clients are paired, a [`game::Match`] is moved into its own
//! task ([`runner`]). The task ticks the match at a fixed rate and is the only
//! code that ever touches it. Sessions forward inputs over a bounded channel
//! and read the most recent snapshot from a watch channel, so a slow client
//! never stalls the simulation.
//!
//! ### Lobby
//! [`lobby::Lobby`] holds the logged-in accounts, the solo queue and the
//! mapping from clients to their match and side. It lives inside the shared
//! [`network::ServerContext`] together with the configuration, storage and
//! rating system.
//!
//! ## Match Lifecycle
//!
//! 1. A client sends `QueuedSolo`. If nobody is waiting it is queued,
//!    otherwise it is paired with a random waiting client and plays on the left.
//! 2. The pairing client gets its first `GameState` right away; the waiting
//!    client gets its first one in reply to its next request.
//! 3. `InGame` requests carry the client's keys and cursor. The latest input
//!    is held and applied on every tick.
//! 4. When the match ends each side receives `EndGameState` once. After both
//!    have it, the game is recorded and ratings and win rates are updated.
//! 5. A client that disconnects mid-match forfeits.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::rating::DefaultElo;
//! use server::storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(
//!         ServerConfig::default(),
//!         Arc::new(InMemoryStore::new()),
//!         Arc::new(DefaultElo),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod lobby;
pub mod network;
pub mod rating;
pub mod runner;
pub mod session;
pub mod storage;
