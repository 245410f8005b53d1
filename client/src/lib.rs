//! # Novaglide Client Library
//!
//! A headless client for the Novaglide server. It speaks the same framed,
//! versioned protocol a graphical front end would, but plays on its own with
//! a simple ball-chasing policy. It is used as a load generator and a smoke
//! test for the server.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! [`network::NetworkClient`] wraps one TCP connection. The protocol is pure
//! request/reply: each call writes one frame and reads exactly one back.
//! Account queries (`elo`, `winrate`, `challengers`, `history`) map onto a
//! single request each, and [`network::NetworkClient::play_match`] drives a
//! whole match by polling at a fixed rate.
//!
//! ### Game Module (`game`)
//! [`game::ClientGameState`] is the client's view of its match, rebuilt from
//! every `GameState` reply. The server is authoritative: nothing is predicted
//! or simulated locally.
//!
//! ### Input Module (`input`)
//! [`input::InputManager`] turns the latest snapshot into keys and a cursor
//! position. It walks behind the ball, dashes into it when close and hooks
//! toward it when far away.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGameState;
//! use client::input::InputManager;
//! use client::network::NetworkClient;
//! use shared::ControlScheme;
//!
//! # async fn demo() -> Result<(), client::error::ClientError> {
//! let mut network = NetworkClient::connect("127.0.0.1:5555").await?;
//! network.log_in("alice", "secret").await?;
//!
//! let mut game = ClientGameState::new();
//! let mut input = InputManager::new(ControlScheme::Wasd);
//! let stats = network.play_match(&mut game, &mut input, 60).await?;
//! println!("Winner: {:?}", stats.winner);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod game;
pub mod input;
pub mod network;
