//! Integration tests against a real TCP server
//!
//! Each test binds a server on an ephemeral port and drives it with one or
//! more `NetworkClient`s.

use client::error::ClientError;
use client::game::ClientGameState;
use client::input::InputManager;
use client::network::NetworkClient;
use server::config::ServerConfig;
use server::network::Server;
use server::rating::DefaultElo;
use server::storage::InMemoryStore;
use shared::framing::{read_frame, write_frame};
use shared::protocol::LoginOutcome;
use shared::{ControlScheme, Envelope, Packet, Sender, Side, STARTING_ELO};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

async fn start_server(config: ServerConfig) -> SocketAddr {
    let config = ServerConfig { port: 0, ..config };
    let server = Server::bind(config, Arc::new(InMemoryStore::new()), Arc::new(DefaultElo))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn logged_in(addr: SocketAddr, name: &str) -> NetworkClient {
    let mut client = NetworkClient::connect(&addr.to_string()).await.unwrap();
    client.log_in(name, "pw").await.unwrap();
    client
}

/// Repeats `QueuedSolo` until the client is placed in a match.
async fn wait_for_match(client: &mut NetworkClient) -> Side {
    for _ in 0..200 {
        match client.request(Packet::QueuedSolo).await.unwrap() {
            Packet::GameState { side, .. } => return side,
            Packet::WaitingForOpponent => sleep(Duration::from_millis(10)).await,
            other => panic!("Expected game state, got {:?}", other),
        }
    }
    panic!("never paired");
}

/// LOBBY AND ACCOUNT TESTS
mod account_tests {
    use super::*;

    #[tokio::test]
    async fn login_registers_then_recognises_user() {
        let addr = start_server(ServerConfig::default()).await;

        let mut first = NetworkClient::connect(&addr.to_string()).await.unwrap();
        assert_eq!(
            first.log_in("carol", "secret").await.unwrap(),
            LoginOutcome::RegisteredNewUser
        );
        assert!(first.client_id().is_some());
        drop(first);

        // The account is released once the first session has cleaned up.
        let mut outcome = None;
        for _ in 0..50 {
            let mut again = NetworkClient::connect(&addr.to_string()).await.unwrap();
            match again.log_in("carol", "secret").await {
                Ok(o) => {
                    outcome = Some(o);
                    break;
                }
                Err(ClientError::LoginRefused(LoginOutcome::AlreadyOnline)) => {
                    sleep(Duration::from_millis(20)).await
                }
                Err(e) => panic!("Unexpected login failure: {}", e),
            }
        }
        assert_eq!(outcome, Some(LoginOutcome::KnownUser));
    }

    #[tokio::test]
    async fn wrong_password_and_missing_credentials() {
        let addr = start_server(ServerConfig::default()).await;
        let _owner = logged_in(addr, "dave").await;

        let mut other = NetworkClient::connect(&addr.to_string()).await.unwrap();
        assert!(matches!(
            other.log_in("dave", "not-pw").await,
            Err(ClientError::LoginRefused(LoginOutcome::IncorrectPassword))
        ));
        assert!(matches!(
            other.log_in("", "").await,
            Err(ClientError::LoginRefused(LoginOutcome::MissingCredentials))
        ));
        assert_eq!(other.client_id(), None);
    }

    #[tokio::test]
    async fn account_queries_for_fresh_user() {
        let addr = start_server(ServerConfig::default()).await;
        let mut client = logged_in(addr, "erin").await;

        let (elo, top) = client.elo("erin").await.unwrap();
        assert_eq!(elo, Some(STARTING_ELO));
        assert_eq!(top, vec![STARTING_ELO]);

        assert_eq!(client.winrate("erin").await.unwrap(), Some(0.0));
        assert_eq!(client.winrate("nobody").await.unwrap(), None);

        let rows = client.challengers().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "erin");

        let (solo, duo) = client.history("erin").await.unwrap();
        assert!(solo.is_empty());
        assert!(duo.is_empty());
    }

    #[tokio::test]
    async fn queue_before_login_is_rejected() {
        let addr = start_server(ServerConfig::default()).await;
        let mut client = NetworkClient::connect(&addr.to_string()).await.unwrap();

        assert!(matches!(
            client.request(Packet::QueuedSolo).await,
            Err(ClientError::Server(_))
        ));
    }
}

/// MATCH FLOW TESTS
mod match_tests {
    use super::*;

    #[tokio::test]
    async fn two_clients_are_paired_on_opposite_sides() {
        let addr = start_server(ServerConfig::default()).await;
        let mut alice = logged_in(addr, "alice").await;
        let mut bob = logged_in(addr, "bob").await;

        assert_eq!(
            alice.request(Packet::QueuedSolo).await.unwrap(),
            Packet::WaitingForOpponent
        );
        let bob_side = wait_for_match(&mut bob).await;
        let alice_side = wait_for_match(&mut alice).await;

        assert_eq!(bob_side, Side::Left);
        assert_eq!(alice_side, Side::Right);
    }

    #[tokio::test]
    async fn snapshots_advance_while_polling() {
        let addr = start_server(ServerConfig::default()).await;
        let mut alice = logged_in(addr, "alice").await;
        let mut bob = logged_in(addr, "bob").await;

        alice.request(Packet::QueuedSolo).await.unwrap();
        wait_for_match(&mut bob).await;

        let mut game = ClientGameState::new();
        let mut input = InputManager::new(ControlScheme::Arrows);
        let mut first_remaining = None;

        for _ in 0..20 {
            let frame = input.next_frame(&game);
            let reply = bob.request(Packet::InGame(frame)).await.unwrap();
            game.apply(&reply);
            if first_remaining.is_none() {
                first_remaining = game.latest().map(|s| s.remaining_time);
            }
            sleep(Duration::from_millis(20)).await;
        }

        let state = game.latest().unwrap();
        assert_eq!(state.name_1, "bob");
        assert_eq!(state.name_2, "alice");
        assert!(state.remaining_time < first_remaining.unwrap());
        assert!(game.own_position().is_some());
    }

    #[tokio::test]
    async fn disconnect_forfeits_and_updates_ratings() {
        let addr = start_server(ServerConfig::default()).await;
        let mut alice = logged_in(addr, "alice").await;
        let mut bob = logged_in(addr, "bob").await;

        let player = tokio::spawn(async move {
            let mut game = ClientGameState::new();
            let mut input = InputManager::new(ControlScheme::Wasd);
            let stats = alice.play_match(&mut game, &mut input, 60).await.unwrap();
            (alice, stats)
        });

        wait_for_match(&mut bob).await;
        drop(bob);

        let (mut alice, stats) = timeout(Duration::from_secs(5), player)
            .await
            .expect("match did not end")
            .unwrap();
        assert_eq!(stats.winner.as_deref(), Some("alice"));
        assert!(stats.get("bob").is_some());

        // Alice was the last side to be told, so the game is already stored.
        let (solo, _) = alice.history("alice").await.unwrap();
        assert_eq!(solo.len(), 1);
        assert_eq!(solo[0].winner.as_deref(), Some("alice"));

        assert_eq!(alice.elo("alice").await.unwrap().0, Some(1028));
        assert_eq!(alice.elo("bob").await.unwrap().0, Some(972));
        assert_eq!(alice.winrate("alice").await.unwrap(), Some(100.0));
        assert_eq!(alice.winrate("bob").await.unwrap(), Some(0.0));

        // Back in the lobby afterwards.
        assert_eq!(
            alice.request(Packet::QueuedSolo).await.unwrap(),
            Packet::WaitingForOpponent
        );
    }
}

/// CONNECTION HANDLING TESTS
mod connection_tests {
    use super::*;

    #[tokio::test]
    async fn server_full_rejects_extra_connection() {
        let config = ServerConfig {
            max_clients: 1,
            ..Default::default()
        };
        let addr = start_server(config).await;

        let first = NetworkClient::connect(&addr.to_string()).await.unwrap();
        match NetworkClient::connect(&addr.to_string()).await {
            Err(ClientError::Disconnected(reason)) => assert_eq!(reason, "Server full"),
            Err(e) => panic!("Expected server full, got {}", e),
            Ok(_) => panic!("Expected server full, got a session"),
        }

        drop(first);
        let mut admitted = false;
        for _ in 0..50 {
            if NetworkClient::connect(&addr.to_string()).await.is_ok() {
                admitted = true;
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
        assert!(admitted, "slot was never released");
    }

    #[tokio::test]
    async fn malformed_frame_closes_connection() {
        let addr = start_server(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let welcome = read_frame(&mut stream).await.unwrap().unwrap();
        assert!(matches!(welcome.packet, Packet::Welcome { .. }));

        stream.write_all(&[0, 0, 0, 4, 0xff, 0xff, 0xff, 0xff]).await.unwrap();
        stream.flush().await.unwrap();

        let next = timeout(Duration::from_secs(2), read_frame(&mut stream))
            .await
            .expect("server kept the connection open");
        assert!(!matches!(next, Ok(Some(_))));
    }

    #[tokio::test]
    async fn version_mismatch_gets_error_then_close() {
        let addr = start_server(ServerConfig::default()).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        read_frame(&mut stream).await.unwrap().unwrap();

        let mut envelope = Envelope::new(Sender::Anonymous, Packet::GetChallengers);
        envelope.version += 1;
        write_frame(&mut stream, &envelope).await.unwrap();

        let reply = read_frame(&mut stream).await.unwrap().unwrap();
        assert!(matches!(reply.packet, Packet::Error { .. }));
    }
}
