//! One task per connection.
//!
//! A session reads a request, produces exactly one reply and writes it back.
//! Account queries go straight to storage. Match traffic goes through the
//! lobby to the match task. When the connection closes the client is removed
//! from the lobby and a running match is forfeited.

use crate::error::{ServerError, StorageError};
use crate::game::{Match, MatchOutcome, MatchResult};
use crate::lobby::{FinishedMatch, Lobby, MatchView, Pairing};
use crate::network::ServerContext;
use crate::runner::{spawn_match, wait_for_outcome, MatchCommand, MatchUpdate};
use crate::storage::with_reconnect;
use log::{debug, error, info, warn};
use shared::framing::{read_frame, write_frame};
use shared::protocol::{now_millis, GameRecord, Status};
use shared::{Envelope, InputFrame, Packet, Sender, Side, STARTING_ELO};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

pub const WELCOME_MESSAGE: &str = "Welcome to Novaglide";

/// How long a finished match may take to publish its outcome before it is
/// dropped without being persisted.
const OUTCOME_WAIT: Duration = Duration::from_secs(2);

pub struct Session<S> {
    ctx: Arc<ServerContext>,
    stream: S,
    peer: SocketAddr,
    client_id: Option<u32>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(ctx: Arc<ServerContext>, stream: S, peer: SocketAddr) -> Self {
        Self {
            ctx,
            stream,
            peer,
            client_id: None,
        }
    }

    /// Serves the connection until it closes, then cleans up after the client.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let result = match self
            .send(Packet::Welcome {
                message: WELCOME_MESSAGE.to_string(),
            })
            .await
        {
            Ok(()) => self.serve().await,
            Err(e) => Err(e),
        };

        self.disconnect().await;
        result
    }

    async fn serve(&mut self) -> Result<(), ServerError> {
        let idle = self.ctx.config.idle_timeout;

        loop {
            let envelope = match timeout(idle, read_frame(&mut self.stream)).await {
                Err(_) => return Err(ServerError::IdleTimeout(idle)),
                Ok(frame) => match frame? {
                    Some(envelope) => envelope,
                    None => return Ok(()),
                },
            };

            if let Err(e) = envelope.check_version() {
                warn!("{}: {}", self.peer, e);
                self.send(Packet::Error {
                    reason: e.to_string(),
                })
                .await?;
                return Err(e.into());
            }

            debug!("{} -> {}", self.peer, envelope.packet.flag());
            let reply = self.handle(envelope.packet).await?;
            debug!("{} <- {}", self.peer, reply.flag());
            self.send(reply).await?;
        }
    }

    async fn send(&mut self, packet: Packet) -> Result<(), ServerError> {
        let envelope = Envelope::new(Sender::Server, packet);
        write_frame(&mut self.stream, &envelope).await?;
        Ok(())
    }

    async fn handle(&mut self, packet: Packet) -> Result<Packet, ServerError> {
        if !packet.is_request() {
            warn!("{} sent a server-only packet: {}", self.peer, packet.flag());
            return Ok(error_reply(format!("unexpected packet {}", packet.flag())));
        }

        let client = match self.client_id {
            Some(client) => {
                let pending = self.ctx.lobby.write().await.take_notification(client);
                if pending {
                    return self.in_game(client, None).await;
                }
                Some(client)
            }
            None if packet.requires_login() => {
                return Ok(error_reply(format!("log in before {}", packet.flag())));
            }
            None => None,
        };

        let storage = Arc::clone(&self.ctx.storage);
        let storage = storage.as_ref();
        let reply = match packet {
            Packet::LogIn { username, password } => self.log_in(username, password).await?,
            Packet::GetElo { name } => Packet::ClientElo {
                elo: with_reconnect(storage, |s| s.get_user_elo(&name))?,
                top_elo: with_reconnect(storage, |s| s.top_elo())?,
            },
            Packet::GetChallengers => Packet::Challengers {
                rows: with_reconnect(storage, |s| s.challengers())?,
            },
            Packet::GetWinrate { name } => Packet::Winrate {
                percent: with_reconnect(storage, |s| s.get_user_winrate(&name))?,
            },
            Packet::GetMatchHistory { name } => Packet::MatchHistory {
                solo: with_reconnect(storage, |s| s.get_history(&name, true))?,
                duo: with_reconnect(storage, |s| s.get_history(&name, false))?,
            },
            Packet::QueuedSolo => match client {
                Some(client) => self.queue(client).await?,
                None => error_reply("log in before queueing"),
            },
            Packet::InGame(frame) => match client {
                Some(client) => self.in_game(client, Some(frame)).await?,
                None => error_reply("log in before sending input"),
            },
            other => error_reply(format!("unexpected packet {}", other.flag())),
        };
        Ok(reply)
    }

    async fn log_in(&mut self, username: String, password: String) -> Result<Packet, ServerError> {
        if self.client_id.is_some() {
            return Ok(error_reply("already logged in"));
        }

        let storage = self.ctx.storage.as_ref();
        let outcome = with_reconnect(storage, |s| s.check_credentials(&username, &password))?;
        if !outcome.is_accepted() {
            info!("{}: login as {} refused: {}", self.peer, username, outcome);
            return Ok(Packet::ChangeOfStatus {
                status: Status::WaitingForApproval,
                outcome,
                client_id: None,
            });
        }

        let id = with_reconnect(storage, |s| s.get_user_id(&username))?
            .ok_or_else(|| StorageError::NotFound(username.clone()))?;

        if !self.ctx.lobby.write().await.log_in(id) {
            info!("{}: {} is already logged in elsewhere", self.peer, username);
            return Ok(Packet::ChangeOfStatus {
                status: Status::WaitingForApproval,
                outcome: shared::protocol::LoginOutcome::AlreadyOnline,
                client_id: None,
            });
        }

        self.client_id = Some(id);
        info!("{} logged in as {} (id {}, {})", self.peer, username, id, outcome);
        Ok(Packet::ChangeOfStatus {
            status: Status::Online,
            outcome,
            client_id: Some(id),
        })
    }

    async fn queue(&mut self, client: u32) -> Result<Packet, ServerError> {
        let view = {
            let mut lobby = self.ctx.lobby.write().await;
            if lobby.match_view(client).is_some() {
                None
            } else {
                match lobby.enqueue_or_pair(client) {
                    Pairing::Waiting => return Ok(Packet::WaitingForOpponent),
                    Pairing::Paired { opponent } => {
                        match self.start_match(&mut lobby, client, opponent) {
                            Ok(view) => {
                                lobby.take_notification(client);
                                Some(view)
                            }
                            Err(e) => {
                                lobby.requeue(opponent);
                                return Err(e);
                            }
                        }
                    }
                }
            }
        };

        match view {
            Some(view) => {
                let state = match &*view.updates.borrow() {
                    MatchUpdate::Running(state) => state.clone(),
                    MatchUpdate::Ended(_) => Default::default(),
                };
                Ok(Packet::GameState {
                    side: view.side,
                    state,
                })
            }
            // Already playing; answer like an input poll.
            None => self.in_game(client, None).await,
        }
    }

    /// Creates and registers a match with `requester` on the left.
    fn start_match(
        &self,
        lobby: &mut Lobby,
        requester: u32,
        opponent: u32,
    ) -> Result<MatchView, ServerError> {
        let left = self.player_entry(requester)?;
        let right = self.player_entry(opponent)?;
        let config = &self.ctx.config;

        let game = Match::new((&left.0, left.1), (&right.0, right.1), config.match_duration);
        let id = lobby.peek_match_id();
        let handle = spawn_match(id, game, config.tick_rate);
        lobby.register_match([requester, opponent], handle);

        info!("Match {}: {} vs {}", id, left.0, right.0);
        lobby.match_view(requester).ok_or(ServerError::MatchGone(id))
    }

    fn player_entry(&self, id: u32) -> Result<(String, i32), StorageError> {
        let storage = self.ctx.storage.as_ref();
        let name = with_reconnect(storage, |s| s.get_user_name(id))?
            .ok_or_else(|| StorageError::NotFound(format!("account {}", id)))?;
        let elo = with_reconnect(storage, |s| s.get_user_elo(&name))?.unwrap_or(STARTING_ELO);
        Ok((name, elo))
    }

    /// Forwards `frame` to the client's match and replies with the latest
    /// snapshot, or with the final stats once the match has ended.
    async fn in_game(
        &mut self,
        client: u32,
        frame: Option<InputFrame>,
    ) -> Result<Packet, ServerError> {
        let view = self.ctx.lobby.read().await.match_view(client);
        let Some(view) = view else {
            return Ok(error_reply("not in a match"));
        };

        let update = view.updates.borrow().clone();
        match update {
            MatchUpdate::Running(state) => {
                if let Some(frame) = frame {
                    let command = MatchCommand::Input {
                        side: view.side,
                        frame,
                    };
                    if view.commands.send(command).await.is_err() {
                        debug!("Match {} no longer takes input", view.id);
                    }
                }
                Ok(Packet::GameState {
                    side: view.side,
                    state,
                })
            }
            MatchUpdate::Ended(outcome) => {
                let finished = self.ctx.lobby.write().await.mark_notified(client);
                if let Some(finished) = finished {
                    finalize(&self.ctx, finished).await;
                }
                Ok(Packet::EndGameState(outcome.stats))
            }
        }
    }

    async fn disconnect(&mut self) {
        let Some(client) = self.client_id.take() else {
            return;
        };

        let departure = self.ctx.lobby.write().await.remove_client(client);
        if let Some(departure) = departure {
            let running = matches!(&*departure.view.updates.borrow(), MatchUpdate::Running(_));
            if running {
                info!("Client {} left match {}, forfeiting", client, departure.view.id);
                let side: Side = departure.view.side;
                let _ = departure
                    .view
                    .commands
                    .send(MatchCommand::Forfeit { side })
                    .await;
            }
            if let Some(finished) = departure.finished {
                finalize(&self.ctx, finished).await;
            }
        }

        info!("Client {} ({}) disconnected", client, self.peer);
    }
}

fn error_reply(reason: impl Into<String>) -> Packet {
    Packet::Error {
        reason: reason.into(),
    }
}

/// Persists a match once both sides have been told how it ended.
pub async fn finalize(ctx: &ServerContext, mut finished: FinishedMatch) {
    match timeout(OUTCOME_WAIT, wait_for_outcome(&mut finished.updates)).await {
        Ok(Some(outcome)) => {
            if let Err(e) = persist(ctx, &outcome) {
                error!("Failed to persist match {}: {}", finished.id, e);
            }
        }
        _ => warn!(
            "Match {} never reported an outcome, not persisted",
            finished.id
        ),
    }
}

/// Stores the game record and applies rating and winrate updates.
///
/// Matches without a result are skipped.
pub fn persist(ctx: &ServerContext, outcome: &MatchOutcome) -> Result<(), StorageError> {
    if outcome.result == MatchResult::NoContest {
        info!(
            "{} vs {} ended without a result, not recorded",
            outcome.names.0, outcome.names.1
        );
        return Ok(());
    }

    let storage = ctx.storage.as_ref();
    let record = GameRecord {
        names: outcome.names.clone(),
        elos: outcome.elos,
        scores: outcome.score,
        winner: outcome.winner_name().map(str::to_string),
        played_at: now_millis(),
    };
    with_reconnect(storage, |s| s.insert_1v1_game(&record))?;

    let Some(winner) = outcome.winner else {
        return Ok(());
    };
    let (elo_1, elo_2) = ctx
        .rating
        .rate(outcome.elos.0, outcome.elos.1, winner == Side::Left);

    for (name, elo) in [(&outcome.names.0, elo_1), (&outcome.names.1, elo_2)] {
        let Some(id) = with_reconnect(storage, |s| s.get_user_id(name))? else {
            warn!("{} has no account, rating not updated", name);
            continue;
        };
        with_reconnect(storage, |s| s.update_user_elo(id, elo))?;
        with_reconnect(storage, |s| s.update_user_winrate(id, name))?;
    }

    info!(
        "Recorded {} {}-{} {}, new ratings {} / {}",
        outcome.names.0, outcome.score.0, outcome.score.1, outcome.names.1, elo_1, elo_2
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::rating::DefaultElo;
    use crate::storage::{InMemoryStore, Storage};
    use shared::protocol::{LoginOutcome, PROTOCOL_VERSION};
    use shared::KeySet;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;

    fn context(config: ServerConfig) -> (Arc<ServerContext>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let ctx = ServerContext::new(config, store.clone(), Arc::new(DefaultElo));
        (Arc::new(ctx), store)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    async fn connect(ctx: &Arc<ServerContext>) -> (DuplexStream, JoinHandle<Result<(), ServerError>>) {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let session = Session::new(Arc::clone(ctx), server, peer());
        let task = tokio::spawn(session.run());

        match read_frame(&mut client).await.unwrap().unwrap().packet {
            Packet::Welcome { message } => assert_eq!(message, WELCOME_MESSAGE),
            other => panic!("Expected welcome, got {:?}", other),
        }
        (client, task)
    }

    async fn request(stream: &mut DuplexStream, packet: Packet) -> Packet {
        let envelope = Envelope::new(Sender::Anonymous, packet);
        write_frame(stream, &envelope).await.unwrap();
        read_frame(stream).await.unwrap().unwrap().packet
    }

    async fn log_in(stream: &mut DuplexStream, name: &str) -> u32 {
        let reply = request(
            stream,
            Packet::LogIn {
                username: name.to_string(),
                password: "pw".to_string(),
            },
        )
        .await;
        match reply {
            Packet::ChangeOfStatus {
                status: Status::Online,
                client_id: Some(id),
                ..
            } => id,
            other => panic!("Login failed: {:?}", other),
        }
    }

    fn idle_input() -> Packet {
        Packet::InGame(InputFrame {
            mouse: (640, 360),
            keys: KeySet::default(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_login_registers_and_blocks_second_session() {
        let (ctx, store) = context(ServerConfig::default());
        let (mut first, _t1) = connect(&ctx).await;
        let (mut second, _t2) = connect(&ctx).await;

        let id = log_in(&mut first, "alice").await;
        assert_eq!(store.get_user_id("alice").unwrap(), Some(id));

        let reply = request(
            &mut second,
            Packet::LogIn {
                username: "alice".into(),
                password: "pw".into(),
            },
        )
        .await;
        assert_eq!(
            reply,
            Packet::ChangeOfStatus {
                status: Status::WaitingForApproval,
                outcome: LoginOutcome::AlreadyOnline,
                client_id: None,
            }
        );

        let reply = request(
            &mut second,
            Packet::LogIn {
                username: "alice".into(),
                password: "wrong".into(),
            },
        )
        .await;
        assert!(matches!(
            reply,
            Packet::ChangeOfStatus {
                outcome: LoginOutcome::IncorrectPassword,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_queue_requires_login() {
        let (ctx, _store) = context(ServerConfig::default());
        let (mut client, _task) = connect(&ctx).await;

        assert!(matches!(
            request(&mut client, Packet::QueuedSolo).await,
            Packet::Error { .. }
        ));
        assert!(matches!(
            request(&mut client, idle_input()).await,
            Packet::Error { .. }
        ));
    }

    #[tokio::test]
    async fn test_account_queries() {
        let (ctx, _store) = context(ServerConfig::default());
        let (mut client, _task) = connect(&ctx).await;
        log_in(&mut client, "alice").await;

        let reply = request(&mut client, Packet::GetElo { name: "alice".into() }).await;
        assert_eq!(
            reply,
            Packet::ClientElo {
                elo: Some(STARTING_ELO),
                top_elo: vec![STARTING_ELO],
            }
        );

        let reply = request(&mut client, Packet::GetWinrate { name: "nobody".into() }).await;
        assert_eq!(reply, Packet::Winrate { percent: None });

        match request(&mut client, Packet::GetChallengers).await {
            Packet::Challengers { rows } => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].name, "alice");
            }
            other => panic!("Expected challengers, got {:?}", other),
        }

        let reply = request(&mut client, Packet::GetMatchHistory { name: "alice".into() }).await;
        assert_eq!(
            reply,
            Packet::MatchHistory {
                solo: vec![],
                duo: vec![],
            }
        );
    }

    #[tokio::test]
    async fn test_server_only_packet_is_rejected() {
        let (ctx, _store) = context(ServerConfig::default());
        let (mut client, _task) = connect(&ctx).await;

        let reply = request(&mut client, Packet::WaitingForOpponent).await;
        assert!(matches!(reply, Packet::Error { .. }));
    }

    #[tokio::test]
    async fn test_version_mismatch_closes_connection() {
        let (ctx, _store) = context(ServerConfig::default());
        let (mut client, task) = connect(&ctx).await;

        let mut envelope = Envelope::new(Sender::Anonymous, Packet::GetChallengers);
        envelope.version = PROTOCOL_VERSION + 1;
        write_frame(&mut client, &envelope).await.unwrap();

        let reply = read_frame(&mut client).await.unwrap().unwrap();
        assert!(matches!(reply.packet, Packet::Error { .. }));
        assert!(read_frame(&mut client).await.unwrap().is_none());
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_idle_connection_times_out() {
        let config = ServerConfig {
            idle_timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let (ctx, _store) = context(config);
        let (_client, task) = connect(&ctx).await;

        let result = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(matches!(result, Err(ServerError::IdleTimeout(_))));
    }

    #[tokio::test]
    async fn test_pairing_notifies_both_clients() {
        let (ctx, _store) = context(ServerConfig::default());
        let (mut alice, _t1) = connect(&ctx).await;
        let (mut bob, _t2) = connect(&ctx).await;
        log_in(&mut alice, "alice").await;
        log_in(&mut bob, "bob").await;

        assert_eq!(
            request(&mut alice, Packet::QueuedSolo).await,
            Packet::WaitingForOpponent
        );
        assert_eq!(
            request(&mut alice, Packet::QueuedSolo).await,
            Packet::WaitingForOpponent
        );

        match request(&mut bob, Packet::QueuedSolo).await {
            Packet::GameState { side, state } => {
                assert_eq!(side, Side::Left);
                assert_eq!(state.name_1, "bob");
                assert_eq!(state.name_2, "alice");
            }
            other => panic!("Expected game state, got {:?}", other),
        }

        // Alice learns about the match from whatever she sends next.
        match request(&mut alice, Packet::GetChallengers).await {
            Packet::GameState { side, .. } => assert_eq!(side, Side::Right),
            other => panic!("Expected game state, got {:?}", other),
        }
        assert!(matches!(
            request(&mut alice, idle_input()).await,
            Packet::GameState { .. }
        ));
        assert_eq!(ctx.lobby.read().await.active_matches(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_forfeits_and_persists() {
        let (ctx, store) = context(ServerConfig::default());
        let (mut alice, alice_task) = connect(&ctx).await;
        let (mut bob, _t2) = connect(&ctx).await;
        log_in(&mut alice, "alice").await;
        log_in(&mut bob, "bob").await;

        request(&mut alice, Packet::QueuedSolo).await;
        request(&mut bob, Packet::QueuedSolo).await;

        drop(alice);
        alice_task.await.unwrap().unwrap();

        let mut stats = None;
        for _ in 0..100 {
            match request(&mut bob, idle_input()).await {
                Packet::EndGameState(snapshot) => {
                    stats = Some(snapshot);
                    break;
                }
                Packet::GameState { .. } => tokio::time::sleep(Duration::from_millis(10)).await,
                other => panic!("Unexpected reply {:?}", other),
            }
        }

        let stats = stats.expect("match never ended");
        assert_eq!(stats.winner.as_deref(), Some("bob"));

        // Bob was the second side to be told, so the match is stored now.
        let history = store.get_history("bob", true).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].winner.as_deref(), Some("bob"));
        assert_eq!(store.get_user_elo("bob").unwrap(), Some(1028));
        assert_eq!(store.get_user_elo("alice").unwrap(), Some(972));
        assert_eq!(store.get_user_winrate("bob").unwrap(), Some(100.0));
        assert_eq!(ctx.lobby.read().await.active_matches(), 0);

        // Free to queue again.
        assert_eq!(
            request(&mut bob, Packet::QueuedSolo).await,
            Packet::WaitingForOpponent
        );
    }

    #[test]
    fn test_no_contest_is_not_persisted() {
        let store = Arc::new(InMemoryStore::new());
        let ctx = ServerContext::new(ServerConfig::default(), store.clone(), Arc::new(DefaultElo));
        store.check_credentials("a", "pw").unwrap();
        store.check_credentials("b", "pw").unwrap();

        let outcome = MatchOutcome::no_contest(("a".into(), "b".into()), (1000, 1000));
        persist(&ctx, &outcome).unwrap();

        assert!(store.get_history("a", true).unwrap().is_empty());
        assert_eq!(store.get_user_elo("a").unwrap(), Some(1000));
    }
}
