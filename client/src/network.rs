use crate::error::ClientError;
use crate::game::{ClientGameState, ClientPhase};
use crate::input::InputManager;
use log::{debug, info, warn};
use shared::framing::{read_frame, write_frame};
use shared::protocol::{ChallengerRow, GameRecord, LoginOutcome, Status};
use shared::{Envelope, Packet, Sender, StatsSnapshot};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{interval, MissedTickBehavior};

/// Request/reply connection to the server. Every request gets exactly one
/// reply, so calls are strictly sequential.
pub struct NetworkClient<S = TcpStream> {
    stream: S,
    client_id: Option<u32>,
    welcome: String,
}

impl NetworkClient<TcpStream> {
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}", addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::from_stream(stream).await
    }
}

impl<S> NetworkClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Waits for the server greeting on an already open stream.
    pub async fn from_stream(mut stream: S) -> Result<Self, ClientError> {
        let envelope = read_frame(&mut stream).await?.ok_or(ClientError::Closed)?;
        match envelope.packet {
            Packet::Welcome { message } => {
                info!("Server says: {}", message);
                Ok(Self {
                    stream,
                    client_id: None,
                    welcome: message,
                })
            }
            Packet::Disconnected { reason } => Err(ClientError::Disconnected(reason)),
            other => Err(ClientError::UnexpectedReply {
                request: "connect",
                got: other.flag(),
            }),
        }
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn welcome(&self) -> &str {
        &self.welcome
    }

    /// Sends one request and returns the server's reply. `Disconnected` and
    /// `Error` replies are turned into errors.
    pub async fn request(&mut self, packet: Packet) -> Result<Packet, ClientError> {
        let sender = match self.client_id {
            Some(id) => Sender::Client(id),
            None => Sender::Anonymous,
        };
        write_frame(&mut self.stream, &Envelope::new(sender, packet)).await?;

        let envelope = read_frame(&mut self.stream)
            .await?
            .ok_or(ClientError::Closed)?;
        envelope.check_version()?;

        match envelope.packet {
            Packet::Disconnected { reason } => Err(ClientError::Disconnected(reason)),
            Packet::Error { reason } => Err(ClientError::Server(reason)),
            reply => Ok(reply),
        }
    }

    pub async fn log_in(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, ClientError> {
        let reply = self
            .request(Packet::LogIn {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await?;

        match reply {
            Packet::ChangeOfStatus {
                status: Status::Online,
                outcome,
                client_id,
            } => {
                self.client_id = client_id;
                info!("Logged in as {} ({})", username, outcome);
                Ok(outcome)
            }
            Packet::ChangeOfStatus { outcome, .. } => Err(ClientError::LoginRefused(outcome)),
            other => Err(unexpected("log_in_data", &other)),
        }
    }

    /// Returns the rating of `name` and the server's `[100th best, lowest]`.
    pub async fn elo(&mut self, name: &str) -> Result<(Option<i32>, Vec<i32>), ClientError> {
        match self.request(Packet::GetElo { name: name.into() }).await? {
            Packet::ClientElo { elo, top_elo } => Ok((elo, top_elo)),
            other => Err(unexpected("get_elo", &other)),
        }
    }

    pub async fn challengers(&mut self) -> Result<Vec<ChallengerRow>, ClientError> {
        match self.request(Packet::GetChallengers).await? {
            Packet::Challengers { rows } => Ok(rows),
            other => Err(unexpected("get_challengers", &other)),
        }
    }

    pub async fn winrate(&mut self, name: &str) -> Result<Option<f32>, ClientError> {
        match self.request(Packet::GetWinrate { name: name.into() }).await? {
            Packet::Winrate { percent } => Ok(percent),
            other => Err(unexpected("get_winrate", &other)),
        }
    }

    /// Returns `(solo, duo)` histories, newest first.
    pub async fn history(
        &mut self,
        name: &str,
    ) -> Result<(Vec<GameRecord>, Vec<GameRecord>), ClientError> {
        match self
            .request(Packet::GetMatchHistory { name: name.into() })
            .await?
        {
            Packet::MatchHistory { solo, duo } => Ok((solo, duo)),
            other => Err(unexpected("get_match_history", &other)),
        }
    }

    /// Queues for a solo match and polls at `poll_rate` Hz until it ends.
    ///
    /// While waiting the queue request is repeated. Once a snapshot arrives
    /// every poll carries the input chosen by `input`.
    pub async fn play_match(
        &mut self,
        game: &mut ClientGameState,
        input: &mut InputManager,
        poll_rate: u32,
    ) -> Result<StatsSnapshot, ClientError> {
        let period = Duration::from_secs_f64(1.0 / f64::from(poll_rate.max(1)));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        game.reset();
        loop {
            ticker.tick().await;

            let request = match game.phase() {
                ClientPhase::Lobby | ClientPhase::Queued => Packet::QueuedSolo,
                ClientPhase::Playing => Packet::InGame(input.next_frame(game)),
                ClientPhase::Finished => break,
            };
            let reply = self.request(request).await?;

            match &reply {
                Packet::WaitingForOpponent | Packet::GameState { .. } => {}
                Packet::EndGameState(_) => {}
                other => {
                    warn!("Ignoring {} while in the match loop", other.flag());
                    continue;
                }
            }
            game.apply(&reply);

            if game.snapshots() > 0 && game.snapshots() % u64::from(poll_rate.max(1)) == 0 {
                if let Some(state) = game.latest() {
                    debug!(
                        "{:.1}s left, {} {}-{} {}",
                        state.remaining_time, state.name_1, state.score_1, state.score_2, state.name_2
                    );
                }
            }
        }

        game.final_stats().cloned().ok_or(ClientError::Closed)
    }
}

fn unexpected(request: &'static str, reply: &Packet) -> ClientError {
    ClientError::UnexpectedReply {
        request,
        got: reply.flag(),
    }
}
