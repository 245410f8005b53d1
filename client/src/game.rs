use log::{debug, info};
use shared::{Packet, ShareState, Side, StatsSnapshot, Vector2};

/// Where the client stands in the lobby/match flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Lobby,
    Queued,
    Playing,
    Finished,
}

/// The client's read-only view of its match. Everything here comes from the
/// server; nothing is simulated locally.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    phase: ClientPhase,
    side: Option<Side>,
    latest: Option<ShareState>,
    snapshots: u64,
    final_stats: Option<StatsSnapshot>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self {
            phase: ClientPhase::Lobby,
            side: None,
            latest: None,
            snapshots: 0,
            final_stats: None,
        }
    }

    /// Folds a server reply into the view. Replies unrelated to the match are
    /// ignored.
    pub fn apply(&mut self, packet: &Packet) {
        match packet {
            Packet::WaitingForOpponent => {
                if self.phase == ClientPhase::Lobby {
                    self.phase = ClientPhase::Queued;
                }
            }
            Packet::GameState { side, state } => {
                if self.phase != ClientPhase::Playing {
                    info!(
                        "Match started: {} vs {}, playing {:?}",
                        state.name_1, state.name_2, side
                    );
                }
                self.phase = ClientPhase::Playing;
                self.side = Some(*side);
                self.latest = Some(state.clone());
                self.snapshots += 1;
            }
            Packet::EndGameState(stats) => {
                info!("Match over, winner: {:?}", stats.winner);
                self.phase = ClientPhase::Finished;
                self.final_stats = Some(stats.clone());
            }
            other => debug!("Ignoring {} for game state", other.flag()),
        }
    }

    /// Back to the lobby, ready to queue again.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn phase(&self) -> ClientPhase {
        self.phase
    }

    pub fn side(&self) -> Option<Side> {
        self.side
    }

    pub fn latest(&self) -> Option<&ShareState> {
        self.latest.as_ref()
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots
    }

    pub fn final_stats(&self) -> Option<&StatsSnapshot> {
        self.final_stats.as_ref()
    }

    pub fn own_position(&self) -> Option<Vector2> {
        let state = self.latest.as_ref()?;
        Some(match self.side? {
            Side::Left => state.position_1,
            Side::Right => state.position_2,
        })
    }

    pub fn opponent_position(&self) -> Option<Vector2> {
        let state = self.latest.as_ref()?;
        Some(match self.side? {
            Side::Left => state.position_2,
            Side::Right => state.position_1,
        })
    }

    pub fn ball_position(&self) -> Option<Vector2> {
        self.latest.as_ref().map(|state| state.ball_position)
    }

    /// Returns `(hook, dash)` cooldown remainders for this client's player.
    pub fn own_cooldowns(&self) -> Option<(f32, f32)> {
        let state = self.latest.as_ref()?;
        Some(match self.side? {
            Side::Left => (state.hook_cooldown_1, state.dash_cooldown_1),
            Side::Right => (state.hook_cooldown_2, state.dash_cooldown_2),
        })
    }

    pub fn is_hooking(&self) -> bool {
        match (self.latest.as_ref(), self.side) {
            (Some(state), Some(Side::Left)) => state.hooking_1,
            (Some(state), Some(Side::Right)) => state.hooking_2,
            _ => false,
        }
    }

    /// Returns `(own, opponent)` goals.
    pub fn score(&self) -> Option<(u32, u32)> {
        let state = self.latest.as_ref()?;
        Some(match self.side? {
            Side::Left => (state.score_1, state.score_2),
            Side::Right => (state.score_2, state.score_1),
        })
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}
