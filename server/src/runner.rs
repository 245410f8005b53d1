//! Match tasks.
//!
//! Every match runs in its own task that exclusively owns the [`Match`].
//! Sessions talk to it through a bounded command channel and read the latest
//! snapshot from a watch channel. A second task supervises the match task so
//! that a panic in the simulation still produces an ended update.

use crate::game::{Match, MatchOutcome, MatchPhase};
use crate::lobby::MatchId;
use log::{debug, error, info};
use shared::{InputFrame, ShareState, Side};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Capacity of the per-match command channel.
pub const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub enum MatchCommand {
    Input { side: Side, frame: InputFrame },
    /// `side` disconnected.
    Forfeit { side: Side },
}

#[derive(Debug, Clone)]
pub enum MatchUpdate {
    Running(ShareState),
    Ended(MatchOutcome),
}

/// Session-side ends of a running match.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    pub commands: mpsc::Sender<MatchCommand>,
    pub updates: watch::Receiver<MatchUpdate>,
}

/// Spawns the task for `game` and its supervisor.
///
/// Must be called from within a tokio runtime.
pub fn spawn_match(id: MatchId, game: Match, tick_rate: u32) -> MatchHandle {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (update_tx, update_rx) = watch::channel(MatchUpdate::Running(game.share_state()));
    let update_tx = Arc::new(update_tx);

    let left = game.player(Side::Left);
    let right = game.player(Side::Right);
    let fallback = MatchOutcome::no_contest(
        (left.name.clone(), right.name.clone()),
        (left.elo, right.elo),
    );

    let task = tokio::spawn(run_match(
        id,
        game,
        command_rx,
        Arc::clone(&update_tx),
        tick_rate,
    ));
    tokio::spawn(supervise(id, task, update_tx, fallback));

    MatchHandle {
        commands: command_tx,
        updates: update_rx,
    }
}

/// Ticks `game` at `tick_rate` Hz until it ends.
///
/// The match is abandoned when every command sender is dropped.
pub async fn run_match(
    id: MatchId,
    mut game: Match,
    mut commands: mpsc::Receiver<MatchCommand>,
    updates: Arc<watch::Sender<MatchUpdate>>,
    tick_rate: u32,
) {
    let tick_rate = tick_rate.max(1);
    let dt = 1.0 / tick_rate as f32;
    let mut ticker = interval(Duration::from_secs_f64(1.0 / tick_rate as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;

    info!("Match {} started", id);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(MatchCommand::Input { side, frame }) => game.set_input(side, frame),
                Some(MatchCommand::Forfeit { side }) => {
                    info!("Match {}: {:?} side forfeited", id, side);
                    game.forfeit(side);
                    break;
                }
                None => {
                    info!("Match {} lost all sessions, abandoning", id);
                    game.abandon();
                    break;
                }
            },

            _ = ticker.tick() => {
                let phase = game.advance_tick(dt);
                ticks += 1;
                if phase == MatchPhase::Ended {
                    break;
                }
                updates.send_replace(MatchUpdate::Running(game.share_state()));

                if ticks % tick_rate as u64 == 0 {
                    let (left, right) = game.score();
                    debug!(
                        "Match {} tick {}: {:.1}s played, score {}-{}, {:?}",
                        id, ticks, game.elapsed(), left, right, phase
                    );
                }
            },
        }
    }

    if let Some(outcome) = game.outcome() {
        updates.send_replace(MatchUpdate::Ended(outcome));
    }
}

/// Publishes `fallback` if the match task panicked or was cancelled.
pub async fn supervise(
    id: MatchId,
    task: JoinHandle<()>,
    updates: Arc<watch::Sender<MatchUpdate>>,
    fallback: MatchOutcome,
) {
    if let Err(e) = task.await {
        error!("Match {} task failed: {}; recording no contest", id, e);
        updates.send_replace(MatchUpdate::Ended(fallback));
    }
}

/// Waits until the match publishes its outcome.
///
/// Returns `None` if the match task went away without ending the match.
pub async fn wait_for_outcome(updates: &mut watch::Receiver<MatchUpdate>) -> Option<MatchOutcome> {
    loop {
        if let MatchUpdate::Ended(outcome) = &*updates.borrow_and_update() {
            return Some(outcome.clone());
        }
        if updates.changed().await.is_err() {
            return match &*updates.borrow() {
                MatchUpdate::Ended(outcome) => Some(outcome.clone()),
                MatchUpdate::Running(_) => None,
            };
        }
    }
}
