//! Per-match statistics, keyed by player name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub touches: u32,
    pub goals: u32,
    /// Always zero; possession is not tracked yet.
    pub possession_time: f32,
    pub elo: i32,
}

/// Immutable copy of [`MatchStats`] sent to clients when a match ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub players: BTreeMap<String, PlayerStats>,
    pub winner: Option<String>,
}

impl StatsSnapshot {
    pub fn get(&self, name: &str) -> Option<&PlayerStats> {
        self.players.get(name)
    }
}

///Accumulates touches, goals and the final ratings of both players.
///
///Updates for a name that was not registered at construction are ignored.
#[derive(Debug, Clone, Default)]
pub struct MatchStats {
    players: BTreeMap<String, PlayerStats>,
    winner: Option<String>,
}

impl MatchStats {
    pub fn new(names: &[&str], elos: &[i32]) -> Self {
        let players = names
            .iter()
            .zip(elos.iter())
            .map(|(name, elo)| {
                (
                    name.to_string(),
                    PlayerStats {
                        elo: *elo,
                        ..Default::default()
                    },
                )
            })
            .collect();

        Self {
            players,
            winner: None,
        }
    }

    pub fn add_touch(&mut self, name: &str) {
        if let Some(stats) = self.players.get_mut(name) {
            stats.touches += 1;
        }
    }

    pub fn add_goal(&mut self, name: &str) {
        if let Some(stats) = self.players.get_mut(name) {
            stats.goals += 1;
        }
    }

    pub fn set_elo(&mut self, name: &str, elo: i32) {
        if let Some(stats) = self.players.get_mut(name) {
            stats.elo = elo;
        }
    }

    pub fn set_winner(&mut self, winner: Option<String>) {
        self.winner = winner;
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&PlayerStats> {
        self.players.get(name)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            players: self.players.clone(),
            winner: self.winner.clone(),
        }
    }
}
