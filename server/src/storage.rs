//! Account and game-record storage.
//!
//! The server only talks to storage through the [`Storage`] trait. Calls are
//! synchronous and short; sessions make them between frames. A backend that
//! can lose its connection reports [`StorageError::ConnectionLost`] and
//! callers go through [`with_reconnect`] to get one retry.

use crate::error::StorageError;
use log::warn;
use shared::protocol::{ChallengerRow, GameRecord, LoginOutcome};
use shared::STARTING_ELO;
use std::sync::{Mutex, MutexGuard};

/// Number of rows returned by [`Storage::challengers`].
pub const LEADERBOARD_SIZE: usize = 100;
/// Number of games returned by [`Storage::get_history`].
pub const HISTORY_SIZE: usize = 10;

pub trait Storage: Send + Sync {
    /// Logs in an existing account or registers a new one with the starting rating.
    fn check_credentials(&self, username: &str, password: &str)
        -> Result<LoginOutcome, StorageError>;
    fn get_user_id(&self, name: &str) -> Result<Option<u32>, StorageError>;
    fn get_user_name(&self, id: u32) -> Result<Option<String>, StorageError>;
    fn get_user_elo(&self, name: &str) -> Result<Option<i32>, StorageError>;
    fn update_user_elo(&self, id: u32, elo: i32) -> Result<(), StorageError>;
    fn get_user_winrate(&self, name: &str) -> Result<Option<f32>, StorageError>;
    /// Recomputes the stored win percentage of `name` from its recorded games.
    fn update_user_winrate(&self, id: u32, name: &str) -> Result<(), StorageError>;
    /// The 100th-best rating (when there are that many accounts) and the lowest one.
    fn top_elo(&self) -> Result<Vec<i32>, StorageError>;
    fn challengers(&self) -> Result<Vec<ChallengerRow>, StorageError>;
    /// Most recent games of `name`, newest first. Team games are not recorded,
    /// so `solo == false` always yields an empty list.
    fn get_history(&self, name: &str, solo: bool) -> Result<Vec<GameRecord>, StorageError>;
    fn insert_1v1_game(&self, record: &GameRecord) -> Result<(), StorageError>;
    fn reconnect(&self) -> Result<(), StorageError>;
}

/// Runs `op`, reconnecting and retrying once if the backend lost its connection.
pub fn with_reconnect<T, F>(storage: &dyn Storage, op: F) -> Result<T, StorageError>
where
    F: Fn(&dyn Storage) -> Result<T, StorageError>,
{
    match op(storage) {
        Err(StorageError::ConnectionLost) => {
            warn!("Storage connection lost, reconnecting");
            storage.reconnect()?;
            op(storage)
        }
        other => other,
    }
}

#[derive(Debug, Clone)]
struct Account {
    id: u32,
    name: String,
    password: String,
    elo: i32,
    winrate: f32,
    #[allow(dead_code)]
    skin: String,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: Vec<Account>,
    games: Vec<GameRecord>,
}

impl Tables {
    fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.name == name)
    }

    fn account_by_id(&mut self, id: u32) -> Result<&mut Account, StorageError> {
        self.accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| StorageError::NotFound(format!("account {}", id)))
    }
}

/// Process-local storage backed by a mutex. Account ids start at 1.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("storage mutex poisoned".to_string()))
    }
}

impl Storage for InMemoryStore {
    fn check_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginOutcome, StorageError> {
        if username.is_empty() || password.is_empty() {
            return Ok(LoginOutcome::MissingCredentials);
        }

        let mut tables = self.tables()?;
        if let Some(account) = tables.account(username) {
            return Ok(if account.password == password {
                LoginOutcome::KnownUser
            } else {
                LoginOutcome::IncorrectPassword
            });
        }

        let id = tables.accounts.len() as u32 + 1;
        tables.accounts.push(Account {
            id,
            name: username.to_string(),
            password: password.to_string(),
            elo: STARTING_ELO,
            winrate: 0.0,
            skin: "Skin1".to_string(),
        });
        Ok(LoginOutcome::RegisteredNewUser)
    }

    fn get_user_id(&self, name: &str) -> Result<Option<u32>, StorageError> {
        Ok(self.tables()?.account(name).map(|a| a.id))
    }

    fn get_user_name(&self, id: u32) -> Result<Option<String>, StorageError> {
        Ok(self
            .tables()?
            .accounts
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.clone()))
    }

    fn get_user_elo(&self, name: &str) -> Result<Option<i32>, StorageError> {
        Ok(self.tables()?.account(name).map(|a| a.elo))
    }

    fn update_user_elo(&self, id: u32, elo: i32) -> Result<(), StorageError> {
        self.tables()?.account_by_id(id)?.elo = elo;
        Ok(())
    }

    fn get_user_winrate(&self, name: &str) -> Result<Option<f32>, StorageError> {
        Ok(self.tables()?.account(name).map(|a| a.winrate))
    }

    fn update_user_winrate(&self, id: u32, name: &str) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        let (played, won) = tables
            .games
            .iter()
            .filter(|g| g.names.0 == name || g.names.1 == name)
            .fold((0u32, 0u32), |(played, won), g| {
                let win = g.winner.as_deref() == Some(name);
                (played + 1, won + win as u32)
            });

        let winrate = if played == 0 {
            0.0
        } else {
            won as f32 / played as f32 * 100.0
        };
        tables.account_by_id(id)?.winrate = winrate;
        Ok(())
    }

    fn top_elo(&self) -> Result<Vec<i32>, StorageError> {
        let tables = self.tables()?;
        let mut elos: Vec<i32> = tables.accounts.iter().map(|a| a.elo).collect();
        elos.sort_unstable_by(|a, b| b.cmp(a));

        let mut result = Vec::new();
        if let Some(hundredth) = elos.get(LEADERBOARD_SIZE - 1) {
            result.push(*hundredth);
        }
        if let Some(lowest) = elos.last() {
            if !result.contains(lowest) {
                result.push(*lowest);
            }
        }
        Ok(result)
    }

    fn challengers(&self) -> Result<Vec<ChallengerRow>, StorageError> {
        let tables = self.tables()?;
        let mut accounts: Vec<&Account> = tables.accounts.iter().collect();
        accounts.sort_by(|a, b| b.elo.cmp(&a.elo));

        Ok(accounts
            .into_iter()
            .take(LEADERBOARD_SIZE)
            .map(|a| ChallengerRow {
                name: a.name.clone(),
                winrate: a.winrate,
                elo: a.elo,
            })
            .collect())
    }

    fn get_history(&self, name: &str, solo: bool) -> Result<Vec<GameRecord>, StorageError> {
        if !solo {
            return Ok(Vec::new());
        }

        let tables = self.tables()?;
        // Reverse first so equal timestamps list the later insert first.
        let mut games: Vec<GameRecord> = tables
            .games
            .iter()
            .rev()
            .filter(|g| g.names.0 == name || g.names.1 == name)
            .cloned()
            .collect();
        games.sort_by(|a, b| b.played_at.cmp(&a.played_at));
        games.truncate(HISTORY_SIZE);
        Ok(games)
    }

    fn insert_1v1_game(&self, record: &GameRecord) -> Result<(), StorageError> {
        self.tables()?.games.push(record.clone());
        Ok(())
    }

    fn reconnect(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
