//! Server-wide bookkeeping of connected clients and running matches.
//!
//! The lobby tracks:
//! - how many connections are open, against the configured capacity
//! - which accounts are logged in
//! - the solo queue
//! - clients that have been paired but not yet told about their match
//! - every active match and which side each client plays
//!
//! It is plain synchronous state; the server keeps it behind a
//! `tokio::sync::RwLock` and only holds the lock for short sections.

use crate::runner::{MatchCommand, MatchHandle, MatchUpdate};
use log::{debug, info};
use rand::seq::IteratorRandom;
use shared::Side;
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, watch};

pub type MatchId = u64;

/// Result of [`Lobby::enqueue_or_pair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    Waiting,
    Paired { opponent: u32 },
}

/// What a client needs to take part in its match.
#[derive(Debug, Clone)]
pub struct MatchView {
    pub id: MatchId,
    pub side: Side,
    pub commands: mpsc::Sender<MatchCommand>,
    pub updates: watch::Receiver<MatchUpdate>,
}

/// A match both of whose sides have seen the end result. It has been removed
/// from the lobby and is ready to be persisted.
#[derive(Debug)]
pub struct FinishedMatch {
    pub id: MatchId,
    pub clients: [u32; 2],
    pub updates: watch::Receiver<MatchUpdate>,
}

/// Returned by [`Lobby::remove_client`] when the client was in a match.
#[derive(Debug)]
pub struct Departure {
    pub view: MatchView,
    /// Set when this departure completed the match's notifications.
    pub finished: Option<FinishedMatch>,
}

#[derive(Debug)]
struct ActiveMatch {
    clients: [u32; 2],
    handle: MatchHandle,
    notified: [bool; 2],
}

pub struct Lobby {
    connections: usize,
    max_clients: usize,
    online: HashSet<u32>,
    queue: HashSet<u32>,
    to_notify: HashSet<u32>,
    matches: HashMap<MatchId, ActiveMatch>,
    assignments: HashMap<u32, (MatchId, Side)>,
    next_match_id: MatchId,
}

impl Lobby {
    pub fn new(max_clients: usize) -> Self {
        Self {
            connections: 0,
            max_clients,
            online: HashSet::new(),
            queue: HashSet::new(),
            to_notify: HashSet::new(),
            matches: HashMap::new(),
            assignments: HashMap::new(),
            next_match_id: 1,
        }
    }

    /// Reserves a connection slot. Returns `false` when the server is full.
    pub fn try_admit(&mut self) -> bool {
        if self.connections >= self.max_clients {
            return false;
        }
        self.connections += 1;
        true
    }

    pub fn release(&mut self) {
        self.connections = self.connections.saturating_sub(1);
    }

    pub fn connections(&self) -> usize {
        self.connections
    }

    /// Marks an account as logged in. Returns `false` if it already was.
    pub fn log_in(&mut self, client: u32) -> bool {
        self.online.insert(client)
    }

    pub fn is_online(&self, client: u32) -> bool {
        self.online.contains(&client)
    }

    pub fn is_queued(&self, client: u32) -> bool {
        self.queue.contains(&client)
    }

    /// Queues `client`, or takes a random waiting client to play against.
    pub fn enqueue_or_pair(&mut self, client: u32) -> Pairing {
        if self.queue.contains(&client) {
            return Pairing::Waiting;
        }

        let opponent = self.queue.iter().copied().choose(&mut rand::thread_rng());
        match opponent {
            Some(opponent) => {
                self.queue.remove(&opponent);
                Pairing::Paired { opponent }
            }
            None => {
                self.queue.insert(client);
                debug!("Client {} queued solo", client);
                Pairing::Waiting
            }
        }
    }

    /// Puts a client taken by [`Lobby::enqueue_or_pair`] back in the queue.
    pub fn requeue(&mut self, client: u32) {
        if self.online.contains(&client) {
            self.queue.insert(client);
        }
    }

    /// Records a freshly spawned match between `clients` (left, right). Both
    /// clients start out awaiting their first snapshot.
    pub fn register_match(&mut self, clients: [u32; 2], handle: MatchHandle) -> MatchId {
        let id = self.next_match_id;
        self.next_match_id += 1;

        for (client, side) in clients.iter().zip([Side::Left, Side::Right]) {
            self.queue.remove(client);
            self.assignments.insert(*client, (id, side));
            self.to_notify.insert(*client);
        }
        self.matches.insert(
            id,
            ActiveMatch {
                clients,
                handle,
                notified: [false; 2],
            },
        );

        info!("Match {} registered: {} vs {}", id, clients[0], clients[1]);
        id
    }

    /// The id the next [`Lobby::register_match`] call will hand out.
    pub fn peek_match_id(&self) -> MatchId {
        self.next_match_id
    }

    /// Consumes the client's pending match notification, if any.
    pub fn take_notification(&mut self, client: u32) -> bool {
        self.to_notify.remove(&client)
    }

    pub fn match_view(&self, client: u32) -> Option<MatchView> {
        let (id, side) = *self.assignments.get(&client)?;
        let active = self.matches.get(&id)?;
        Some(MatchView {
            id,
            side,
            commands: active.handle.commands.clone(),
            updates: active.handle.updates.clone(),
        })
    }

    /// Records that `client` has been shown the end of its match and frees
    /// it to queue again. Once both sides are notified the match is removed.
    pub fn mark_notified(&mut self, client: u32) -> Option<FinishedMatch> {
        let (id, side) = self.assignments.remove(&client)?;
        self.to_notify.remove(&client);

        let active = self.matches.get_mut(&id)?;
        active.notified[side.index()] = true;
        if !active.notified.iter().all(|n| *n) {
            return None;
        }

        let active = self.matches.remove(&id)?;
        debug!("Match {} fully notified", id);
        Some(FinishedMatch {
            id,
            clients: active.clients,
            updates: active.handle.updates,
        })
    }

    /// Drops every trace of `client` except its side of a match, which is
    /// counted as notified.
    pub fn remove_client(&mut self, client: u32) -> Option<Departure> {
        self.online.remove(&client);
        self.queue.remove(&client);
        self.to_notify.remove(&client);

        let view = self.match_view(client)?;
        let finished = self.mark_notified(client);
        Some(Departure { view, finished })
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ShareState;

    fn dummy_handle() -> MatchHandle {
        let (commands, _rx) = mpsc::channel(1);
        let (_tx, updates) = watch::channel(MatchUpdate::Running(ShareState::default()));
        MatchHandle { commands, updates }
    }

    #[test]
    fn test_capacity() {
        let mut lobby = Lobby::new(2);
        assert!(lobby.try_admit());
        assert!(lobby.try_admit());
        assert!(!lobby.try_admit());
        assert_eq!(lobby.connections(), 2);

        lobby.release();
        assert!(lobby.try_admit());
    }

    #[test]
    fn test_log_in_once() {
        let mut lobby = Lobby::new(4);
        assert!(lobby.log_in(1));
        assert!(!lobby.log_in(1));
        assert!(lobby.is_online(1));
    }

    #[test]
    fn test_first_client_waits_second_pairs() {
        let mut lobby = Lobby::new(4);

        assert_eq!(lobby.enqueue_or_pair(1), Pairing::Waiting);
        assert!(lobby.is_queued(1));
        assert_eq!(lobby.enqueue_or_pair(1), Pairing::Waiting);

        assert_eq!(lobby.enqueue_or_pair(2), Pairing::Paired { opponent: 1 });
        assert!(!lobby.is_queued(1));
        assert!(!lobby.is_queued(2));
    }

    #[test]
    fn test_pairs_one_of_many_waiting() {
        let mut lobby = Lobby::new(8);
        for client in 1..=3 {
            lobby.queue.insert(client);
        }

        match lobby.enqueue_or_pair(9) {
            Pairing::Paired { opponent } => {
                assert!((1..=3).contains(&opponent));
                assert!(!lobby.is_queued(opponent));
            }
            Pairing::Waiting => panic!("Expected a pairing"),
        }
        assert_eq!(lobby.queue.len(), 2);
    }

    #[test]
    fn test_register_match_assigns_sides() {
        let mut lobby = Lobby::new(4);
        let id = lobby.register_match([5, 7], dummy_handle());

        let left = lobby.match_view(5).unwrap();
        let right = lobby.match_view(7).unwrap();
        assert_eq!(left.id, id);
        assert_eq!(left.side, Side::Left);
        assert_eq!(right.side, Side::Right);
        assert!(lobby.take_notification(5));
        assert!(!lobby.take_notification(5));
        assert!(lobby.take_notification(7));
    }

    #[test]
    fn test_match_finishes_after_both_notified() {
        let mut lobby = Lobby::new(4);
        let id = lobby.register_match([5, 7], dummy_handle());

        assert!(lobby.mark_notified(5).is_none());
        assert!(lobby.match_view(5).is_none());
        assert!(lobby.match_view(7).is_some());
        assert!(lobby.mark_notified(5).is_none());

        let finished = lobby.mark_notified(7).unwrap();
        assert_eq!(finished.id, id);
        assert_eq!(finished.clients, [5, 7]);
        assert_eq!(lobby.active_matches(), 0);
    }

    #[test]
    fn test_remove_client_counts_as_notified() {
        let mut lobby = Lobby::new(4);
        lobby.log_in(5);
        lobby.log_in(7);
        lobby.register_match([5, 7], dummy_handle());

        let departure = lobby.remove_client(5).unwrap();
        assert_eq!(departure.view.side, Side::Left);
        assert!(departure.finished.is_none());
        assert!(!lobby.is_online(5));

        let finished = lobby.mark_notified(7).unwrap();
        assert_eq!(finished.clients, [5, 7]);
    }

    #[test]
    fn test_remove_idle_client() {
        let mut lobby = Lobby::new(4);
        lobby.log_in(3);
        lobby.enqueue_or_pair(3);

        assert!(lobby.remove_client(3).is_none());
        assert!(!lobby.is_queued(3));
        assert!(!lobby.is_online(3));
    }
}
