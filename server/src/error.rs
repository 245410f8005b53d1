use shared::protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

use crate::lobby::MatchId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage connection lost")]
    ConnectionLost,
    #[error("no record for {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("connection idle for more than {0:?}")]
    IdleTimeout(Duration),
    #[error("match {0} is no longer running")]
    MatchGone(MatchId),
}
