use shared::protocol::{LoginOutcome, ProtocolError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("server closed the connection")]
    Closed,

    #[error("server disconnected us: {0}")]
    Disconnected(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("login refused: {0}")]
    LoginRefused(LoginOutcome),

    #[error("unexpected reply {got} to {request}")]
    UnexpectedReply {
        request: &'static str,
        got: &'static str,
    },
}
