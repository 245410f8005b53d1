//! TCP accept loop and the state shared by every connection.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::lobby::Lobby;
use crate::rating::RatingSystem;
use crate::session::Session;
use crate::storage::Storage;
use log::{debug, error, info, warn};
use shared::framing::write_frame;
use shared::{Envelope, Packet, Sender};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;

/// Everything a session needs besides its own socket.
pub struct ServerContext {
    pub config: ServerConfig,
    pub lobby: RwLock<Lobby>,
    pub storage: Arc<dyn Storage>,
    pub rating: Arc<dyn RatingSystem>,
}

impl ServerContext {
    pub fn new(
        config: ServerConfig,
        storage: Arc<dyn Storage>,
        rating: Arc<dyn RatingSystem>,
    ) -> Self {
        let lobby = RwLock::new(Lobby::new(config.max_clients));
        Self {
            config,
            lobby,
            storage,
            rating,
        }
    }
}

pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
}

impl Server {
    pub async fn bind(
        config: ServerConfig,
        storage: Arc<dyn Storage>,
        rating: Arc<dyn RatingSystem>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            ctx: Arc::new(ServerContext::new(config, storage, rating)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    /// Accepts connections forever, one session task per connection.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(
            "Server started: {} Hz, {}s matches, up to {} clients",
            self.ctx.config.tick_rate, self.ctx.config.match_duration, self.ctx.config.max_clients
        );

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not disable Nagle for {}: {}", peer, e);
            }

            let ctx = Arc::clone(&self.ctx);
            tokio::spawn(async move {
                handle_connection(ctx, stream, peer).await;
            });
        }
    }
}

async fn handle_connection(ctx: Arc<ServerContext>, mut stream: TcpStream, peer: SocketAddr) {
    let admitted = ctx.lobby.write().await.try_admit();
    if !admitted {
        warn!("Rejecting {}: server full", peer);
        let envelope = Envelope::new(
            Sender::Server,
            Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        );
        if let Err(e) = write_frame(&mut stream, &envelope).await {
            debug!("Could not notify {}: {}", peer, e);
        }
        return;
    }

    info!("Client connected from {}", peer);
    let session = Session::new(Arc::clone(&ctx), stream, peer);
    match session.run().await {
        Ok(()) => info!("{} closed the connection", peer),
        Err(ServerError::IdleTimeout(idle)) => {
            info!("Dropping {} after {:?} without a request", peer, idle)
        }
        Err(e) => warn!("Connection with {} ended: {}", peer, e),
    }

    ctx.lobby.write().await.release();
}
