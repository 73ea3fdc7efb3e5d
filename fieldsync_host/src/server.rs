//! Host implementation.
//!
//! The host accepts WebSocket connections on a single path and runs one task per connection.
//! Each task is a strict request/response loop:
//!
//! 1. receive one player update
//! 2. decode and validate it (any failure closes the connection, nothing is applied)
//! 3. apply it through the world authority and get the merged world back
//! 4. reply with the merged world on the same connection
//!
//! There is no broadcast: a client only learns about other players' moves when it sends its
//! own next update.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use fieldsync_shared::{
    codec::{decode_player, encode_world},
    config::{SyncConfig, Timeouts},
    net::{self, protocol_error, HostConn, SyncListener, ACCEPT_BACKOFF},
    world::{Player, World},
};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

use crate::authority::{WorldAuthority, WorldHandle};

/// Connection-lifetime counter shared with handler tasks.
#[derive(Clone, Default)]
struct ConnCounter(Arc<AtomicUsize>);

struct ConnGuard(ConnCounter);

impl ConnCounter {
    fn enter(&self) -> ConnGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        ConnGuard(self.clone())
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Drop for ConnGuard {
    fn drop(&mut self) {
        (self.0).0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnEnd {
    /// Peer closed or the stream ended.
    Closed,
    /// Peer sent something that failed decoding or validation.
    Rejected(String),
    /// Read/write failure or timeout.
    Failed(String),
}

/// Host server.
pub struct HostServer {
    pub cfg: SyncConfig,
    listener: SyncListener,
    world: WorldHandle,
    active: ConnCounter,
    accepted: u64,
}

impl HostServer {
    /// Binds the listener and starts the world authority with the default placements.
    pub async fn bind(cfg: SyncConfig) -> anyhow::Result<Self> {
        Self::bind_with_world(cfg, World::new()).await
    }

    pub async fn bind_with_world(cfg: SyncConfig, world: World) -> anyhow::Result<Self> {
        let listener = SyncListener::bind(&cfg.server_addr).await?;
        Ok(Self {
            cfg,
            listener,
            world: WorldAuthority::spawn(world),
            active: ConnCounter::default(),
            accepted: 0,
        })
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the canonical world, e.g. for the host's own player.
    pub fn world(&self) -> WorldHandle {
        self.world.clone()
    }

    /// Connections whose handler is still running.
    pub fn active_connections(&self) -> usize {
        self.active.get()
    }

    /// Accepts one TCP connection and spawns its handler.
    pub async fn accept_one(&mut self) -> anyhow::Result<SocketAddr> {
        let (stream, peer) = self.listener.accept().await?;
        self.accepted += 1;
        info!(%peer, accepted = self.accepted, "connection accepted");

        let world = self.world.clone();
        let path = self.cfg.path.clone();
        let timeouts = self.cfg.host_timeouts();
        let guard = self.active.enter();
        tokio::spawn(async move {
            let end = serve(stream, peer, &path, timeouts, world).await;
            drop(guard);
            match end {
                ConnEnd::Closed => info!(%peer, "connection closed"),
                ConnEnd::Rejected(why) => warn!(%peer, reason = %why, "connection rejected"),
                ConnEnd::Failed(why) => warn!(%peer, error = %why, "connection failed"),
            }
        });
        Ok(peer)
    }

    /// Accept loop. Runs until the listener itself fails.
    ///
    /// Errors on individual accepts (e.g. running out of file descriptors) are logged and
    /// retried after a short pause.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!(addr = %self.local_addr()?, path = %self.cfg.path, "host accepting");
        loop {
            if let Err(e) = self.accept_one().await {
                error!(error = %e, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    path: &str,
    timeouts: Timeouts,
    world: WorldHandle,
) -> ConnEnd {
    let conn = match net::accept(stream, path, timeouts).await {
        Ok(conn) => conn,
        Err(e) => return ConnEnd::Failed(format!("{e:#}")),
    };
    debug!(%peer, "websocket upgraded");
    handle_connection(conn, peer, &world).await
}

/// Request/response loop for one client connection.
pub async fn handle_connection(mut conn: HostConn, peer: SocketAddr, world: &WorldHandle) -> ConnEnd {
    let mut rounds = 0u64;
    let end = loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break ConnEnd::Closed,
            Err(e) => break ConnEnd::Failed(format!("{e:#}")),
        };

        let update = match decode_player(&frame.payload)
            .and_then(|msg| Player::try_from(msg).map_err(anyhow::Error::from))
        {
            Ok(update) => update,
            Err(e) => {
                let why = protocol_error(&e).map_or_else(|| format!("{e:#}"), |p| p.to_string());
                break ConnEnd::Rejected(why);
            }
        };

        let merged = match world.apply(update).await {
            Ok(w) => w,
            Err(e) => break ConnEnd::Failed(format!("{e:#}")),
        };

        let reply = match encode_world(&merged) {
            Ok(r) => r,
            Err(e) => break ConnEnd::Failed(format!("{e:#}")),
        };
        if let Err(e) = conn.send(frame.kind, reply).await {
            break ConnEnd::Failed(format!("{e:#}"));
        }

        rounds += 1;
        trace!(%peer, player = %update.id, rounds, "sync round");
    };

    conn.close().await;
    end
}

/// Helper for tests: bind to an ephemeral port on localhost.
pub async fn bind_ephemeral() -> anyhow::Result<(HostServer, SyncConfig)> {
    let cfg = SyncConfig {
        server_addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    };
    let mut server = HostServer::bind(cfg).await?;
    server.cfg.server_addr = server.local_addr()?.to_string();
    let cfg = server.cfg.clone();
    Ok((server, cfg))
}
