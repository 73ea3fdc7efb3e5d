//! Client implementation.
//!
//! The client maintains:
//! - One persistent WebSocket to the host
//! - A local world replica shared with the frontend loop
//! - A fixed-rate sync loop: send own player, wait for the merged world, absorb it
//!
//! Every slot but our own is overwritten from the host's reply. The host applies an update before
//! it snapshots the reply, so the echoed own slot always equals what was just sent; it is checked,
//! not applied, so a fresher local sample written during the round is not rolled back.

use std::time::Duration;

use anyhow::Context;
use fieldsync_shared::{
    codec::{decode_world, encode_player},
    config::SyncConfig,
    net::{self, protocol_error, ClientConn, FrameKind},
    world::{PlayerId, SharedWorld, World},
};
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Client connection state.
///
/// `Disconnected -> Connected -> Syncing -> Failed` on error, or back to `Disconnected` on a
/// requested shutdown. `Failed` is terminal; nothing reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected to any host.
    Disconnected,
    /// Connected, no sync round run yet.
    Connected,
    /// Sync loop running.
    Syncing,
    /// A send, receive, or decode failed; the connection is gone.
    Failed,
}

/// Sync client for one local player.
pub struct SyncClient {
    pub player_id: PlayerId,
    pub state: ClientState,
    conn: ClientConn,
    world: SharedWorld,
    tick_interval: Duration,
    rounds: u64,
}

impl SyncClient {
    /// Connects to the host in `cfg`. Dial failure is an error; there is no retry.
    pub async fn connect(
        cfg: &SyncConfig,
        player_id: PlayerId,
        world: SharedWorld,
    ) -> anyhow::Result<Self> {
        if player_id.is_host() {
            anyhow::bail!("player {player_id} is reserved for the host");
        }
        let url = cfg.player_url();
        info!(%url, player = %player_id, "Connecting to host");

        let conn = net::connect(&url, cfg.client_timeouts()).await?;

        info!(player = %player_id, "Connected to host");
        Ok(Self {
            player_id,
            state: ClientState::Connected,
            conn,
            world,
            tick_interval: cfg.tick_interval(),
            rounds: 0,
        })
    }

    /// The replica this client writes into.
    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    /// Completed sync rounds.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// One sync round: push own player, absorb the merged world. Returns the received world.
    pub async fn sync_once(&mut self) -> anyhow::Result<World> {
        let me = self.world.player(self.player_id);
        let msg = encode_player(&me)?;
        self.conn.send(FrameKind::Text, msg).await?;

        let frame = self
            .conn
            .recv()
            .await?
            .context("host closed the connection")?;
        let received = World::try_from(decode_world(&frame.payload)?)?;

        let echoed = received.player(self.player_id).draw_matrix;
        if echoed != me.draw_matrix {
            warn!(player = %self.player_id, ?echoed, sent = ?me.draw_matrix, "host echo differs from sent update");
        }
        self.world.merge_from(&received, Some(self.player_id));
        self.rounds += 1;
        trace!(player = %self.player_id, rounds = self.rounds, "sync round");
        Ok(received)
    }

    /// Runs sync rounds every tick until an error or until `shutdown` flips to `true`.
    /// Returns the final state.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ClientState {
        self.state = ClientState::Syncing;
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once().await {
                        let detail = format!("{e:#}");
                        if protocol_error(&e).is_some() {
                            warn!(player = %self.player_id, error = %detail, "protocol error, sync stopped");
                        } else {
                            warn!(player = %self.player_id, error = %detail, "connection error, sync stopped");
                        }
                        self.state = ClientState::Failed;
                        self.conn.close().await;
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!(player = %self.player_id, "shutdown requested");
                        self.conn.close().await;
                        self.state = ClientState::Disconnected;
                        break;
                    }
                }
            }
        }

        info!(player = %self.player_id, rounds = self.rounds, state = ?self.state, "Sync loop ended");
        self.state
    }

    /// Closes the connection without running the loop.
    pub async fn close(mut self) -> ClientState {
        self.conn.close().await;
        ClientState::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_shared::{
        codec::{decode_player, encode_world, WorldMsg},
        math::{Matrix, Vec2},
        net::SyncListener,
        world::Player,
    };

    fn id(n: u8) -> PlayerId {
        PlayerId::new(n).unwrap()
    }

    /// Host stand-in answering each update via `reply`, for `rounds` rounds, then hanging up.
    async fn fake_host<F>(rounds: usize, reply: F) -> anyhow::Result<SyncConfig>
    where
        F: Fn(World, Player) -> String + Send + 'static,
    {
        let listener = SyncListener::bind("127.0.0.1:0").await?;
        let cfg = SyncConfig {
            server_addr: listener.local_addr()?.to_string(),
            tick_hz: 200,
            read_timeout_ms: 1_000,
            ..Default::default()
        };
        let timeouts = cfg.host_timeouts();
        let path = cfg.path.clone();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let mut conn = net::accept(stream, &path, timeouts).await?;
            let mut world = World::new();
            for _ in 0..rounds {
                let Some(frame) = conn.recv().await? else { break };
                let update = Player::try_from(decode_player(&frame.payload)?)?;
                world.apply(&update);
                conn.send(frame.kind, reply(world.clone(), update)).await?;
            }
            conn.close().await;
            Ok::<_, anyhow::Error>(())
        });
        Ok(cfg)
    }

    #[tokio::test]
    async fn sync_once_absorbs_merged_world() -> anyhow::Result<()> {
        let cfg = fake_host(1, |mut world, _| {
            world.set_matrix(id(3), Matrix::at(Vec2::new(1.0, 2.0)));
            encode_world(&world).unwrap()
        })
        .await?;

        let replica = SharedWorld::default();
        replica.set_matrix(id(1), Matrix::at(Vec2::new(100.0, 100.0)));
        let mut client = SyncClient::connect(&cfg, id(1), replica.clone()).await?;
        assert_eq!(client.state, ClientState::Connected);

        let received = client.sync_once().await?;
        assert_eq!(received.player(id(1)).position(), Vec2::new(100.0, 100.0));
        assert_eq!(replica.player(id(3)).position(), Vec2::new(1.0, 2.0));
        assert_eq!(client.rounds(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn bad_world_shape_fails_the_loop() -> anyhow::Result<()> {
        let cfg = fake_host(5, |world, _| {
            let mut msg = WorldMsg::from(&world);
            msg.players.truncate(3);
            serde_json::to_string(&msg).unwrap()
        })
        .await?;

        let replica = SharedWorld::default();
        let client = SyncClient::connect(&cfg, id(2), replica.clone()).await?;
        let (_tx, rx) = watch::channel(false);
        assert_eq!(client.run(rx).await, ClientState::Failed);
        assert_eq!(replica.snapshot(), World::new());
        Ok(())
    }

    #[tokio::test]
    async fn host_hangup_fails_after_last_round() -> anyhow::Result<()> {
        let cfg = fake_host(3, |world, _| encode_world(&world).unwrap()).await?;
        let client = SyncClient::connect(&cfg, id(2), SharedWorld::default()).await?;
        let (_tx, rx) = watch::channel(false);
        assert_eq!(client.run(rx).await, ClientState::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_disconnects() -> anyhow::Result<()> {
        let cfg = fake_host(usize::MAX, |world, _| encode_world(&world).unwrap()).await?;
        let client = SyncClient::connect(&cfg, id(3), SharedWorld::default()).await?;
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(client.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true)?;
        assert_eq!(handle.await?, ClientState::Disconnected);
        Ok(())
    }

    #[tokio::test]
    async fn refuses_host_slot_and_dead_host() -> anyhow::Result<()> {
        let listener = SyncListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        drop(listener);

        let cfg = SyncConfig {
            server_addr: addr,
            ..Default::default()
        };
        assert!(SyncClient::connect(&cfg, PlayerId::HOST, SharedWorld::default())
            .await
            .is_err());
        assert!(SyncClient::connect(&cfg, id(1), SharedWorld::default())
            .await
            .is_err());
        Ok(())
    }
}
