//! Frontend loop.
//!
//! Stands in for the window loop: every frame it samples local input, writes the local player's
//! placement into the world, and draws all four players from a snapshot. The world behind it is
//! either a client replica (`SharedWorld`) or the host's authority handle.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, info};

use crate::{
    input::PositionSource,
    math::Matrix,
    render::RenderBackend,
    world::{PlayerId, SharedWorld, World},
};

/// The frontend's access to a world.
#[async_trait]
pub trait WorldView: Send + Sync {
    /// Writes the local player's placement.
    async fn set_local(&self, id: PlayerId, draw_matrix: Matrix) -> anyhow::Result<()>;

    /// Current state of all four players.
    async fn snapshot(&self) -> anyhow::Result<World>;
}

#[async_trait]
impl WorldView for SharedWorld {
    async fn set_local(&self, id: PlayerId, draw_matrix: Matrix) -> anyhow::Result<()> {
        self.set_matrix(id, draw_matrix);
        Ok(())
    }

    async fn snapshot(&self) -> anyhow::Result<World> {
        Ok(SharedWorld::snapshot(self))
    }
}

/// Runs one frame.
pub async fn draw_frame<V, P, R>(
    view: &V,
    local: PlayerId,
    source: &mut P,
    renderer: &mut R,
    dt: f64,
) -> anyhow::Result<()>
where
    V: WorldView + ?Sized,
    P: PositionSource + ?Sized,
    R: RenderBackend + ?Sized,
{
    if let Some(pos) = source.sample(dt) {
        view.set_local(local, Matrix::at(pos)).await?;
    }
    let world = view.snapshot().await?;
    renderer.begin_frame();
    for player in world.iter() {
        renderer.draw_player(player.id, &player.draw_matrix);
    }
    renderer.end_frame();
    Ok(())
}

/// Runs frames at `frame_interval` until `shutdown` flips to `true`. Returns the frame count.
pub async fn run_frontend<V, P, R>(
    view: &V,
    local: PlayerId,
    source: &mut P,
    renderer: &mut R,
    frame_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<u64>
where
    V: WorldView + ?Sized,
    P: PositionSource + ?Sized,
    R: RenderBackend + ?Sized,
{
    info!(player = %local, "frontend running");
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let dt = frame_interval.as_secs_f64();
    let mut frames = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                draw_frame(view, local, source, renderer, dt).await?;
                frames += 1;
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!(frames, "frontend stopped");
    Ok(frames)
}
