//! World authority.
//!
//! The canonical `World` lives inside a single task. Connection handlers and the host's own
//! frontend reach it through a cloneable `WorldHandle`; requests are served one at a time in
//! arrival order, so "apply this update, then give me the world" is atomic with respect to every
//! other connection.

use anyhow::Context;
use async_trait::async_trait;
use fieldsync_shared::{
    frontend::WorldView,
    math::Matrix,
    world::{Player, PlayerId, World},
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Pending requests before senders start waiting.
const REQUEST_QUEUE: usize = 256;

enum Request {
    Apply {
        update: Player,
        reply: oneshot::Sender<World>,
    },
    Snapshot {
        reply: oneshot::Sender<World>,
    },
}

/// Owner of the canonical world.
pub struct WorldAuthority {
    world: World,
    rx: mpsc::Receiver<Request>,
    applied: u64,
}

impl WorldAuthority {
    /// Moves `world` into a new task and returns a handle to it.
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn(world: World) -> WorldHandle {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        let authority = Self {
            world,
            rx,
            applied: 0,
        };
        tokio::spawn(authority.run());
        WorldHandle { tx }
    }

    async fn run(mut self) {
        while let Some(req) = self.rx.recv().await {
            match req {
                Request::Apply { update, reply } => {
                    self.world.apply(&update);
                    self.applied += 1;
                    trace!(player = %update.id, applied = self.applied, "update applied");
                    // The requester may have gone away; the update still counts.
                    let _ = reply.send(self.world.clone());
                }
                Request::Snapshot { reply } => {
                    let _ = reply.send(self.world.clone());
                }
            }
        }
        debug!(applied = self.applied, "world authority stopped");
    }
}

/// Cloneable access to the authority task.
#[derive(Clone)]
pub struct WorldHandle {
    tx: mpsc::Sender<Request>,
}

impl WorldHandle {
    /// Applies `update` and returns the world as it stands right after it.
    pub async fn apply(&self, update: Player) -> anyhow::Result<World> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Apply { update, reply })
            .await
            .ok()
            .context("world authority stopped")?;
        rx.await.context("world authority dropped reply")
    }

    pub async fn snapshot(&self) -> anyhow::Result<World> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Snapshot { reply })
            .await
            .ok()
            .context("world authority stopped")?;
        rx.await.context("world authority dropped reply")
    }
}

#[async_trait]
impl WorldView for WorldHandle {
    async fn set_local(&self, id: PlayerId, draw_matrix: Matrix) -> anyhow::Result<()> {
        self.apply(Player::new(id, draw_matrix)).await.map(drop)
    }

    async fn snapshot(&self) -> anyhow::Result<World> {
        WorldHandle::snapshot(self).await
    }
}
