//! Player and world model.
//!
//! A `World` is exactly four player slots and slot `i` always holds the player with id `i`.
//! Players are created once and only their `draw_matrix` ever changes.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{
    codec::ProtocolError,
    math::{Matrix, Vec2},
};

/// Number of player slots.
pub const MAX_PLAYERS: usize = 4;

/// Starting placements, indexed by player id.
pub const DEFAULT_POSITIONS: [Vec2; MAX_PLAYERS] = [
    Vec2::new(250.0, 250.0),
    Vec2::new(750.0, 250.0),
    Vec2::new(250.0, 500.0),
    Vec2::new(750.0, 500.0),
];

/// Player identity, always in `0..MAX_PLAYERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u8);

impl PlayerId {
    /// The host process drives slot 0.
    pub const HOST: Self = Self(0);

    pub const ALL: [Self; MAX_PLAYERS] = [Self(0), Self(1), Self(2), Self(3)];

    pub const fn new(id: u8) -> Option<Self> {
        if (id as usize) < MAX_PLAYERS {
            Some(Self(id))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub fn is_host(self) -> bool {
        self == Self::HOST
    }
}

impl TryFrom<i64> for PlayerId {
    type Error = ProtocolError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u8::try_from(raw)
            .ok()
            .and_then(PlayerId::new)
            .ok_or(ProtocolError::PlayerIdOutOfRange(raw))
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One participant: identity plus placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub draw_matrix: Matrix,
}

impl Player {
    pub fn new(id: PlayerId, draw_matrix: Matrix) -> Self {
        Self { id, draw_matrix }
    }

    pub fn position(&self) -> Vec2 {
        self.draw_matrix.position()
    }
}

/// The four player slots.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    players: [Player; MAX_PLAYERS],
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates the world with every player at its default placement.
    pub fn new() -> Self {
        Self {
            players: PlayerId::ALL.map(|id| Player::new(id, Matrix::at(DEFAULT_POSITIONS[id.index()]))),
        }
    }

    /// Builds a world from per-slot matrices; slot `i` gets player id `i`.
    pub fn from_matrices(matrices: [Matrix; MAX_PLAYERS]) -> Self {
        let mut world = Self::new();
        for (player, m) in world.players.iter_mut().zip(matrices) {
            player.draw_matrix = m;
        }
        world
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id.index()]
    }

    pub fn players(&self) -> &[Player; MAX_PLAYERS] {
        &self.players
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn set_matrix(&mut self, id: PlayerId, m: Matrix) {
        self.players[id.index()].draw_matrix = m;
    }

    /// Last write wins for the player's slot.
    pub fn apply(&mut self, update: &Player) {
        self.set_matrix(update.id, update.draw_matrix);
    }

    /// Overwrites every slot from `other`, except `keep` if given.
    pub fn merge_from(&mut self, other: &World, keep: Option<PlayerId>) {
        for (mine, theirs) in self.players.iter_mut().zip(other.players.iter()) {
            if Some(mine.id) != keep {
                mine.draw_matrix = theirs.draw_matrix;
            }
        }
    }
}

/// A world replica shared between the frontend loop and the sync loop.
#[derive(Debug, Clone, Default)]
pub struct SharedWorld {
    inner: Arc<Mutex<World>>,
}

impl SharedWorld {
    pub fn new(world: World) -> Self {
        Self {
            inner: Arc::new(Mutex::new(world)),
        }
    }

    pub fn snapshot(&self) -> World {
        self.inner.lock().clone()
    }

    pub fn player(&self, id: PlayerId) -> Player {
        *self.inner.lock().player(id)
    }

    pub fn set_matrix(&self, id: PlayerId, m: Matrix) {
        self.inner.lock().set_matrix(id, m);
    }

    pub fn merge_from(&self, other: &World, keep: Option<PlayerId>) {
        self.inner.lock().merge_from(other, keep);
    }
}
