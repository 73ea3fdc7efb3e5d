//! Message codec.
//!
//! JSON text on the wire:
//! - client -> host: `{"DrawMatrix":[a,b,c,d,e,f],"PlayerId":1}`
//! - host -> client: `{"Players":[<player>, <player>, <player>, <player>]}`
//!
//! Decoding only checks the shape of the JSON. Ranges and slot layout are checked by the
//! `TryFrom` conversions into the domain types, which every receiver must go through before
//! touching a `World`.

use std::fmt;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    math::Matrix,
    world::{Player, PlayerId, World, MAX_PLAYERS},
};

/// Protocol-level failures. Carried inside `anyhow::Error`; use `downcast_ref` to classify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload is not a well-formed message.
    Malformed(String),
    /// Player id outside `0..MAX_PLAYERS`.
    PlayerIdOutOfRange(i64),
    /// World does not have one player per slot in id order.
    WorldShape(String),
    /// Peer went silent on a read or write.
    Timeout(&'static str),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Malformed(why) => write!(f, "malformed payload: {why}"),
            ProtocolError::PlayerIdOutOfRange(id) => {
                write!(f, "player id {id} outside 0..{MAX_PLAYERS}")
            }
            ProtocolError::WorldShape(why) => write!(f, "bad world shape: {why}"),
            ProtocolError::Timeout(op) => write!(f, "{op} timed out"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Wire form of a player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerMsg {
    #[serde(rename = "DrawMatrix")]
    pub draw_matrix: Matrix,
    #[serde(rename = "PlayerId")]
    pub player_id: i64,
}

/// Wire form of a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldMsg {
    #[serde(rename = "Players")]
    pub players: Vec<PlayerMsg>,
}

impl From<&Player> for PlayerMsg {
    fn from(p: &Player) -> Self {
        Self {
            draw_matrix: p.draw_matrix,
            player_id: i64::from(p.id.get()),
        }
    }
}

impl From<&World> for WorldMsg {
    fn from(w: &World) -> Self {
        Self {
            players: w.iter().map(PlayerMsg::from).collect(),
        }
    }
}

impl TryFrom<PlayerMsg> for Player {
    type Error = ProtocolError;

    fn try_from(msg: PlayerMsg) -> Result<Self, Self::Error> {
        let id = PlayerId::try_from(msg.player_id)?;
        if !msg.draw_matrix.is_finite() {
            return Err(ProtocolError::Malformed("non-finite matrix".into()));
        }
        Ok(Player::new(id, msg.draw_matrix))
    }
}

impl TryFrom<WorldMsg> for World {
    type Error = ProtocolError;

    fn try_from(msg: WorldMsg) -> Result<Self, Self::Error> {
        if msg.players.len() != MAX_PLAYERS {
            return Err(ProtocolError::WorldShape(format!(
                "expected {MAX_PLAYERS} players, got {}",
                msg.players.len()
            )));
        }
        let mut world = World::new();
        for (slot, p) in msg.players.into_iter().enumerate() {
            let player = Player::try_from(p)?;
            if player.id.index() != slot {
                return Err(ProtocolError::WorldShape(format!(
                    "player {} in slot {slot}",
                    player.id
                )));
            }
            world.apply(&player);
        }
        Ok(world)
    }
}

pub fn encode_player(p: &Player) -> anyhow::Result<String> {
    serde_json::to_string(&PlayerMsg::from(p)).context("serialize player")
}

pub fn encode_world(w: &World) -> anyhow::Result<String> {
    serde_json::to_string(&WorldMsg::from(w)).context("serialize world")
}

pub fn decode_player(b: &[u8]) -> anyhow::Result<PlayerMsg> {
    serde_json::from_slice(b).map_err(|e| ProtocolError::Malformed(e.to_string()).into())
}

pub fn decode_world(b: &[u8]) -> anyhow::Result<WorldMsg> {
    serde_json::from_slice(b).map_err(|e| ProtocolError::Malformed(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn protocol_err(e: &anyhow::Error) -> &ProtocolError {
        e.downcast_ref::<ProtocolError>().expect("protocol error")
    }

    #[test]
    fn player_roundtrip_keeps_id_and_transform() {
        let m = Matrix::at(Vec2::new(100.0, 100.0)).rotated(Vec2::new(3.0, 4.0), 0.3);
        for id in PlayerId::ALL {
            let p = Player::new(id, m);
            let msg = decode_player(encode_player(&p).unwrap().as_bytes()).unwrap();
            assert_eq!(Player::try_from(msg).unwrap(), p);
        }
    }

    #[test]
    fn player_wire_field_names() {
        let p = Player::new(PlayerId::new(1).unwrap(), Matrix::at(Vec2::new(100.0, 100.0)));
        assert_eq!(
            encode_player(&p).unwrap(),
            r#"{"DrawMatrix":[1.0,0.0,0.0,1.0,100.0,100.0],"PlayerId":1}"#
        );
    }

    #[test]
    fn world_encodes_four_players_in_slot_order() {
        let msg = decode_world(encode_world(&World::new()).unwrap().as_bytes()).unwrap();
        let ids: Vec<i64> = msg.players.iter().map(|p| p.player_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(World::try_from(msg).unwrap(), World::new());
    }

    #[test]
    fn decode_does_not_range_check() {
        let msg = decode_player(br#"{"DrawMatrix":[1,0,0,1,5,5],"PlayerId":9}"#).unwrap();
        assert_eq!(msg.player_id, 9);
        assert_eq!(
            Player::try_from(msg),
            Err(ProtocolError::PlayerIdOutOfRange(9))
        );
    }

    #[test]
    fn malformed_payloads_are_protocol_errors() {
        let cases: [&[u8]; 4] = [
            b"not json",
            br#"{"PlayerId":1}"#,
            br#"{"DrawMatrix":[1,0,0],"PlayerId":1}"#,
            br#"{"DrawMatrix":[1,0,0,1,0,0],"PlayerId":"one"}"#,
        ];
        for raw in cases {
            let err = decode_player(raw).unwrap_err();
            assert!(matches!(protocol_err(&err), ProtocolError::Malformed(_)), "{raw:?}");
        }
    }

    #[test]
    fn world_shape_is_validated() {
        let mut msg = WorldMsg::from(&World::new());
        msg.players.pop();
        assert!(matches!(World::try_from(msg), Err(ProtocolError::WorldShape(_))));

        let mut msg = WorldMsg::from(&World::new());
        msg.players.swap(0, 1);
        assert!(matches!(World::try_from(msg), Err(ProtocolError::WorldShape(_))));
    }
}
