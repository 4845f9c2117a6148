//! Wire messages and their JSON encoding.
//!
//! Every message is one JSON object tagged by its `type` field, e.g.
//! `{"type":"attack","coordinate":{"x":3,"y":4}}`. Coordinates on the wire
//! are 1-indexed except the `x_start`/`y_start` anchors of a fleet entry.

use serde::{Deserialize, Serialize};

use crate::common::GridError;
use crate::grid::Grid;
use crate::ship::{Orientation, Ship, ShipSpec};

pub const WAITING_MESSAGE: &str = "Server << Waiting for your opponent to join..";
pub const WIN_MESSAGE: &str = "Bravo. You win !!!";
pub const LOSE_MESSAGE: &str = "You lost. Better luck next time :`(";
pub const FORFEIT_MESSAGE: &str = "Your opponent has quit the game. You win :)";

/// Messages exchanged between a player and the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Keep-alive while the session is unpaired.
    WaitForOpponent { message: String },
    /// Both players are paired; placement begins.
    StartGame,
    /// A full fleet layout. From the server, `starting` is set when the
    /// recipient fires first.
    Coordinates {
        ships: Vec<ShipPlacement>,
        #[serde(default, with = "flag")]
        starting: bool,
    },
    /// A fired shot.
    Attack { coordinate: WireCoordinate },
    /// Result of a shot, sent by the defender and relayed to the attacker.
    AttackStatus(AttackStatus),
    /// It is now the recipient's turn to fire.
    LaunchHit,
    /// The match is over.
    EndGame {
        #[serde(with = "flag")]
        is_win: bool,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attack_status: Option<AttackStatus>,
    },
    /// The submitted fleet was refused; the player may submit another one.
    PlacementRejected { message: String },
    /// Voluntary disconnect.
    Exit,
    /// Server-initiated teardown.
    Close,
    /// Any `type` this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Message {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::WaitForOpponent { .. } => "wait_for_opponent",
            Message::StartGame => "start_game",
            Message::Coordinates { .. } => "coordinates",
            Message::Attack { .. } => "attack",
            Message::AttackStatus(_) => "attack_status",
            Message::LaunchHit => "launch_hit",
            Message::EndGame { .. } => "end_game",
            Message::PlacementRejected { .. } => "placement_rejected",
            Message::Exit => "exit",
            Message::Close => "close",
            Message::Unknown => "unknown",
        }
    }
}

/// A 1-indexed grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCoordinate {
    pub x: usize,
    pub y: usize,
}

impl WireCoordinate {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Outcome of one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackStatus {
    #[serde(with = "flag")]
    pub status: bool,
    pub coordinate: WireCoordinate,
}

/// One ship of a serialized fleet.
///
/// `height`/`width` are the footprint before orientation and
/// `x_start`/`y_start` the 0-indexed top-left corner, so replaying the entry
/// through [`Grid::place`] reproduces the same cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipPlacement {
    pub name: String,
    pub sign: String,
    pub height: usize,
    pub width: usize,
    pub x_start: usize,
    pub y_start: usize,
    pub orientation: Orientation,
}

impl ShipPlacement {
    pub fn from_ship(ship: &Ship) -> Self {
        let orientation = Grid::detect_orientation(ship);
        let (height, width) = match orientation {
            Orientation::Horizontal => (ship.height(), ship.width()),
            Orientation::Vertical => (ship.width(), ship.height()),
        };
        let (x_start, y_start) = ship.anchor();
        Self {
            name: ship.name().to_string(),
            sign: ship.sign().to_string(),
            height,
            width,
            x_start,
            y_start,
            orientation,
        }
    }

    pub fn spec(&self) -> Result<ShipSpec, GridError> {
        ShipSpec::with_sign_str(self.name.clone(), &self.sign, self.height, self.width)
    }

    /// 1-indexed anchor for [`Grid::place`].
    pub fn anchor(&self) -> (usize, usize) {
        (self.x_start.saturating_add(1), self.y_start.saturating_add(1))
    }
}

/// Serialize every ship of `grid` in placement order.
pub fn serialize_fleet(grid: &Grid) -> Vec<ShipPlacement> {
    grid.ships().iter().map(ShipPlacement::from_ship).collect()
}

/// Build a fresh grid from a serialized fleet. Any invalid entry rejects the
/// whole fleet.
pub fn fleet_grid(
    width: usize,
    height: usize,
    ships: &[ShipPlacement],
) -> Result<Grid, GridError> {
    if ships.is_empty() {
        return Err(GridError::EmptyFleet);
    }
    let mut grid = Grid::new(width, height);
    for entry in ships {
        let spec = entry.spec()?;
        grid.place(&spec, entry.anchor(), entry.orientation)?;
    }
    Ok(grid)
}

/// Encode a message as a single line of JSON, without the trailing newline.
pub fn encode(msg: &Message) -> anyhow::Result<String> {
    serde_json::to_string(msg).map_err(|e| anyhow::anyhow!("Serialization error: {}", e))
}

/// Decode one line of JSON.
pub fn decode(line: &str) -> anyhow::Result<Message> {
    serde_json::from_str(line.trim_end_matches(['\r', '\n']))
        .map_err(|e| anyhow::anyhow!("Deserialization error: {}", e))
}

/// Booleans travel as `0`/`1`; JSON `true`/`false` are accepted as well.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bool(bool),
            Int(i64),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Bool(b) => b,
            Repr::Int(i) => i != 0,
        })
    }
}
