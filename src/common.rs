//! Common types: grid and match errors, seats and identifiers.

use core::fmt;

use thiserror::Error;

/// Errors returned by ship construction and grid placement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Footprint extends past the grid edges.
    #[error("ship placement out of bounds: anchor ({x}, {y}) with footprint {span_x}x{span_y}")]
    OutOfBounds {
        x: usize,
        y: usize,
        span_x: usize,
        span_y: usize,
    },
    /// Target cell (1-indexed) already belongs to a placed ship.
    #[error("coordinate ({x}, {y}) is already taken")]
    CoordinateTaken { x: usize, y: usize },
    /// Sign is empty, longer than one character, or the empty-cell sign.
    #[error("invalid ship sign ({0:?})")]
    InvalidShipSign(String),
    /// Height or width of zero.
    #[error("invalid ship footprint {height}x{width}")]
    InvalidFootprint { height: usize, width: usize },
    /// A ship with this name is already on the grid.
    #[error("ship {0:?} is already placed")]
    ShipAlreadyPlaced(String),
    /// A fleet without ships.
    #[error("fleet contains no ships")]
    EmptyFleet,
}

/// Errors raised while assembling a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("number of players inside match {0} exceeded")]
    TooManyPlayers(MatchId),
    #[error("match {0} needs two players to start")]
    NotEnoughPlayers(MatchId),
}

/// One of the two sides of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    A,
    B,
}

impl Seat {
    pub const BOTH: [Seat; 2] = [Seat::A, Seat::B];

    pub fn other(self) -> Seat {
        match self {
            Seat::A => Seat::B,
            Seat::B => Seat::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Seat::A => 0,
            Seat::B => 1,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::A => write!(f, "A"),
            Seat::B => write!(f, "B"),
        }
    }
}

/// Identifier the registry assigns to each accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic identifier the matchmaker assigns to each match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchId(pub u64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
