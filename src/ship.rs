//! Ship footprints, placed ships and the coordinates they own.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::common::GridError;
use crate::config::EMPTY_SIGN;

/// Orientation of a ship on the grid.
///
/// Horizontal lays the declared height along the x axis and the width along
/// the y axis; vertical swaps the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[serde(rename = "h", alias = "horizontal")]
    Horizontal,
    #[serde(rename = "v", alias = "vertical")]
    Vertical,
}

/// A 0-indexed cell owned by a placed ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    x: usize,
    y: usize,
    damaged: bool,
}

impl Coordinate {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y, damaged: false }
    }

    pub fn x(&self) -> usize {
        self.x
    }

    pub fn y(&self) -> usize {
        self.y
    }

    pub fn is_damaged(&self) -> bool {
        self.damaged
    }

    pub(crate) fn set_damaged(&mut self) {
        self.damaged = true;
    }
}

/// A ship before placement: name, sign and footprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipSpec {
    name: String,
    sign: char,
    height: usize,
    width: usize,
}

impl ShipSpec {
    /// Create a footprint, rejecting the empty-cell sign and zero dimensions.
    pub fn new(
        name: impl Into<String>,
        sign: char,
        height: usize,
        width: usize,
    ) -> Result<Self, GridError> {
        if sign == EMPTY_SIGN || sign.is_whitespace() || sign.is_control() {
            return Err(GridError::InvalidShipSign(sign.to_string()));
        }
        if height == 0 || width == 0 {
            return Err(GridError::InvalidFootprint { height, width });
        }
        Ok(Self {
            name: name.into(),
            sign,
            height,
            width,
        })
    }

    /// Same as [`ShipSpec::new`] but takes the sign as text, which must be
    /// exactly one character.
    pub fn with_sign_str(
        name: impl Into<String>,
        sign: &str,
        height: usize,
        width: usize,
    ) -> Result<Self, GridError> {
        let mut chars = sign.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(name, c, height, width),
            _ => Err(GridError::InvalidShipSign(sign.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sign(&self) -> char {
        self.sign
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Cells covered along (x, y) once `orientation` is applied.
    pub fn span(&self, orientation: Orientation) -> (usize, usize) {
        match orientation {
            Orientation::Horizontal => (self.height, self.width),
            Orientation::Vertical => (self.width, self.height),
        }
    }
}

/// A ship bound to concrete grid coordinates.
///
/// `height` and `width` hold the oriented footprint, so a vertical placement
/// stores them swapped.
#[derive(Clone, PartialEq, Eq)]
pub struct Ship {
    name: String,
    sign: char,
    height: usize,
    width: usize,
    coordinates: Vec<Coordinate>,
}

impl Ship {
    pub(crate) fn placed(
        spec: &ShipSpec,
        orientation: Orientation,
        coordinates: Vec<Coordinate>,
    ) -> Self {
        let (height, width) = spec.span(orientation);
        Self {
            name: spec.name.clone(),
            sign: spec.sign,
            height,
            width,
            coordinates,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sign(&self) -> char {
        self.sign
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub(crate) fn coordinate_mut(&mut self, index: usize) -> Option<&mut Coordinate> {
        self.coordinates.get_mut(index)
    }

    /// Top-left corner, 0-indexed.
    pub fn anchor(&self) -> (usize, usize) {
        let x = self.coordinates.iter().map(|c| c.x).min().unwrap_or(0);
        let y = self.coordinates.iter().map(|c| c.y).min().unwrap_or(0);
        (x, y)
    }

    pub fn damaged_count(&self) -> usize {
        self.coordinates.iter().filter(|c| c.damaged).count()
    }
}

impl fmt::Debug for Ship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ship {{ name: \"{}\", sign: '{}', footprint: {}x{}, anchor: {:?}, damaged: {} }}",
            self.name,
            self.sign,
            self.height,
            self.width,
            self.anchor(),
            self.damaged_count(),
        )
    }
}
