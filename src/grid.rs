//! Player grid: ship placement, hit resolution and damage accounting.

use crate::common::GridError;
use crate::config::EMPTY_SIGN;
use crate::ship::{Coordinate, Orientation, Ship, ShipSpec};

/// Points a cell at the coordinate of the ship that occupies it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRef {
    ship: usize,
    segment: usize,
}

/// What a single cell shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Ship { sign: char, damaged: bool },
}

impl Cell {
    pub fn sign(&self) -> char {
        match self {
            Cell::Empty => EMPTY_SIGN,
            Cell::Ship { sign, .. } => *sign,
        }
    }

    pub fn is_damaged(&self) -> bool {
        matches!(self, Cell::Ship { damaged: true, .. })
    }
}

/// A `width` x `height` lattice holding one player's fleet.
///
/// No two ships share a cell and every placed coordinate lies inside
/// `[0, width) x [0, height)`.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    ships: Vec<Ship>,
    cells: Vec<Option<CellRef>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ships: Vec::new(),
            cells: vec![None; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Placed ships in placement order.
    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Place `spec` with its top-left corner at the 1-indexed `anchor`.
    ///
    /// Every target cell is validated before anything is written, so a
    /// failed call leaves the grid untouched.
    pub fn place(
        &mut self,
        spec: &ShipSpec,
        anchor: (usize, usize),
        orientation: Orientation,
    ) -> Result<&Ship, GridError> {
        let (ax, ay) = anchor;
        let (span_x, span_y) = spec.span(orientation);
        let out_of_bounds = GridError::OutOfBounds {
            x: ax,
            y: ay,
            span_x,
            span_y,
        };
        if ax == 0 || ay == 0 {
            return Err(out_of_bounds);
        }
        let (x0, y0) = (ax - 1, ay - 1);
        let fits_x = x0.checked_add(span_x).is_some_and(|end| end <= self.width);
        let fits_y = y0.checked_add(span_y).is_some_and(|end| end <= self.height);
        if !fits_x || !fits_y {
            return Err(out_of_bounds);
        }
        if self.ships.iter().any(|s| s.name() == spec.name()) {
            return Err(GridError::ShipAlreadyPlaced(spec.name().to_string()));
        }

        let mut coordinates = Vec::with_capacity(span_x * span_y);
        for dx in 0..span_x {
            for dy in 0..span_y {
                let (x, y) = (x0 + dx, y0 + dy);
                if self.cells[self.index(x, y)].is_some() {
                    return Err(GridError::CoordinateTaken { x: x + 1, y: y + 1 });
                }
                coordinates.push(Coordinate::new(x, y));
            }
        }

        let ship = self.ships.len();
        for (segment, c) in coordinates.iter().enumerate() {
            let i = self.index(c.x(), c.y());
            self.cells[i] = Some(CellRef { ship, segment });
        }
        self.ships.push(Ship::placed(spec, orientation, coordinates));
        Ok(&self.ships[ship])
    }

    /// Fire at the 1-indexed (`x`, `y`). Returns `true` when a ship occupies
    /// the cell; hitting an already damaged coordinate reports `true` again.
    pub fn hit(&mut self, x: usize, y: usize) -> bool {
        let (Some(x), Some(y)) = (x.checked_sub(1), y.checked_sub(1)) else {
            return false;
        };
        if x >= self.width || y >= self.height {
            return false;
        }
        let Some(cell) = self.cells[self.index(x, y)] else {
            return false;
        };
        match self.ships[cell.ship].coordinate_mut(cell.segment) {
            Some(coordinate) => {
                coordinate.set_damaged();
                true
            }
            None => false,
        }
    }

    /// Number of damaged coordinates across every ship.
    pub fn count_damaged(&self) -> usize {
        self.ships.iter().map(Ship::damaged_count).sum()
    }

    /// Recover the orientation a ship was placed with from its bounding box:
    /// horizontal when the x span exceeds the y span.
    pub fn detect_orientation(ship: &Ship) -> Orientation {
        let (mut min_x, mut max_x) = (usize::MAX, 0);
        let (mut min_y, mut max_y) = (usize::MAX, 0);
        for c in ship.coordinates() {
            min_x = min_x.min(c.x());
            max_x = max_x.max(c.x());
            min_y = min_y.min(c.y());
            max_y = max_y.max(c.y());
        }
        if max_x.saturating_sub(min_x) > max_y.saturating_sub(min_y) {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    /// Cell at the 0-indexed (`x`, `y`), or `None` outside the grid.
    pub fn cell(&self, x: usize, y: usize) -> Option<Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let cell = match self.cells[self.index(x, y)] {
            None => Cell::Empty,
            Some(r) => {
                let ship = &self.ships[r.ship];
                let damaged = ship
                    .coordinates()
                    .get(r.segment)
                    .is_some_and(Coordinate::is_damaged);
                Cell::Ship {
                    sign: ship.sign(),
                    damaged,
                }
            }
        };
        Some(cell)
    }

    /// Whether the 0-indexed (`x`, `y`) belongs to a ship.
    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        matches!(self.cell(x, y), Some(Cell::Ship { .. }))
    }
}
