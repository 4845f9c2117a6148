//! Win evaluation.

use crate::common::Seat;
use crate::grid::Grid;

/// Result of evaluating both fleets after a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Nobody reached the threshold, or both reached it with equal damage.
    Undecided,
    Winner(Seat),
}

/// Decide the match from the damaged hull points of each side.
///
/// Once either side has lost at least `threshold` points the side with
/// fewer damaged points wins. Equal counts never produce a winner.
pub fn evaluate(damaged_a: usize, damaged_b: usize, threshold: usize) -> Verdict {
    if damaged_a < threshold && damaged_b < threshold {
        return Verdict::Undecided;
    }
    match damaged_a.cmp(&damaged_b) {
        core::cmp::Ordering::Less => Verdict::Winner(Seat::A),
        core::cmp::Ordering::Greater => Verdict::Winner(Seat::B),
        core::cmp::Ordering::Equal => Verdict::Undecided,
    }
}

/// [`evaluate`] applied to the two grids of a match.
pub fn evaluate_grids(grid_a: &Grid, grid_b: &Grid, threshold: usize) -> Verdict {
    evaluate(grid_a.count_damaged(), grid_b.count_damaged(), threshold)
}
