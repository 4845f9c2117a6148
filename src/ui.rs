use std::fmt::Write as _;

use crate::client::Renderer;
use crate::config::EMPTY_SIGN;
use crate::grid::{Cell, Grid};

/// Marks a damaged cell of the player's own fleet.
pub const OWN_DAMAGED_SIGN: char = '*';
/// Marks a damaged cell of the opponent fleet.
pub const OPPONENT_DAMAGED_SIGN: char = 'X';

const GAP: &str = "      ";

fn own_cell(cell: Cell) -> char {
    match cell {
        Cell::Empty => EMPTY_SIGN,
        Cell::Ship { damaged: true, .. } => OWN_DAMAGED_SIGN,
        Cell::Ship { sign, .. } => sign,
    }
}

fn opponent_cell(cell: Cell, reveal: bool) -> char {
    match cell {
        Cell::Empty => EMPTY_SIGN,
        Cell::Ship { damaged: true, .. } => OPPONENT_DAMAGED_SIGN,
        Cell::Ship { sign, .. } if reveal => sign,
        Cell::Ship { .. } => EMPTY_SIGN,
    }
}

fn header(out: &mut String, width: usize) {
    out.push_str("   ");
    for x in 1..=width {
        let _ = write!(out, "{:>3}", x);
    }
}

fn row(out: &mut String, grid: &Grid, y: usize, glyph: impl Fn(Cell) -> char) {
    let _ = write!(out, "{:>3}", y + 1);
    for x in 0..grid.width() {
        let ch = grid.cell(x, y).map_or(EMPTY_SIGN, &glyph);
        let _ = write!(out, "{:>3}", ch);
    }
}

/// Side by side dump of the player's grid (left) and the opponent's
/// (right), with 1-indexed axes.
pub fn render_grids(own: &Grid, opponent: &Grid, show_opponent: bool) -> String {
    let mut out = String::new();
    let own_width = 3 + 3 * own.width();
    let _ = writeln!(out, "{:<own_width$}{}{}", "Your fleet", GAP, "Opponent");
    header(&mut out, own.width());
    out.push_str(GAP);
    header(&mut out, opponent.width());
    out.push('\n');

    for y in 0..own.height().max(opponent.height()) {
        if y < own.height() {
            row(&mut out, own, y, own_cell);
        } else {
            out.push_str(&" ".repeat(own_width));
        }
        out.push_str(GAP);
        if y < opponent.height() {
            row(&mut out, opponent, y, |c| opponent_cell(c, show_opponent));
        }
        out.push('\n');
    }
    out
}

/// Prints both grids to stdout.
#[derive(Debug, Default)]
pub struct TextRenderer;

impl Renderer for TextRenderer {
    fn render(&mut self, own: &Grid, opponent: &Grid, show_opponent: bool) {
        println!("\n{}", render_grids(own, opponent, show_opponent));
    }

    fn notice(&mut self, message: &str) {
        println!("{}", message);
    }
}

/// Renders nothing. Used by bots and tests.
#[derive(Debug, Default)]
pub struct SilentRenderer;

impl Renderer for SilentRenderer {
    fn render(&mut self, _own: &Grid, _opponent: &Grid, _show_opponent: bool) {}
}
