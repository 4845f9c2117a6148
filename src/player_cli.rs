use std::collections::HashSet;
use std::io::{self, BufRead, Write};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::client::{CoordinateInput, Interrupted};
use crate::common::GridError;
use crate::grid::Grid;
use crate::ship::{Orientation, ShipSpec};

/// Interactive prompts. Reads one answer per line; end of input or `exit`
/// interrupts.
pub struct PromptInput<R, W> {
    reader: R,
    writer: W,
}

impl PromptInput<io::BufReader<io::Stdin>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptInput<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    fn ask(&mut self, prompt: &str) -> Result<String, Interrupted> {
        let _ = write!(self.writer, "{}", prompt);
        let _ = self.writer.flush();
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) | Err(_) => Err(Interrupted),
            Ok(_) => {
                let answer = line.trim().to_string();
                if answer.eq_ignore_ascii_case("exit") {
                    return Err(Interrupted);
                }
                Ok(answer)
            }
        }
    }

    /// Ask until the answer is a number in `1..=max`.
    fn ask_index(&mut self, axis: &str, max: usize) -> Result<usize, Interrupted> {
        loop {
            let answer = self.ask(&format!("{} (1-{}): ", axis, max))?;
            match answer.parse::<usize>() {
                Ok(n) if (1..=max).contains(&n) => return Ok(n),
                _ => {
                    let _ = writeln!(self.writer, "Please enter a number between 1 and {}", max);
                }
            }
        }
    }

    fn ask_orientation(&mut self) -> Result<Orientation, Interrupted> {
        loop {
            let answer = self.ask("Orientation (h/v): ")?;
            match answer.to_ascii_lowercase().as_str() {
                "h" | "horizontal" => return Ok(Orientation::Horizontal),
                "v" | "vertical" => return Ok(Orientation::Vertical),
                _ => {
                    let _ = writeln!(self.writer, "Please enter h or v");
                }
            }
        }
    }
}

impl<R: BufRead + Send, W: Write + Send> CoordinateInput for PromptInput<R, W> {
    fn placement(
        &mut self,
        grid: &Grid,
        ship: &ShipSpec,
    ) -> Result<(usize, usize, Orientation), Interrupted> {
        let _ = writeln!(
            self.writer,
            "Place {} ({}x{}, sign '{}')",
            ship.name(),
            ship.height(),
            ship.width(),
            ship.sign()
        );
        let x = self.ask_index("x", grid.width())?;
        let y = self.ask_index("y", grid.height())?;
        let orientation = self.ask_orientation()?;
        Ok((x, y, orientation))
    }

    fn target(&mut self, opponent: &Grid) -> Result<(usize, usize), Interrupted> {
        let _ = writeln!(self.writer, "Your turn to fire");
        let x = self.ask_index("x", opponent.width())?;
        let y = self.ask_index("y", opponent.height())?;
        Ok((x, y))
    }

    fn placement_failed(&mut self, ship: &ShipSpec, error: &GridError) {
        let _ = writeln!(self.writer, "Cannot place {}: {}", ship.name(), error);
    }
}

/// Automatic player: random legal placements and random shots, never the
/// same cell twice.
pub struct RandomInput {
    rng: SmallRng,
    fired: HashSet<(usize, usize)>,
}

impl RandomInput {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_rng(&mut rand::rng()),
        };
        Self {
            rng,
            fired: HashSet::new(),
        }
    }

    /// Cells fired at so far, 1-indexed.
    pub fn fired(&self) -> &HashSet<(usize, usize)> {
        &self.fired
    }
}

fn fits(grid: &Grid, ship: &ShipSpec, x: usize, y: usize, orientation: Orientation) -> bool {
    let (span_x, span_y) = ship.span(orientation);
    if x + span_x > grid.width() || y + span_y > grid.height() {
        return false;
    }
    (0..span_x).all(|dx| (0..span_y).all(|dy| !grid.is_occupied(x + dx, y + dy)))
}

impl CoordinateInput for RandomInput {
    fn placement(
        &mut self,
        grid: &Grid,
        ship: &ShipSpec,
    ) -> Result<(usize, usize, Orientation), Interrupted> {
        let mut candidates = Vec::new();
        for orientation in [Orientation::Horizontal, Orientation::Vertical] {
            for y in 0..grid.height() {
                for x in 0..grid.width() {
                    if fits(grid, ship, x, y, orientation) {
                        candidates.push((x + 1, y + 1, orientation));
                    }
                }
            }
        }
        if candidates.is_empty() {
            return Err(Interrupted);
        }
        let pick = self.rng.random_range(0..candidates.len());
        Ok(candidates[pick])
    }

    fn target(&mut self, opponent: &Grid) -> Result<(usize, usize), Interrupted> {
        let mut open: Vec<(usize, usize)> = (1..=opponent.height())
            .flat_map(|y| (1..=opponent.width()).map(move |x| (x, y)))
            .filter(|cell| !self.fired.contains(cell))
            .collect();
        open.shuffle(&mut self.rng);
        let target = open.pop().ok_or(Interrupted)?;
        self.fired.insert(target);
        Ok(target)
    }
}
