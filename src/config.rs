use std::time::Duration;

use crate::ship::ShipSpec;

pub const GRID_WIDTH: usize = 10;
pub const GRID_HEIGHT: usize = 10;

/// Sign shown for a cell no ship occupies. Ships may not use it.
pub const EMPTY_SIGN: char = '.';

/// Hull points a fleet may lose before the match is decided.
pub const WIN_THRESHOLD: usize = 5;

pub const DEFAULT_BIND: &str = "127.0.0.1:12345";

/// First pause between two `wait_for_opponent` keep-alives.
pub const KEEPALIVE_INITIAL: Duration = Duration::from_secs(6);
/// Amount added to the keep-alive pause after every send.
pub const KEEPALIVE_STEP: Duration = Duration::from_secs(3);

/// Upper bound for one encoded message line (64 KiB).
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// (name, sign, height, width) of the standard fleet.
const DEFAULT_FLEET: [(&str, char, usize, usize); 3] = [
    ("BB-67", 'X', 6, 2),
    ("FTR-88", '#', 4, 2),
    ("MO201", 'o', 3, 2),
];

/// The three ships every player places unless told otherwise.
pub fn default_fleet() -> Vec<ShipSpec> {
    DEFAULT_FLEET
        .iter()
        .filter_map(|&(name, sign, height, width)| ShipSpec::new(name, sign, height, width).ok())
        .collect()
}

/// Settings for the listener and every match it runs.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub grid_width: usize,
    pub grid_height: usize,
    pub win_threshold: usize,
    pub keepalive_initial: Duration,
    pub keepalive_step: Duration,
    pub max_message_size: usize,
    /// Fixes the first-attacker draw for reproducible matches.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            grid_width: GRID_WIDTH,
            grid_height: GRID_HEIGHT,
            win_threshold: WIN_THRESHOLD,
            keepalive_initial: KEEPALIVE_INITIAL,
            keepalive_step: KEEPALIVE_STEP,
            max_message_size: MAX_MESSAGE_SIZE,
            seed: None,
        }
    }
}

/// Settings for one player connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub grid_width: usize,
    pub grid_height: usize,
    pub fleet: Vec<ShipSpec>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_BIND.to_string(),
            grid_width: GRID_WIDTH,
            grid_height: GRID_HEIGHT,
            fleet: default_fleet(),
        }
    }
}
