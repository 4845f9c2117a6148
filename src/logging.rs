//! Stderr logger for both roles. Stdout stays free for the player's boards
//! and prompts.

use std::env;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Metadata, Record};

/// Environment variable overriding the log level.
pub const LOG_ENV: &str = "BROADSIDE_LOG";

struct SimpleLogger {
    started: OnceLock<Instant>,
}

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target().starts_with("broadside")
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Seconds since start, so keep-alive pauses and turn timing show up.
        let elapsed = self.started.get_or_init(Instant::now).elapsed();
        eprintln!(
            "{:>9.3} {:<5} {}",
            elapsed.as_secs_f64(),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger {
    started: OnceLock::new(),
};

/// Parse a level name, falling back to `default` when absent or unknown.
pub fn level_from(value: Option<&str>, default: LevelFilter) -> LevelFilter {
    value
        .and_then(|lvl| lvl.trim().parse().ok())
        .unwrap_or(default)
}

/// Install the logger. [`LOG_ENV`] wins over `default`; the server runs at
/// `info`, the interactive player at `warn` so records do not bury prompts.
pub fn init_logging(default: LevelFilter) {
    let level = level_from(env::var(LOG_ENV).ok().as_deref(), default);
    LOGGER.started.get_or_init(Instant::now);
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(level));
}
