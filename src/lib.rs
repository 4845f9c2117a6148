pub mod client;
mod common;
mod config;
pub mod game_match;
mod grid;
mod logging;
mod player_cli;
pub mod protocol;
mod rules;
pub mod server;
pub mod session;
mod ship;
pub mod transport;
mod ui;

pub use client::{ClientOutcome, CoordinateInput, Interrupted, PlayerClient, Renderer};
pub use common::*;
pub use config::*;
pub use game_match::{Match, MatchOutcome};
pub use grid::*;
pub use logging::{init_logging, level_from, LOG_ENV};
pub use player_cli::*;
pub use protocol::*;
pub use rules::*;
pub use server::{Matchmaker, Server, ServerHandle};
pub use session::{Backoff, GateWaiter, Session, TurnGate};
pub use ship::*;
pub use transport::in_memory::InMemoryTransport;
pub use transport::tcp::TcpTransport;
pub use ui::*;
