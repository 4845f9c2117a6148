//! Client side of the protocol.
//!
//! [`PlayerClient`] reacts to server messages, asking a [`CoordinateInput`]
//! for placements and shots and handing both grids to a [`Renderer`].

use log::{debug, info, warn};
use thiserror::Error;

use crate::common::GridError;
use crate::config::ClientConfig;
use crate::grid::Grid;
use crate::protocol::{fleet_grid, serialize_fleet, AttackStatus, Message, WireCoordinate};
use crate::ship::{Orientation, ShipSpec};
use crate::transport::tcp::TcpTransport;
use crate::transport::Transport;

/// The player asked to stop (end of input or an explicit `exit`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("input interrupted")]
pub struct Interrupted;

/// Produces a view of both grids.
pub trait Renderer: Send {
    /// `show_opponent` reveals intact opponent ships; damaged cells are
    /// always visible.
    fn render(&mut self, own: &Grid, opponent: &Grid, show_opponent: bool);

    /// A line of text for the player.
    fn notice(&mut self, _message: &str) {}
}

/// Supplies coordinates, 1-indexed and within the grid.
pub trait CoordinateInput: Send {
    /// Anchor and orientation for `ship` on `grid`.
    fn placement(
        &mut self,
        grid: &Grid,
        ship: &ShipSpec,
    ) -> Result<(usize, usize, Orientation), Interrupted>;

    /// Next cell to fire at.
    fn target(&mut self, opponent: &Grid) -> Result<(usize, usize), Interrupted>;

    /// The last placement for `ship` was refused.
    fn placement_failed(&mut self, _ship: &ShipSpec, _error: &GridError) {}
}

/// How a client run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientOutcome {
    Won { message: String },
    Lost { message: String },
    /// The server sent `close` or went away.
    Closed,
    /// The player quit; `exit` was sent.
    Interrupted,
}

pub struct PlayerClient<I, R> {
    transport: Box<dyn Transport>,
    input: I,
    renderer: R,
    fleet: Vec<ShipSpec>,
    own: Grid,
    opponent: Grid,
    awaiting_status: Option<WireCoordinate>,
    grid_width: usize,
    grid_height: usize,
}

impl<I: CoordinateInput, R: Renderer> PlayerClient<I, R> {
    pub fn new(transport: Box<dyn Transport>, config: &ClientConfig, input: I, renderer: R) -> Self {
        Self {
            transport,
            input,
            renderer,
            fleet: config.fleet.clone(),
            own: Grid::new(config.grid_width, config.grid_height),
            opponent: Grid::new(config.grid_width, config.grid_height),
            awaiting_status: None,
            grid_width: config.grid_width,
            grid_height: config.grid_height,
        }
    }

    pub async fn connect(config: &ClientConfig, input: I, renderer: R) -> anyhow::Result<Self> {
        let transport = TcpTransport::connect(&config.server).await?;
        info!("[Client] Connected to {}", transport.peer());
        Ok(Self::new(Box::new(transport), config, input, renderer))
    }

    pub fn own_grid(&self) -> &Grid {
        &self.own
    }

    /// Local copy of the opponent fleet, with the damage this client caused.
    pub fn opponent_grid(&self) -> &Grid {
        &self.opponent
    }

    /// Play until the match ends. A lost connection before `end_game` is
    /// reported as [`ClientOutcome::Closed`].
    pub async fn run(&mut self) -> anyhow::Result<ClientOutcome> {
        loop {
            let msg = match self.transport.recv().await {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("[Client] Connection ended: {}", e);
                    return Ok(ClientOutcome::Closed);
                }
            };
            debug!("[Client] <- {}", msg.kind());
            if let Some(outcome) = self.handle(msg).await? {
                return Ok(outcome);
            }
        }
    }

    async fn handle(&mut self, msg: Message) -> anyhow::Result<Option<ClientOutcome>> {
        match msg {
            Message::WaitForOpponent { message } => {
                info!("[Client] {}", message);
                self.renderer.notice(&message);
            }
            Message::StartGame => {
                self.renderer.notice("Opponent found. Place your ships.");
                return self.submit_fleet().await;
            }
            Message::PlacementRejected { message } => {
                warn!("[Client] Fleet rejected: {}", message);
                self.renderer.notice(&format!("Fleet rejected: {}", message));
                return self.submit_fleet().await;
            }
            Message::Coordinates { ships, starting } => {
                match fleet_grid(self.grid_width, self.grid_height, &ships) {
                    Ok(grid) => self.opponent = grid,
                    Err(e) => warn!("[Client] Could not rebuild the opponent fleet: {}", e),
                }
                if starting {
                    return self.fire().await;
                }
                self.renderer.notice("Waiting for your opponent to fire..");
            }
            Message::Attack { coordinate } => {
                let status = self.own.hit(coordinate.x, coordinate.y);
                self.renderer.render(&self.own, &self.opponent, false);
                self.transport
                    .send(&Message::AttackStatus(AttackStatus { status, coordinate }))
                    .await?;
            }
            Message::AttackStatus(status) => self.apply_status(status),
            Message::LaunchHit => return self.fire().await,
            Message::EndGame {
                is_win,
                message,
                attack_status,
            } => {
                if let Some(status) = attack_status {
                    self.apply_status(status);
                }
                self.renderer.render(&self.own, &self.opponent, true);
                self.renderer.notice(&message);
                info!("[Client] {}", message);
                return Ok(Some(if is_win {
                    ClientOutcome::Won { message }
                } else {
                    ClientOutcome::Lost { message }
                }));
            }
            Message::Close => {
                info!("[Client] Server closed the connection");
                return Ok(Some(ClientOutcome::Closed));
            }
            Message::Exit => debug!("[Client] Ignoring exit from server"),
            Message::Unknown => info!("[Client] Ignoring unknown message"),
        }
        Ok(None)
    }

    /// Mark our shot on the opponent copy once its status comes back.
    fn apply_status(&mut self, status: AttackStatus) {
        if self.awaiting_status != Some(status.coordinate) {
            return;
        }
        self.awaiting_status = None;
        if status.status {
            self.opponent.hit(status.coordinate.x, status.coordinate.y);
        }
    }

    async fn submit_fleet(&mut self) -> anyhow::Result<Option<ClientOutcome>> {
        self.own = Grid::new(self.grid_width, self.grid_height);
        for spec in self.fleet.clone() {
            loop {
                self.renderer.render(&self.own, &self.opponent, false);
                let (x, y, orientation) = match self.input.placement(&self.own, &spec) {
                    Ok(p) => p,
                    Err(Interrupted) => return self.quit().await,
                };
                match self.own.place(&spec, (x, y), orientation) {
                    Ok(_) => break,
                    Err(e) => {
                        self.renderer.notice(&e.to_string());
                        self.input.placement_failed(&spec, &e);
                    }
                }
            }
        }
        self.renderer.render(&self.own, &self.opponent, false);
        let ships = serialize_fleet(&self.own);
        self.transport
            .send(&Message::Coordinates {
                ships,
                starting: false,
            })
            .await?;
        Ok(None)
    }

    async fn fire(&mut self) -> anyhow::Result<Option<ClientOutcome>> {
        self.renderer.render(&self.own, &self.opponent, false);
        let (x, y) = match self.input.target(&self.opponent) {
            Ok(t) => t,
            Err(Interrupted) => return self.quit().await,
        };
        let coordinate = WireCoordinate::new(x, y);
        self.awaiting_status = Some(coordinate);
        self.transport.send(&Message::Attack { coordinate }).await?;
        Ok(None)
    }

    async fn quit(&mut self) -> anyhow::Result<Option<ClientOutcome>> {
        info!("[Client] Leaving the game");
        self.transport.send(&Message::Exit).await?;
        Ok(Some(ClientOutcome::Interrupted))
    }
}
