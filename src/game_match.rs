//! Match orchestration: placement phase, alternating attack loop and
//! termination.
//!
//! Each seat gets a reader task that forwards decoded messages into one
//! queue. The orchestrator is the only code that touches either grid or
//! writes to either connection, and it alone decides whose turn it is.

use log::{debug, error, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::common::{MatchError, MatchId, Seat, SessionId};
use crate::config::ServerConfig;
use crate::grid::Grid;
use crate::protocol::{
    fleet_grid, serialize_fleet, AttackStatus, Message, ShipPlacement, WireCoordinate,
    FORFEIT_MESSAGE, LOSE_MESSAGE, WIN_MESSAGE,
};
use crate::rules::{evaluate_grids, Verdict};
use crate::session::{wait_shutdown, Session};
use crate::transport::{Inbound, Outbound};

/// Where a started match is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pairing,
    Placement,
    AttackLoop,
    Closed,
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A side reached the damage threshold with more damage than the other.
    Decided { winner: Seat },
    /// A side sent `exit`, lost its connection or sent garbage.
    Forfeit { quitter: Seat },
    /// The server shut down mid-match.
    Shutdown,
}

/// Two sessions bound into one game.
pub struct Match {
    id: MatchId,
    players: [Option<Session>; 2],
    grid_width: usize,
    grid_height: usize,
    win_threshold: usize,
    rng: SmallRng,
    shutdown: watch::Receiver<bool>,
}

impl Match {
    pub fn new(id: MatchId, config: &ServerConfig, shutdown: watch::Receiver<bool>) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(id.0)),
            None => SmallRng::from_rng(&mut rand::rng()),
        };
        Self {
            id,
            players: [None, None],
            grid_width: config.grid_width,
            grid_height: config.grid_height,
            win_threshold: config.win_threshold,
            rng,
            shutdown,
        }
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Seat `session` in the first free slot.
    pub fn add_player(&mut self, session: Session) -> Result<Seat, MatchError> {
        for seat in Seat::BOTH {
            let slot = &mut self.players[seat.index()];
            if slot.is_none() {
                info!(
                    "[Match {}] Adding session {} ({}) as player {}",
                    self.id,
                    session.id(),
                    session.peer(),
                    seat
                );
                *slot = Some(session);
                return Ok(seat);
            }
        }
        Err(MatchError::TooManyPlayers(self.id))
    }

    /// Drive the match to completion.
    ///
    /// With a single seated player the absent side counts as having
    /// forfeited. With none the match cannot start.
    pub async fn run(mut self) -> anyhow::Result<MatchOutcome> {
        let a = self.players[0].take();
        let b = self.players[1].take();
        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            (Some(lone), None) => return Ok(self.walkover(lone, Seat::B).await),
            (None, Some(lone)) => return Ok(self.walkover(lone, Seat::A).await),
            (None, None) => return Err(MatchError::NotEnoughPlayers(self.id).into()),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let a = a.into_parts();
        let b = b.into_parts();
        let readers = [
            spawn_reader(self.id, Seat::A, a.id, a.inbound, tx.clone()),
            spawn_reader(self.id, Seat::B, b.id, b.inbound, tx),
        ];
        let mut table = Table {
            id: self.id,
            seats: [
                Seated {
                    id: a.id,
                    peer: a.peer,
                    outbound: a.outbound,
                    grid: a.grid,
                },
                Seated {
                    id: b.id,
                    peer: b.peer,
                    outbound: b.outbound,
                    grid: b.grid,
                },
            ],
            events: rx,
            shutdown: self.shutdown,
            phase: Phase::Pairing,
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            win_threshold: self.win_threshold,
            rng: self.rng,
        };

        info!(
            "[Match {}] Game started {} VS {}",
            table.id, table.seats[0].peer, table.seats[1].peer
        );
        let outcome = table.play().await;
        for reader in readers {
            reader.abort();
        }
        Ok(outcome)
    }

    async fn walkover(&mut self, mut lone: Session, absent: Seat) -> MatchOutcome {
        warn!(
            "[Match {}] Opponent of session {} left before the game started",
            self.id,
            lone.id()
        );
        let msg = Message::EndGame {
            is_win: true,
            message: FORFEIT_MESSAGE.to_string(),
            attack_status: None,
        };
        if let Err(e) = lone.send(&msg).await {
            warn!("[Match {}] Error notifying session {}: {}", self.id, lone.id(), e);
        }
        lone.disconnect().await;
        MatchOutcome::Forfeit { quitter: absent }
    }
}

enum Event {
    Received(Message),
    Failed(anyhow::Error),
}

struct SeatEvent {
    seat: Seat,
    event: Event,
}

enum Step {
    Event(SeatEvent),
    Shutdown,
}

fn spawn_reader(
    match_id: MatchId,
    seat: Seat,
    session: SessionId,
    mut inbound: Box<dyn Inbound>,
    tx: mpsc::UnboundedSender<SeatEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match inbound.recv().await {
                Ok(msg) => {
                    debug!("[Match {}] <- {} from session {}", match_id, msg.kind(), session);
                    let stop = matches!(msg, Message::Exit);
                    let event = SeatEvent {
                        seat,
                        event: Event::Received(msg),
                    };
                    if tx.send(event).is_err() || stop {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(SeatEvent {
                        seat,
                        event: Event::Failed(e),
                    });
                    break;
                }
            }
        }
    })
}

struct Seated {
    id: SessionId,
    peer: String,
    outbound: Box<dyn Outbound>,
    grid: Grid,
}

/// Running state of a started match.
struct Table {
    id: MatchId,
    seats: [Seated; 2],
    events: mpsc::UnboundedReceiver<SeatEvent>,
    shutdown: watch::Receiver<bool>,
    phase: Phase,
    grid_width: usize,
    grid_height: usize,
    win_threshold: usize,
    rng: SmallRng,
}

impl Table {
    async fn next_step(&mut self) -> Step {
        tokio::select! {
            biased;
            _ = wait_shutdown(&mut self.shutdown) => Step::Shutdown,
            event = self.events.recv() => match event {
                Some(event) => Step::Event(event),
                None => Step::Shutdown,
            },
        }
    }

    /// Send to one seat. A failure is logged and reported as `false`.
    async fn send(&mut self, seat: Seat, msg: &Message) -> bool {
        let seated = &mut self.seats[seat.index()];
        match seated.outbound.send(msg).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "[Match {}] Error sending {} to session {}: {}",
                    self.id,
                    msg.kind(),
                    seated.id,
                    e
                );
                false
            }
        }
    }

    async fn play(&mut self) -> MatchOutcome {
        for seat in Seat::BOTH {
            if !self.send(seat, &Message::StartGame).await {
                return self.forfeit(seat).await;
            }
        }
        self.phase = Phase::Placement;

        let fleets = match self.placement().await {
            Ok(fleets) => fleets,
            Err(ending) => return ending,
        };

        let starting = if self.rng.random_bool(0.5) {
            Seat::A
        } else {
            Seat::B
        };
        info!(
            "[Match {}] Player {} launches the first hit",
            self.id, starting
        );
        for seat in Seat::BOTH {
            let msg = Message::Coordinates {
                ships: fleets[seat.other().index()].clone(),
                starting: seat == starting,
            };
            if !self.send(seat, &msg).await {
                return self.forfeit(seat).await;
            }
        }
        self.phase = Phase::AttackLoop;
        self.attack_loop(starting).await
    }

    /// Collect one valid fleet from each seat.
    async fn placement(&mut self) -> Result<[Vec<ShipPlacement>; 2], MatchOutcome> {
        let mut fleets: [Option<Vec<ShipPlacement>>; 2] = [None, None];
        while fleets.iter().any(Option::is_none) {
            let SeatEvent { seat, event } = match self.next_step().await {
                Step::Event(ev) => ev,
                Step::Shutdown => return Err(self.close_all().await),
            };
            match event {
                Event::Received(Message::Coordinates { ships, .. }) => {
                    let slot = seat.index();
                    if fleets[slot].is_some() {
                        warn!(
                            "[Match {}] Player {} sent a second fleet, ignoring",
                            self.id, seat
                        );
                        continue;
                    }
                    match fleet_grid(self.grid_width, self.grid_height, &ships) {
                        Ok(grid) => {
                            info!(
                                "[Match {}] Received coordinates from player {} ({} ships)",
                                self.id,
                                seat,
                                grid.ships().len()
                            );
                            fleets[slot] = Some(serialize_fleet(&grid));
                            self.seats[slot].grid = grid;
                        }
                        Err(e) => {
                            warn!(
                                "[Match {}] Rejected fleet from player {}: {}",
                                self.id, seat, e
                            );
                            let msg = Message::PlacementRejected {
                                message: e.to_string(),
                            };
                            if !self.send(seat, &msg).await {
                                return Err(self.forfeit(seat).await);
                            }
                        }
                    }
                }
                Event::Received(Message::Exit) => return Err(self.forfeit(seat).await),
                Event::Received(Message::Unknown) => {
                    info!("[Match {}] Ignoring unknown message from player {}", self.id, seat);
                }
                Event::Received(other) => {
                    warn!(
                        "[Match {}] Unexpected {} from player {} in {:?}",
                        self.id,
                        other.kind(),
                        seat,
                        self.phase
                    );
                }
                Event::Failed(e) => {
                    warn!("[Match {}] Error handling player {}: {}", self.id, seat, e);
                    return Err(self.forfeit(seat).await);
                }
            }
        }
        let [a, b] = fleets;
        match (a, b) {
            (Some(a), Some(b)) => Ok([a, b]),
            _ => Err(self.close_all().await),
        }
    }

    async fn attack_loop(&mut self, starting: Seat) -> MatchOutcome {
        let mut turn = starting;
        // Shot waiting for its attack_status, with the server's own result.
        let mut pending: Option<(WireCoordinate, bool)> = None;
        loop {
            let SeatEvent { seat, event } = match self.next_step().await {
                Step::Event(ev) => ev,
                Step::Shutdown => return self.close_all().await,
            };
            match event {
                Event::Received(Message::Attack { coordinate }) => {
                    if seat != turn || pending.is_some() {
                        warn!(
                            "[Match {}] Ignoring out-of-turn attack from player {}",
                            self.id, seat
                        );
                        continue;
                    }
                    let defender = seat.other();
                    info!(
                        "[Match {}] Received attack ({}, {}) from player {}",
                        self.id, coordinate.x, coordinate.y, seat
                    );
                    let hit = self.seats[defender.index()]
                        .grid
                        .hit(coordinate.x, coordinate.y);
                    pending = Some((coordinate, hit));
                    if !self.send(defender, &Message::Attack { coordinate }).await {
                        return self.forfeit(defender).await;
                    }
                }
                Event::Received(Message::AttackStatus(status)) => {
                    let Some((coordinate, hit)) = pending else {
                        warn!(
                            "[Match {}] Ignoring attack status from player {} with no shot pending",
                            self.id, seat
                        );
                        continue;
                    };
                    if seat != turn.other() {
                        warn!(
                            "[Match {}] Ignoring attack status from attacking player {}",
                            self.id, seat
                        );
                        continue;
                    }
                    pending = None;
                    if status.status != hit || status.coordinate != coordinate {
                        warn!(
                            "[Match {}] Player {} reported {:?}, server resolved ({}, {}) as hit={}",
                            self.id, seat, status, coordinate.x, coordinate.y, hit
                        );
                    }

                    let verdict = evaluate_grids(
                        &self.seats[0].grid,
                        &self.seats[1].grid,
                        self.win_threshold,
                    );
                    if let Verdict::Winner(winner) = verdict {
                        return self.decisive(winner, turn, status).await;
                    }

                    let attacker = turn;
                    if !self.send(attacker, &Message::AttackStatus(status)).await {
                        return self.forfeit(attacker).await;
                    }
                    if !self.send(seat, &Message::LaunchHit).await {
                        return self.forfeit(seat).await;
                    }
                    turn = seat;
                }
                Event::Received(Message::Exit) => return self.forfeit(seat).await,
                Event::Received(Message::Unknown) => {
                    info!("[Match {}] Ignoring unknown message from player {}", self.id, seat);
                }
                Event::Received(other) => {
                    warn!(
                        "[Match {}] Unexpected {} from player {} in {:?}",
                        self.id,
                        other.kind(),
                        seat,
                        self.phase
                    );
                }
                Event::Failed(e) => {
                    warn!("[Match {}] Error handling player {}: {}", self.id, seat, e);
                    return self.forfeit(seat).await;
                }
            }
        }
    }

    /// Winner is told first. The final status goes to the loser and, when
    /// the attacker won, to the attacker too, since it has not seen it yet.
    async fn decisive(&mut self, winner: Seat, attacker: Seat, status: AttackStatus) -> MatchOutcome {
        let loser = winner.other();
        let win = Message::EndGame {
            is_win: true,
            message: WIN_MESSAGE.to_string(),
            attack_status: (winner == attacker).then_some(status),
        };
        let lose = Message::EndGame {
            is_win: false,
            message: LOSE_MESSAGE.to_string(),
            attack_status: Some(status),
        };
        self.send(winner, &win).await;
        self.send(loser, &lose).await;
        info!(
            "[Match {}] {} VS {} --> {} has won the battle",
            self.id,
            self.seats[attacker.index()].peer,
            self.seats[attacker.other().index()].peer,
            self.seats[winner.index()].peer
        );
        self.disconnect_all().await;
        MatchOutcome::Decided { winner }
    }

    async fn forfeit(&mut self, quitter: Seat) -> MatchOutcome {
        let remaining = quitter.other();
        info!(
            "[Match {}] Player {} ({}) has quit the game",
            self.id,
            quitter,
            self.seats[quitter.index()].peer
        );
        let msg = Message::EndGame {
            is_win: true,
            message: FORFEIT_MESSAGE.to_string(),
            attack_status: None,
        };
        self.send(remaining, &msg).await;
        self.disconnect_all().await;
        MatchOutcome::Forfeit { quitter }
    }

    async fn close_all(&mut self) -> MatchOutcome {
        warn!("[Match {}] Server is shutting down, closing both players", self.id);
        for seat in Seat::BOTH {
            self.send(seat, &Message::Close).await;
        }
        self.disconnect_all().await;
        MatchOutcome::Shutdown
    }

    async fn disconnect_all(&mut self) {
        for seated in self.seats.iter_mut() {
            if let Err(e) = seated.outbound.shutdown().await {
                error!(
                    "[Match {}] Error closing session {}: {}",
                    self.id, seated.id, e
                );
            }
        }
        self.phase = Phase::Closed;
    }
}
