//! Per-connection state and the lobby keep-alive loop.

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::time::{sleep_until, Duration, Instant};

use crate::common::SessionId;
use crate::grid::Grid;
use crate::protocol::{Message, WAITING_MESSAGE};
use crate::transport::{Inbound, Outbound, Transport};

/// State of a [`TurnGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Hold,
    Release,
}

/// Single-slot signal: the holder of the gate says when the waiting side
/// may act. Not a counter; releasing twice is the same as releasing once.
/// The matchmaker releases a lobby session's gate once it is paired.
#[derive(Debug)]
pub struct TurnGate {
    tx: watch::Sender<GateState>,
}

/// Waiting end of a [`TurnGate`].
#[derive(Debug)]
pub struct GateWaiter {
    rx: watch::Receiver<GateState>,
}

impl TurnGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GateState::Hold);
        Self { tx }
    }

    pub fn release(&self) {
        self.tx.send_replace(GateState::Release);
    }

    pub fn waiter(&self) -> GateWaiter {
        GateWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for TurnGate {
    fn default() -> Self {
        Self::new()
    }
}

impl GateWaiter {
    /// Resolve once the gate is released. Returns `false` if the gate was
    /// dropped without being released.
    pub async fn released(&mut self) -> bool {
        self.rx
            .wait_for(|state| *state == GateState::Release)
            .await
            .is_ok()
    }

    pub fn is_released(&self) -> bool {
        *self.rx.borrow() == GateState::Release
    }
}

/// Resolve once `rx` reports `true`. Never resolves if the sender is gone.
pub(crate) async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// One accepted connection and the grid of the player behind it.
pub struct Session {
    id: SessionId,
    peer: String,
    inbound: Box<dyn Inbound>,
    outbound: Box<dyn Outbound>,
    grid: Grid,
}

impl Session {
    pub fn new(id: SessionId, transport: Box<dyn Transport>, width: usize, height: usize) -> Self {
        let peer = transport.peer();
        let (inbound, outbound) = transport.split();
        Self {
            id,
            peer,
            inbound,
            outbound,
            grid: Grid::new(width, height),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub async fn send(&mut self, msg: &Message) -> anyhow::Result<()> {
        debug!("[Session {}] -> {}", self.id, msg.kind());
        self.outbound.send(msg).await
    }

    /// Close the sending direction. Errors are logged, not returned.
    pub async fn disconnect(&mut self) {
        if let Err(e) = self.outbound.shutdown().await {
            debug!("[Session {}] shutdown: {}", self.id, e);
        }
        info!("[Session {}] {} has disconnected", self.id, self.peer);
    }

    pub(crate) fn into_parts(self) -> SessionParts {
        SessionParts {
            id: self.id,
            peer: self.peer,
            inbound: self.inbound,
            outbound: self.outbound,
            grid: self.grid,
        }
    }
}

pub(crate) struct SessionParts {
    pub id: SessionId,
    pub peer: String,
    pub inbound: Box<dyn Inbound>,
    pub outbound: Box<dyn Outbound>,
    pub grid: Grid,
}

/// Keep-alive timing for unpaired sessions.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub step: Duration,
}

/// Hold `session` in the lobby until `gate` is released, sending
/// `wait_for_opponent` with a growing pause in between. Hands the session
/// back once paired.
///
/// The connection is read while waiting: `exit`, end of stream or a broken
/// record ends the wait with an error, as do a failed send and a shutdown
/// request. On shutdown the client is told to `close` first. Any other
/// message is ignored.
pub async fn hold_in_lobby(
    mut session: Session,
    mut gate: GateWaiter,
    backoff: Backoff,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Session> {
    let mut pause = backoff.initial;
    loop {
        if gate.is_released() {
            return Ok(session);
        }
        session
            .send(&Message::WaitForOpponent {
                message: WAITING_MESSAGE.to_string(),
            })
            .await?;
        let wake = Instant::now() + pause;
        loop {
            // `Inbound::recv` is cancel safe, so losing the race to the gate
            // or the timer drops no input.
            tokio::select! {
                biased;
                paired = gate.released() => {
                    if paired {
                        return Ok(session);
                    }
                    return Err(anyhow::anyhow!("Lobby closed before pairing"));
                }
                _ = wait_shutdown(&mut shutdown) => {
                    if let Err(e) = session.send(&Message::Close).await {
                        warn!("[Session {}] Error sending shutdown message: {}", session.id, e);
                    }
                    session.disconnect().await;
                    return Err(anyhow::anyhow!("Server is shutting down"));
                }
                received = session.inbound.recv() => match received {
                    Ok(Message::Exit) => {
                        session.disconnect().await;
                        return Err(anyhow::anyhow!("Client left before pairing"));
                    }
                    Ok(msg) => debug!(
                        "[Session {}] Ignoring {} while waiting for an opponent",
                        session.id,
                        msg.kind()
                    ),
                    Err(e) => {
                        session.disconnect().await;
                        return Err(e);
                    }
                },
                _ = sleep_until(wake) => break,
            }
        }
        pause += backoff.step;
    }
}
