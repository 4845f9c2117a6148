//! Listener and matchmaker.
//!
//! Every accepted connection becomes a [`Session`] held in the lobby until a
//! second one arrives; the two oldest waiting sessions are then bound into a
//! [`Match`] running on its own task. The [`Registry`] is the only owner of
//! the client and match lists and is shared behind one mutex.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration, Instant};

use crate::common::{MatchId, SessionId};
use crate::config::ServerConfig;
use crate::game_match::{Match, MatchOutcome};
use crate::session::{hold_in_lobby, wait_shutdown, Backoff, GateWaiter, Session, TurnGate};
use crate::transport::tcp::TcpTransport;
use crate::transport::Transport;

/// How long [`Server::run`] waits for matches and lobbies to wind down
/// after a shutdown request.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Where a registered client currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Waiting,
    Playing,
}

#[derive(Debug)]
struct MatchEntry {
    players: [SessionId; 2],
}

/// An unpaired session: its gate and the lobby task holding it.
struct Waiting {
    id: SessionId,
    gate: TurnGate,
    lobby: JoinHandle<anyhow::Result<Session>>,
}

/// Live clients, live matches and the lobby queue.
#[derive(Default)]
pub struct Registry {
    clients: HashMap<SessionId, ClientState>,
    matches: BTreeMap<MatchId, MatchEntry>,
    waiting: VecDeque<Waiting>,
    next_session: u64,
    next_match: u64,
}

impl Registry {
    fn register_client(&mut self) -> SessionId {
        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.clients.insert(id, ClientState::Waiting);
        id
    }

    /// Queue `waiting`; once two sessions are queued, pop the two oldest and
    /// record them as a new match.
    fn enqueue(&mut self, waiting: Waiting) -> Option<(MatchId, Waiting, Waiting)> {
        self.waiting.push_back(waiting);
        if self.waiting.len() < 2 {
            return None;
        }
        let a = self.waiting.pop_front()?;
        let b = self.waiting.pop_front()?;
        self.next_match += 1;
        let match_id = MatchId(self.next_match);
        for id in [a.id, b.id] {
            if let Some(state) = self.clients.get_mut(&id) {
                *state = ClientState::Playing;
            }
        }
        self.matches.insert(
            match_id,
            MatchEntry {
                players: [a.id, b.id],
            },
        );
        Some((match_id, a, b))
    }

    /// Forget a session that left the lobby without being paired.
    fn drop_waiting(&mut self, id: SessionId) -> bool {
        let before = self.waiting.len();
        self.waiting.retain(|w| w.id != id);
        if self.clients.get(&id) == Some(&ClientState::Waiting) {
            self.clients.remove(&id);
        }
        self.waiting.len() != before
    }

    fn finish_match(&mut self, id: MatchId) {
        if let Some(entry) = self.matches.remove(&id) {
            for player in entry.players {
                self.clients.remove(&player);
            }
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn live_matches(&self) -> Vec<MatchId> {
        self.matches.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty() && self.matches.is_empty()
    }
}

/// Lock the registry, recovering the data if a holder panicked.
fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Admits sessions, pairs them and spawns their matches.
#[derive(Clone)]
pub struct Matchmaker {
    config: Arc<ServerConfig>,
    registry: Arc<Mutex<Registry>>,
    shutdown: watch::Receiver<bool>,
}

impl Matchmaker {
    pub fn new(config: ServerConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(Mutex::new(Registry::default())),
            shutdown,
        }
    }

    /// Register a new connection and put it in the lobby. Starts a match if
    /// this completes a pair.
    pub fn admit(&self, transport: Box<dyn Transport>) -> SessionId {
        let peer = transport.peer();
        let backoff = Backoff {
            initial: self.config.keepalive_initial,
            step: self.config.keepalive_step,
        };

        let mut registry = lock(&self.registry);
        let id = registry.register_client();
        info!("[Server] Session {} accepted from {}", id, peer);
        let session = Session::new(
            id,
            transport,
            self.config.grid_width,
            self.config.grid_height,
        );
        let gate = TurnGate::new();
        let lobby = tokio::spawn(lobby(
            self.registry.clone(),
            session,
            gate.waiter(),
            backoff,
            self.shutdown.clone(),
        ));
        let paired = registry.enqueue(Waiting { id, gate, lobby });
        drop(registry);

        if let Some((match_id, a, b)) = paired {
            info!(
                "[Server] Pairing sessions {} and {} into match {}",
                a.id, b.id, match_id
            );
            tokio::spawn(run_match(self.clone(), match_id, a, b));
        }
        id
    }

    pub fn client_count(&self) -> usize {
        lock(&self.registry).client_count()
    }

    pub fn waiting_count(&self) -> usize {
        lock(&self.registry).waiting_count()
    }

    pub fn live_matches(&self) -> Vec<MatchId> {
        lock(&self.registry).live_matches()
    }

    fn is_idle(&self) -> bool {
        lock(&self.registry).is_empty()
    }
}

async fn lobby(
    registry: Arc<Mutex<Registry>>,
    session: Session,
    gate: GateWaiter,
    backoff: Backoff,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Session> {
    let id = session.id();
    let result = hold_in_lobby(session, gate, backoff, shutdown).await;
    if let Err(e) = &result {
        info!("[Session {}] Left the lobby: {}", id, e);
        lock(&registry).drop_waiting(id);
    }
    result
}

async fn run_match(matchmaker: Matchmaker, match_id: MatchId, a: Waiting, b: Waiting) {
    let mut game = Match::new(match_id, &matchmaker.config, matchmaker.shutdown.clone());
    for waiting in [&a, &b] {
        waiting.gate.release();
    }
    for waiting in [a, b] {
        match waiting.lobby.await {
            Ok(Ok(session)) => {
                if let Err(e) = game.add_player(session) {
                    error!("[Match {}] {}", match_id, e);
                }
            }
            Ok(Err(e)) => warn!(
                "[Match {}] Session {} dropped before the game started: {}",
                match_id, waiting.id, e
            ),
            Err(e) => error!(
                "[Match {}] Lobby task of session {} failed: {}",
                match_id, waiting.id, e
            ),
        }
    }

    match game.run().await {
        Ok(MatchOutcome::Decided { winner }) => {
            info!("[Match {}] Finished, player {} won", match_id, winner)
        }
        Ok(MatchOutcome::Forfeit { quitter }) => {
            info!("[Match {}] Finished by forfeit of player {}", match_id, quitter)
        }
        Ok(MatchOutcome::Shutdown) => info!("[Match {}] Closed by shutdown", match_id),
        Err(e) => warn!("[Match {}] Could not run: {}", match_id, e),
    }
    lock(&matchmaker.registry).finish_match(match_id);
}

/// Cloneable control surface of a running [`Server`].
#[derive(Clone)]
pub struct ServerHandle {
    shutdown: Arc<watch::Sender<bool>>,
    matchmaker: Matchmaker,
}

impl ServerHandle {
    /// Ask the server to stop: every waiting and playing session gets
    /// `close` and the accept loop ends.
    pub fn shutdown(&self) {
        info!("[Server] Shutdown requested");
        self.shutdown.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn client_count(&self) -> usize {
        self.matchmaker.client_count()
    }

    pub fn waiting_count(&self) -> usize {
        self.matchmaker.waiting_count()
    }

    pub fn live_matches(&self) -> Vec<MatchId> {
        self.matchmaker.live_matches()
    }
}

pub struct Server {
    listener: TcpListener,
    matchmaker: Matchmaker,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&config.bind).await?;
        let (tx, rx) = watch::channel(false);
        info!("[Server] Listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            matchmaker: Matchmaker::new(config, rx),
            shutdown: Arc::new(tx),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: self.shutdown.clone(),
            matchmaker: self.matchmaker.clone(),
        }
    }

    /// Accept connections until shutdown. An accept failure is returned as
    /// an error and ends the server.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        let max_message_size = self.matchmaker.config.max_message_size;
        loop {
            tokio::select! {
                biased;
                _ = wait_shutdown(&mut shutdown) => break,
                accepted = self.listener.accept() => {
                    let (stream, addr) = accepted?;
                    info!("[Server] Connection from {}", addr);
                    let transport = TcpTransport::with_config(stream, None, max_message_size);
                    self.matchmaker.admit(Box::new(transport));
                }
            }
        }

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        while !self.matchmaker.is_idle() && Instant::now() < deadline {
            sleep(Duration::from_millis(20)).await;
        }
        if !self.matchmaker.is_idle() {
            warn!(
                "[Server] Stopped with {} sessions still registered",
                self.matchmaker.client_count()
            );
        }
        info!("[Server] Stopped");
        Ok(())
    }
}
