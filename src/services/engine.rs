//! Transition engine — the single owner of live show state.
//!
//! ARCHITECTURE
//! ============
//! One tokio task owns the presentation state, score ledger, timer registry
//! and session registry. Connection tasks, timer tasks and the status route
//! reach it only through [`Command`]s on a bounded channel, and each command
//! runs to completion before the next is read. Two transitions can therefore
//! never interleave, and a timer fire is ordered against manual transitions
//! like any other event.
//!
//! DESIGN
//! ======
//! Event handlers mutate state and return an [`Outcome`]; they never send.
//! [`Engine::dispatch`] hands the outcome to the broadcast dispatcher, which
//! owns every outbound concern.
//!
//! TRANSITIONS
//! ===========
//! Every page change goes through [`Engine::transition`]: cancel the timer of
//! the page being left, make the target live, start the target's countdown if
//! it is a timer page, broadcast the render command. A missing or unknown
//! link logs a warning and leaves the show where it is.

use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, MAIN_PAGE_ID, PageDefinition, PageKind};
use crate::message::{Outbound, SessionId, now_rfc3339};
use crate::services::broadcast::{self, Outcome};
use crate::services::presentation::{Presentation, Transition};
use crate::services::score::{ScoreLedger, Team, team_label};
use crate::services::session::SessionRegistry;
use crate::services::timer::TimerManager;

const WELCOME_MESSAGE: &str = "Connected to Quiz Show Server";

// =============================================================================
// EVENTS
// =============================================================================

/// Something a client did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect { role: Option<String> },
    Reconnect { role: Option<String> },
    Ping,
    ListClients,
    /// Grid click in client coordinates.
    CellSelected { row: usize, col: usize },
    BuzzerPressed,
    /// A client's own countdown reached zero. Advisory only.
    ClientTimerFinished,
    AdvanceSlide,
    ReturnToMain,
    Moderator(ModeratorCommand),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeratorCommand {
    AddPoints { team: String, amount: u32 },
    RemovePoints { team: String, amount: u32 },
    /// `team` is a team id or `"none"`.
    EnableTeam { team: String },
    Reset,
}

/// Everything the engine task accepts.
#[derive(Debug)]
pub enum Command {
    Register {
        tx: mpsc::Sender<Outbound>,
        address: Option<SocketAddr>,
        asset_host: String,
        reply: oneshot::Sender<SessionId>,
    },
    Event {
        session_id: SessionId,
        event: Event,
    },
    Unregister {
        session_id: SessionId,
    },
    TimerFired {
        page_id: String,
        generation: u64,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

/// Scoreboard view served by `GET /points`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub team_red: u32,
    pub team_blue: u32,
    pub team_yellow: u32,
    pub team_green: u32,
    pub enabled_team: String,
    pub last_buzzer_team: Option<String>,
    pub team_red_devices: usize,
    pub team_blue_devices: usize,
    pub team_yellow_devices: usize,
    pub team_green_devices: usize,
}

// =============================================================================
// ENGINE
// =============================================================================

pub struct Engine {
    catalog: Arc<Catalog>,
    presentation: Presentation,
    ledger: ScoreLedger,
    timers: TimerManager,
    sessions: SessionRegistry,
}

impl Engine {
    /// Build an engine whose timers fire into `command_tx`.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, command_tx: &mpsc::Sender<Command>) -> Self {
        Self {
            catalog,
            presentation: Presentation::new(),
            ledger: ScoreLedger::new(),
            timers: TimerManager::new(command_tx.downgrade()),
            sessions: SessionRegistry::new(),
        }
    }

    /// Process commands until every sender is gone.
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        info!(pages = self.catalog.len(), "engine started");
        while let Some(command) = command_rx.recv().await {
            self.process(command);
        }
        self.timers.cancel_all();
        info!("engine stopped");
    }

    pub fn process(&mut self, command: Command) {
        match command {
            Command::Register { tx, address, asset_host, reply } => {
                let session_id = self.register_session(tx, address, asset_host);
                let _ = reply.send(session_id);
            }
            Command::Event { session_id, event } => {
                let outcome = self.handle_event(session_id, event);
                self.dispatch(outcome);
            }
            Command::Unregister { session_id } => {
                self.sessions.unregister(session_id);
            }
            Command::TimerFired { page_id, generation } => {
                let outcome = self.handle_timer_fired(&page_id, generation);
                self.dispatch(outcome);
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Add a session and greet it.
    pub fn register_session(
        &mut self,
        tx: mpsc::Sender<Outbound>,
        address: Option<SocketAddr>,
        asset_host: String,
    ) -> SessionId {
        let session_id = self.sessions.register(tx, address, asset_host);
        let mut outcome = Outcome::none();
        outcome.send_to(session_id, Outbound::Welcome { client_id: session_id, message: WELCOME_MESSAGE.into() });
        self.dispatch(outcome);
        session_id
    }

    /// Deliver an outcome. Returns sessions evicted on delivery failure.
    pub fn dispatch(&mut self, outcome: Outcome) -> Vec<SessionId> {
        if outcome.is_empty() {
            return Vec::new();
        }
        let view = self.presentation.main_view();
        broadcast::deliver(&mut self.sessions, &view, outcome)
    }

    // =========================================================================
    // EVENT HANDLERS
    // =========================================================================

    pub fn handle_event(&mut self, session_id: SessionId, event: Event) -> Outcome {
        if self.sessions.get(session_id).is_none() {
            debug!(%session_id, ?event, "event from unknown session ignored");
            return Outcome::none();
        }

        match event {
            Event::Connect { role } => self.handle_connect(session_id, role, true),
            Event::Reconnect { role } => self.handle_connect(session_id, role, false),
            Event::Ping => {
                let mut outcome = Outcome::none();
                outcome.send_to(session_id, Outbound::Pong { timestamp: now_rfc3339() });
                outcome
            }
            Event::ListClients => {
                let mut outcome = Outcome::none();
                let clients = self.sessions.list(Some(session_id));
                outcome.send_to(session_id, Outbound::ClientsList { clients });
                outcome
            }
            Event::CellSelected { row, col } => self.handle_cell_selected(session_id, row, col),
            Event::BuzzerPressed => self.handle_buzzer(session_id),
            Event::ClientTimerFinished => {
                info!(%session_id, page_id = self.presentation.current_page_id(), "client timer finished (advisory)");
                Outcome::none()
            }
            Event::AdvanceSlide => self.handle_advance(session_id),
            Event::ReturnToMain => {
                info!(%session_id, "return to main");
                let mut outcome = Outcome::none();
                self.transition(MAIN_PAGE_ID, &mut outcome);
                outcome
            }
            Event::Moderator(command) => self.handle_moderator(session_id, command),
        }
    }

    fn handle_connect(&mut self, session_id: SessionId, role: Option<String>, announce: bool) -> Outcome {
        self.sessions.update_role(session_id, role.clone());
        info!(%session_id, role = role.as_deref().unwrap_or("-"), reconnect = !announce, "session joined");

        let asset_host = self
            .sessions
            .get(session_id)
            .map(|s| s.asset_host.clone())
            .unwrap_or_default();

        let mut outcome = Outcome::none();
        outcome.send_to(session_id, Outbound::ConnectionConfirmed { mode: role.clone(), client_id: session_id });
        outcome.send_to(session_id, Outbound::Config { config: self.catalog.snapshot_for(&asset_host) });
        outcome.send_to(session_id, Outbound::RenderPage(self.presentation.render_current(&self.catalog)));
        if announce {
            outcome.send_to_all_except(session_id, Outbound::ClientConnected { client_id: session_id, mode: role });
        }
        outcome
    }

    fn handle_cell_selected(&mut self, session_id: SessionId, row: usize, col: usize) -> Outcome {
        let current = self.presentation.current_page_id().to_owned();
        let Some(page) = self.catalog.get(&current).filter(|p| p.kind == PageKind::Main) else {
            debug!(%session_id, page_id = %current, row, col, "grid click ignored: live page is not a grid");
            return Outcome::none();
        };
        let Some(cell) = page.cell_at(row, col) else {
            warn!(%session_id, row, col, "grid click outside table");
            return Outcome::none();
        };
        let link = cell.link.clone();

        let key = Presentation::cell_key(row, col);
        if !self.presentation.press(key.clone()) {
            info!(%session_id, cell = %key, "cell already pressed, ignoring");
            return Outcome::none();
        }
        info!(%session_id, cell = %key, "cell pressed");

        let actor = self.sessions.role(session_id).and_then(|r| r.parse::<Team>().ok());
        let turn_consumed = actor.is_some() && actor == self.presentation.enabled_team();
        if turn_consumed {
            self.presentation.set_enabled_team(None);
            info!(%session_id, team = team_label(actor), "turn consumed, no team enabled");
        }

        let mut outcome = Outcome::none();
        if let Some(target) = self.resolve_link(link.as_deref(), &current, "grid cell") {
            self.transition(&target, &mut outcome);
        }

        // Sent even when the transition above already rendered main: clients
        // treat this second render as the turn update.
        if turn_consumed && self.presentation.current_page_id() == MAIN_PAGE_ID {
            outcome.send_to_all(Outbound::RenderPage(self.presentation.render_current(&self.catalog)));
        }
        outcome
    }

    fn handle_buzzer(&mut self, session_id: SessionId) -> Outcome {
        let role = self.sessions.role(session_id).map(str::to_owned);
        self.ledger.record_buzzer(role.as_deref());

        let current = self.presentation.current_page_id().to_owned();
        info!(%session_id, role = role.as_deref().unwrap_or("-"), page_id = %current, "buzzer pressed");

        let link = self.catalog.get(&current).and_then(|p| p.link.clone());
        let mut outcome = Outcome::none();
        if let Some(target) = self.resolve_link(link.as_deref(), &current, "buzzer") {
            self.transition(&target, &mut outcome);
        }
        outcome
    }

    /// Follow the link of a page whose countdown elapsed, if that countdown
    /// is still the registered one.
    pub fn handle_timer_fired(&mut self, page_id: &str, generation: u64) -> Outcome {
        if !self.timers.claim(page_id, generation) {
            debug!(page_id, generation, "stale timer fire discarded");
            return Outcome::none();
        }
        info!(page_id, "server timer finished");

        let link = self.catalog.get(page_id).and_then(|p| p.link.clone());
        let mut outcome = Outcome::none();
        if let Some(target) = self.resolve_link(link.as_deref(), page_id, "timer") {
            self.transition(&target, &mut outcome);
        }
        outcome
    }

    fn handle_advance(&mut self, session_id: SessionId) -> Outcome {
        let current = self.presentation.current_page_id().to_owned();
        info!(%session_id, page_id = %current, "next slide");
        self.timers.cancel(&current);

        let link = self.catalog.get(&current).and_then(|p| p.link.clone());
        let mut outcome = Outcome::none();
        if let Some(target) = self.resolve_link(link.as_deref(), &current, "next slide") {
            self.transition(&target, &mut outcome);
        }
        outcome
    }

    fn handle_moderator(&mut self, session_id: SessionId, command: ModeratorCommand) -> Outcome {
        match command {
            ModeratorCommand::AddPoints { team, amount } => {
                match team.parse::<Team>() {
                    Ok(team) => {
                        let total = self.ledger.add(team, amount);
                        info!(%session_id, %team, amount, total, "points added");
                    }
                    Err(e) => debug!(%session_id, error = %e, "add points ignored"),
                }
                Outcome::none()
            }
            ModeratorCommand::RemovePoints { team, amount } => {
                match team.parse::<Team>() {
                    Ok(team) => {
                        let total = self.ledger.remove(team, amount);
                        info!(%session_id, %team, amount, total, "points removed");
                    }
                    Err(e) => debug!(%session_id, error = %e, "remove points ignored"),
                }
                Outcome::none()
            }
            ModeratorCommand::EnableTeam { team } => {
                let enabled = if team == "none" {
                    None
                } else {
                    match team.parse::<Team>() {
                        Ok(team) => Some(team),
                        Err(e) => {
                            debug!(%session_id, error = %e, "enable team ignored");
                            return Outcome::none();
                        }
                    }
                };
                self.presentation.set_enabled_team(enabled);
                info!(%session_id, team = team_label(enabled), "enabled team changed");

                let mut outcome = Outcome::none();
                outcome.send_to_all(Outbound::RenderPage(self.presentation.render_current(&self.catalog)));
                outcome
            }
            ModeratorCommand::Reset => {
                self.ledger.reset();
                self.presentation.reset();
                self.timers.cancel_all();
                info!(%session_id, "game state reset");

                let mut outcome = Outcome::none();
                self.transition(MAIN_PAGE_ID, &mut outcome);
                outcome
            }
        }
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    /// Make `target` the live page and broadcast it.
    fn transition(&mut self, target: &str, outcome: &mut Outcome) {
        let from = self.presentation.current_page_id().to_owned();
        self.timers.cancel(&from);

        let transition = Transition::to(&self.catalog, target);
        let countdown = transition.page.as_ref().and_then(PageDefinition::countdown);
        let render = self.presentation.render(&transition);
        self.presentation.apply(transition);

        match countdown {
            Some(duration) => {
                self.timers.start(target, duration);
            }
            None if self.catalog.get(target).is_some_and(|p| p.kind == PageKind::Timer) => {
                warn!(page_id = target, "timer page has no usable countdown, waiting for a manual advance");
            }
            None => {}
        }

        info!(%from, to = target, sessions = self.sessions.len(), "page transition");
        outcome.send_to_all(Outbound::RenderPage(render));
    }

    /// Validate a link target. Logs and returns `None` when there is nothing
    /// to follow.
    fn resolve_link(&self, link: Option<&str>, page_id: &str, trigger: &'static str) -> Option<String> {
        let Some(link) = link.filter(|l| !l.is_empty()) else {
            warn!(page_id, trigger, "no link target, staying on current page");
            return None;
        };
        if !self.catalog.is_known(link) {
            warn!(page_id, link, trigger, "unknown link target, staying on current page");
            return None;
        }
        Some(link.to_owned())
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let devices = self.sessions.count_by_team();
        let count = |team: Team| devices.get(&team).copied().unwrap_or(0);
        StatusSnapshot {
            team_red: self.ledger.score(Team::Red),
            team_blue: self.ledger.score(Team::Blue),
            team_yellow: self.ledger.score(Team::Yellow),
            team_green: self.ledger.score(Team::Green),
            enabled_team: team_label(self.presentation.enabled_team()).to_owned(),
            last_buzzer_team: self.ledger.last_buzzer_team().map(str::to_owned),
            team_red_devices: count(Team::Red),
            team_blue_devices: count(Team::Blue),
            team_yellow_devices: count(Team::Yellow),
            team_green_devices: count(Team::Green),
        }
    }

    #[must_use]
    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    #[must_use]
    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    #[must_use]
    pub fn timers(&self) -> &TimerManager {
        &self.timers
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable front door to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Command>,
}

impl EngineHandle {
    /// Register a connection. `None` if the engine has stopped.
    pub async fn register(
        &self,
        tx: mpsc::Sender<Outbound>,
        address: Option<SocketAddr>,
        asset_host: String,
    ) -> Option<SessionId> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Register { tx, address, asset_host, reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    /// Queue an event. Returns `false` if the engine has stopped.
    pub async fn event(&self, session_id: SessionId, event: Event) -> bool {
        self.tx.send(Command::Event { session_id, event }).await.is_ok()
    }

    pub async fn unregister(&self, session_id: SessionId) {
        let _ = self.tx.send(Command::Unregister { session_id }).await;
    }

    pub async fn status(&self) -> Option<StatusSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Status { reply }).await.ok()?;
        rx.await.ok()
    }
}

/// Start the engine task.
#[must_use]
pub fn spawn_engine(catalog: Arc<Catalog>, queue_capacity: usize) -> (EngineHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_capacity);
    let engine = Engine::new(catalog, &tx);
    let task = tokio::spawn(engine.run(rx));
    (EngineHandle { tx }, task)
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
