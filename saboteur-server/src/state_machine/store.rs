//! Session registry and per-session event processing.
//!
//! Each session sits behind its own mutex so independent lobbies progress
//! concurrently while events for one lobby are applied one at a time. The
//! registry lock is always taken before a session lock, never the reverse.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use saboteur_core::{GameRules, Player, PlayerId, Role, SabotageKind, Settings};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::action::Action;
use super::context::SessionContext;
use super::effect::Effect;
use super::event::Event;
use super::interpreter::{execute_effects, InterpreterContext, SabotageTimeout};
use super::state::GameState;
use super::transition::{on_player_join, on_player_leave, step, TransitionResult};
use crate::clock::Clock;
use crate::ids::{IdGenerator, LobbyCode, SessionId};
use crate::messenger::{MessageRef, Messenger};
use crate::sabotage_engine::SabotageEngine;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no lobby with code {0}")]
    UnknownLobby(LobbyCode),
    #[error("player {0} is not in that lobby")]
    NotInSession(PlayerId),
    #[error("lobby {0} is full")]
    LobbyFull(LobbyCode),
    #[error("lobby {0} already has a game in progress")]
    GameInProgress(LobbyCode),
    #[error("player {0} is already in lobby {1}")]
    AlreadyInSession(PlayerId, LobbyCode),
}

/// One game session: its phase, its data and when a player last did something.
#[derive(Debug)]
pub struct Session {
    pub id: SessionId,
    pub state: GameState,
    pub ctx: SessionContext,
    pub last_activity: DateTime<Utc>,
}

/// Knobs the store applies to every session it creates.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub rules: GameRules,
    pub role_reveal_ttl: Duration,
    /// Seed for lobby codes and per-session randomness. Entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            rules: GameRules::default(),
            role_reveal_ttl: Duration::from_secs(30),
            seed: None,
        }
    }
}

struct Registry {
    ids: IdGenerator,
    sessions: HashMap<SessionId, Arc<Mutex<Session>>>,
    codes: HashMap<LobbyCode, SessionId>,
    players: HashMap<PlayerId, SessionId>,
    rng: StdRng,
}

impl Registry {
    fn handle(&self, code: &LobbyCode) -> Result<(SessionId, Arc<Mutex<Session>>), StoreError> {
        self.codes
            .get(code)
            .and_then(|id| self.sessions.get(id).map(|s| (*id, Arc::clone(s))))
            .ok_or_else(|| StoreError::UnknownLobby(code.clone()))
    }

    fn fresh_code(&mut self) -> LobbyCode {
        loop {
            let code = self.ids.lobby_code(&mut self.rng);
            if !self.codes.contains_key(&code) {
                return code;
            }
        }
    }

    fn forget(&mut self, id: SessionId, code: &LobbyCode) {
        self.sessions.remove(&id);
        self.codes.remove(code);
        self.players.retain(|_, session| *session != id);
    }
}

/// Public view of a session, safe to show to any player.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub code: LobbyCode,
    pub state: GameState,
    pub owner: PlayerId,
    pub players: Vec<PlayerView>,
    pub settings: Settings,
    pub task_progress: u32,
    pub sabotage: Option<SabotageKind>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
    pub ready: bool,
    /// Only revealed once the round has ended.
    pub role: Option<Role>,
}

impl SessionView {
    fn of(session: &Session) -> Self {
        let reveal = matches!(session.state, GameState::Ended { .. });
        let ctx = &session.ctx;
        Self {
            code: ctx.code.clone(),
            state: session.state.clone(),
            owner: ctx.owner,
            players: ctx
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id,
                    name: p.name.clone(),
                    alive: p.alive,
                    ready: p.ready,
                    role: if reveal { p.role } else { None },
                })
                .collect(),
            settings: ctx.settings.clone(),
            task_progress: ctx.tasks.completion_percentage(),
            sabotage: ctx.sabotage.as_ref().map(|s| s.kind),
        }
    }
}

/// Thread-safe registry of running sessions.
pub struct SessionStore {
    registry: RwLock<Registry>,
    messenger: Arc<dyn Messenger>,
    sabotage: Arc<SabotageEngine>,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
    timeouts: UnboundedSender<SabotageTimeout>,
}

impl SessionStore {
    /// Creates the store and spawns the task that turns sabotage timeouts
    /// into events. Must be called inside a tokio runtime.
    pub fn start(
        messenger: Arc<dyn Messenger>,
        sabotage: Arc<SabotageEngine>,
        clock: Arc<dyn Clock>,
        options: StoreOptions,
    ) -> Arc<Self> {
        let (timeouts, receiver) = mpsc::unbounded_channel();
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let store = Arc::new(Self {
            registry: RwLock::new(Registry {
                ids: IdGenerator::new(),
                sessions: HashMap::new(),
                codes: HashMap::new(),
                players: HashMap::new(),
                rng,
            }),
            messenger,
            sabotage,
            clock,
            options,
            timeouts,
        });
        tokio::spawn(forward_timeouts(Arc::downgrade(&store), receiver));
        store
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Opens a new lobby owned by `owner`. An owner already in another
    /// session leaves it first.
    pub async fn create_session(&self, owner: PlayerId, name: &str) -> Result<LobbyCode, StoreError> {
        self.leave_if_present(owner).await;

        let now = self.clock.now();
        let mut registry = self.registry.write().await;
        let id = registry.ids.next_session_id();
        let code = registry.fresh_code();
        let seed = registry.rng.gen();

        let mut ctx = SessionContext::new(
            code.clone(),
            Player::new(owner, name),
            self.options.rules.clone(),
            StdRng::seed_from_u64(seed),
            now,
        );
        ctx.role_reveal_ttl = self.options.role_reveal_ttl;
        let handle = Arc::new(Mutex::new(Session {
            id,
            state: GameState::Lobby,
            ctx,
            last_activity: now,
        }));
        registry.sessions.insert(id, Arc::clone(&handle));
        registry.codes.insert(code.clone(), id);
        registry.players.insert(owner, id);
        let mut session = handle.lock_owned().await;
        drop(registry);

        info!("Created lobby {} ({}) for player {}", code, id, owner);
        let state = session.state.clone();
        let effects = on_player_join(&state, owner, &mut session.ctx);
        self.drive(&mut session, effects, vec![]).await;
        Ok(code)
    }

    /// Adds a player to a lobby that has not started yet.
    pub async fn join(&self, code: &LobbyCode, player: PlayerId, name: &str) -> Result<(), StoreError> {
        self.check_joinable(code, player).await?;
        self.leave_if_present(player).await;

        let mut registry = self.registry.write().await;
        let (id, handle) = registry.handle(code)?;
        let mut session = handle.lock_owned().await;
        // Re-checked: the lobby may have changed while we left the old one.
        Self::admit(&session, code)?;
        session.ctx.players.push(Player::new(player, name));
        session.last_activity = self.clock.now();
        registry.players.insert(player, id);
        drop(registry);

        info!("Player {} joined lobby {}", player, code);
        let state = session.state.clone();
        let effects = on_player_join(&state, player, &mut session.ctx);
        self.drive(&mut session, effects, vec![]).await;
        Ok(())
    }

    async fn check_joinable(&self, code: &LobbyCode, player: PlayerId) -> Result<(), StoreError> {
        let registry = self.registry.read().await;
        let (id, handle) = registry.handle(code)?;
        if registry.players.get(&player) == Some(&id) {
            return Err(StoreError::AlreadyInSession(player, code.clone()));
        }
        let session = handle.lock().await;
        Self::admit(&session, code)
    }

    fn admit(session: &Session, code: &LobbyCode) -> Result<(), StoreError> {
        if !session.state.accepts_new_players() {
            return Err(StoreError::GameInProgress(code.clone()));
        }
        if session.ctx.is_full() {
            return Err(StoreError::LobbyFull(code.clone()));
        }
        Ok(())
    }

    async fn leave_if_present(&self, player: PlayerId) {
        if let Err(StoreError::NotInSession(_)) = self.leave(player).await {
            debug!("Player {} was not in a session", player);
        }
    }

    /// Removes a player from whatever session they are in. The last player
    /// out closes the session.
    pub async fn leave(&self, player: PlayerId) -> Result<LobbyCode, StoreError> {
        let mut registry = self.registry.write().await;
        let id = registry
            .players
            .remove(&player)
            .ok_or(StoreError::NotInSession(player))?;
        let Some(handle) = registry.sessions.get(&id).cloned() else {
            return Err(StoreError::NotInSession(player));
        };
        let mut session = handle.lock_owned().await;
        let code = session.ctx.code.clone();

        let Some(index) = session.ctx.players.iter().position(|p| p.id == player) else {
            return Err(StoreError::NotInSession(player));
        };
        let leaver = session.ctx.players.remove(index);
        info!("Player {} left lobby {}", player, code);
        self.messenger.forget_player(player).await;

        if session.ctx.players.is_empty() {
            registry.forget(id, &code);
            drop(registry);
            self.sabotage.cancel(id).await;
            info!("Lobby {} closed: no players left", code);
            return Ok(code);
        }
        drop(registry);

        let state = session.state.clone();
        let effects = on_player_leave(&state, &leaver, &mut session.ctx);
        // A departure can decide the round or unblock the lobby.
        self.drive(&mut session, effects, vec![Event::Tick]).await;
        Ok(code)
    }

    /// Lobby the player is currently in.
    pub async fn session_of(&self, player: PlayerId) -> Option<LobbyCode> {
        let registry = self.registry.read().await;
        let id = registry.players.get(&player)?;
        registry
            .codes
            .iter()
            .find(|(_, session)| *session == id)
            .map(|(code, _)| code.clone())
    }

    pub async fn session_count(&self) -> usize {
        self.registry.read().await.sessions.len()
    }

    pub async fn snapshot(&self, code: &LobbyCode) -> Result<SessionView, StoreError> {
        self.inspect(code, SessionView::of).await
    }

    /// Runs `f` against the session under its lock.
    pub async fn inspect<T>(&self, code: &LobbyCode, f: impl FnOnce(&Session) -> T) -> Result<T, StoreError> {
        let (_, handle) = self.registry.read().await.handle(code)?;
        let session = handle.lock().await;
        Ok(f(&session))
    }

    // =========================================================================
    // Player Input
    // =========================================================================

    pub async fn handle_chat_message(
        &self,
        code: &LobbyCode,
        player: PlayerId,
        text: &str,
    ) -> Result<GameState, StoreError> {
        let event = Event::ChatMessage {
            player,
            text: text.to_string(),
        };
        self.dispatch_player(code, player, event).await
    }

    pub async fn handle_button_press(
        &self,
        code: &LobbyCode,
        player: PlayerId,
        token: &str,
        message: Option<MessageRef>,
    ) -> Result<GameState, StoreError> {
        let event = Event::ButtonPressed {
            player,
            action: Action::parse(token),
            message,
        };
        self.dispatch_player(code, player, event).await
    }

    pub async fn handle_photo_submission(
        &self,
        code: &LobbyCode,
        player: PlayerId,
        proof: &str,
    ) -> Result<GameState, StoreError> {
        let event = Event::PhotoSubmitted {
            player,
            proof: proof.to_string(),
        };
        self.dispatch_player(code, player, event).await
    }

    pub async fn new_round(&self, code: &LobbyCode, player: PlayerId) -> Result<GameState, StoreError> {
        self.dispatch_player(code, player, Event::NewRoundRequested { player })
            .await
    }

    async fn dispatch_player(
        &self,
        code: &LobbyCode,
        player: PlayerId,
        event: Event,
    ) -> Result<GameState, StoreError> {
        let (_, handle) = self.registry.read().await.handle(code)?;
        let mut session = handle.lock().await;
        if !session.ctx.contains(player) {
            return Err(StoreError::NotInSession(player));
        }
        Ok(self.drive(&mut session, vec![], vec![event]).await)
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Delivers a tick to every session.
    pub async fn tick_all(&self) {
        let handles: Vec<Arc<Mutex<Session>>> = {
            let registry = self.registry.read().await;
            registry.sessions.values().cloned().collect()
        };
        for handle in handles {
            let mut session = handle.lock().await;
            self.drive(&mut session, vec![], vec![Event::Tick]).await;
        }
    }

    /// Closes sessions with no player input for longer than `max_idle`.
    pub async fn expire_idle(&self, max_idle: chrono::Duration) -> Vec<LobbyCode> {
        let now = self.clock.now();
        let mut expired = Vec::new();
        {
            let mut registry = self.registry.write().await;
            let mut stale = Vec::new();
            for (id, handle) in &registry.sessions {
                let session = handle.lock().await;
                if now - session.last_activity > max_idle {
                    stale.push((*id, session.ctx.code.clone(), session.ctx.ids()));
                }
            }
            for (id, code, players) in stale {
                registry.forget(id, &code);
                expired.push((id, code, players));
            }
        }

        let mut codes = Vec::new();
        for (id, code, players) in expired {
            self.sabotage.cancel(id).await;
            for player in players {
                self.messenger.forget_player(player).await;
                if let Err(e) = self
                    .messenger
                    .send_to_player(player, &format!("💤 Lobby {} was closed after being idle.", code), None)
                    .await
                {
                    warn!("Could not notify player {} of expiry: {}", player, e);
                }
            }
            info!("Lobby {} expired after inactivity", code);
            codes.push(code);
        }
        codes
    }

    async fn dispatch(&self, id: SessionId, event: Event) {
        let handle = self.registry.read().await.sessions.get(&id).cloned();
        let Some(handle) = handle else {
            debug!("Dropping {} for closed {}", event.log_summary(), id);
            return;
        };
        let mut session = handle.lock().await;
        self.drive(&mut session, vec![], vec![event]).await;
    }

    // =========================================================================
    // Event Loop
    // =========================================================================

    /// Executes `effects`, then processes `events` and every result event
    /// they produce until the session settles.
    ///
    /// Returns the final state.
    async fn drive(&self, session: &mut Session, effects: Vec<Effect>, events: Vec<Event>) -> GameState {
        let correlation_id = Uuid::new_v4().to_string();
        let now = self.clock.now();
        session.ctx.now = now;
        session.ctx.sabotage = self.sabotage.active(session.id).await;
        let interpreter = self.interpreter_context(session, &correlation_id);

        let mut events_to_process: Vec<Event> = events.into_iter().rev().collect();
        if !effects.is_empty() {
            let result_events = execute_effects(&interpreter, effects).await;
            events_to_process.extend(result_events.into_iter().rev());
        }

        while let Some(event) = events_to_process.pop() {
            if event.is_player_input() {
                session.last_activity = now;
            }
            if matches!(event, Event::Tick) {
                debug!("Tick for lobby {} in state {}", session.ctx.code, session.state);
            } else {
                info!(
                    correlation_id = %correlation_id,
                    "Processing event {} for lobby {} in state {}",
                    event.log_summary(),
                    session.ctx.code,
                    session.state
                );
            }

            let Some(TransitionResult { state, effects }) = guarded_step(session, event) else {
                error!(
                    correlation_id = %correlation_id,
                    "Transition panicked in lobby {}; keeping state {}",
                    session.ctx.code,
                    session.state
                );
                continue;
            };
            if state != session.state {
                info!(
                    "Session {} transitioning {} -> {}",
                    session.ctx.code, session.state, state
                );
            }
            session.state = state;

            if !effects.is_empty() {
                let result_events = execute_effects(&interpreter, effects).await;
                // Reverse so they're processed in order.
                events_to_process.extend(result_events.into_iter().rev());
                session.ctx.sabotage = self.sabotage.active(session.id).await;
            }
        }

        session.state.clone()
    }

    fn interpreter_context(&self, session: &Session, correlation_id: &str) -> InterpreterContext {
        InterpreterContext {
            session: session.id,
            code: session.ctx.code.clone(),
            messenger: Arc::clone(&self.messenger),
            sabotage: Arc::clone(&self.sabotage),
            scheduler: self.sabotage.scheduler(),
            timeouts: self.timeouts.clone(),
            now: session.ctx.now,
            correlation_id: Some(correlation_id.to_string()),
        }
    }
}

/// Runs one transition on copies of the state and context. A panic leaves
/// the session exactly as it was.
fn guarded_step(session: &mut Session, event: Event) -> Option<TransitionResult> {
    let state = session.state.clone();
    let mut ctx = session.ctx.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
        let result = step(state, event, &mut ctx);
        (result, ctx)
    }));
    match outcome {
        Ok((result, ctx)) => {
            session.ctx = ctx;
            Some(result)
        }
        Err(_) => None,
    }
}

/// Turns expired critical sabotages into events for their sessions.
async fn forward_timeouts(store: Weak<SessionStore>, mut receiver: UnboundedReceiver<SabotageTimeout>) {
    while let Some(SabotageTimeout { session, sabotage }) = receiver.recv().await {
        let Some(store) = store.upgrade() else {
            break;
        };
        store.dispatch(session, Event::SabotageTimedOut { sabotage }).await;
    }
    debug!("Sabotage timeout forwarder stopped");
}
