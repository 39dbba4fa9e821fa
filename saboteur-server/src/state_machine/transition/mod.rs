//! Pure state transition function.
//!
//! Each phase has its own handler module with co-located tests:
//! - `lobby`: joining, readiness and settings
//! - `running`: the round itself (tasks, kills, sabotage, reports)
//! - `discussion`: meetings and voting
//! - `ended`: post-game chat and new rounds
//!
//! Handlers mutate the session context directly but perform no I/O; all
//! outbound work is returned as effects.

mod discussion;
mod ended;
mod lobby;
mod running;

use saboteur_core::{Player, PlayerId, Team};

use super::context::SessionContext;
use super::effect::{Effect, LogLevel};
use super::event::Event;
use super::menus;
use super::state::GameState;

/// Result of a state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult {
    /// The new state after the transition.
    pub state: GameState,
    /// Effects to execute.
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: GameState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    pub fn no_change(state: GameState) -> Self {
        Self {
            state,
            effects: vec![],
        }
    }

    /// Stay in `state` and tell `player` why their input did nothing.
    pub fn reject(state: GameState, player: PlayerId, reason: &str) -> Self {
        Self::new(state, vec![Effect::send(player, format!("❌ {}", reason))])
    }
}

/// Routes an event to the handler for the current phase.
pub fn transition(state: GameState, event: Event, ctx: &mut SessionContext) -> TransitionResult {
    match &state {
        GameState::Lobby => lobby::handle(state, event, ctx),
        GameState::Running => running::handle(state, event, ctx),
        GameState::Discussion { .. } => discussion::handle(state, event, ctx),
        GameState::Ended { .. } => ended::handle(state, event, ctx),
    }
}

/// Runs [`transition`] and, when the phase changes, the exit hook of the old
/// phase followed by the entry hook of the new one.
pub fn step(state: GameState, event: Event, ctx: &mut SessionContext) -> TransitionResult {
    let previous = state.clone();
    let mut result = transition(state, event, ctx);
    if !previous.same_phase(&result.state) {
        result.effects.extend(on_exit(&previous, ctx));
        result.effects.extend(on_enter(&result.state, &previous, ctx));
    }
    result
}

pub fn on_enter(state: &GameState, previous: &GameState, ctx: &mut SessionContext) -> Vec<Effect> {
    match state {
        GameState::Lobby => lobby::on_enter(ctx),
        GameState::Running => running::on_enter(previous, ctx),
        GameState::Discussion { .. } => discussion::on_enter(ctx),
        GameState::Ended { winner } => ended::on_enter(*winner, ctx),
    }
}

pub fn on_exit(state: &GameState, ctx: &mut SessionContext) -> Vec<Effect> {
    match state {
        GameState::Discussion { .. } => discussion::on_exit(ctx),
        _ => vec![],
    }
}

/// Called after `player` has been added to the context.
pub fn on_player_join(state: &GameState, player: PlayerId, ctx: &mut SessionContext) -> Vec<Effect> {
    match state {
        GameState::Lobby => lobby::on_player_join(player, ctx),
        _ => vec![Effect::log(
            LogLevel::Warn,
            format!("Player {} joined lobby {} outside the lobby phase", player, ctx.code),
        )],
    }
}

/// Called after `player` has been removed from the context.
pub fn on_player_leave(state: &GameState, player: &Player, ctx: &mut SessionContext) -> Vec<Effect> {
    let mut effects = Vec::new();
    if ctx.owner == player.id {
        if let Some(next_owner) = ctx.players.first().map(|p| p.id) {
            ctx.owner = next_owner;
            effects.extend(ctx.broadcast(&format!(
                "👑 {} is now the lobby owner.",
                ctx.name_of(next_owner)
            )));
        }
    }
    effects.extend(ctx.broadcast(&format!("🚪 {} left the game.", player.name)));
    if matches!(state, GameState::Lobby) {
        effects.extend(ctx.broadcast(&menus::roster(ctx)));
    }
    effects
}

/// Announcement sent to everyone when a round is decided.
pub(crate) fn victory_text(winner: Team) -> &'static str {
    match winner {
        Team::Crewmates => "🎉 The CREWMATES win!",
        Team::Saboteurs => "😈 The SABOTEURS win!",
    }
}
