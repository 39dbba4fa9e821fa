//! Lobby state transitions.

use saboteur_core::assignment::effective_saboteur_count;
use saboteur_core::{PlayerId, SettingField};

use super::TransitionResult;
use crate::messenger::MessageRef;
use crate::state_machine::action::Action;
use crate::state_machine::context::SessionContext;
use crate::state_machine::effect::{Effect, LogLevel};
use crate::state_machine::event::Event;
use crate::state_machine::menus;
use crate::state_machine::state::GameState;

/// Handle transitions from the Lobby state.
///
/// The lobby relays chat, tracks readiness and lets the owner tune the
/// settings. The round starts as soon as enough players are all ready.
pub fn handle(state: GameState, event: Event, ctx: &mut SessionContext) -> TransitionResult {
    match event {
        Event::ChatMessage { player, text } => {
            if !ctx.contains(player) || text.starts_with('/') {
                return TransitionResult::no_change(state);
            }
            let line = format!("💬 {}: {}", ctx.name_of(player), text);
            TransitionResult::new(state, ctx.broadcast_except(player, &line))
        }

        Event::ButtonPressed {
            player,
            action,
            message,
        } => handle_button(state, player, action, message, ctx),

        Event::PhotoSubmitted { player, .. } => {
            TransitionResult::reject(state, player, "The game hasn't started yet.")
        }

        Event::NewRoundRequested { player } => {
            TransitionResult::reject(state, player, "You're already in the lobby.")
        }

        // A player leaving can make everyone else ready.
        Event::Tick => maybe_start(state, ctx, vec![]),

        Event::SabotageStarted { .. }
        | Event::SabotageRejected { .. }
        | Event::SabotageFixRecorded { .. }
        | Event::SabotageTimedOut { .. } => TransitionResult::new(
            state,
            vec![Effect::log(
                LogLevel::Warn,
                format!("Ignoring sabotage event in lobby {}", ctx.code),
            )],
        ),
    }
}

fn handle_button(
    state: GameState,
    player: PlayerId,
    action: Action,
    message: Option<MessageRef>,
    ctx: &mut SessionContext,
) -> TransitionResult {
    if !ctx.contains(player) {
        return TransitionResult::no_change(state);
    }

    match action {
        Action::Ready => {
            let Some(p) = ctx.player_mut(player) else {
                return TransitionResult::no_change(state);
            };
            p.ready = !p.ready;
            let confirmation = if p.ready {
                "✅ You are ready."
            } else {
                "↩️ You are no longer ready."
            };
            let mut effects = vec![Effect::send(player, confirmation)];
            effects.extend(ctx.broadcast(&menus::roster(ctx)));
            maybe_start(state, ctx, effects)
        }

        Action::OpenSettings => {
            if !ctx.is_owner(player) {
                return TransitionResult::reject(state, player, "Only the lobby owner can change settings.");
            }
            let (text, keyboard) = menus::settings_panel(&ctx.settings);
            TransitionResult::new(state, vec![Effect::send_with(player, text, keyboard)])
        }

        Action::AdjustSetting { field, increase } => {
            if !ctx.is_owner(player) {
                return TransitionResult::reject(state, player, "Only the lobby owner can change settings.");
            }
            let changed = ctx.settings.step(field, increase);
            let mut effects = vec![refresh_settings(player, message, ctx)];
            if changed {
                effects.push(Effect::log(
                    LogLevel::Debug,
                    format!(
                        "Lobby {}: {:?} set to {}",
                        ctx.code,
                        field,
                        ctx.settings.get(field)
                    ),
                ));
                if field == SettingField::SaboteurCount {
                    effects.extend(ctx.broadcast_except(
                        player,
                        &format!("⚙️ Saboteurs this round: {}", ctx.settings.saboteur_count()),
                    ));
                }
            }
            TransitionResult::new(state, effects)
        }

        Action::CloseSettings => {
            let Some(p) = ctx.player(player) else {
                return TransitionResult::no_change(state);
            };
            let text = menus::roster(ctx);
            let keyboard = menus::lobby_keyboard(p, ctx.is_owner(player));
            let effect = match message {
                Some(message) => Effect::Edit {
                    player,
                    message,
                    text,
                    keyboard: Some(keyboard),
                },
                None => Effect::send_with(player, text, keyboard),
            };
            TransitionResult::new(state, vec![effect])
        }

        Action::Unknown(token) => TransitionResult::new(
            state,
            vec![
                Effect::send(player, "❌ Unknown action."),
                Effect::log(LogLevel::Debug, format!("Unknown action {:?} in lobby", token)),
            ],
        ),

        _ => TransitionResult::reject(state, player, "The game hasn't started yet."),
    }
}

fn refresh_settings(player: PlayerId, message: Option<MessageRef>, ctx: &SessionContext) -> Effect {
    let (text, keyboard) = menus::settings_panel(&ctx.settings);
    match message {
        Some(message) => Effect::Edit {
            player,
            message,
            text,
            keyboard: Some(keyboard),
        },
        None => Effect::send_with(player, text, keyboard),
    }
}

/// Whether the round can start right now.
pub(crate) fn can_start(ctx: &SessionContext) -> bool {
    ctx.players.len() >= ctx.rules.min_players
        && ctx.players.iter().all(|p| p.ready)
        && effective_saboteur_count(ctx.players.len(), ctx.settings.saboteur_count(), &ctx.rules).is_ok()
}

fn maybe_start(state: GameState, ctx: &SessionContext, mut effects: Vec<Effect>) -> TransitionResult {
    if !can_start(ctx) {
        return TransitionResult::new(state, effects);
    }
    effects.extend(ctx.broadcast("🚀 Everyone is ready. Starting the game!"));
    TransitionResult::new(GameState::Running, effects)
}

/// Entering the lobby after a finished round: clear round state and invite
/// everyone to ready up again.
pub fn on_enter(ctx: &mut SessionContext) -> Vec<Effect> {
    for player in ctx.players.iter_mut() {
        player.reset_for_lobby();
    }
    ctx.tasks.reset();
    ctx.meeting = None;

    let mut effects = vec![Effect::log(
        LogLevel::Info,
        format!("Lobby {} reopened for a new round", ctx.code),
    )];
    let roster = menus::roster(ctx);
    for player in &ctx.players {
        effects.push(Effect::send_with(
            player.id,
            format!("🔄 New round!\n{}", roster),
            menus::lobby_keyboard(player, ctx.is_owner(player.id)),
        ));
    }
    effects
}

pub fn on_player_join(player: PlayerId, ctx: &mut SessionContext) -> Vec<Effect> {
    let Some(joined) = ctx.player(player) else {
        return vec![];
    };
    let roster = menus::roster(ctx);
    let welcome = format!(
        "👋 Welcome to lobby {}! Share this code with your friends.\n{}",
        ctx.code, roster
    );
    let mut effects = vec![Effect::send_with(
        player,
        welcome,
        menus::lobby_keyboard(joined, ctx.is_owner(player)),
    )];
    effects.extend(ctx.broadcast_except(
        player,
        &format!(
            "👋 {} joined ({}/{}).",
            joined.name,
            ctx.players.len(),
            ctx.rules.max_players
        ),
    ));
    effects
}
