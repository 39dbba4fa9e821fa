//! Ended state transitions.

use saboteur_core::Team;

use super::{victory_text, TransitionResult};
use crate::state_machine::context::SessionContext;
use crate::state_machine::effect::{Effect, LogLevel};
use crate::state_machine::event::Event;
use crate::state_machine::menus;
use crate::state_machine::state::GameState;

/// Handle transitions from the Ended state.
///
/// Everyone can chat freely. Only the owner can send the session back to the
/// lobby for another round.
pub fn handle(state: GameState, event: Event, ctx: &mut SessionContext) -> TransitionResult {
    match event {
        Event::ChatMessage { player, text } => {
            if !ctx.contains(player) || text.starts_with('/') {
                return TransitionResult::no_change(state);
            }
            let line = format!("💬 {}: {}", ctx.name_of(player), text);
            TransitionResult::new(state, ctx.broadcast_except(player, &line))
        }

        Event::NewRoundRequested { player } => {
            if !ctx.is_owner(player) {
                return TransitionResult::reject(state, player, "Only the lobby owner can start a new round.");
            }
            TransitionResult::new(
                GameState::Lobby,
                vec![Effect::log(
                    LogLevel::Info,
                    format!("Lobby {}: {} requested a new round", ctx.code, player),
                )],
            )
        }

        Event::ButtonPressed { player, .. } | Event::PhotoSubmitted { player, .. } => {
            TransitionResult::reject(state, player, "The game is over. Ask the owner for a new round.")
        }

        Event::Tick
        | Event::SabotageStarted { .. }
        | Event::SabotageRejected { .. }
        | Event::SabotageFixRecorded { .. }
        | Event::SabotageTimedOut { .. } => TransitionResult::no_change(state),
    }
}

/// Announce the result and reveal every role.
pub fn on_enter(winner: Team, ctx: &mut SessionContext) -> Vec<Effect> {
    ctx.sabotage = None;
    ctx.meeting = None;

    let mut effects = vec![
        Effect::CancelSabotage,
        Effect::log(
            LogLevel::Info,
            format!("Lobby {}: round won by {}", ctx.code, winner),
        ),
    ];
    let text = format!(
        "{}\n\n{}\nThe owner can start a new round.",
        victory_text(winner),
        menus::final_roles(ctx)
    );
    effects.extend(ctx.broadcast(&text));
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::action::Action;
    use crate::state_machine::transition::fixtures::*;
    use crate::state_machine::transition::step;
    use saboteur_core::{PlayerId, Sabotage, SabotageKind};

    const ENDED: GameState = GameState::Ended {
        winner: Team::Crewmates,
    };

    #[test]
    fn test_only_owner_starts_new_round() {
        let mut ctx = round(4, &[4], 1);

        let result = handle(ENDED, Event::NewRoundRequested { player: PlayerId(2) }, &mut ctx);
        assert_eq!(result.state, ENDED);
        assert!(texts_for(&result.effects, PlayerId(2))[0].contains("Only the lobby owner"));

        let result = handle(ENDED, Event::NewRoundRequested { player: PlayerId(1) }, &mut ctx);
        assert_eq!(result.state, GameState::Lobby);
    }

    #[test]
    fn test_buttons_are_rejected() {
        let mut ctx = round(4, &[4], 1);
        let result = handle(
            ENDED,
            Event::ButtonPressed {
                player: PlayerId(3),
                action: Action::ViewTasks,
                message: None,
            },
            &mut ctx,
        );
        assert_eq!(result.state, ENDED);
        assert!(texts_for(&result.effects, PlayerId(3))[0].contains("The game is over"));
    }

    #[test]
    fn test_late_sabotage_timeout_is_ignored() {
        let mut ctx = round(4, &[4], 1);
        let sabotage = Sabotage::new(SabotageKind::Reactor, PlayerId(4), t0());
        let result = handle(ENDED, Event::SabotageTimedOut { sabotage }, &mut ctx);
        assert_eq!(result, TransitionResult::no_change(ENDED));
    }

    #[test]
    fn test_on_enter_reveals_roles_and_cancels_sabotage() {
        let mut ctx = round(4, &[4], 1);
        ctx.sabotage = Some(Sabotage::new(SabotageKind::Oxygen, PlayerId(4), t0()));
        let effects = on_enter(Team::Saboteurs, &mut ctx);

        assert!(ctx.sabotage.is_none());
        assert!(effects.contains(&Effect::CancelSabotage));
        let texts = texts_for(&effects, PlayerId(1));
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("😈 The SABOTEURS win!"));
        assert!(texts[0].contains("p4: Saboteur (survived)"));
    }

    #[test]
    fn test_new_round_resets_players() {
        let mut ctx = round(4, &[4], 2);
        ctx.players[0].kill();
        let result = step(ENDED, Event::NewRoundRequested { player: PlayerId(1) }, &mut ctx);

        assert_eq!(result.state, GameState::Lobby);
        assert!(ctx.players.iter().all(|p| p.alive && p.role.is_none() && p.tasks.is_empty()));
        assert!(texts_for(&result.effects, PlayerId(2))[0].starts_with("🔄 New round!"));
    }
}
