//! Running state transitions.

use saboteur_core::{assign_roles, win, PlayerId, Role, Sabotage, Team};

use super::TransitionResult;
use crate::sabotage_engine::FixOutcome;
use crate::state_machine::action::Action;
use crate::state_machine::context::{Meeting, MeetingDurations, MeetingTrigger, SessionContext};
use crate::state_machine::effect::{Effect, LogLevel};
use crate::state_machine::event::Event;
use crate::state_machine::menus;
use crate::state_machine::state::{GameState, MeetingPhase};

/// Handle transitions from the Running state.
///
/// Living players do tasks, report bodies and call meetings; saboteurs also
/// kill and sabotage. Ghosts keep doing tasks and talk among themselves.
pub fn handle(state: GameState, event: Event, ctx: &mut SessionContext) -> TransitionResult {
    match event {
        Event::ChatMessage { player, text } => round_chat(state, player, &text, ctx),

        Event::ButtonPressed { player, action, .. } => handle_button(state, player, action, ctx),

        Event::PhotoSubmitted { player, proof } => submit_photo(state, player, proof, ctx),

        Event::NewRoundRequested { player } => {
            TransitionResult::reject(state, player, "The round is still in progress.")
        }

        Event::Tick => check_round_over(state, ctx),

        Event::SabotageTimedOut { sabotage } => sabotage_timed_out(state, &sabotage, ctx),

        event @ (Event::SabotageStarted { .. }
        | Event::SabotageRejected { .. }
        | Event::SabotageFixRecorded { .. }) => sabotage_feedback(state, event, ctx),
    }
}

/// Player-facing results of sabotage effects. Shared with meetings, where a
/// result can still arrive for an action taken just before the meeting.
pub(super) fn sabotage_feedback(state: GameState, event: Event, ctx: &mut SessionContext) -> TransitionResult {
    match event {
        Event::SabotageStarted { sabotage } => {
            let text = sabotage.announcement(ctx.now, ctx.rules.critical_sabotage_timeout);
            ctx.sabotage = Some(sabotage);
            let ctx: &SessionContext = ctx;
            let effects = ctx
                .players
                .iter()
                .map(|p| {
                    if p.alive {
                        Effect::send_with(p.id, text.clone(), menus::controls(p, ctx))
                    } else {
                        Effect::send(p.id, text.clone())
                    }
                })
                .collect();
            TransitionResult::new(state, effects)
        }

        Event::SabotageRejected { initiator, kind } => TransitionResult::reject(
            state,
            initiator,
            &format!("Can't start {}: another sabotage is already active.", kind),
        ),

        Event::SabotageFixRecorded { player, outcome } => match outcome {
            FixOutcome::NoActiveSabotage => {
                TransitionResult::reject(state, player, "There is nothing to fix right now.")
            }
            FixOutcome::Progress {
                kind,
                fixers,
                required,
            } => {
                let text = format!(
                    "🔧 {} is working on {} ({}/{}). Someone else needs to help at: {}",
                    ctx.name_of(player),
                    kind,
                    fixers,
                    required,
                    kind.fix_locations().join(", ")
                );
                TransitionResult::new(state, ctx.broadcast_living(&text))
            }
            FixOutcome::Fixed(sabotage) => {
                ctx.sabotage = None;
                TransitionResult::new(
                    state,
                    ctx.broadcast(&format!("✅ {} has been fixed!", sabotage.kind)),
                )
            }
        },

        _ => TransitionResult::no_change(state),
    }
}

fn round_chat(state: GameState, player: PlayerId, text: &str, ctx: &SessionContext) -> TransitionResult {
    let Some(sender) = ctx.player(player) else {
        return TransitionResult::no_change(state);
    };
    if text.starts_with('/') {
        return TransitionResult::no_change(state);
    }
    if sender.alive {
        return TransitionResult::reject(
            state,
            player,
            "Chat is closed during the round. Report a body or call a meeting to talk.",
        );
    }
    let line = format!("👻 {}: {}", sender.name, text);
    let effects = ctx
        .ghost_ids()
        .into_iter()
        .filter(|id| *id != player)
        .map(|id| Effect::send(id, line.clone()))
        .collect();
    TransitionResult::new(state, effects)
}

fn handle_button(state: GameState, player: PlayerId, action: Action, ctx: &mut SessionContext) -> TransitionResult {
    let Some(actor) = ctx.player(player) else {
        return TransitionResult::no_change(state);
    };
    let alive = actor.alive;
    let saboteur = actor.is_saboteur();

    match action {
        Action::ViewTasks => {
            if ctx.sabotage.as_ref().is_some_and(|s| s.kind.blocks_task_list()) {
                return TransitionResult::reject(
                    state,
                    player,
                    "Communications are down. Your task list is unavailable.",
                );
            }
            let effect = Effect::send_with(player, menus::task_list(actor, ctx), menus::controls(actor, ctx));
            TransitionResult::new(state, vec![effect])
        }

        Action::ReportBody => {
            if !alive {
                return TransitionResult::reject(state, player, "Ghosts can't report bodies.");
            }
            start_meeting(MeetingTrigger::BodyReported { reporter: player }, ctx)
        }

        Action::EmergencyMeeting => {
            if !alive {
                return TransitionResult::reject(state, player, "Ghosts can't call meetings.");
            }
            let used = ctx.player_mut(player).is_some_and(|p| p.use_emergency_meeting());
            if !used {
                return TransitionResult::reject(state, player, "You have no emergency meetings left.");
            }
            start_meeting(MeetingTrigger::Emergency { caller: player }, ctx)
        }

        Action::ReportOwnDeath => {
            if !alive {
                return TransitionResult::reject(state, player, "You are already dead.");
            }
            TransitionResult::new(
                state,
                vec![Effect::send_with(
                    player,
                    "Were you killed by a saboteur? This cannot be undone.",
                    menus::confirm_death(),
                )],
            )
        }

        Action::ConfirmOwnDeath => {
            if !alive {
                return TransitionResult::reject(state, player, "You are already dead.");
            }
            let effects = become_ghost(player, ctx);
            TransitionResult::new(state, effects)
        }

        Action::KillMenu | Action::Kill(_) | Action::SabotageMenu | Action::Sabotage(_)
            if !(alive && saboteur) =>
        {
            TransitionResult::reject(state, player, "You can't do that.")
        }

        Action::KillMenu => {
            if let Some(secs) = actor.kill_cooldown_remaining(ctx.now) {
                return TransitionResult::reject(state, player, &format!("Kill is on cooldown for {}s.", secs));
            }
            let targets = menus::kill_targets(actor, ctx);
            if targets.rows.is_empty() {
                return TransitionResult::reject(state, player, "There is no one to kill.");
            }
            TransitionResult::new(
                state,
                vec![Effect::send_with(player, "🔪 Choose your target:", targets)],
            )
        }

        Action::Kill(target) => kill(state, player, target, ctx),

        Action::SabotageMenu => {
            if ctx.sabotage.is_some() {
                return TransitionResult::reject(state, player, "A sabotage is already active.");
            }
            TransitionResult::new(
                state,
                vec![Effect::send_with(player, "💥 Choose a sabotage:", menus::sabotage_menu())],
            )
        }

        Action::Sabotage(kind) => {
            if ctx.sabotage.is_some() {
                return TransitionResult::reject(state, player, "A sabotage is already active.");
            }
            TransitionResult::new(
                state,
                vec![Effect::InitiateSabotage {
                    kind,
                    initiator: player,
                }],
            )
        }

        Action::FixSabotage => {
            if !alive {
                return TransitionResult::reject(state, player, "Ghosts can't fix sabotage.");
            }
            if ctx.sabotage.is_none() {
                return TransitionResult::reject(state, player, "There is nothing to fix right now.");
            }
            TransitionResult::new(state, vec![Effect::AttemptSabotageFix { player }])
        }

        Action::Vote(_) => {
            TransitionResult::reject(state, player, "Voting only happens during meetings.")
        }

        Action::Ready | Action::OpenSettings | Action::AdjustSetting { .. } | Action::CloseSettings => {
            TransitionResult::reject(state, player, "The game is already in progress.")
        }

        Action::Unknown(_) => TransitionResult::reject(state, player, "Unknown action."),
    }
}

fn kill(state: GameState, killer: PlayerId, target: PlayerId, ctx: &mut SessionContext) -> TransitionResult {
    let now = ctx.now;
    let Some(actor) = ctx.player(killer) else {
        return TransitionResult::no_change(state);
    };
    if let Some(secs) = actor.kill_cooldown_remaining(now) {
        return TransitionResult::reject(state, killer, &format!("Kill is on cooldown for {}s.", secs));
    }
    let cooldown = actor.kill_cooldown_secs;
    let valid_target = target != killer
        && ctx
            .player(target)
            .is_some_and(|p| p.alive && !p.is_saboteur());
    if !valid_target {
        return TransitionResult::reject(state, killer, "That player can't be killed.");
    }

    if let Some(p) = ctx.player_mut(killer) {
        p.last_kill_at = Some(now);
    }
    let mut effects = become_ghost(target, ctx);
    effects.push(Effect::send(
        killer,
        format!(
            "🔪 {} has been eliminated. Next kill in {}s.",
            ctx.name_of(target),
            cooldown
        ),
    ));
    TransitionResult::new(state, effects)
}

/// Marks a player dead and moves them to the ghost channel.
fn become_ghost(player: PlayerId, ctx: &mut SessionContext) -> Vec<Effect> {
    let Some(p) = ctx.player_mut(player) else {
        return vec![];
    };
    p.kill();
    let name = p.name.clone();

    let Some(ghost) = ctx.player(player) else {
        return vec![];
    };
    let mut effects = vec![
        Effect::send_with(
            player,
            "💀 You are dead. You can still do your tasks and chat with other ghosts, \
             but you can't vote or report.",
            menus::controls(ghost, ctx),
        ),
        Effect::log(LogLevel::Info, format!("Lobby {}: {} died", ctx.code, name)),
    ];
    for id in ctx.ghost_ids().into_iter().filter(|id| *id != player) {
        effects.push(Effect::send(id, format!("👻 {} has joined the ghosts.", name)));
    }
    effects
}

fn start_meeting(trigger: MeetingTrigger, ctx: &mut SessionContext) -> TransitionResult {
    let durations = MeetingDurations::from_settings(&ctx.settings);
    let voters = ctx.living_ids();
    ctx.meeting = Some(Meeting::start(trigger, durations, voters, ctx.now));
    TransitionResult::new(
        GameState::Discussion {
            phase: MeetingPhase::Talking,
        },
        vec![Effect::log(
            LogLevel::Info,
            format!("Lobby {}: meeting started ({:?})", ctx.code, trigger),
        )],
    )
}

fn submit_photo(state: GameState, player: PlayerId, proof: String, ctx: &mut SessionContext) -> TransitionResult {
    let Some(p) = ctx.player(player) else {
        return TransitionResult::no_change(state);
    };
    if ctx.sabotage.as_ref().is_some_and(|s| s.kind.blocks_task_submission()) {
        return TransitionResult::reject(
            state,
            player,
            "The lights are out! Photos can't be submitted until they're fixed.",
        );
    }
    let counted = p.is_crewmate();
    let now = ctx.now;

    let Some(p) = ctx.player_mut(player) else {
        return TransitionResult::no_change(state);
    };
    let Some(task) = p.complete_next_task(Some(proof), now) else {
        return TransitionResult::reject(state, player, "All your tasks are already done.");
    };
    let title = task.title.clone();
    let left = p.tasks.iter().filter(|t| !t.completed).count();

    let mut effects = vec![Effect::send(
        player,
        format!("✅ Task done: {}. {} left.", title, left),
    )];
    if !counted {
        return TransitionResult::new(state, effects);
    }

    ctx.tasks.record_completion();
    effects.extend(ctx.broadcast(&format!(
        "📊 Task progress: {}%",
        ctx.tasks.completion_percentage()
    )));
    if ctx.tasks.all_completed() {
        return TransitionResult::new(
            GameState::Ended {
                winner: Team::Crewmates,
            },
            effects,
        );
    }
    TransitionResult::new(state, effects)
}

/// Ends the round if the active critical sabotage has run out of time.
/// Shared with meetings, where the countdown keeps running.
pub(super) fn expired_sabotage(ctx: &SessionContext) -> Option<TransitionResult> {
    let timeout = ctx.rules.critical_sabotage_timeout;
    let expired = ctx.sabotage.as_ref().filter(|s| s.is_timed_out(ctx.now, timeout))?;
    Some(TransitionResult::new(
        GameState::Ended {
            winner: Team::Saboteurs,
        },
        vec![Effect::log(
            LogLevel::Info,
            format!("Lobby {}: {} expired", ctx.code, expired.kind),
        )],
    ))
}

/// Handles a timeout reported by the sabotage engine. Only a critical
/// sabotage started in this round, and not superseded by another one, ends
/// the round.
pub(super) fn sabotage_timed_out(state: GameState, expired: &Sabotage, ctx: &SessionContext) -> TransitionResult {
    let this_round = ctx
        .round_started_at
        .is_some_and(|started| expired.started_at >= started);
    let superseded = ctx
        .sabotage
        .as_ref()
        .is_some_and(|active| active.kind != expired.kind || active.started_at != expired.started_at);
    if !expired.kind.is_critical() || !this_round || superseded {
        return TransitionResult::new(
            state,
            vec![Effect::log(
                LogLevel::Debug,
                format!("Lobby {}: ignoring stale {} timeout", ctx.code, expired.kind),
            )],
        );
    }
    TransitionResult::new(
        GameState::Ended {
            winner: Team::Saboteurs,
        },
        vec![Effect::log(
            LogLevel::Info,
            format!("Lobby {}: {} was not fixed in time", ctx.code, expired.kind),
        )],
    )
}

fn check_round_over(state: GameState, ctx: &SessionContext) -> TransitionResult {
    if let Some(result) = expired_sabotage(ctx) {
        return result;
    }
    match win::evaluate(&ctx.players, &ctx.tasks) {
        Some(winner) => TransitionResult::new(
            GameState::Ended { winner },
            vec![Effect::log(
                LogLevel::Info,
                format!("Lobby {}: {} win", ctx.code, winner),
            )],
        ),
        None => TransitionResult::no_change(state),
    }
}

pub fn on_enter(previous: &GameState, ctx: &mut SessionContext) -> Vec<Effect> {
    match previous {
        GameState::Lobby => start_round(ctx),
        _ => resume_round(ctx),
    }
}

fn start_round(ctx: &mut SessionContext) -> Vec<Effect> {
    ctx.tasks.reset();
    ctx.meeting = None;
    ctx.round_started_at = Some(ctx.now);

    let requested = ctx.settings.saboteur_count();
    let assignment = match assign_roles(&mut ctx.players, requested, &ctx.rules, &mut ctx.rng) {
        Ok(assignment) => assignment,
        Err(e) => {
            return vec![Effect::log(
                LogLevel::Error,
                format!("Lobby {}: role assignment failed: {}", ctx.code, e),
            )]
        }
    };

    let count = ctx.settings.tasks_per_player() as usize;
    let cooldown = ctx.settings.kill_cooldown_secs();
    for player in ctx.players.iter_mut() {
        let role = player.role.unwrap_or(Role::Crewmate);
        player.kill_cooldown_secs = cooldown;
        player.tasks = ctx.tasks.assign(role, count, &mut ctx.rng);
    }

    let mut effects = vec![Effect::log(
        LogLevel::Info,
        format!(
            "Lobby {}: round started with {} players, {} saboteurs",
            ctx.code,
            ctx.players.len(),
            assignment.saboteurs.len()
        ),
    )];
    effects.extend(ctx.broadcast(&format!(
        "🎮 The game has started! Your role is below and disappears in {} seconds.",
        ctx.role_reveal_ttl.as_secs()
    )));
    for player in &ctx.players {
        effects.push(Effect::SendEphemeral {
            player: player.id,
            text: menus::role_reveal(player, ctx),
            ttl: ctx.role_reveal_ttl,
        });
        effects.push(Effect::send(player.id, menus::task_list(player, ctx)));
        effects.push(Effect::send_with(
            player.id,
            "🎛 Your controls:",
            menus::controls(player, ctx),
        ));
    }
    effects
}

fn resume_round(ctx: &SessionContext) -> Vec<Effect> {
    let mut effects = ctx.broadcast("▶️ The meeting is over. Back to work!");
    for player in ctx.players.iter().filter(|p| p.alive) {
        effects.push(Effect::send_with(
            player.id,
            "🎛 Your controls:",
            menus::controls(player, ctx),
        ));
    }
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::transition::fixtures::*;
    use chrono::Duration;
    use saboteur_core::{Sabotage, SabotageKind};

    fn press(player: u64, action: Action) -> Event {
        Event::ButtonPressed {
            player: PlayerId(player),
            action,
            message: None,
        }
    }

    fn photo(player: u64) -> Event {
        Event::PhotoSubmitted {
            player: PlayerId(player),
            proof: format!("photo-{}", player),
        }
    }

    #[test]
    fn test_living_player_report_starts_meeting() {
        let mut ctx = round(5, &[5], 2);
        let result = handle(GameState::Running, press(1, Action::ReportBody), &mut ctx);

        assert_eq!(
            result.state,
            GameState::Discussion {
                phase: MeetingPhase::Talking
            }
        );
        let meeting = ctx.meeting.as_ref().unwrap();
        assert_eq!(
            meeting.trigger,
            MeetingTrigger::BodyReported {
                reporter: PlayerId(1)
            }
        );
        assert_eq!(meeting.discussion_ends_at, t0() + Duration::seconds(45));
    }

    #[test]
    fn test_dead_player_cannot_report() {
        let mut ctx = round(5, &[5], 2);
        ctx.player_mut(PlayerId(1)).unwrap().alive = false;
        let result = handle(GameState::Running, press(1, Action::ReportBody), &mut ctx);

        assert_eq!(result.state, GameState::Running);
        assert!(ctx.meeting.is_none());
        assert!(texts_for(&result.effects, PlayerId(1))[0].contains("Ghosts can't report"));
    }

    #[test]
    fn test_meeting_freezes_living_voters() {
        let mut ctx = round(5, &[5], 2);
        ctx.player_mut(PlayerId(2)).unwrap().alive = false;
        handle(GameState::Running, press(1, Action::ReportBody), &mut ctx);

        let votes = &ctx.meeting.as_ref().unwrap().votes;
        assert!(votes.is_eligible(PlayerId(1)));
        assert!(!votes.is_eligible(PlayerId(2)));
    }

    #[test]
    fn test_emergency_meetings_are_limited() {
        let mut ctx = round(5, &[5], 2);
        let first = handle(GameState::Running, press(1, Action::EmergencyMeeting), &mut ctx);
        assert!(matches!(first.state, GameState::Discussion { .. }));

        ctx.meeting = None;
        let second = handle(GameState::Running, press(1, Action::EmergencyMeeting), &mut ctx);
        assert_eq!(second.state, GameState::Running);
        assert!(texts_for(&second.effects, PlayerId(1))[0].contains("no emergency meetings left"));
    }

    #[test]
    fn test_self_reported_death_needs_confirmation() {
        let mut ctx = round(5, &[5], 2);
        let ask = handle(GameState::Running, press(2, Action::ReportOwnDeath), &mut ctx);
        assert!(ctx.is_alive(PlayerId(2)));
        assert!(matches!(
            &ask.effects[0],
            Effect::Send { keyboard: Some(k), .. } if k.actions().any(|a| a == "killed_confirm")
        ));

        handle(GameState::Running, press(2, Action::ConfirmOwnDeath), &mut ctx);
        assert!(!ctx.is_alive(PlayerId(2)));
    }

    #[test]
    fn test_ghost_chat_reaches_only_ghosts() {
        let mut ctx = round(5, &[5], 2);
        ctx.player_mut(PlayerId(2)).unwrap().alive = false;
        ctx.player_mut(PlayerId(3)).unwrap().alive = false;

        let result = handle(
            GameState::Running,
            Event::ChatMessage {
                player: PlayerId(2),
                text: "boo".into(),
            },
            &mut ctx,
        );
        assert_eq!(texts_for(&result.effects, PlayerId(3)), vec!["👻 p2: boo"]);
        assert!(texts_for(&result.effects, PlayerId(1)).is_empty());
        assert!(texts_for(&result.effects, PlayerId(2)).is_empty());
    }

    #[test]
    fn test_crew_wins_when_all_tasks_done() {
        let mut ctx = round(5, &[5], 0);
        let tasks = ctx.tasks.assign(Role::Crewmate, 5, &mut ctx.rng);
        ctx.player_mut(PlayerId(1)).unwrap().tasks = tasks;
        assert_eq!(ctx.tasks.assigned(), 5);

        let mut state = GameState::Running;
        for _ in 0..4 {
            state = handle(state, photo(1), &mut ctx).state;
            assert_eq!(state, GameState::Running);
        }
        let result = handle(state, photo(1), &mut ctx);
        assert_eq!(ctx.tasks.completed(), 5);
        assert_eq!(
            result.state,
            GameState::Ended {
                winner: Team::Crewmates
            }
        );
        assert!(texts_for(&result.effects, PlayerId(3)).contains(&"📊 Task progress: 100%".to_string()));
    }

    #[test]
    fn test_saboteur_photos_are_not_counted() {
        let mut ctx = round(5, &[5], 2);
        let result = handle(GameState::Running, photo(5), &mut ctx);

        assert_eq!(ctx.tasks.completed(), 0);
        assert_eq!(ctx.player(PlayerId(5)).unwrap().completed_task_count(), 1);
        assert!(texts_for(&result.effects, PlayerId(1)).is_empty());
    }

    #[test]
    fn test_lights_block_photos() {
        let mut ctx = round(5, &[5], 2);
        ctx.sabotage = Some(Sabotage::new(SabotageKind::Lights, PlayerId(5), t0()));
        let result = handle(GameState::Running, photo(1), &mut ctx);

        assert_eq!(ctx.player(PlayerId(1)).unwrap().completed_task_count(), 0);
        assert!(texts_for(&result.effects, PlayerId(1))[0].contains("lights are out"));
    }

    #[test]
    fn test_comms_block_task_list() {
        let mut ctx = round(5, &[5], 2);
        ctx.sabotage = Some(Sabotage::new(SabotageKind::Communications, PlayerId(5), t0()));
        let result = handle(GameState::Running, press(1, Action::ViewTasks), &mut ctx);
        assert!(texts_for(&result.effects, PlayerId(1))[0].contains("Communications are down"));
    }

    #[test]
    fn test_task_list_shows_progress() {
        let mut ctx = round(5, &[5], 2);
        handle(GameState::Running, photo(1), &mut ctx);

        let crew = handle(GameState::Running, press(1, Action::ViewTasks), &mut ctx);
        let text = &texts_for(&crew.effects, PlayerId(1))[0];
        assert!(text.contains("Your progress: 50%"));
        // One of eight crew tasks done.
        assert!(text.contains("Team progress: 12%"));

        let saboteur = handle(GameState::Running, press(5, Action::ViewTasks), &mut ctx);
        let text = &texts_for(&saboteur.effects, PlayerId(5))[0];
        assert!(text.contains("Your progress: 0%"));
        assert!(!text.contains("Team progress"));
    }

    #[test]
    fn test_kill_respects_cooldown_and_targets() {
        let mut ctx = round(5, &[5], 2);

        let crew_try = handle(GameState::Running, press(1, Action::Kill(PlayerId(2))), &mut ctx);
        assert!(ctx.is_alive(PlayerId(2)));
        assert!(texts_for(&crew_try.effects, PlayerId(1))[0].contains("can't do that"));

        handle(GameState::Running, press(5, Action::Kill(PlayerId(2))), &mut ctx);
        assert!(!ctx.is_alive(PlayerId(2)));

        ctx.now = t0() + Duration::seconds(10);
        let too_soon = handle(GameState::Running, press(5, Action::Kill(PlayerId(3))), &mut ctx);
        assert!(ctx.is_alive(PlayerId(3)));
        assert!(texts_for(&too_soon.effects, PlayerId(5))[0].contains("cooldown for 20s"));

        ctx.now = t0() + Duration::seconds(30);
        handle(GameState::Running, press(5, Action::Kill(PlayerId(3))), &mut ctx);
        assert!(!ctx.is_alive(PlayerId(3)));
    }

    #[test]
    fn test_sabotage_button_emits_effect() {
        let mut ctx = round(5, &[5], 2);
        let result = handle(
            GameState::Running,
            press(5, Action::Sabotage(SabotageKind::Reactor)),
            &mut ctx,
        );
        assert_eq!(
            result.effects,
            vec![Effect::InitiateSabotage {
                kind: SabotageKind::Reactor,
                initiator: PlayerId(5)
            }]
        );

        ctx.sabotage = Some(Sabotage::new(SabotageKind::Lights, PlayerId(5), t0()));
        let again = handle(
            GameState::Running,
            press(5, Action::Sabotage(SabotageKind::Oxygen)),
            &mut ctx,
        );
        assert!(texts_for(&again.effects, PlayerId(5))[0].contains("already active"));
    }

    #[test]
    fn test_fix_requires_active_sabotage() {
        let mut ctx = round(5, &[5], 2);
        let nothing = handle(GameState::Running, press(1, Action::FixSabotage), &mut ctx);
        assert!(texts_for(&nothing.effects, PlayerId(1))[0].contains("nothing to fix"));

        ctx.sabotage = Some(Sabotage::new(SabotageKind::Reactor, PlayerId(5), t0()));
        let fix = handle(GameState::Running, press(1, Action::FixSabotage), &mut ctx);
        assert_eq!(fix.effects, vec![Effect::AttemptSabotageFix { player: PlayerId(1) }]);
    }

    #[test]
    fn test_fix_progress_reaches_living_crew() {
        let mut ctx = round(5, &[5], 2);
        ctx.player_mut(PlayerId(4)).unwrap().alive = false;
        let result = handle(
            GameState::Running,
            Event::SabotageFixRecorded {
                player: PlayerId(1),
                outcome: FixOutcome::Progress {
                    kind: SabotageKind::Reactor,
                    fixers: 1,
                    required: 2,
                },
            },
            &mut ctx,
        );

        for id in [1, 2, 3, 5] {
            assert!(texts_for(&result.effects, PlayerId(id))[0].contains("p1 is working on"));
        }
        assert!(texts_for(&result.effects, PlayerId(4)).is_empty());
    }

    #[test]
    fn test_superseded_timeout_keeps_round_going() {
        let mut ctx = round(5, &[5], 2);
        ctx.sabotage = Some(Sabotage::new(
            SabotageKind::Oxygen,
            PlayerId(5),
            t0() + Duration::seconds(5),
        ));
        let stale = Sabotage::new(SabotageKind::Reactor, PlayerId(5), t0());

        let result = handle(GameState::Running, Event::SabotageTimedOut { sabotage: stale }, &mut ctx);
        assert_eq!(result.state, GameState::Running);
    }

    #[test]
    fn test_parity_ends_round_on_tick() {
        let mut ctx = round(4, &[4], 2);
        ctx.player_mut(PlayerId(1)).unwrap().alive = false;
        ctx.player_mut(PlayerId(2)).unwrap().alive = false;

        let result = handle(GameState::Running, Event::Tick, &mut ctx);
        assert_eq!(
            result.state,
            GameState::Ended {
                winner: Team::Saboteurs
            }
        );
    }

    #[test]
    fn test_expired_critical_sabotage_ends_round_on_tick() {
        let mut ctx = round(5, &[5], 2);
        ctx.sabotage = Some(Sabotage::new(SabotageKind::Oxygen, PlayerId(5), t0()));

        ctx.now = t0() + Duration::seconds(59);
        assert_eq!(handle(GameState::Running, Event::Tick, &mut ctx).state, GameState::Running);

        ctx.now = t0() + Duration::seconds(60);
        assert_eq!(
            handle(GameState::Running, Event::Tick, &mut ctx).state,
            GameState::Ended {
                winner: Team::Saboteurs
            }
        );
    }

    #[test]
    fn test_sabotage_timeout_event_ends_round() {
        let mut ctx = round(5, &[5], 2);
        let sabotage = Sabotage::new(SabotageKind::Reactor, PlayerId(5), t0());
        let result = handle(GameState::Running, Event::SabotageTimedOut { sabotage }, &mut ctx);
        assert_eq!(
            result.state,
            GameState::Ended {
                winner: Team::Saboteurs
            }
        );
    }

    #[test]
    fn test_start_round_assigns_roles_and_tasks() {
        let mut ctx = lobby(5);
        let effects = on_enter(&GameState::Lobby, &mut ctx);

        assert_eq!(ctx.players.iter().filter(|p| p.is_saboteur()).count(), 1);
        assert_eq!(ctx.round_started_at, Some(t0()));
        assert!(ctx.players.iter().all(|p| p.tasks.len() == 5));
        assert_eq!(ctx.tasks.assigned(), 20);
        assert_eq!(
            effects
                .iter()
                .filter(|e| matches!(e, Effect::SendEphemeral { .. }))
                .count(),
            5
        );
    }
}
