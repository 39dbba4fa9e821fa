//! Discussion state transitions.
//!
//! A meeting has two timed sub-phases. Talking runs for the discussion
//! window; voting opens on the first tick after it and closes when every
//! voter has voted or the voting window runs out.

use saboteur_core::{win, PlayerId, VoteCast, VoteTarget};

use super::{running, TransitionResult};
use crate::state_machine::action::Action;
use crate::state_machine::context::{MeetingTrigger, SessionContext};
use crate::state_machine::effect::{Effect, LogLevel};
use crate::state_machine::event::Event;
use crate::state_machine::menus;
use crate::state_machine::state::{GameState, MeetingPhase};

pub fn handle(state: GameState, event: Event, ctx: &mut SessionContext) -> TransitionResult {
    let phase = match &state {
        GameState::Discussion { phase } => *phase,
        _ => return TransitionResult::no_change(state),
    };

    match event {
        Event::ChatMessage { player, text } => meeting_chat(state, player, &text, ctx),

        Event::ButtonPressed {
            player,
            action: Action::Vote(target),
            ..
        } => cast_vote(state, phase, player, target, ctx),

        Event::ButtonPressed { player, .. } => {
            TransitionResult::reject(state, player, "A meeting is in progress. Discuss and vote!")
        }

        Event::PhotoSubmitted { player, .. } => {
            TransitionResult::reject(state, player, "Tasks are paused during meetings.")
        }

        Event::NewRoundRequested { player } => {
            TransitionResult::reject(state, player, "The round is still in progress.")
        }

        Event::Tick => tick(state, phase, ctx),

        // Critical sabotages keep counting down through meetings.
        Event::SabotageTimedOut { sabotage } => running::sabotage_timed_out(state, &sabotage, ctx),

        event @ (Event::SabotageStarted { .. }
        | Event::SabotageRejected { .. }
        | Event::SabotageFixRecorded { .. }) => running::sabotage_feedback(state, event, ctx),
    }
}

fn meeting_chat(state: GameState, player: PlayerId, text: &str, ctx: &SessionContext) -> TransitionResult {
    let Some(sender) = ctx.player(player) else {
        return TransitionResult::no_change(state);
    };
    if text.starts_with('/') {
        return TransitionResult::no_change(state);
    }
    let (line, recipients) = if sender.alive {
        (format!("🗣 {}: {}", sender.name, text), ctx.living_ids())
    } else {
        (format!("👻 {}: {}", sender.name, text), ctx.ghost_ids())
    };
    let effects = recipients
        .into_iter()
        .filter(|id| *id != player)
        .map(|id| Effect::send(id, line.clone()))
        .collect();
    TransitionResult::new(state, effects)
}

fn cast_vote(
    state: GameState,
    phase: MeetingPhase,
    voter: PlayerId,
    target: VoteTarget,
    ctx: &mut SessionContext,
) -> TransitionResult {
    if phase == MeetingPhase::Talking {
        return TransitionResult::reject(state, voter, "Voting hasn't opened yet.");
    }
    if let VoteTarget::Player(candidate) = target {
        if !ctx.is_alive(candidate) {
            return TransitionResult::reject(state, voter, "You can only vote for a living player.");
        }
    }
    let voter_name = ctx.name_of(voter);
    let target_name = match target {
        VoteTarget::Player(candidate) => ctx.name_of(candidate),
        VoteTarget::Skip => "skip".to_string(),
    };
    let Some(meeting) = ctx.meeting.as_mut() else {
        return TransitionResult::new(
            state,
            vec![Effect::log(LogLevel::Warn, "Vote cast with no meeting in progress")],
        );
    };

    let mut effects = match meeting.votes.cast(voter, target) {
        VoteCast::Ineligible => {
            return TransitionResult::reject(state, voter, "You can't vote in this meeting.");
        }
        VoteCast::Recorded => {
            let mut effects = vec![Effect::send(voter, format!("🗳 You voted: {}", target_name))];
            effects.extend(ctx.broadcast_except(voter, &format!("🗳 {} voted.", voter_name)));
            effects
        }
        VoteCast::Replaced { .. } => {
            vec![Effect::send(voter, format!("🗳 Vote changed to: {}", target_name))]
        }
    };

    let everyone_voted = ctx
        .meeting
        .as_ref()
        .is_some_and(|m| m.votes.has_everyone_voted());
    if everyone_voted {
        effects.extend(ctx.broadcast("Everyone has voted."));
        return close_voting(ctx, effects);
    }
    TransitionResult::new(state, effects)
}

fn tick(state: GameState, phase: MeetingPhase, ctx: &mut SessionContext) -> TransitionResult {
    if let Some(result) = running::expired_sabotage(ctx) {
        return result;
    }
    let now = ctx.now;
    let Some(meeting) = ctx.meeting.as_ref() else {
        return TransitionResult::new(
            GameState::Running,
            vec![Effect::log(
                LogLevel::Warn,
                format!("Lobby {}: meeting data missing, resuming round", ctx.code),
            )],
        );
    };

    match phase {
        MeetingPhase::Talking if now >= meeting.discussion_ends_at => open_voting(ctx),
        MeetingPhase::Voting if meeting.voting_ends_at.is_some_and(|ends| now >= ends) => {
            let effects = ctx.broadcast("⏰ Time's up!");
            close_voting(ctx, effects)
        }
        _ => TransitionResult::no_change(state),
    }
}

fn open_voting(ctx: &mut SessionContext) -> TransitionResult {
    let now = ctx.now;
    let Some(meeting) = ctx.meeting.as_mut() else {
        return TransitionResult::no_change(GameState::Running);
    };
    meeting.open_voting(now);
    let secs = meeting.durations.voting.num_seconds();
    let voters: Vec<PlayerId> = meeting.votes.voters().collect();

    let mut effects = Vec::new();
    for player in &ctx.players {
        if voters.contains(&player.id) {
            effects.push(Effect::send_with(
                player.id,
                format!("🗳 Voting is open! You have {} seconds.", secs),
                menus::vote_keyboard(player, ctx),
            ));
        } else {
            effects.push(Effect::send(player.id, "🗳 Voting is open."));
        }
    }
    TransitionResult::new(
        GameState::Discussion {
            phase: MeetingPhase::Voting,
        },
        effects,
    )
}

/// Tallies the ballots, applies the ejection and decides where the round goes.
fn close_voting(ctx: &mut SessionContext, mut effects: Vec<Effect>) -> TransitionResult {
    let Some(meeting) = ctx.meeting.take() else {
        return TransitionResult::new(GameState::Running, effects);
    };
    let results = meeting.votes.tally();
    effects.extend(ctx.broadcast(&menus::vote_results(&results, ctx)));
    effects.push(Effect::log(
        LogLevel::Info,
        format!("Lobby {}: vote closed with {:?}", ctx.code, results.outcome),
    ));

    if let Some(ejected) = results.ejected() {
        if let Some(player) = ctx.player_mut(ejected) {
            player.kill();
        }
    }

    let next = match win::evaluate(&ctx.players, &ctx.tasks) {
        Some(winner) => GameState::Ended { winner },
        None => GameState::Running,
    };
    TransitionResult::new(next, effects)
}

pub fn on_enter(ctx: &mut SessionContext) -> Vec<Effect> {
    let Some(meeting) = ctx.meeting.as_ref() else {
        return vec![Effect::log(
            LogLevel::Warn,
            format!("Lobby {}: entered discussion without a meeting", ctx.code),
        )];
    };
    let headline = match meeting.trigger {
        MeetingTrigger::BodyReported { reporter } => {
            format!("🚨 BODY REPORTED by {}!", ctx.name_of(reporter))
        }
        MeetingTrigger::Emergency { caller } => {
            format!("🔔 EMERGENCY MEETING called by {}!", ctx.name_of(caller))
        }
    };
    let text = format!(
        "{}\nDiscuss for {} seconds, then vote for {} seconds. Ghosts can listen but not vote.",
        headline,
        meeting.durations.discussion.num_seconds(),
        meeting.durations.voting.num_seconds()
    );
    ctx.broadcast(&text)
}

pub fn on_exit(ctx: &mut SessionContext) -> Vec<Effect> {
    ctx.meeting = None;
    vec![]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::context::{Meeting, MeetingDurations};
    use crate::state_machine::transition::fixtures::*;
    use chrono::Duration;
    use saboteur_core::{Sabotage, SabotageKind, Team};

    const TALKING: GameState = GameState::Discussion {
        phase: MeetingPhase::Talking,
    };
    const VOTING: GameState = GameState::Discussion {
        phase: MeetingPhase::Voting,
    };

    /// A 5-player round (p5 is the saboteur) with a meeting called by p1 at t0.
    fn meeting_ctx() -> SessionContext {
        let mut ctx = round(5, &[5], 2);
        ctx.meeting = Some(Meeting::start(
            MeetingTrigger::BodyReported {
                reporter: PlayerId(1),
            },
            MeetingDurations::from_settings(&ctx.settings),
            ctx.living_ids(),
            t0(),
        ));
        ctx
    }

    fn vote(voter: u64, target: VoteTarget) -> Event {
        Event::ButtonPressed {
            player: PlayerId(voter),
            action: Action::Vote(target),
            message: None,
        }
    }

    fn at(ctx: &mut SessionContext, secs: i64) {
        ctx.now = t0() + Duration::seconds(secs);
    }

    #[test]
    fn test_default_timeline() {
        let mut ctx = meeting_ctx();

        at(&mut ctx, 44);
        assert_eq!(handle(TALKING, Event::Tick, &mut ctx).state, TALKING);

        at(&mut ctx, 45);
        let opened = handle(TALKING, Event::Tick, &mut ctx);
        assert_eq!(opened.state, VOTING);
        assert!(texts_for(&opened.effects, PlayerId(1))[0].contains("30 seconds"));

        at(&mut ctx, 74);
        assert_eq!(handle(VOTING, Event::Tick, &mut ctx).state, VOTING);

        at(&mut ctx, 75);
        let closed = handle(VOTING, Event::Tick, &mut ctx);
        assert_eq!(closed.state, GameState::Running);
        assert!(ctx.meeting.is_none());
        assert!(texts_for(&closed.effects, PlayerId(2))
            .iter()
            .any(|t| t.contains("no votes")));
    }

    #[test]
    fn test_votes_rejected_while_talking() {
        let mut ctx = meeting_ctx();
        let result = handle(TALKING, vote(1, VoteTarget::Skip), &mut ctx);
        assert_eq!(result.state, TALKING);
        assert_eq!(ctx.meeting.as_ref().unwrap().votes.vote_count(), 0);
    }

    #[test]
    fn test_vote_target_must_be_alive() {
        let mut ctx = meeting_ctx();
        ctx.player_mut(PlayerId(4)).unwrap().alive = false;
        let result = handle(VOTING, vote(1, VoteTarget::Player(PlayerId(4))), &mut ctx);
        assert!(texts_for(&result.effects, PlayerId(1))[0].contains("living player"));
    }

    #[test]
    fn test_ghost_cannot_vote() {
        let mut ctx = round(5, &[5], 2);
        ctx.player_mut(PlayerId(2)).unwrap().alive = false;
        ctx.meeting = Some(Meeting::start(
            MeetingTrigger::Emergency {
                caller: PlayerId(1),
            },
            MeetingDurations::from_settings(&ctx.settings),
            ctx.living_ids(),
            t0(),
        ));
        let result = handle(VOTING, vote(2, VoteTarget::Skip), &mut ctx);
        assert!(texts_for(&result.effects, PlayerId(2))[0].contains("can't vote"));
    }

    #[test]
    fn test_vote_is_announced() {
        let mut ctx = meeting_ctx();
        let result = handle(VOTING, vote(1, VoteTarget::Player(PlayerId(5))), &mut ctx);
        assert_eq!(texts_for(&result.effects, PlayerId(1)), vec!["🗳 You voted: p5"]);
        assert_eq!(texts_for(&result.effects, PlayerId(3)), vec!["🗳 p1 voted."]);
    }

    #[test]
    fn test_everyone_voting_closes_early_and_ejects() {
        let mut ctx = meeting_ctx();
        let mut state = VOTING;
        for voter in 1..=4 {
            state = handle(state, vote(voter, VoteTarget::Player(PlayerId(5))), &mut ctx).state;
            assert_eq!(state, VOTING);
        }
        let result = handle(state, vote(5, VoteTarget::Player(PlayerId(1))), &mut ctx);

        assert!(!ctx.is_alive(PlayerId(5)));
        assert_eq!(
            result.state,
            GameState::Ended {
                winner: Team::Crewmates
            }
        );
        assert!(texts_for(&result.effects, PlayerId(2))
            .iter()
            .any(|t| t.contains("p5 was ejected. They were a Saboteur.")));
    }

    #[test]
    fn test_plurality_ejects_and_resumes_round() {
        let mut ctx = meeting_ctx();
        let mut state = VOTING;
        let ballots = [(1, 2), (2, 1), (3, 4), (4, 3), (5, 3)];
        for (voter, target) in ballots.iter().take(4) {
            state = handle(state, vote(*voter, VoteTarget::Player(PlayerId(*target))), &mut ctx).state;
        }
        // p3 has two votes, p1, p2 and p4 one each: p3 goes.
        let (voter, target) = ballots[4];
        let result = handle(state, vote(voter, VoteTarget::Player(PlayerId(target))), &mut ctx);
        assert!(!ctx.is_alive(PlayerId(3)));
        assert_eq!(result.state, GameState::Running);
    }

    #[test]
    fn test_even_split_ejects_nobody() {
        let mut ctx = meeting_ctx();
        ctx.meeting
            .as_mut()
            .unwrap()
            .open_voting(t0() + Duration::seconds(45));
        handle(VOTING, vote(1, VoteTarget::Player(PlayerId(2))), &mut ctx);
        handle(VOTING, vote(2, VoteTarget::Player(PlayerId(1))), &mut ctx);

        at(&mut ctx, 75);
        let result = handle(VOTING, Event::Tick, &mut ctx);
        assert_eq!(result.state, GameState::Running);
        assert!(ctx.players.iter().all(|p| p.alive));
        assert!(texts_for(&result.effects, PlayerId(3))
            .iter()
            .any(|t| t.contains("(tie)")));
    }

    #[test]
    fn test_critical_timeout_during_meeting_ends_round() {
        let mut ctx = meeting_ctx();
        let sabotage = Sabotage::new(SabotageKind::Reactor, PlayerId(5), t0());
        let result = handle(TALKING, Event::SabotageTimedOut { sabotage }, &mut ctx);
        assert_eq!(
            result.state,
            GameState::Ended {
                winner: Team::Saboteurs
            }
        );
    }

    #[test]
    fn test_tick_ends_meeting_when_critical_sabotage_runs_out() {
        let mut ctx = meeting_ctx();
        ctx.sabotage = Some(Sabotage::new(SabotageKind::Oxygen, PlayerId(5), t0()));

        ctx.now = t0() + Duration::seconds(30);
        assert_eq!(handle(TALKING, Event::Tick, &mut ctx).state, TALKING);

        ctx.now = t0() + Duration::seconds(60);
        assert_eq!(
            handle(TALKING, Event::Tick, &mut ctx).state,
            GameState::Ended {
                winner: Team::Saboteurs
            }
        );
    }

    #[test]
    fn test_timeout_from_an_earlier_round_is_ignored() {
        let mut ctx = meeting_ctx();
        ctx.round_started_at = Some(t0() + Duration::seconds(10));
        let sabotage = Sabotage::new(SabotageKind::Reactor, PlayerId(5), t0());

        let result = handle(TALKING, Event::SabotageTimedOut { sabotage }, &mut ctx);
        assert_eq!(result.state, TALKING);
    }

    #[test]
    fn test_living_chat_reaches_living_only() {
        let mut ctx = meeting_ctx();
        ctx.player_mut(PlayerId(4)).unwrap().alive = false;
        let result = handle(
            TALKING,
            Event::ChatMessage {
                player: PlayerId(1),
                text: "it was p5".into(),
            },
            &mut ctx,
        );
        assert_eq!(texts_for(&result.effects, PlayerId(2)), vec!["🗣 p1: it was p5"]);
        assert!(texts_for(&result.effects, PlayerId(4)).is_empty());
        assert!(texts_for(&result.effects, PlayerId(1)).is_empty());
    }

    #[test]
    fn test_on_enter_announces_reporter() {
        let mut ctx = meeting_ctx();
        let effects = on_enter(&mut ctx);
        assert!(texts_for(&effects, PlayerId(3))[0].starts_with("🚨 BODY REPORTED by p1!"));
    }
}
