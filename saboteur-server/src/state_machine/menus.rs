//! Message texts and button layouts shown to players.

use saboteur_core::{Ability, Player, Role, SabotageKind, SettingField, Settings, VoteOutcome, VoteTarget, VotingResults};

use super::action::Action;
use super::context::SessionContext;
use crate::messenger::{Button, Keyboard};

fn button(label: impl Into<String>, action: Action) -> Button {
    Button::new(label, action.to_string())
}

pub fn lobby_keyboard(player: &Player, is_owner: bool) -> Keyboard {
    let ready_label = if player.ready { "↩️ Not ready" } else { "✅ Ready" };
    let mut keyboard = Keyboard::new().row(vec![button(ready_label, Action::Ready)]);
    if is_owner {
        keyboard = keyboard.row(vec![button("⚙️ Settings", Action::OpenSettings)]);
    }
    keyboard
}

pub fn roster(ctx: &SessionContext) -> String {
    let mut text = format!(
        "👥 Lobby {} ({}/{} players)\n",
        ctx.code,
        ctx.players.len(),
        ctx.rules.max_players
    );
    for player in &ctx.players {
        let mark = if player.ready { "✅" } else { "⏳" };
        let crown = if ctx.is_owner(player.id) { " 👑" } else { "" };
        text.push_str(&format!("{} {}{}\n", mark, player.name, crown));
    }
    if ctx.players.len() < ctx.rules.min_players {
        text.push_str(&format!(
            "Need at least {} players to start.",
            ctx.rules.min_players
        ));
    } else {
        text.push_str("The game starts when everyone is ready.");
    }
    text
}

pub fn settings_panel(settings: &Settings) -> (String, Keyboard) {
    let mut keyboard = Keyboard::new();
    for field in SettingField::ALL {
        keyboard = keyboard.row(vec![
            button(
                format!("➖ {}", field.label()),
                Action::AdjustSetting {
                    field,
                    increase: false,
                },
            ),
            button(
                format!("➕ {}", field.label()),
                Action::AdjustSetting {
                    field,
                    increase: true,
                },
            ),
        ]);
    }
    keyboard = keyboard.row(vec![button("⬅️ Back", Action::CloseSettings)]);
    (settings.to_string(), keyboard)
}

fn ability_button(ability: Ability, player: &Player) -> Button {
    match ability {
        Ability::ViewTasks => button("📋 Tasks", Action::ViewTasks),
        Ability::ReportBody => button("🚨 Report body", Action::ReportBody),
        Ability::EmergencyMeeting => button(
            format!("🔔 Emergency meeting ({})", player.emergency_meetings_left),
            Action::EmergencyMeeting,
        ),
        Ability::ReportOwnDeath => button("💀 I was killed", Action::ReportOwnDeath),
        Ability::Kill => button("🔪 Kill", Action::KillMenu),
        Ability::Sabotage => button("💥 Sabotage", Action::SabotageMenu),
    }
}

/// Control panel for a player during the round.
///
/// Ghosts only keep their task list. A fix button is added while a sabotage
/// is active.
pub fn controls(player: &Player, ctx: &SessionContext) -> Keyboard {
    if !player.alive {
        return Keyboard::new().row(vec![button("📋 Tasks", Action::ViewTasks)]);
    }
    let role = player.role.unwrap_or(Role::Crewmate);
    let buttons: Vec<Button> = role
        .abilities()
        .iter()
        .map(|ability| ability_button(*ability, player))
        .collect();

    let mut keyboard = Keyboard::new();
    for pair in buttons.chunks(2) {
        keyboard = keyboard.row(pair.to_vec());
    }
    if ctx.sabotage.is_some() {
        keyboard = keyboard.row(vec![button("🔧 Fix sabotage", Action::FixSabotage)]);
    }
    keyboard
}

pub fn confirm_death() -> Keyboard {
    Keyboard::new().row(vec![button("☠️ Yes, I'm dead", Action::ConfirmOwnDeath)])
}

/// Living crewmates the saboteur can target.
pub fn kill_targets(killer: &Player, ctx: &SessionContext) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for target in ctx
        .players
        .iter()
        .filter(|p| p.alive && p.id != killer.id && !p.is_saboteur())
    {
        keyboard = keyboard.row(vec![button(format!("🔪 {}", target.name), Action::Kill(target.id))]);
    }
    keyboard
}

pub fn sabotage_menu() -> Keyboard {
    let mut keyboard = Keyboard::new();
    for kind in SabotageKind::ALL {
        let label = if kind.is_critical() {
            format!("☢️ {}", kind.name())
        } else {
            kind.name().to_string()
        };
        keyboard = keyboard.row(vec![button(label, Action::Sabotage(kind))]);
    }
    keyboard
}

/// Ballot for one voter: every other living player plus skip.
pub fn vote_keyboard(voter: &Player, ctx: &SessionContext) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for candidate in ctx.players.iter().filter(|p| p.alive && p.id != voter.id) {
        keyboard = keyboard.row(vec![button(
            candidate.name.clone(),
            Action::Vote(VoteTarget::Player(candidate.id)),
        )]);
    }
    keyboard.row(vec![button("⏭ Skip vote", Action::Vote(VoteTarget::Skip))])
}

/// A player's tasks with their own progress. Crewmates also see how far the
/// team has got.
pub fn task_list(player: &Player, ctx: &SessionContext) -> String {
    if player.tasks.is_empty() {
        return "You have no tasks.".to_string();
    }
    let mut text = String::from("📋 Your tasks:\n");
    for task in &player.tasks {
        text.push_str(&task.summary());
        text.push('\n');
    }
    let own = player.completed_task_count() * 100 / player.tasks.len();
    text.push_str(&format!("Your progress: {}%\n", own));
    if player.is_crewmate() {
        text.push_str(&format!(
            "Team progress: {}%\n",
            ctx.tasks.completion_percentage()
        ));
    }
    if player.is_saboteur() {
        text.push_str("(These are cover. Pretend to do them.)");
    } else {
        text.push_str("Send a photo to complete the next task.");
    }
    text
}

pub fn role_reveal(player: &Player, ctx: &SessionContext) -> String {
    let role = player.role.unwrap_or(Role::Crewmate);
    let mut text = role.reveal_message().to_string();
    if role.is_saboteur() {
        let partners: Vec<&str> = ctx
            .players
            .iter()
            .filter(|p| p.is_saboteur() && p.id != player.id)
            .map(|p| p.name.as_str())
            .collect();
        if !partners.is_empty() {
            text.push_str(&format!("\nYour partners: {}", partners.join(", ")));
        }
    }
    text.push_str("\n(This message disappears shortly.)");
    text
}

pub fn vote_results(results: &VotingResults, ctx: &SessionContext) -> String {
    let mut text = String::from("🗳 Voting results:\n");
    for (target, count) in &results.counts {
        let label = match target {
            VoteTarget::Player(id) => ctx.name_of(*id),
            VoteTarget::Skip => "Skip".to_string(),
        };
        text.push_str(&format!("  {}: {}\n", label, count));
    }
    if !results.non_voters.is_empty() {
        let names: Vec<String> = results.non_voters.iter().map(|id| ctx.name_of(*id)).collect();
        text.push_str(&format!("Did not vote: {}\n", names.join(", ")));
    }
    match results.outcome {
        VoteOutcome::Ejected(id) => {
            let verdict = match ctx.player(id).and_then(|p| p.role) {
                Some(Role::Saboteur) => "were a Saboteur",
                _ => "were not a Saboteur",
            };
            text.push_str(&format!("🚀 {} was ejected. They {}.", ctx.name_of(id), verdict));
        }
        VoteOutcome::Skipped => text.push_str("Nobody was ejected (skipped)."),
        VoteOutcome::Tie => text.push_str("Nobody was ejected (tie)."),
        VoteOutcome::NoVotes => text.push_str("Nobody was ejected (no votes)."),
    }
    text
}

pub fn final_roles(ctx: &SessionContext) -> String {
    let mut text = String::from("Roles this round:\n");
    for player in &ctx.players {
        let role = player
            .role
            .map(|r| r.to_string())
            .unwrap_or_else(|| "Spectator".to_string());
        let status = if player.alive { "survived" } else { "dead" };
        text.push_str(&format!("  {}: {} ({})\n", player.name, role, status));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::LobbyCode;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use saboteur_core::{GameRules, PlayerId, Sabotage};

    fn ctx_with(roles: &[Role]) -> SessionContext {
        let mut players: Vec<Player> = roles
            .iter()
            .enumerate()
            .map(|(i, role)| {
                let mut p = Player::new(PlayerId(i as u64 + 1), format!("p{}", i + 1));
                p.assign_role(*role, 1);
                p
            })
            .collect();
        let owner = players.remove(0);
        let mut ctx = SessionContext::new(
            LobbyCode::from("ABCDE"),
            owner,
            GameRules::default(),
            StdRng::seed_from_u64(0),
            Utc::now(),
        );
        ctx.players.extend(players);
        ctx
    }

    #[test]
    fn test_crewmate_controls_have_no_kill() {
        let ctx = ctx_with(&[Role::Crewmate, Role::Saboteur]);
        let actions: Vec<String> = controls(&ctx.players[0], &ctx)
            .actions()
            .map(str::to_string)
            .collect();
        assert!(actions.contains(&"report_body".to_string()));
        assert!(actions.contains(&"killed".to_string()));
        assert!(!actions.contains(&"kill".to_string()));
        assert!(!actions.contains(&"fix_sabotage".to_string()));

        let saboteur: Vec<String> = controls(&ctx.players[1], &ctx)
            .actions()
            .map(str::to_string)
            .collect();
        assert!(saboteur.contains(&"kill".to_string()));
        assert!(saboteur.contains(&"sabotage".to_string()));
    }

    #[test]
    fn test_fix_button_appears_during_sabotage() {
        let mut ctx = ctx_with(&[Role::Crewmate, Role::Saboteur]);
        ctx.sabotage = Some(Sabotage::new(SabotageKind::Lights, PlayerId(2), Utc::now()));
        assert!(controls(&ctx.players[0], &ctx)
            .actions()
            .any(|a| a == "fix_sabotage"));
    }

    #[test]
    fn test_kill_targets_exclude_saboteurs_and_dead() {
        let mut ctx = ctx_with(&[Role::Saboteur, Role::Saboteur, Role::Crewmate, Role::Crewmate]);
        ctx.players[3].alive = false;
        let keyboard = kill_targets(&ctx.players[0], &ctx);
        assert_eq!(keyboard.actions().collect::<Vec<_>>(), vec!["kill_3"]);
    }

    #[test]
    fn test_roster_marks_owner() {
        let ctx = ctx_with(&[Role::Crewmate, Role::Crewmate]);
        let text = roster(&ctx);
        assert!(text.contains("p1 👑"));
        assert!(text.contains("Need at least 4 players"));
    }
}
