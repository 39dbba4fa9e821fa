//! Win condition evaluation.

use crate::player::Player;
use crate::role::Team;
use crate::task::TaskEngine;

/// Living player counts by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Headcount {
    pub crewmates: usize,
    pub saboteurs: usize,
}

impl Headcount {
    pub fn of(players: &[Player]) -> Self {
        let living = players.iter().filter(|p| p.alive);
        let (mut crewmates, mut saboteurs) = (0, 0);
        for player in living {
            if player.is_saboteur() {
                saboteurs += 1;
            } else if player.is_crewmate() {
                crewmates += 1;
            }
        }
        Self {
            crewmates,
            saboteurs,
        }
    }
}

/// Decides whether the round is over.
///
/// Checked in order: all counted tasks done, no saboteurs left, saboteurs
/// matching or outnumbering the living crew.
pub fn evaluate(players: &[Player], tasks: &TaskEngine) -> Option<Team> {
    if tasks.all_completed() {
        return Some(Team::Crewmates);
    }
    let headcount = Headcount::of(players);
    if headcount.saboteurs == 0 {
        return Some(Team::Crewmates);
    }
    if headcount.saboteurs >= headcount.crewmates {
        return Some(Team::Saboteurs);
    }
    None
}
