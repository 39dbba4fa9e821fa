//! Secret role assignment at the start of a round.

use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use crate::player::{Player, PlayerId};
use crate::role::Role;
use crate::rules::GameRules;
use crate::settings::SABOTEUR_COUNT_RANGE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleAssignmentError {
    #[error("not enough players: have {have}, need at least {need}")]
    NotEnoughPlayers { have: usize, need: usize },
    #[error("invalid saboteur count {0}")]
    InvalidSaboteurCount(u32),
}

/// Who ended up on which side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub saboteurs: Vec<PlayerId>,
    pub crewmates: Vec<PlayerId>,
}

/// Number of saboteurs a round with `players` players will actually get.
///
/// The requested count is capped at a third of the table (never below the
/// configured minimum), so small games stay winnable for the crew.
pub fn effective_saboteur_count(
    players: usize,
    requested: u32,
    rules: &GameRules,
) -> Result<usize, RoleAssignmentError> {
    if players < rules.min_players {
        return Err(RoleAssignmentError::NotEnoughPlayers {
            have: players,
            need: rules.min_players,
        });
    }
    if !SABOTEUR_COUNT_RANGE.contains(&requested) {
        return Err(RoleAssignmentError::InvalidSaboteurCount(requested));
    }
    let cap = rules.min_saboteurs.max(players / 3);
    Ok((requested as usize).min(cap))
}

/// Shuffles the players and hands out roles.
pub fn assign_roles<R: Rng + ?Sized>(
    players: &mut [Player],
    requested: u32,
    rules: &GameRules,
    rng: &mut R,
) -> Result<RoleAssignment, RoleAssignmentError> {
    let saboteur_count = effective_saboteur_count(players.len(), requested, rules)?;

    let mut order: Vec<usize> = (0..players.len()).collect();
    order.shuffle(rng);

    let mut assignment = RoleAssignment {
        saboteurs: Vec::with_capacity(saboteur_count),
        crewmates: Vec::with_capacity(players.len() - saboteur_count),
    };
    for (position, index) in order.into_iter().enumerate() {
        let player = &mut players[index];
        if position < saboteur_count {
            player.assign_role(Role::Saboteur, rules.emergency_meetings_per_player);
            assignment.saboteurs.push(player.id);
        } else {
            player.assign_role(Role::Crewmate, rules.emergency_meetings_per_player);
            assignment.crewmates.push(player.id);
        }
    }
    Ok(assignment)
}
