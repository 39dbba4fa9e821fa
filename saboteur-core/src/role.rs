//! Roles, teams and the abilities each role may use.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two sides of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Crewmates,
    Saboteurs,
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Crewmates => write!(f, "Crewmates"),
            Team::Saboteurs => write!(f, "Saboteurs"),
        }
    }
}

/// A player's secret role for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Crewmate,
    Saboteur,
}

/// Something a player can do from their control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    ViewTasks,
    ReportBody,
    EmergencyMeeting,
    ReportOwnDeath,
    Kill,
    Sabotage,
}

const CREWMATE_ABILITIES: &[Ability] = &[
    Ability::ViewTasks,
    Ability::ReportBody,
    Ability::EmergencyMeeting,
    Ability::ReportOwnDeath,
];

const SABOTEUR_ABILITIES: &[Ability] = &[
    Ability::ViewTasks,
    Ability::ReportBody,
    Ability::EmergencyMeeting,
    Ability::ReportOwnDeath,
    Ability::Kill,
    Ability::Sabotage,
];

impl Role {
    pub fn is_saboteur(self) -> bool {
        matches!(self, Role::Saboteur)
    }

    pub fn team(self) -> Team {
        match self {
            Role::Crewmate => Team::Crewmates,
            Role::Saboteur => Team::Saboteurs,
        }
    }

    /// Abilities available to a living player with this role.
    ///
    /// Saboteurs see the crew abilities too so their panel looks the same
    /// from across the room.
    pub fn abilities(self) -> &'static [Ability] {
        match self {
            Role::Crewmate => CREWMATE_ABILITIES,
            Role::Saboteur => SABOTEUR_ABILITIES,
        }
    }

    pub fn has_ability(self, ability: Ability) -> bool {
        self.abilities().contains(&ability)
    }

    /// Private message shown to the player when the round starts.
    pub fn reveal_message(self) -> &'static str {
        match self {
            Role::Crewmate => {
                "You are a CREWMATE.\nComplete your tasks and find the saboteurs. \
                 Report bodies and call meetings when something looks wrong."
            }
            Role::Saboteur => {
                "You are a SABOTEUR.\nEliminate the crew without getting caught. \
                 Use sabotage to split them up and pretend to do tasks."
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Crewmate => write!(f, "Crewmate"),
            Role::Saboteur => write!(f, "Saboteur"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saboteur_abilities_extend_crewmate_abilities() {
        for ability in Role::Crewmate.abilities() {
            assert!(Role::Saboteur.has_ability(*ability));
        }
        assert!(Role::Saboteur.has_ability(Ability::Kill));
        assert!(Role::Saboteur.has_ability(Ability::Sabotage));
        assert!(!Role::Crewmate.has_ability(Ability::Kill));
        assert!(!Role::Crewmate.has_ability(Ability::Sabotage));
    }

    #[test]
    fn test_role_team() {
        assert_eq!(Role::Crewmate.team(), Team::Crewmates);
        assert_eq!(Role::Saboteur.team(), Team::Saboteurs);
    }
}
