//! Session phases.
//!
//! Only the phase lives here. Round data (players, votes, timers) lives in
//! [`SessionContext`](super::context::SessionContext) so that a phase change
//! is a cheap value swap.

use saboteur_core::Team;
use serde::Serialize;
use std::fmt;
use std::mem::discriminant;

/// Sub-phase of a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MeetingPhase {
    /// Free discussion; ballots are not accepted yet.
    Talking,
    /// Ballots open.
    Voting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GameState {
    /// Waiting for players to join and ready up.
    Lobby,
    /// Round in progress.
    Running,
    /// Meeting after a body report or emergency call.
    Discussion { phase: MeetingPhase },
    /// Round over.
    Ended { winner: Team },
}

impl GameState {
    /// Whether two states are the same phase, ignoring their payload.
    ///
    /// Entry and exit hooks only run when this is false.
    pub fn same_phase(&self, other: &GameState) -> bool {
        discriminant(self) == discriminant(other)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GameState::Lobby => "lobby",
            GameState::Running => "running",
            GameState::Discussion { .. } => "discussion",
            GameState::Ended { .. } => "ended",
        }
    }

    pub fn accepts_new_players(&self) -> bool {
        matches!(self, GameState::Lobby)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::Discussion { phase } => write!(f, "discussion ({:?})", phase),
            GameState::Ended { winner } => write!(f, "ended ({} won)", winner),
            other => write!(f, "{}", other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_phase_ignores_payload() {
        let talking = GameState::Discussion {
            phase: MeetingPhase::Talking,
        };
        let voting = GameState::Discussion {
            phase: MeetingPhase::Voting,
        };
        assert!(talking.same_phase(&voting));
        assert!(!talking.same_phase(&GameState::Running));
        assert!(GameState::Ended {
            winner: Team::Crewmates
        }
        .same_phase(&GameState::Ended {
            winner: Team::Saboteurs
        }));
    }
}
