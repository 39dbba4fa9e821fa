//! Server-wide game rules.
//!
//! Unlike [`Settings`](crate::settings::Settings), which the lobby owner
//! tweaks per session, these are fixed by the operator at startup.

use std::time::Duration;

/// Operator-level constants shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    /// Fewest players a round can start with.
    pub min_players: usize,
    /// Lobby capacity.
    pub max_players: usize,
    /// Lower bound used when the requested saboteur count is clamped.
    pub min_saboteurs: usize,
    pub emergency_meetings_per_player: u32,
    /// Distinct players needed to fix a sabotage.
    pub sabotage_fix_quorum: usize,
    /// Time the crew has to fix a critical sabotage.
    pub critical_sabotage_timeout: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 10,
            min_saboteurs: 1,
            emergency_meetings_per_player: 1,
            sabotage_fix_quorum: 2,
            critical_sabotage_timeout: Duration::from_secs(60),
        }
    }
}
