//! Per-session settings the lobby owner can adjust.
//!
//! Every setter validates against a fixed range and silently ignores
//! out-of-range values, so a stray button press can never corrupt the
//! configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

pub const SABOTEUR_COUNT_RANGE: RangeInclusive<u32> = 1..=2;
pub const DISCUSSION_SECS_RANGE: RangeInclusive<u32> = 30..=120;
pub const VOTING_SECS_RANGE: RangeInclusive<u32> = 15..=60;
pub const KILL_COOLDOWN_SECS_RANGE: RangeInclusive<u32> = 10..=60;
pub const TASKS_PER_PLAYER_RANGE: RangeInclusive<u32> = 1..=8;

/// One adjustable setting, as addressed by the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingField {
    SaboteurCount,
    DiscussionSecs,
    VotingSecs,
    KillCooldownSecs,
    TasksPerPlayer,
}

impl SettingField {
    pub const ALL: [SettingField; 5] = [
        SettingField::SaboteurCount,
        SettingField::DiscussionSecs,
        SettingField::VotingSecs,
        SettingField::KillCooldownSecs,
        SettingField::TasksPerPlayer,
    ];

    /// Increment applied by a single plus/minus press.
    pub fn step(self) -> u32 {
        match self {
            SettingField::SaboteurCount => 1,
            SettingField::DiscussionSecs => 15,
            SettingField::VotingSecs => 15,
            SettingField::KillCooldownSecs => 5,
            SettingField::TasksPerPlayer => 1,
        }
    }

    pub fn range(self) -> RangeInclusive<u32> {
        match self {
            SettingField::SaboteurCount => SABOTEUR_COUNT_RANGE,
            SettingField::DiscussionSecs => DISCUSSION_SECS_RANGE,
            SettingField::VotingSecs => VOTING_SECS_RANGE,
            SettingField::KillCooldownSecs => KILL_COOLDOWN_SECS_RANGE,
            SettingField::TasksPerPlayer => TASKS_PER_PLAYER_RANGE,
        }
    }

    /// Short token used in button actions, e.g. `settings_voting_plus`.
    pub fn token(self) -> &'static str {
        match self {
            SettingField::SaboteurCount => "saboteurs",
            SettingField::DiscussionSecs => "discussion",
            SettingField::VotingSecs => "voting",
            SettingField::KillCooldownSecs => "cooldown",
            SettingField::TasksPerPlayer => "tasks",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.token() == token)
    }

    pub fn label(self) -> &'static str {
        match self {
            SettingField::SaboteurCount => "Saboteurs",
            SettingField::DiscussionSecs => "Discussion (s)",
            SettingField::VotingSecs => "Voting (s)",
            SettingField::KillCooldownSecs => "Kill cooldown (s)",
            SettingField::TasksPerPlayer => "Tasks per player",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    saboteur_count: u32,
    discussion_secs: u32,
    voting_secs: u32,
    kill_cooldown_secs: u32,
    tasks_per_player: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            saboteur_count: 1,
            discussion_secs: 45,
            voting_secs: 30,
            kill_cooldown_secs: 30,
            tasks_per_player: 5,
        }
    }
}

impl Settings {
    pub fn saboteur_count(&self) -> u32 {
        self.saboteur_count
    }

    pub fn discussion_secs(&self) -> u32 {
        self.discussion_secs
    }

    pub fn voting_secs(&self) -> u32 {
        self.voting_secs
    }

    pub fn kill_cooldown_secs(&self) -> u32 {
        self.kill_cooldown_secs
    }

    pub fn tasks_per_player(&self) -> u32 {
        self.tasks_per_player
    }

    pub fn get(&self, field: SettingField) -> u32 {
        match field {
            SettingField::SaboteurCount => self.saboteur_count,
            SettingField::DiscussionSecs => self.discussion_secs,
            SettingField::VotingSecs => self.voting_secs,
            SettingField::KillCooldownSecs => self.kill_cooldown_secs,
            SettingField::TasksPerPlayer => self.tasks_per_player,
        }
    }

    /// Sets a field, returning whether the value was accepted.
    pub fn set(&mut self, field: SettingField, value: u32) -> bool {
        if !field.range().contains(&value) {
            return false;
        }
        let slot = match field {
            SettingField::SaboteurCount => &mut self.saboteur_count,
            SettingField::DiscussionSecs => &mut self.discussion_secs,
            SettingField::VotingSecs => &mut self.voting_secs,
            SettingField::KillCooldownSecs => &mut self.kill_cooldown_secs,
            SettingField::TasksPerPlayer => &mut self.tasks_per_player,
        };
        *slot = value;
        true
    }

    pub fn set_saboteur_count(&mut self, value: u32) -> bool {
        self.set(SettingField::SaboteurCount, value)
    }

    pub fn set_discussion_secs(&mut self, value: u32) -> bool {
        self.set(SettingField::DiscussionSecs, value)
    }

    pub fn set_voting_secs(&mut self, value: u32) -> bool {
        self.set(SettingField::VotingSecs, value)
    }

    pub fn set_kill_cooldown_secs(&mut self, value: u32) -> bool {
        self.set(SettingField::KillCooldownSecs, value)
    }

    pub fn set_tasks_per_player(&mut self, value: u32) -> bool {
        self.set(SettingField::TasksPerPlayer, value)
    }

    /// Moves a field one step up or down. Out-of-range results are ignored.
    pub fn step(&mut self, field: SettingField, increase: bool) -> bool {
        let current = self.get(field);
        let next = if increase {
            current.checked_add(field.step())
        } else {
            current.checked_sub(field.step())
        };
        match next {
            Some(value) => self.set(field, value),
            None => false,
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Game settings:")?;
        for field in SettingField::ALL {
            writeln!(f, "  {}: {}", field.label(), self.get(field))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.saboteur_count(), 1);
        assert_eq!(settings.discussion_secs(), 45);
        assert_eq!(settings.voting_secs(), 30);
        assert_eq!(settings.kill_cooldown_secs(), 30);
        assert_eq!(settings.tasks_per_player(), 5);
    }

    #[test]
    fn test_out_of_range_values_are_ignored() {
        let mut settings = Settings::default();
        assert!(!settings.set_saboteur_count(3));
        assert!(!settings.set_discussion_secs(29));
        assert!(!settings.set_voting_secs(61));
        assert!(!settings.set_kill_cooldown_secs(0));
        assert!(!settings.set_tasks_per_player(9));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_range_boundaries_are_accepted() {
        let mut settings = Settings::default();
        assert!(settings.set_saboteur_count(2));
        assert!(settings.set_discussion_secs(120));
        assert!(settings.set_voting_secs(15));
        assert!(settings.set_kill_cooldown_secs(60));
        assert!(settings.set_tasks_per_player(1));
        assert_eq!(settings.discussion_secs(), 120);
    }

    #[test]
    fn test_step_stops_at_bounds() {
        let mut settings = Settings::default();
        assert!(settings.step(SettingField::DiscussionSecs, false));
        assert_eq!(settings.discussion_secs(), 30);
        assert!(!settings.step(SettingField::DiscussionSecs, false));
        assert_eq!(settings.discussion_secs(), 30);

        assert!(!settings.step(SettingField::SaboteurCount, false));
        assert!(settings.step(SettingField::SaboteurCount, true));
        assert!(!settings.step(SettingField::SaboteurCount, true));
        assert_eq!(settings.saboteur_count(), 2);
    }

    #[test]
    fn test_field_tokens_round_trip() {
        for field in SettingField::ALL {
            assert_eq!(SettingField::from_token(field.token()), Some(field));
        }
        assert_eq!(SettingField::from_token("bogus"), None);
    }
}
