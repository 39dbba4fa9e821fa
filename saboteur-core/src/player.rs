//! Players and their per-round state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::role::Role;
use crate::task::Task;

/// Newtype for player IDs, as handed to us by the chat platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// `None` until the first round starts.
    pub role: Option<Role>,
    pub alive: bool,
    pub ready: bool,
    pub tasks: Vec<Task>,
    pub emergency_meetings_left: u32,
    pub last_kill_at: Option<DateTime<Utc>>,
    pub kill_cooldown_secs: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            role: None,
            alive: true,
            ready: false,
            tasks: Vec::new(),
            emergency_meetings_left: 0,
            last_kill_at: None,
            kill_cooldown_secs: 0,
        }
    }

    pub fn is_saboteur(&self) -> bool {
        self.role.is_some_and(Role::is_saboteur)
    }

    pub fn is_crewmate(&self) -> bool {
        self.role == Some(Role::Crewmate)
    }

    /// Gives the player a fresh role for a new round, clearing everything
    /// left over from the previous one.
    pub fn assign_role(&mut self, role: Role, emergency_meetings: u32) {
        self.role = Some(role);
        self.alive = true;
        self.ready = false;
        self.tasks.clear();
        self.emergency_meetings_left = emergency_meetings;
        self.last_kill_at = None;
    }

    /// Back to a lobby member with no round state.
    pub fn reset_for_lobby(&mut self) {
        self.role = None;
        self.alive = true;
        self.ready = false;
        self.tasks.clear();
        self.emergency_meetings_left = 0;
        self.last_kill_at = None;
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }

    /// Marks the first incomplete task as done and returns it.
    pub fn complete_next_task(&mut self, proof: Option<String>, now: DateTime<Utc>) -> Option<&Task> {
        let task = self.tasks.iter_mut().find(|t| !t.completed)?;
        task.complete(proof, now);
        Some(task)
    }

    pub fn completed_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    /// Consumes an emergency meeting if one is left.
    pub fn use_emergency_meeting(&mut self) -> bool {
        if self.emergency_meetings_left == 0 {
            return false;
        }
        self.emergency_meetings_left -= 1;
        true
    }

    /// Seconds until this player may kill again, or `None` if ready now.
    pub fn kill_cooldown_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        let last = self.last_kill_at?;
        let ready_at = last + Duration::seconds(i64::from(self.kill_cooldown_secs));
        let remaining = (ready_at - now).num_seconds();
        if ready_at > now {
            Some(remaining.max(1))
        } else {
            None
        }
    }

    pub fn can_kill(&self, now: DateTime<Utc>) -> bool {
        self.alive && self.is_saboteur() && self.kill_cooldown_remaining(now).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskEngine, TaskKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_assign_role_resets_round_state() {
        let mut player = Player::new(PlayerId(1), "Ann");
        player.ready = true;
        player.alive = false;
        player.last_kill_at = Some(Utc::now());

        player.assign_role(Role::Saboteur, 1);

        assert!(player.is_saboteur());
        assert!(player.alive);
        assert!(!player.ready);
        assert_eq!(player.emergency_meetings_left, 1);
        assert!(player.last_kill_at.is_none());
    }

    #[test]
    fn test_complete_next_task_in_order() {
        let mut engine = TaskEngine::new();
        let mut rng = StdRng::seed_from_u64(2);
        let mut player = Player::new(PlayerId(1), "Ann");
        player.assign_role(Role::Crewmate, 1);
        player.tasks = engine.assign(Role::Crewmate, 3, &mut rng);
        let first = player.tasks[0].id;

        let done = player.complete_next_task(Some("photo-1".into()), Utc::now());
        assert_eq!(done.map(|t| t.id), Some(first));
        assert_eq!(player.completed_task_count(), 1);
        assert_eq!(player.tasks[0].proof.as_deref(), Some("photo-1"));
        assert_eq!(player.tasks[0].kind, TaskKind::Short);

        player.complete_next_task(None, Utc::now());
        player.complete_next_task(None, Utc::now());
        assert!(player.complete_next_task(None, Utc::now()).is_none());
    }

    #[test]
    fn test_emergency_meetings_are_limited() {
        let mut player = Player::new(PlayerId(1), "Ann");
        player.assign_role(Role::Crewmate, 1);
        assert!(player.use_emergency_meeting());
        assert!(!player.use_emergency_meeting());
    }

    #[test]
    fn test_kill_cooldown() {
        let now = Utc::now();
        let mut player = Player::new(PlayerId(1), "Ann");
        player.assign_role(Role::Saboteur, 1);
        player.kill_cooldown_secs = 30;
        assert!(player.can_kill(now));

        player.last_kill_at = Some(now);
        assert!(!player.can_kill(now + Duration::seconds(10)));
        assert_eq!(player.kill_cooldown_remaining(now + Duration::seconds(10)), Some(20));
        assert!(player.can_kill(now + Duration::seconds(30)));
    }

    #[test]
    fn test_crewmates_cannot_kill() {
        let mut player = Player::new(PlayerId(1), "Ann");
        player.assign_role(Role::Crewmate, 1);
        assert!(!player.can_kill(Utc::now()));
    }
}
