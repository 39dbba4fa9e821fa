//! Per-session data carried alongside the phase.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use saboteur_core::{GameRules, Player, PlayerId, Sabotage, Settings, TaskEngine, VoteTracker};

use super::effect::{broadcast, Effect};
use crate::ids::LobbyCode;

/// What started a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingTrigger {
    BodyReported { reporter: PlayerId },
    Emergency { caller: PlayerId },
}

impl MeetingTrigger {
    pub fn initiator(&self) -> PlayerId {
        match self {
            MeetingTrigger::BodyReported { reporter } => *reporter,
            MeetingTrigger::Emergency { caller } => *caller,
        }
    }
}

/// Phase lengths for one meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeetingDurations {
    pub discussion: Duration,
    pub voting: Duration,
}

impl MeetingDurations {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            discussion: Duration::seconds(i64::from(settings.discussion_secs())),
            voting: Duration::seconds(i64::from(settings.voting_secs())),
        }
    }
}

/// Bookkeeping for the meeting in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meeting {
    pub trigger: MeetingTrigger,
    pub durations: MeetingDurations,
    pub discussion_ends_at: DateTime<Utc>,
    /// Set when voting opens.
    pub voting_ends_at: Option<DateTime<Utc>>,
    /// Voters are the players alive when the meeting was called.
    pub votes: VoteTracker,
}

impl Meeting {
    pub fn start(
        trigger: MeetingTrigger,
        durations: MeetingDurations,
        voters: impl IntoIterator<Item = PlayerId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            trigger,
            durations,
            discussion_ends_at: now + durations.discussion,
            voting_ends_at: None,
            votes: VoteTracker::with_voters(voters),
        }
    }

    pub fn open_voting(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let ends_at = now + self.durations.voting;
        self.voting_ends_at = Some(ends_at);
        ends_at
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub code: LobbyCode,
    pub owner: PlayerId,
    /// In join order.
    pub players: Vec<Player>,
    pub settings: Settings,
    pub rules: GameRules,
    pub tasks: TaskEngine,
    pub meeting: Option<Meeting>,
    /// Snapshot of the engine's active sabotage, refreshed before each event.
    pub sabotage: Option<Sabotage>,
    /// When the current round's roles were dealt.
    pub round_started_at: Option<DateTime<Utc>>,
    /// Time the current event is processed at.
    pub now: DateTime<Utc>,
    pub role_reveal_ttl: std::time::Duration,
    pub rng: StdRng,
}

impl SessionContext {
    pub fn new(code: LobbyCode, owner: Player, rules: GameRules, rng: StdRng, now: DateTime<Utc>) -> Self {
        Self {
            code,
            owner: owner.id,
            players: vec![owner],
            settings: Settings::default(),
            rules,
            tasks: TaskEngine::new(),
            meeting: None,
            sabotage: None,
            round_started_at: None,
            now,
            role_reveal_ttl: std::time::Duration::from_secs(30),
            rng,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.player(id).is_some()
    }

    pub fn name_of(&self, id: PlayerId) -> String {
        self.player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("player {}", id))
    }

    pub fn is_owner(&self, id: PlayerId) -> bool {
        self.owner == id
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.player(id).is_some_and(|p| p.alive)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn living_ids(&self) -> Vec<PlayerId> {
        self.players.iter().filter(|p| p.alive).map(|p| p.id).collect()
    }

    pub fn ghost_ids(&self) -> Vec<PlayerId> {
        self.players.iter().filter(|p| !p.alive).map(|p| p.id).collect()
    }

    pub fn broadcast(&self, text: &str) -> Vec<Effect> {
        broadcast(self.ids(), text)
    }

    pub fn broadcast_except(&self, excluded: PlayerId, text: &str) -> Vec<Effect> {
        broadcast(self.ids().into_iter().filter(|id| *id != excluded), text)
    }

    pub fn broadcast_living(&self, text: &str) -> Vec<Effect> {
        broadcast(self.living_ids(), text)
    }

    pub fn broadcast_ghosts(&self, text: &str) -> Vec<Effect> {
        broadcast(self.ghost_ids(), text)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.rules.max_players
    }
}
