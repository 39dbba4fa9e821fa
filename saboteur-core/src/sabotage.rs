//! Sabotage kinds and the state of a single active sabotage.
//!
//! The lifecycle across a session (one at a time, timeouts) lives in the
//! server's sabotage engine; this module only knows what a sabotage is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::player::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SabotageKind {
    Lights,
    Communications,
    Reactor,
    Oxygen,
}

impl SabotageKind {
    pub const ALL: [SabotageKind; 4] = [
        SabotageKind::Lights,
        SabotageKind::Communications,
        SabotageKind::Reactor,
        SabotageKind::Oxygen,
    ];

    /// Critical sabotages end the game if left unfixed.
    pub fn is_critical(self) -> bool {
        matches!(self, SabotageKind::Reactor | SabotageKind::Oxygen)
    }

    pub fn name(self) -> &'static str {
        match self {
            SabotageKind::Lights => "Lights",
            SabotageKind::Communications => "Communications",
            SabotageKind::Reactor => "Reactor meltdown",
            SabotageKind::Oxygen => "Oxygen depletion",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SabotageKind::Lights => "The lights are out. Photos cannot be submitted.",
            SabotageKind::Communications => "Communications are down. Task lists are unavailable.",
            SabotageKind::Reactor => "The reactor is melting down!",
            SabotageKind::Oxygen => "The oxygen supply is failing!",
        }
    }

    /// Physical spots players go to when fixing this sabotage.
    pub fn fix_locations(self) -> &'static [&'static str] {
        match self {
            SabotageKind::Lights => &["Electrical panel"],
            SabotageKind::Communications => &["Comms station"],
            SabotageKind::Reactor => &["Reactor, left panel", "Reactor, right panel"],
            SabotageKind::Oxygen => &["House oxygen tank", "Garden oxygen tank"],
        }
    }

    /// Token used in button actions, e.g. `sabotage_reactor`.
    pub fn token(self) -> &'static str {
        match self {
            SabotageKind::Lights => "lights",
            SabotageKind::Communications => "comms",
            SabotageKind::Reactor => "reactor",
            SabotageKind::Oxygen => "oxygen",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.token() == token)
    }

    /// Task lists are hidden while communications are down.
    pub fn blocks_task_list(self) -> bool {
        matches!(self, SabotageKind::Communications)
    }

    /// Photo proofs are rejected while the lights are out.
    pub fn blocks_task_submission(self) -> bool {
        matches!(self, SabotageKind::Lights)
    }
}

impl fmt::Display for SabotageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sabotage {
    pub kind: SabotageKind,
    pub initiator: PlayerId,
    pub started_at: DateTime<Utc>,
    pub fixed: bool,
    pub fixed_at: Option<DateTime<Utc>>,
    /// Distinct players who have worked on the fix.
    pub fixers: BTreeSet<PlayerId>,
}

impl Sabotage {
    pub fn new(kind: SabotageKind, initiator: PlayerId, now: DateTime<Utc>) -> Self {
        Self {
            kind,
            initiator,
            started_at: now,
            fixed: false,
            fixed_at: None,
            fixers: BTreeSet::new(),
        }
    }

    /// Records a fix contribution. Returns `true` once the sabotage is fixed.
    ///
    /// Repeated presses by the same player count once.
    pub fn record_fix(&mut self, player: PlayerId, quorum: usize, now: DateTime<Utc>) -> bool {
        if self.fixed {
            return true;
        }
        self.fixers.insert(player);
        if self.fixers.len() >= quorum {
            self.fixed = true;
            self.fixed_at = Some(now);
        }
        self.fixed
    }

    /// Time left before a critical sabotage ends the game.
    pub fn remaining(&self, now: DateTime<Utc>, timeout: Duration) -> Option<Duration> {
        if !self.kind.is_critical() || self.fixed {
            return None;
        }
        let elapsed = (now - self.started_at).to_std().unwrap_or(Duration::ZERO);
        Some(timeout.saturating_sub(elapsed))
    }

    pub fn is_timed_out(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.remaining(now, timeout) == Some(Duration::ZERO)
    }

    /// Broadcast text describing the sabotage and where to fix it.
    pub fn announcement(&self, now: DateTime<Utc>, timeout: Duration) -> String {
        let mut text = format!(
            "⚠️ SABOTAGE: {}\n{}\nFix at: {}",
            self.kind.name(),
            self.kind.description(),
            self.kind.fix_locations().join(", ")
        );
        if let Some(left) = self.remaining(now, timeout) {
            text.push_str(&format!("\n⏱ {} seconds left!", left.as_secs()));
        }
        text
    }
}
