//! Vote bookkeeping for a single meeting.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::player::PlayerId;

/// What a ballot is cast for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VoteTarget {
    Player(PlayerId),
    Skip,
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteTarget::Player(id) => write!(f, "{}", id),
            VoteTarget::Skip => write!(f, "skip"),
        }
    }
}

/// Result of trying to cast a ballot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteCast {
    /// First ballot from this voter.
    Recorded,
    /// The voter changed their mind; the previous ballot is discarded.
    Replaced { previous: VoteTarget },
    /// The voter was not registered for this meeting.
    Ineligible,
}

/// How a meeting ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOutcome {
    Ejected(PlayerId),
    Skipped,
    Tie,
    NoVotes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingResults {
    pub counts: BTreeMap<VoteTarget, usize>,
    pub outcome: VoteOutcome,
    pub non_voters: Vec<PlayerId>,
}

impl VotingResults {
    pub fn ejected(&self) -> Option<PlayerId> {
        match self.outcome {
            VoteOutcome::Ejected(id) => Some(id),
            _ => None,
        }
    }

    pub fn votes_for(&self, target: VoteTarget) -> usize {
        self.counts.get(&target).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTracker {
    voters: BTreeSet<PlayerId>,
    votes: BTreeMap<PlayerId, VoteTarget>,
}

impl VoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker whose eligible voters are fixed to `voters`.
    pub fn with_voters(voters: impl IntoIterator<Item = PlayerId>) -> Self {
        Self {
            voters: voters.into_iter().collect(),
            votes: BTreeMap::new(),
        }
    }

    pub fn register_voter(&mut self, voter: PlayerId) {
        self.voters.insert(voter);
    }

    pub fn is_eligible(&self, voter: PlayerId) -> bool {
        self.voters.contains(&voter)
    }

    pub fn voters(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.voters.iter().copied()
    }

    /// Records a ballot. The most recent ballot per voter wins.
    pub fn cast(&mut self, voter: PlayerId, target: VoteTarget) -> VoteCast {
        if !self.is_eligible(voter) {
            return VoteCast::Ineligible;
        }
        match self.votes.insert(voter, target) {
            Some(previous) => VoteCast::Replaced { previous },
            None => VoteCast::Recorded,
        }
    }

    pub fn vote_of(&self, voter: PlayerId) -> Option<VoteTarget> {
        self.votes.get(&voter).copied()
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    pub fn has_everyone_voted(&self) -> bool {
        self.votes.len() >= self.voters.len()
    }

    pub fn non_voters(&self) -> Vec<PlayerId> {
        self.voters
            .iter()
            .filter(|v| !self.votes.contains_key(*v))
            .copied()
            .collect()
    }

    pub fn counts(&self) -> BTreeMap<VoteTarget, usize> {
        let mut counts = BTreeMap::new();
        for target in self.votes.values() {
            *counts.entry(*target).or_insert(0) += 1;
        }
        counts
    }

    /// Tallies the ballots.
    ///
    /// A player is ejected only when they alone hold the highest count. A
    /// tie for first place, or skip holding the highest count, ejects nobody.
    pub fn tally(&self) -> VotingResults {
        let counts = self.counts();
        let top = counts.values().copied().max().unwrap_or(0);
        let leaders: Vec<VoteTarget> = counts
            .iter()
            .filter(|(_, n)| **n == top)
            .map(|(t, _)| *t)
            .collect();

        let outcome = match leaders.as_slice() {
            [] => VoteOutcome::NoVotes,
            [VoteTarget::Player(id)] => VoteOutcome::Ejected(*id),
            [VoteTarget::Skip] => VoteOutcome::Skipped,
            _ => VoteOutcome::Tie,
        };

        VotingResults {
            counts,
            outcome,
            non_voters: self.non_voters(),
        }
    }

    pub fn clear(&mut self) {
        self.voters.clear();
        self.votes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: PlayerId = PlayerId(1);
    const B: PlayerId = PlayerId(2);
    const C: PlayerId = PlayerId(3);
    const X: PlayerId = PlayerId(10);
    const Y: PlayerId = PlayerId(11);

    #[test]
    fn test_unique_leader_is_ejected() {
        let mut tracker = VoteTracker::with_voters([A, B, C]);
        tracker.cast(A, VoteTarget::Player(X));
        tracker.cast(B, VoteTarget::Player(X));
        tracker.cast(C, VoteTarget::Skip);

        let results = tracker.tally();
        assert_eq!(results.outcome, VoteOutcome::Ejected(X));
        assert_eq!(results.votes_for(VoteTarget::Player(X)), 2);
        assert_eq!(results.votes_for(VoteTarget::Skip), 1);
    }

    #[test]
    fn test_tie_ejects_nobody() {
        let mut tracker = VoteTracker::with_voters([A, B]);
        tracker.cast(A, VoteTarget::Player(X));
        tracker.cast(B, VoteTarget::Player(Y));

        let results = tracker.tally();
        assert_eq!(results.outcome, VoteOutcome::Tie);
        assert_eq!(results.ejected(), None);
    }

    #[test]
    fn test_skip_majority_skips() {
        let mut tracker = VoteTracker::with_voters([A, B, C]);
        tracker.cast(A, VoteTarget::Skip);
        tracker.cast(B, VoteTarget::Skip);
        tracker.cast(C, VoteTarget::Player(X));
        assert_eq!(tracker.tally().outcome, VoteOutcome::Skipped);
    }

    #[test]
    fn test_skip_tied_with_player_ejects_nobody() {
        let mut tracker = VoteTracker::with_voters([A, B]);
        tracker.cast(A, VoteTarget::Skip);
        tracker.cast(B, VoteTarget::Player(X));
        assert_eq!(tracker.tally().outcome, VoteOutcome::Tie);
    }

    #[test]
    fn test_no_votes() {
        let tracker = VoteTracker::with_voters([A, B]);
        let results = tracker.tally();
        assert_eq!(results.outcome, VoteOutcome::NoVotes);
        assert_eq!(results.non_voters, vec![A, B]);
    }

    #[test]
    fn test_last_vote_wins() {
        let mut tracker = VoteTracker::with_voters([A, B]);
        assert_eq!(tracker.cast(A, VoteTarget::Player(X)), VoteCast::Recorded);
        assert_eq!(
            tracker.cast(A, VoteTarget::Player(Y)),
            VoteCast::Replaced {
                previous: VoteTarget::Player(X)
            }
        );
        assert_eq!(tracker.vote_of(A), Some(VoteTarget::Player(Y)));
        assert_eq!(tracker.vote_count(), 1);
        assert!(!tracker.has_everyone_voted());
        assert_eq!(tracker.non_voters(), vec![B]);
    }

    #[test]
    fn test_unregistered_voter_is_rejected() {
        let mut tracker = VoteTracker::with_voters([A]);
        assert_eq!(tracker.cast(B, VoteTarget::Skip), VoteCast::Ineligible);
        assert_eq!(tracker.vote_count(), 0);
    }

    #[test]
    fn test_everyone_voted() {
        let mut tracker = VoteTracker::with_voters([A, B]);
        tracker.cast(A, VoteTarget::Skip);
        tracker.cast(B, VoteTarget::Skip);
        assert!(tracker.has_everyone_voted());

        tracker.clear();
        assert_eq!(tracker.vote_count(), 0);
        assert!(!tracker.is_eligible(A));
    }
}
