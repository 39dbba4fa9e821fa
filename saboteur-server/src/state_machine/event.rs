//! Events that trigger state transitions.
//!
//! Player input arrives through the store's entry points; timer ticks come
//! from the ticker; sabotage events are results of effects or of the
//! sabotage engine's timeout callback.

use saboteur_core::{PlayerId, Sabotage, SabotageKind};

use super::action::Action;
use crate::messenger::MessageRef;
use crate::sabotage_engine::FixOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // =========================================================================
    // Player Input
    // =========================================================================
    ChatMessage {
        player: PlayerId,
        text: String,
    },

    ButtonPressed {
        player: PlayerId,
        action: Action,
        /// The message the button was attached to, for in-place edits.
        message: Option<MessageRef>,
    },

    /// A photo proving a task was done. `proof` is an opaque file reference.
    PhotoSubmitted {
        player: PlayerId,
        proof: String,
    },

    /// Owner asked for another round after the game ended.
    NewRoundRequested {
        player: PlayerId,
    },

    // =========================================================================
    // Timer
    // =========================================================================
    Tick,

    // =========================================================================
    // Sabotage Results
    // =========================================================================
    SabotageStarted {
        sabotage: Sabotage,
    },

    SabotageRejected {
        initiator: PlayerId,
        kind: SabotageKind,
    },

    SabotageFixRecorded {
        player: PlayerId,
        outcome: FixOutcome,
    },

    /// A critical sabotage was not fixed in time.
    SabotageTimedOut {
        sabotage: Sabotage,
    },
}

impl Event {
    /// Returns a brief summary suitable for logging.
    pub fn log_summary(&self) -> String {
        match self {
            Event::ChatMessage { player, text } => {
                format!("ChatMessage {{ player: {}, len: {} }}", player, text.len())
            }
            Event::ButtonPressed { player, action, .. } => {
                format!("ButtonPressed {{ player: {}, action: {} }}", player, action)
            }
            Event::PhotoSubmitted { player, .. } => {
                format!("PhotoSubmitted {{ player: {} }}", player)
            }
            Event::NewRoundRequested { player } => {
                format!("NewRoundRequested {{ player: {} }}", player)
            }
            Event::Tick => "Tick".to_string(),
            Event::SabotageStarted { sabotage } => {
                format!("SabotageStarted {{ kind: {} }}", sabotage.kind)
            }
            Event::SabotageRejected { kind, .. } => {
                format!("SabotageRejected {{ kind: {} }}", kind)
            }
            Event::SabotageFixRecorded { player, .. } => {
                format!("SabotageFixRecorded {{ player: {} }}", player)
            }
            Event::SabotageTimedOut { sabotage } => {
                format!("SabotageTimedOut {{ kind: {} }}", sabotage.kind)
            }
        }
    }

    /// Whether this event came from a player rather than a timer or engine.
    pub fn is_player_input(&self) -> bool {
        matches!(
            self,
            Event::ChatMessage { .. }
                | Event::ButtonPressed { .. }
                | Event::PhotoSubmitted { .. }
                | Event::NewRoundRequested { .. }
        )
    }
}
