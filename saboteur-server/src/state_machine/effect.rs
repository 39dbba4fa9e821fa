//! Effects (side effects as data).
//!
//! Transitions describe what should happen; the interpreter makes it happen.

use saboteur_core::{PlayerId, SabotageKind};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::messenger::{Keyboard, MessageRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    // =========================================================================
    // Messaging Effects
    // =========================================================================
    /// Send a private message to one player.
    Send {
        player: PlayerId,
        text: String,
        keyboard: Option<Keyboard>,
    },

    /// Send a message that is deleted again after `ttl`.
    SendEphemeral {
        player: PlayerId,
        text: String,
        ttl: Duration,
    },

    /// Replace the text and buttons of a message we sent earlier.
    Edit {
        player: PlayerId,
        message: MessageRef,
        text: String,
        keyboard: Option<Keyboard>,
    },

    // =========================================================================
    // Sabotage Effects
    // =========================================================================
    /// Ask the sabotage engine to start a sabotage.
    InitiateSabotage {
        kind: SabotageKind,
        initiator: PlayerId,
    },

    /// Record a fix contribution.
    AttemptSabotageFix { player: PlayerId },

    /// Drop any active sabotage without running its timeout.
    CancelSabotage,

    // =========================================================================
    // Logging Effects
    // =========================================================================
    Log { level: LogLevel, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl Effect {
    pub fn send(player: PlayerId, text: impl Into<String>) -> Self {
        Effect::Send {
            player,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn send_with(player: PlayerId, text: impl Into<String>, keyboard: Keyboard) -> Self {
        Effect::Send {
            player,
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Effect::Log {
            level,
            message: message.into(),
        }
    }

    /// Recipient of a messaging effect.
    pub fn recipient(&self) -> Option<PlayerId> {
        match self {
            Effect::Send { player, .. }
            | Effect::SendEphemeral { player, .. }
            | Effect::Edit { player, .. } => Some(*player),
            _ => None,
        }
    }

    /// Text of a messaging effect.
    pub fn text(&self) -> Option<&str> {
        match self {
            Effect::Send { text, .. } | Effect::SendEphemeral { text, .. } | Effect::Edit { text, .. } => {
                Some(text)
            }
            _ => None,
        }
    }
}

/// One [`Effect::Send`] per recipient.
pub fn broadcast(recipients: impl IntoIterator<Item = PlayerId>, text: &str) -> Vec<Effect> {
    recipients
        .into_iter()
        .map(|player| Effect::send(player, text))
        .collect()
}
