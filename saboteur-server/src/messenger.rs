//! Outbound chat messages.
//!
//! The game never talks to a chat platform directly. It goes through the
//! [`Messenger`] trait, which the HTTP bridge implements with an in-memory
//! outbox that clients poll.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use saboteur_core::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tokio::sync::RwLock;

/// Newtype for the ID of a message we sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    /// Action token sent back when the button is pressed.
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Rows of buttons attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        if !buttons.is_empty() {
            self.rows.push(buttons);
        }
        self
    }

    pub fn button(self, label: impl Into<String>, action: impl Into<String>) -> Self {
        self.row(vec![Button::new(label, action)])
    }

    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().flatten().map(|b| b.action.as_str())
    }
}

#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("message {message:?} not found for player {player}")]
    UnknownMessage { player: PlayerId, message: MessageRef },
    #[error("delivery to player {player} failed: {reason}")]
    Delivery { player: PlayerId, reason: String },
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_to_player(
        &self,
        player: PlayerId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError>;

    async fn edit_message(
        &self,
        player: PlayerId,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError>;

    async fn delete_message(&self, player: PlayerId, message: MessageRef) -> Result<(), MessengerError>;

    /// Drops anything still held for a player who is no longer in a session.
    async fn forget_player(&self, _player: PlayerId) {}
}

/// A message as stored in the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: MessageRef,
    pub text: String,
    pub keyboard: Option<Keyboard>,
    pub sent_at: DateTime<Utc>,
    pub edited: bool,
}

/// Messages kept per player before the oldest are dropped.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 200;

#[derive(Debug, Default)]
struct Outbox {
    next_id: u64,
    by_player: HashMap<PlayerId, VecDeque<OutboundMessage>>,
}

/// In-memory messenger. Each player has a bounded mailbox that clients read
/// over HTTP.
#[derive(Debug)]
pub struct OutboxMessenger {
    outbox: RwLock<Outbox>,
    capacity: usize,
}

impl Default for OutboxMessenger {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl OutboxMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outbox: RwLock::new(Outbox::default()),
            capacity: capacity.max(1),
        }
    }

    /// Messages currently visible to a player, oldest first.
    pub async fn messages_for(&self, player: PlayerId) -> Vec<OutboundMessage> {
        let outbox = self.outbox.read().await;
        outbox
            .by_player
            .get(&player)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Most recent message sent to a player.
    pub async fn last_message(&self, player: PlayerId) -> Option<OutboundMessage> {
        let outbox = self.outbox.read().await;
        outbox.by_player.get(&player).and_then(|m| m.back().cloned())
    }

    /// Number of players with a mailbox.
    pub async fn mailbox_count(&self) -> usize {
        self.outbox.read().await.by_player.len()
    }
}

#[async_trait]
impl Messenger for OutboxMessenger {
    async fn send_to_player(
        &self,
        player: PlayerId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, MessengerError> {
        let mut outbox = self.outbox.write().await;
        outbox.next_id += 1;
        let id = MessageRef(outbox.next_id);
        let mailbox = outbox.by_player.entry(player).or_default();
        mailbox.push_back(OutboundMessage {
            id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
            sent_at: Utc::now(),
            edited: false,
        });
        while mailbox.len() > self.capacity {
            mailbox.pop_front();
        }
        Ok(id)
    }

    async fn edit_message(
        &self,
        player: PlayerId,
        message: MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), MessengerError> {
        let mut outbox = self.outbox.write().await;
        let stored = outbox
            .by_player
            .get_mut(&player)
            .and_then(|m| m.iter_mut().find(|m| m.id == message))
            .ok_or(MessengerError::UnknownMessage { player, message })?;
        stored.text = text.to_string();
        stored.keyboard = keyboard.cloned();
        stored.edited = true;
        Ok(())
    }

    async fn delete_message(&self, player: PlayerId, message: MessageRef) -> Result<(), MessengerError> {
        let mut outbox = self.outbox.write().await;
        let messages = outbox
            .by_player
            .get_mut(&player)
            .ok_or(MessengerError::UnknownMessage { player, message })?;
        let before = messages.len();
        messages.retain(|m| m.id != message);
        if messages.len() == before {
            return Err(MessengerError::UnknownMessage { player, message });
        }
        Ok(())
    }

    async fn forget_player(&self, player: PlayerId) {
        self.outbox.write().await.by_player.remove(&player);
    }
}
