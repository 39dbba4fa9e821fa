//! Session identity: internal IDs and the short codes players type to join.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const LOBBY_CODE_LENGTH: usize = 5;

/// Letters and digits that are hard to confuse when read aloud.
const LOBBY_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Newtype for session IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Newtype for lobby join codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LobbyCode(pub String);

impl LobbyCode {
    /// Normalises user input: trimmed and upper-cased.
    pub fn parse(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LobbyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LobbyCode {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

/// Hands out session IDs. Owned by the session registry.
#[derive(Debug)]
pub struct IdGenerator {
    next_session: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self { next_session: 1 }
    }
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_session_id(&mut self) -> SessionId {
        let id = SessionId(self.next_session);
        self.next_session += 1;
        id
    }

    pub fn lobby_code<R: Rng + ?Sized>(&self, rng: &mut R) -> LobbyCode {
        let code = (0..LOBBY_CODE_LENGTH)
            .map(|_| LOBBY_CODE_ALPHABET[rng.gen_range(0..LOBBY_CODE_ALPHABET.len())] as char)
            .collect();
        LobbyCode(code)
    }
}
