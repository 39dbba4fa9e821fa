pub mod api;
pub mod clock;
pub mod config;
pub mod ids;
pub mod messenger;
pub mod sabotage_engine;
pub mod scheduler;
pub mod state_machine;
pub mod ticker;

use std::sync::Arc;

pub use ids::{LobbyCode, SessionId};
pub use messenger::{Messenger, OutboxMessenger};
pub use state_machine::store::{SessionStore, SessionView, StoreError, StoreOptions};

pub struct AppState {
    pub store: Arc<SessionStore>,
    /// The messenger behind the store, read by the HTTP polling endpoint.
    pub outbox: Arc<OutboxMessenger>,
}
