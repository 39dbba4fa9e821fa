//! Explicit state machine for a game session.
//!
//! The design separates:
//! - **State**: Which phase the session is in (`GameState`)
//! - **Context**: Everything else the session knows (`SessionContext`)
//! - **Events**: What happened (`Event`)
//! - **Effects**: What to do (`Effect`)
//! - **Transition**: `(State, Event, &mut Context) -> (State, Vec<Effect>)`
//!
//! Transitions never perform I/O. The interpreter executes effects against
//! the messenger and the sabotage engine and feeds result events back in.

pub mod action;
pub mod context;
pub mod effect;
pub mod event;
pub mod interpreter;
pub mod menus;
pub mod state;
pub mod store;
pub mod transition;

pub use action::*;
pub use context::*;
pub use effect::*;
pub use event::*;
pub use state::*;
pub use transition::*;
