//! Core game logic for the saboteur party game.
//!
//! Everything in this crate is synchronous and free of I/O. Randomness is
//! always injected by the caller so that role and task assignment can be
//! reproduced in tests.

pub mod assignment;
pub mod player;
pub mod role;
pub mod rules;
pub mod sabotage;
pub mod settings;
pub mod task;
pub mod voting;
pub mod win;

pub use assignment::{assign_roles, RoleAssignment, RoleAssignmentError};
pub use player::{Player, PlayerId};
pub use role::{Ability, Role, Team};
pub use rules::GameRules;
pub use sabotage::{Sabotage, SabotageKind};
pub use settings::{SettingField, Settings};
pub use task::{Task, TaskEngine, TaskId, TaskKind, TaskTemplate};
pub use voting::{VoteCast, VoteOutcome, VoteTarget, VoteTracker, VotingResults};
