// crates/types/src/lib.rs
//! Shared data types for the showrunner orchestration core.
//!
//! Pure data, no runtime. Everything here either crosses the wire (serde,
//! camelCase) or flows through the subscription channels handed to UI
//! collaborators, so the types are cheap to clone and carry no locks.

pub mod event;
pub mod job;
pub mod player;

pub use event::JobEvent;
pub use job::{JobId, JobKey, JobKind, JobSnapshot, Phase, UnknownName};
pub use player::PlayerId;
