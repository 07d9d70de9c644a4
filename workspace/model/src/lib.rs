//! Persistence layer for the campus marketplace: sea-orm entities plus the
//! small domain rules that belong to a single record (status transition
//! tables, derived flags, expiry checks).

pub mod entities;
pub mod money;
pub mod transitions;

pub use transitions::{StatusTransitions, TransitionError};
