//! Business computations that sit between the entities and the HTTP layer:
//! notification dispatch, aggregate analytics, review ratings and the chat
//! assistant.

pub mod analytics;
pub mod assistant;
pub mod error;
pub mod notifier;
pub mod ratings;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ComputeError, Result};
pub use notifier::{NewNotification, NoopSink, NotificationSink};
