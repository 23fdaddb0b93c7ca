//! Trigger coordination core
//!
//! Consumes a telescope pointing-event feed, matches events against
//! configured rules, and dispatches at-most-once follow-up observation jobs
//! through an external queue, with a durable dedup store guaranteeing that a
//! crash or restart never duplicates or loses a trigger.

pub mod coordinator;
pub mod core;
pub mod dispatcher;
pub mod error;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use coordinator::Coordinator;
pub use core::{CoordinatorState, DispatchIntent, MatchOutcome, Phase, RuleSet, TriggerRule};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{CoordinatorError, CoordinatorResult, QueueError};
pub use traits::{EventSource, JobQueue, SecretStore};
