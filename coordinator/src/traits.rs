//! Capability traits at the coordinator's external seams
//!
//! These traits are the boundary to the telescope middleware, the external
//! job queue, and the secret store. They carry mockall annotations so tests
//! can inject scripted collaborators.

use crate::error::{CoordinatorResult, QueueError};
use shared::{JobSpec, PointingEvent};

/// Source of pointing events from the source telescope's control middleware.
///
/// Implementations own their connection lifecycle explicitly; no ambient
/// process-wide listener state. The feed may redeliver events (the same
/// `event_id` twice, e.g. after a middleware reconnect); the dedup store
/// absorbs that downstream.
#[mockall::automock]
#[async_trait::async_trait]
pub trait EventSource: Send + Sync {
    /// Establish the middleware subscription.
    async fn connect(&mut self) -> CoordinatorResult<()>;

    /// Pull the next batch of events.
    ///
    /// Blocks until at least one event is available. Returns `None` once the
    /// feed has closed and no further events will arrive.
    async fn next_events(&mut self) -> CoordinatorResult<Option<Vec<PointingEvent>>>;

    /// Tear down the middleware subscription.
    async fn disconnect(&mut self) -> CoordinatorResult<()>;
}

/// External asynchronous execution queue for dispatch jobs.
///
/// The submitted job spec carries everything an independent worker process
/// needs to perform the actual trigger web-service call later, decoupled
/// from the coordinator's own lifetime.
#[mockall::automock]
#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a dispatch job.
    ///
    /// # Returns
    /// The queue-assigned job reference on success.
    async fn submit(&self, spec: &JobSpec) -> Result<String, QueueError>;
}

/// Per-project secret lookup for the destination trigger service.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve the secret key for a destination project.
    ///
    /// `None` means the project has no configured secret. The caller treats
    /// that as a fatal configuration error, not a per-event failure.
    async fn get_secret(&self, project_id: &str) -> CoordinatorResult<Option<String>>;
}
