//! Dispatch execution: dedup reservation, job submission, bookkeeping
//!
//! The dispatcher is the only component that writes dispatch records. It
//! claims the dedup key first, then either submits a job or (in dry-run
//! mode) resolves the record without touching the queue. Submission
//! failures are recorded and contained: a redelivered event re-enters
//! through `reserve`, which only permits a retry from `failed`.

use crate::core::matcher::DispatchIntent;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::services::DedupStore;
use crate::traits::{JobQueue, SecretStore};
use shared::{DispatchRecord, DispatchStatus, JobSpec};
use tracing::{debug, info, warn};

/// What one dispatch call actually did
#[derive(Clone, Debug)]
pub struct DispatchOutcome {
    pub record: DispatchRecord,
    /// True when the key was already owned and no new attempt was made
    pub duplicate: bool,
}

pub struct Dispatcher<Q, S>
where
    Q: JobQueue + Send + Sync + 'static,
    S: SecretStore + Send + Sync + 'static,
{
    store: DedupStore,
    queue: Q,
    secrets: S,
    dry_run: bool,
}

impl<Q, S> Dispatcher<Q, S>
where
    Q: JobQueue + Send + Sync + 'static,
    S: SecretStore + Send + Sync + 'static,
{
    pub fn new(store: DedupStore, queue: Q, secrets: S, dry_run: bool) -> Self {
        Self {
            store,
            queue,
            secrets,
            dry_run,
        }
    }

    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    /// Fail fast when a configured destination project has no secret.
    ///
    /// Called once per destination at startup: a missing secret means
    /// misconfiguration, and the process must not start consuming events.
    pub async fn require_secret(&self, project_id: &str) -> CoordinatorResult<()> {
        match self.secrets.get_secret(project_id).await? {
            Some(_) => Ok(()),
            None => Err(CoordinatorError::config(format!(
                "no secret key configured for destination project {project_id}"
            ))),
        }
    }

    /// Dispatch one intent with at-most-once semantics.
    ///
    /// Exactly one caller ever wins the reservation for a key; everyone else
    /// gets the existing record back untouched.
    pub async fn dispatch(&self, intent: &DispatchIntent) -> CoordinatorResult<DispatchOutcome> {
        let key = intent.dedup_key();
        let fresh = DispatchRecord::pending(&intent.event_id, &intent.alias, intent.kind);

        if !self.store.reserve(&fresh)? {
            let record = self.store.lookup(&key)?.ok_or_else(|| {
                CoordinatorError::integrity(&key, "reservation refused but no record present")
            })?;
            debug!("Duplicate delivery for {}: already {}", key, record.status);
            return Ok(DispatchOutcome {
                record,
                duplicate: true,
            });
        }

        if self.dry_run {
            info!(
                "🔎 Dry run: suppressing submission of {} for project {} ({} parameters)",
                key,
                intent.destination_project_id,
                intent.params.len()
            );
            let record = self
                .store
                .complete(&key, DispatchStatus::DryRun, None, None)?;
            return Ok(DispatchOutcome {
                record,
                duplicate: false,
            });
        }

        let secure_key = self
            .secrets
            .get_secret(&intent.destination_project_id)
            .await?
            .ok_or_else(|| {
                CoordinatorError::config(format!(
                    "no secret key configured for destination project {}",
                    intent.destination_project_id
                ))
            })?;

        let spec = JobSpec {
            project_id: intent.destination_project_id.clone(),
            secure_key,
            obsname: intent.obsname(),
            params: intent.params.clone(),
        };

        let record = match self.queue.submit(&spec).await {
            Ok(job_reference) => {
                info!("📤 Submitted {} as job {}", key, job_reference);
                self.store
                    .complete(&key, DispatchStatus::Submitted, Some(job_reference), None)?
            }
            Err(e) => {
                warn!("Job submission failed for {}: {}", key, e);
                self.store
                    .complete(&key, DispatchStatus::Failed, None, Some(e.to_string()))?
            }
        };

        Ok(DispatchOutcome {
            record,
            duplicate: false,
        })
    }
}
