//! Spool-directory job queue
//!
//! Dispatch jobs are handed off by writing the job spec into a spool
//! directory; an independent worker process picks them up and performs the
//! actual trigger web-service call. The write is temp-file-plus-rename so a
//! worker never observes a half-written spec.

use crate::error::QueueError;
use crate::traits::JobQueue;
use shared::JobSpec;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub struct SpoolDirJobQueue {
    spool_dir: PathBuf,
}

impl SpoolDirJobQueue {
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
        }
    }
}

#[async_trait::async_trait]
impl JobQueue for SpoolDirJobQueue {
    async fn submit(&self, spec: &JobSpec) -> Result<String, QueueError> {
        let payload = serde_json::to_vec_pretty(spec).map_err(|e| QueueError::Rejected {
            message: format!("job spec does not serialize: {e}"),
        })?;

        fs::create_dir_all(&self.spool_dir).await.map_err(|e| {
            // A file squatting on the spool path is a configuration problem,
            // not an outage.
            if e.kind() == ErrorKind::AlreadyExists || e.kind() == ErrorKind::NotADirectory {
                QueueError::Rejected {
                    message: format!("{} is not a spool directory: {e}", self.spool_dir.display()),
                }
            } else {
                QueueError::Unavailable {
                    message: format!("cannot create spool directory {}: {e}", self.spool_dir.display()),
                }
            }
        })?;

        let job_reference = Uuid::new_v4().to_string();
        let tmp_path = self.spool_dir.join(format!(".{job_reference}.json.tmp"));
        let final_path = self.spool_dir.join(format!("{job_reference}.json"));

        fs::write(&tmp_path, &payload)
            .await
            .map_err(|e| QueueError::Unavailable {
                message: format!("cannot write job spec to spool: {e}"),
            })?;
        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| QueueError::Unavailable {
                message: format!("cannot publish job spec in spool: {e}"),
            })?;

        debug!(
            "Spooled job {} for project {} at {}",
            job_reference,
            spec.project_id,
            final_path.display()
        );
        Ok(job_reference)
    }
}
