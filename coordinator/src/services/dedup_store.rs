//! Durable dedup store for dispatch records
//!
//! A thin wrapper over an embedded sled database. Records are stored as JSON
//! under their dedup key so the store doubles as an operator-facing audit
//! artifact. Every mutation is flushed before returning success: an operation
//! the caller has seen succeed survives a process crash, which is what makes
//! restart-safe at-most-once dispatch possible.

use crate::error::{CoordinatorError, CoordinatorResult};
use chrono::Utc;
use shared::{DispatchRecord, DispatchStatus, SharedError};
use std::path::Path;

/// Durable record of every dispatch decision ever taken, keyed by dedup key.
///
/// The handle is cheaply cloneable; clones share the same underlying
/// database. The coordinator is the only writer; concurrent readers are
/// fine, and the compare-and-swap protocol below keeps `reserve`/`complete`
/// correct even if the processing loop is ever made concurrent.
#[derive(Clone)]
pub struct DedupStore {
    db: sled::Db,
}

impl DedupStore {
    pub fn open(path: &Path) -> CoordinatorResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Atomically claim the dispatch attempt for a key.
    ///
    /// Inserts `fresh` (a `pending` record) if the key is unseen and returns
    /// true, and the caller now owns the attempt. A `failed` record is
    /// superseded by the fresh `pending` one (failed submissions stay
    /// retryable); any other existing record refuses the claim. The
    /// check-and-insert is a compare-and-swap loop, so two concurrent callers
    /// can never both own `pending` for the same key.
    pub fn reserve(&self, fresh: &DispatchRecord) -> CoordinatorResult<bool> {
        debug_assert_eq!(fresh.status, DispatchStatus::Pending);
        let key = fresh.dedup_key();
        let new_bytes = serde_json::to_vec(fresh)?;

        loop {
            let current = self.db.get(key.as_bytes())?;
            if let Some(bytes) = &current {
                let existing = decode(&key, bytes)?;
                if !existing.status.is_retryable() {
                    return Ok(false);
                }
            }
            match self
                .db
                .compare_and_swap(key.as_bytes(), current, Some(new_bytes.clone()))?
            {
                Ok(()) => {
                    self.db.flush()?;
                    return Ok(true);
                }
                // Lost a race against another claimant; re-examine.
                Err(_) => continue,
            }
        }
    }

    /// Resolve a `pending` record to `submitted`, `failed`, or `dry_run`.
    ///
    /// Any other current status (or any other target status) is an
    /// integrity violation: it means a dispatch attempt ran without holding
    /// the reservation.
    pub fn complete(
        &self,
        key: &str,
        status: DispatchStatus,
        job_reference: Option<String>,
        error_detail: Option<String>,
    ) -> CoordinatorResult<DispatchRecord> {
        if !matches!(
            status,
            DispatchStatus::Submitted | DispatchStatus::Failed | DispatchStatus::DryRun
        ) {
            return Err(CoordinatorError::integrity(
                key,
                format!("cannot complete a record to {status}"),
            ));
        }

        let current = self.db.get(key.as_bytes())?.ok_or_else(|| {
            CoordinatorError::integrity(key, "no record to complete")
        })?;
        let record = decode(key, &current)?;
        if record.status != DispatchStatus::Pending {
            return Err(CoordinatorError::integrity(
                key,
                format!("expected pending, found {}", record.status),
            ));
        }

        let mut updated = record;
        updated.status = status;
        updated.job_reference = job_reference;
        updated.error_detail = error_detail;
        if matches!(status, DispatchStatus::Submitted | DispatchStatus::DryRun) {
            updated.submitted_at = Some(Utc::now());
        }

        let new_bytes = serde_json::to_vec(&updated)?;
        match self
            .db
            .compare_and_swap(key.as_bytes(), Some(current), Some(new_bytes))?
        {
            Ok(()) => {
                self.db.flush()?;
                Ok(updated)
            }
            Err(_) => Err(CoordinatorError::integrity(
                key,
                "record changed underneath an in-flight completion",
            )),
        }
    }

    /// Record that an event matched a rule but was excluded before any
    /// dispatch attempt. Terminal, written directly without a `pending`
    /// intermediate. Returns false if the key was already recorded
    /// (duplicate delivery).
    pub fn record_skipped(&self, event_id: &str, alias: &str) -> CoordinatorResult<bool> {
        let record = DispatchRecord::skipped(event_id, alias);
        let key = record.dedup_key();
        let bytes = serde_json::to_vec(&record)?;
        match self
            .db
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(bytes))?
        {
            Ok(()) => {
                self.db.flush()?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    pub fn lookup(&self, key: &str) -> CoordinatorResult<Option<DispatchRecord>> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Records left `pending`. After a clean pass these only exist if an
    /// earlier run stopped uncleanly. Surfaced to the operator at startup,
    /// never auto-resolved.
    pub fn pending_records(&self) -> CoordinatorResult<Vec<DispatchRecord>> {
        let mut pending = Vec::new();
        for (_, record) in self.records()? {
            if record.status == DispatchStatus::Pending {
                pending.push(record);
            }
        }
        Ok(pending)
    }

    /// Full read-only scan in key order, for audit tooling.
    pub fn records(&self) -> CoordinatorResult<Vec<(String, DispatchRecord)>> {
        let mut records = Vec::new();
        for item in self.db.iter() {
            let (key_bytes, value) = item?;
            let key = String::from_utf8_lossy(&key_bytes).to_string();
            records.push((key.clone(), decode(&key, &value)?));
        }
        Ok(records)
    }
}

fn decode(key: &str, bytes: &[u8]) -> CoordinatorResult<DispatchRecord> {
    serde_json::from_slice(bytes).map_err(|e| {
        SharedError::MalformedRecord {
            key: key.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}
