//! Core shared types for the trigger coordination system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Scan type reported by the source telescope's control middleware
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Regular science observation
    Science,
    /// Bandpass calibration scan (still eligible for triggering)
    Bandpass,
    /// On-dish calibration weights scan
    OdcWeights,
    /// Beamforming scan
    Beamform,
}

impl ScanType {
    /// Scan types that must never produce a trigger, independent of any
    /// configured rule.
    pub fn is_excluded(&self) -> bool {
        matches!(self, ScanType::OdcWeights | ScanType::Beamform)
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanType::Science => "science",
            ScanType::Bandpass => "bandpass",
            ScanType::OdcWeights => "odc_weights",
            ScanType::Beamform => "beamform",
        };
        write!(f, "{name}")
    }
}

/// A pointing notification from the source telescope.
///
/// This is also the wire format of the middleware event feed (one JSON
/// object per line). `event_id` is stable across redelivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PointingEvent {
    pub event_id: String,
    pub source_project_id: String,
    pub field_ra: f64,
    pub field_dec: f64,
    pub scan_type: ScanType,
    pub observed_at: DateTime<Utc>,
}

/// Whether a dispatch targets the science field itself or a follow-up
/// calibrator observation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchKind {
    Target,
    Calibration,
}

/// Lifecycle status of a dispatch record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Reserved by a dispatch attempt that has not yet resolved
    Pending,
    /// Job handed to the queue; terminal
    Submitted,
    /// Submission failed; eligible for an explicit retry
    Failed,
    /// Matched a rule but was excluded before any dispatch attempt; terminal
    Skipped,
    /// Suppressed by the operator dry-run flag; terminal
    DryRun,
}

impl DispatchStatus {
    /// Terminal states refuse any further dispatch attempt for their key.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchStatus::Submitted | DispatchStatus::Skipped | DispatchStatus::DryRun
        )
    }

    /// Only failed submissions may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchStatus::Failed)
    }
}

impl fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchStatus::Pending => "pending",
            DispatchStatus::Submitted => "submitted",
            DispatchStatus::Failed => "failed",
            DispatchStatus::Skipped => "skipped",
            DispatchStatus::DryRun => "dry_run",
        };
        write!(f, "{name}")
    }
}

/// Key under which a dispatch decision is recorded.
///
/// One event may match several aliases; each (alias, event) pair is
/// deduplicated independently, and a calibration follow-up gets its own key.
pub fn dedup_key(alias: &str, event_id: &str, kind: DispatchKind) -> String {
    match kind {
        DispatchKind::Target => format!("{alias}:{event_id}"),
        DispatchKind::Calibration => format!("{alias}:{event_id}:cal"),
    }
}

/// Durable record of one dispatch decision.
///
/// Stored as JSON in the dedup store; the schema is operator-facing and must
/// stay stable across versions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub event_id: String,
    pub alias: String,
    pub kind: DispatchKind,
    pub status: DispatchStatus,
    pub job_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub error_detail: Option<String>,
}

impl DispatchRecord {
    /// Fresh record owning an in-flight dispatch attempt
    pub fn pending(event_id: &str, alias: &str, kind: DispatchKind) -> Self {
        Self {
            event_id: event_id.to_string(),
            alias: alias.to_string(),
            kind,
            status: DispatchStatus::Pending,
            job_reference: None,
            created_at: Utc::now(),
            submitted_at: None,
            error_detail: None,
        }
    }

    /// Terminal record for an event that matched a rule but was excluded
    /// before any dispatch attempt
    pub fn skipped(event_id: &str, alias: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            alias: alias.to_string(),
            kind: DispatchKind::Target,
            status: DispatchStatus::Skipped,
            job_reference: None,
            created_at: Utc::now(),
            submitted_at: None,
            error_detail: None,
        }
    }

    pub fn dedup_key(&self) -> String {
        dedup_key(&self.alias, &self.event_id, self.kind)
    }
}

/// Everything an independent worker process needs to perform the actual
/// trigger web-service call, decoupled from the coordinator's lifetime.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobSpec {
    /// Destination project the observation is booked under
    pub project_id: String,
    /// Project secret for the trigger service
    pub secure_key: String,
    /// Observation name shown on the destination schedule
    pub obsname: String,
    /// Merged destination parameters, live coordinates included
    pub params: BTreeMap<String, Value>,
}
