//! Coordinator lifecycle state and run counters

use std::time::{Duration, Instant};
use tracing::debug;

/// Lifecycle phase of the driving loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Polling,
    Processing,
    ShuttingDown,
    Terminated,
}

/// State owned by the coordinator loop: current phase plus run counters.
///
/// None of this is trusted across restarts; recovery derives entirely from
/// the dedup store.
pub struct CoordinatorState {
    phase: Phase,
    started_at: Instant,

    pub events_seen: u64,
    pub dispatched: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub failures: u64,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            started_at: Instant::now(),
            events_seen: 0,
            dispatched: 0,
            duplicates: 0,
            skipped: 0,
            failures: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Move to a new phase. Terminated is final.
    pub fn enter(&mut self, phase: Phase) {
        if self.phase == Phase::Terminated {
            return;
        }
        if self.phase != phase {
            debug!("Coordinator phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// One-line run summary for the shutdown log
    pub fn summary(&self) -> String {
        format!(
            "{} events, {} dispatched, {} duplicates, {} skipped, {} failed in {:.0?}",
            self.events_seen,
            self.dispatched,
            self.duplicates,
            self.skipped,
            self.failures,
            self.uptime()
        )
    }
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self::new()
    }
}
