//! Main coordinator implementation: the driving loop
//!
//! Pulls events from the event source, feeds them through the matcher, and
//! hands intents to the dispatcher. Startup recovery relies entirely on the
//! dedup store: no history is replayed, no in-memory state is trusted.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use shared::{logging, DispatchStatus, PointingEvent};

use crate::core::matcher::{self, MatchOutcome};
use crate::core::rules::RuleSet;
use crate::core::state::{CoordinatorState, Phase};
use crate::dispatcher::Dispatcher;
use crate::error::CoordinatorResult;
use crate::traits::{EventSource, JobQueue, SecretStore};

/// Coordinates the event feed, rule matching, and dispatch bookkeeping
pub struct Coordinator<E, Q, S>
where
    E: EventSource + Send + Sync + 'static,
    Q: JobQueue + Send + Sync + 'static,
    S: SecretStore + Send + Sync + 'static,
{
    state: CoordinatorState,
    rules: RuleSet,
    event_source: E,
    dispatcher: Dispatcher<Q, S>,

    /// Shutdown signal
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl<E, Q, S> Coordinator<E, Q, S>
where
    E: EventSource + Send + Sync + 'static,
    Q: JobQueue + Send + Sync + 'static,
    S: SecretStore + Send + Sync + 'static,
{
    pub fn new(rules: RuleSet, event_source: E, dispatcher: Dispatcher<Q, S>) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        Self {
            state: CoordinatorState::new(),
            rules,
            event_source,
            dispatcher,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Sender half of the shutdown channel, for signal handlers
    pub fn get_shutdown_sender(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    /// Validate configuration, surface stale `pending` records, and connect
    /// the event feed.
    pub async fn initialize(&mut self) -> CoordinatorResult<()> {
        debug!("🚀 Initializing coordinator with {} rule(s)", self.rules.rules().len());

        // Every configured destination must have a secret before the first
        // event arrives; discovering this mid-run would strand a pending
        // record.
        let destinations: BTreeSet<&str> = self
            .rules
            .rules()
            .iter()
            .map(|rule| rule.destination_project_id.as_str())
            .collect();
        for project_id in destinations {
            self.dispatcher.require_secret(project_id).await?;
        }

        let stale = self.dispatcher.store().pending_records()?;
        if !stale.is_empty() {
            warn!(
                "⚠️ {} record(s) left pending by an unclean shutdown; inspect with `coordinator status`",
                stale.len()
            );
            for record in &stale {
                warn!("  pending since {}: {}", record.created_at, record.dedup_key());
            }
        }

        self.event_source.connect().await?;
        logging::log_success("Coordinator initialized");
        Ok(())
    }

    /// Main event loop.
    ///
    /// Shutdown is only observed between batches, so an in-flight batch is
    /// always drained before the loop exits; no event is abandoned
    /// mid-dispatch.
    pub async fn run(&mut self) -> CoordinatorResult<()> {
        loop {
            self.state.enter(Phase::Polling);
            tokio::select! {
                batch = self.event_source.next_events() => {
                    match batch? {
                        Some(events) => {
                            self.state.enter(Phase::Processing);
                            for event in &events {
                                self.process_event(event).await?;
                            }
                        }
                        None => {
                            logging::log_shutdown("event feed closed");
                            break;
                        }
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    logging::log_shutdown("stop signal received");
                    break;
                }
            }
        }

        self.state.enter(Phase::ShuttingDown);
        self.event_source.disconnect().await?;
        self.state.enter(Phase::Terminated);
        info!("Run summary: {}", self.state.summary());
        Ok(())
    }

    async fn process_event(&mut self, event: &PointingEvent) -> CoordinatorResult<()> {
        self.state.events_seen += 1;
        debug!(
            "Event {}: project {} {} scan at ({:.4}, {:.4})",
            event.event_id, event.source_project_id, event.scan_type, event.field_ra, event.field_dec
        );

        match matcher::evaluate(event, &self.rules) {
            MatchOutcome::NoMatch => {
                // Nothing recorded: the event simply wasn't ours to act on.
                debug!("Event {} matched no rule", event.event_id);
            }
            MatchOutcome::Excluded { aliases } => {
                for alias in aliases {
                    if self
                        .dispatcher
                        .store()
                        .record_skipped(&event.event_id, &alias)?
                    {
                        info!(
                            "⏭️ Skipped {} for {}: {} scans never trigger",
                            event.event_id, alias, event.scan_type
                        );
                        self.state.skipped += 1;
                    }
                }
            }
            MatchOutcome::Matched(intents) => {
                for intent in intents {
                    let outcome = self.dispatcher.dispatch(&intent).await?;
                    if outcome.duplicate {
                        self.state.duplicates += 1;
                    } else {
                        match outcome.record.status {
                            DispatchStatus::Submitted | DispatchStatus::DryRun => {
                                self.state.dispatched += 1
                            }
                            DispatchStatus::Failed => self.state.failures += 1,
                            _ => {}
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
