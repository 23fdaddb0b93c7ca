//! Builders and drivers for coordinator integration tests

use std::path::Path;
use std::sync::{Arc, Mutex};

use coordinator::services::DedupStore;
use coordinator::traits::{MockJobQueue, MockSecretStore};
use coordinator::{
    Coordinator, CoordinatorResult, Dispatcher, EventSource, JobQueue, QueueError, RuleSet,
    SecretStore,
};
use shared::{JobSpec, PointingEvent};
use tokio::sync::mpsc;

/// Event source fed from an mpsc channel: batches arrive as sent, and the
/// feed reports closed once the sender is dropped. Blocks naturally between
/// batches, which is exactly what shutdown tests need.
pub struct ChannelEventSource {
    rx: mpsc::Receiver<Vec<PointingEvent>>,
}

#[async_trait::async_trait]
impl EventSource for ChannelEventSource {
    async fn connect(&mut self) -> CoordinatorResult<()> {
        Ok(())
    }

    async fn next_events(&mut self) -> CoordinatorResult<Option<Vec<PointingEvent>>> {
        Ok(self.rx.recv().await)
    }

    async fn disconnect(&mut self) -> CoordinatorResult<()> {
        Ok(())
    }
}

pub fn channel_source() -> (mpsc::Sender<Vec<PointingEvent>>, ChannelEventSource) {
    let (tx, rx) = mpsc::channel(64);
    (tx, ChannelEventSource { rx })
}

pub fn open_store(dir: &Path) -> DedupStore {
    DedupStore::open(&dir.join("records.db")).expect("store opens")
}

/// Queue that accepts every submission and records the specs it saw
pub fn accepting_queue(captured: &Arc<Mutex<Vec<JobSpec>>>) -> MockJobQueue {
    let captured = Arc::clone(captured);
    let mut queue = MockJobQueue::new();
    queue.expect_submit().returning(move |spec| {
        let mut seen = captured.lock().unwrap();
        seen.push(spec.clone());
        Ok(format!("job-{}", seen.len()))
    });
    queue
}

/// Queue that must never be invoked
pub fn queue_never_called() -> MockJobQueue {
    let mut queue = MockJobQueue::new();
    queue.expect_submit().times(0);
    queue
}

/// Queue whose first submission fails transiently and whose second succeeds
pub fn flaky_queue() -> MockJobQueue {
    let mut seq = mockall::Sequence::new();
    let mut queue = MockJobQueue::new();
    queue
        .expect_submit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| {
            Err(QueueError::Unavailable {
                message: "queue down".to_string(),
            })
        });
    queue
        .expect_submit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok("job-2".to_string()));
    queue
}

/// Secret store with a key for every project
pub fn secrets() -> MockSecretStore {
    let mut store = MockSecretStore::new();
    store
        .expect_get_secret()
        .returning(|_| Ok(Some("s3cret".to_string())));
    store
}

/// Secret store with no keys at all
pub fn no_secrets() -> MockSecretStore {
    let mut store = MockSecretStore::new();
    store.expect_get_secret().returning(|_| Ok(None));
    store
}

/// Drive a coordinator through the given event batches and run to feed close.
pub async fn run_events<Q, S>(
    rules: RuleSet,
    store: DedupStore,
    queue: Q,
    secret_store: S,
    dry_run: bool,
    batches: Vec<Vec<PointingEvent>>,
) -> CoordinatorResult<()>
where
    Q: JobQueue + Send + Sync + 'static,
    S: SecretStore + Send + Sync + 'static,
{
    let (tx, source) = channel_source();
    let dispatcher = Dispatcher::new(store, queue, secret_store, dry_run);
    let mut coordinator = Coordinator::new(rules, source, dispatcher);

    coordinator.initialize().await?;
    for batch in batches {
        tx.send(batch).await.expect("batch fits the channel");
    }
    // Closing the sender ends the feed and lets the run return.
    drop(tx);

    coordinator.run().await
}
