//! TCP event feed client
//!
//! The control middleware publishes pointing events as newline-delimited
//! JSON over TCP. This client owns its connection explicitly (constructed
//! disconnected, wired into the coordinator, connected at startup and torn
//! down at shutdown) with a bounded reconnect on transport errors. After a
//! reconnect the middleware may replay recent events; the dedup store
//! absorbs the duplicates.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::EventSource;
use shared::PointingEvent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

pub struct TcpEventSource {
    feed_addr: String,
    reader: Option<BufReader<TcpStream>>,
    max_reconnect_attempts: u32,
}

impl TcpEventSource {
    pub fn new(feed_addr: impl Into<String>) -> Self {
        Self {
            feed_addr: feed_addr.into(),
            reader: None,
            max_reconnect_attempts: 5,
        }
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    async fn establish(&mut self) -> CoordinatorResult<()> {
        for attempt in 1..=self.max_reconnect_attempts {
            match TcpStream::connect(&self.feed_addr).await {
                Ok(stream) => {
                    self.reader = Some(BufReader::new(stream));
                    info!("🔗 Connected to event feed at {}", self.feed_addr);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Event feed connection attempt {}/{} failed: {}",
                        attempt, self.max_reconnect_attempts, e
                    );
                    if attempt < self.max_reconnect_attempts {
                        sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }
        Err(CoordinatorError::feed(format!(
            "cannot reach event feed at {} after {} attempts",
            self.feed_addr, self.max_reconnect_attempts
        )))
    }
}

#[async_trait::async_trait]
impl EventSource for TcpEventSource {
    async fn connect(&mut self) -> CoordinatorResult<()> {
        self.establish().await
    }

    async fn next_events(&mut self) -> CoordinatorResult<Option<Vec<PointingEvent>>> {
        loop {
            let reader = self
                .reader
                .as_mut()
                .ok_or_else(|| CoordinatorError::feed("event source is not connected"))?;

            let mut line = String::new();
            match reader.read_line(&mut line).await {
                // Clean end of stream: the middleware closed the feed.
                Ok(0) => return Ok(None),
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<PointingEvent>(trimmed) {
                        Ok(event) => return Ok(Some(vec![event])),
                        Err(e) => {
                            // One garbled line must not take the feed down.
                            warn!("Ignoring malformed feed line: {}", e);
                            continue;
                        }
                    }
                }
                Err(e) => {
                    warn!("Event feed read failed: {}; reconnecting", e);
                    self.reader = None;
                    self.establish().await?;
                }
            }
        }
    }

    async fn disconnect(&mut self) -> CoordinatorResult<()> {
        if self.reader.take().is_some() {
            info!("Disconnected from event feed at {}", self.feed_addr);
        }
        Ok(())
    }
}
