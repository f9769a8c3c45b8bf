//! Continuous admin-event stream
//!
//! A background task turns the cursor-paged `/events` API into an ordered
//! stream of [`Event`]s:
//!
//! ```text
//!  Seeding ──ok──▶ Fetching ──ok──▶ Publishing ──cursor──▶ Backoff ──▶ Fetching
//!     │               │                  │
//!   error           error          empty cursor
//!     │               ▼                  │
//!     │          ErrorBackoff ──▶ Fetching (same cursor)
//!     ▼                                  ▼
//!  Terminated ◀──────────────────────────┘
//! ```
//!
//! Every await in the loop is raced against the cancellation signal, so
//! [`EventStream::cancel`] (or dropping the stream) stops it promptly and
//! aborts any request in flight.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ClientError, Result};
use crate::events::{Event, EventService, EventsPage};
use crate::retry::{duration_millis, RetryPolicy};
use crate::types::StreamPosition;

/// What the consumer receives: an event, or an error that did not stop the stream
pub type StreamItem = Result<Event>;

/// Streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamConfig {
    /// Events requested per page
    pub event_limit: u32,

    /// Pause between successfully drained pages
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// First pause after a failed page fetch
    #[serde(with = "duration_millis")]
    pub error_backoff_initial: Duration,

    /// Longest pause between failed page fetches
    #[serde(with = "duration_millis")]
    pub error_backoff_max: Duration,

    /// Consumer channel capacity
    pub buffer: usize,

    /// Retries for the seed query
    pub seed_retry: RetryPolicy,

    /// Retries for each page query
    pub page_retry: RetryPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            event_limit: 100,
            poll_interval: Duration::from_secs(2),
            error_backoff_initial: Duration::from_secs(1),
            error_backoff_max: Duration::from_secs(60),
            buffer: 1,
            seed_retry: RetryPolicy::exponential(),
            page_retry: RetryPolicy::exponential(),
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page size
    pub fn with_event_limit(mut self, limit: u32) -> Self {
        self.event_limit = limit.max(1);
        self
    }

    /// Set pause between pages
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set error backoff bounds
    pub fn with_error_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.error_backoff_initial = initial;
        self.error_backoff_max = max.max(initial);
        self
    }

    /// Set consumer channel capacity
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Set the retry policy for the seed query
    pub fn with_seed_retry(mut self, policy: RetryPolicy) -> Self {
        self.seed_retry = policy;
        self
    }

    /// Set the retry policy for page queries
    pub fn with_page_retry(mut self, policy: RetryPolicy) -> Self {
        self.page_retry = policy;
        self
    }

    /// Pause after `failures` consecutive failed fetches
    pub fn error_backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.error_backoff_initial
            .saturating_mul(factor)
            .min(self.error_backoff_max)
    }
}

/// Consumer half of a running event stream
///
/// Yields events in log order. Errors from individual page fetches arrive as
/// `Err` items and the stream keeps going; the stream ends when the log is
/// exhausted, seeding fails, or it is cancelled.
pub struct EventStream {
    rx: mpsc::Receiver<StreamItem>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl EventStream {
    pub(crate) fn spawn(service: EventService, config: StreamConfig, start_time: String) -> Self {
        let (tx, rx) = mpsc::channel(config.buffer.max(1));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let streamer = Streamer {
            service,
            config,
            tx,
            shutdown_rx,
            failures: 0,
        };
        let handle = tokio::spawn(streamer.run(start_time));

        Self {
            rx,
            shutdown_tx,
            handle,
        }
    }

    /// Next event or error; `None` once the stream has ended
    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }

    /// Ask the producer to stop. Items already buffered can still be received.
    pub fn cancel(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Whether the producer task has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait for the producer task to exit
    pub async fn close(self) {
        let Self {
            rx,
            shutdown_tx,
            handle,
        } = self;
        let _ = shutdown_tx.send(true);
        drop(rx);
        if let Err(e) = handle.await {
            warn!(error = %e, "Event stream task did not exit cleanly");
        }
    }
}

impl Stream for EventStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

enum State {
    Seeding(String),
    Fetching(StreamPosition),
    Publishing(EventsPage),
    Backoff(StreamPosition),
    ErrorBackoff(StreamPosition),
    Terminated,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Seeding(_) => "seeding",
            State::Fetching(_) => "fetching",
            State::Publishing(_) => "publishing",
            State::Backoff(_) => "backoff",
            State::ErrorBackoff(_) => "error_backoff",
            State::Terminated => "terminated",
        }
    }
}

/// Producer task; owns the cursor
struct Streamer {
    service: EventService,
    config: StreamConfig,
    tx: mpsc::Sender<StreamItem>,
    shutdown_rx: watch::Receiver<bool>,
    failures: u32,
}

impl Streamer {
    async fn run(mut self, start_time: String) {
        info!(
            start_time = %start_time,
            event_limit = self.config.event_limit,
            "Event stream starting"
        );

        let mut state = State::Seeding(start_time);
        loop {
            trace!(state = state.name(), "Stream state");
            state = match state {
                State::Seeding(start_time) => self.seed(&start_time).await,
                State::Fetching(position) => self.fetch(position).await,
                State::Publishing(page) => self.publish_page(page).await,
                State::Backoff(position) => {
                    let interval = self.config.poll_interval;
                    self.pause(interval, State::Fetching(position)).await
                }
                State::ErrorBackoff(position) => {
                    let delay = self.config.error_backoff(self.failures);
                    self.pause(delay, State::Fetching(position)).await
                }
                State::Terminated => break,
            };
        }

        info!("Event stream terminated");
    }

    async fn seed(&mut self, start_time: &str) -> State {
        let seeded = until_shutdown(
            &mut self.shutdown_rx,
            self.service.seed_stream_position(start_time),
        )
        .await;

        match seeded {
            None => State::Terminated,
            Some(Ok(position)) if position.is_exhausted() => {
                info!("Seed query returned no stream position, nothing to stream");
                State::Terminated
            }
            Some(Ok(position)) => State::Fetching(position),
            Some(Err(e)) => {
                error!(error = %e, "Failed to seed event stream");
                self.send(Err(ClientError::seed(e))).await;
                State::Terminated
            }
        }
    }

    async fn fetch(&mut self, position: StreamPosition) -> State {
        let fetched = until_shutdown(
            &mut self.shutdown_rx,
            self.service.fetch_page(self.config.event_limit, &position),
        )
        .await;

        match fetched {
            None => State::Terminated,
            Some(Ok(page)) => {
                self.failures = 0;
                State::Publishing(page)
            }
            Some(Err(e)) => {
                self.failures += 1;
                warn!(
                    error = %e,
                    position = %position,
                    failures = self.failures,
                    "Page fetch failed, will retry the same position"
                );
                if self.send(Err(e)).await {
                    State::ErrorBackoff(position)
                } else {
                    State::Terminated
                }
            }
        }
    }

    async fn publish_page(&mut self, page: EventsPage) -> State {
        let count = page.entries.len();
        for event in page.entries {
            if !self.send(Ok(event)).await {
                return State::Terminated;
            }
        }
        debug!(count, "Published page");

        if page.next_stream_position.is_exhausted() {
            info!("Stream position exhausted");
            State::Terminated
        } else {
            State::Backoff(page.next_stream_position)
        }
    }

    async fn pause(&mut self, delay: Duration, next: State) -> State {
        match until_shutdown(&mut self.shutdown_rx, tokio::time::sleep(delay)).await {
            Some(()) => next,
            None => State::Terminated,
        }
    }

    /// Deliver one item; false when the consumer is gone or we were cancelled
    async fn send(&mut self, item: StreamItem) -> bool {
        match until_shutdown(&mut self.shutdown_rx, self.tx.send(item)).await {
            Some(Ok(())) => true,
            Some(Err(_)) => {
                debug!("Consumer dropped the event stream");
                false
            }
            None => false,
        }
    }
}

/// Run `fut` unless shutdown is signalled first; `None` means cancelled
async fn until_shutdown<F: Future>(
    shutdown_rx: &mut watch::Receiver<bool>,
    fut: F,
) -> Option<F::Output> {
    if *shutdown_rx.borrow() {
        return None;
    }
    tokio::select! {
        biased;
        _ = wait_for_shutdown(shutdown_rx) => {
            debug!("Shutdown signal received");
            None
        }
        out = fut => Some(out),
    }
}

async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        // Sender dropped with the EventStream
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.event_limit, 100);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.buffer, 1);
        assert_eq!(config.seed_retry.max_attempts, 5);
        assert_eq!(config.page_retry.max_attempts, 5);
    }

    #[test]
    fn test_config_builder() {
        let config = StreamConfig::new()
            .with_event_limit(0)
            .with_poll_interval(Duration::from_millis(50))
            .with_error_backoff(Duration::from_millis(10), Duration::from_millis(5))
            .with_buffer(0)
            .with_page_retry(RetryPolicy::no_retry());

        assert_eq!(config.event_limit, 1);
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.error_backoff_max, Duration::from_millis(10));
        assert_eq!(config.buffer, 1);
        assert_eq!(config.page_retry.max_attempts, 1);
    }

    #[test]
    fn test_error_backoff_doubles_and_caps() {
        let config = StreamConfig::new()
            .with_error_backoff(Duration::from_secs(1), Duration::from_secs(10));

        assert_eq!(config.error_backoff(1), Duration::from_secs(1));
        assert_eq!(config.error_backoff(2), Duration::from_secs(2));
        assert_eq!(config.error_backoff(3), Duration::from_secs(4));
        assert_eq!(config.error_backoff(5), Duration::from_secs(10));
        assert_eq!(config.error_backoff(64), Duration::from_secs(10));
    }

    #[test]
    fn test_serialization() {
        let config = StreamConfig::new().with_poll_interval(Duration::from_millis(1500));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"poll_interval\":1500"));

        let parsed: StreamConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[tokio::test(start_paused = true)]
    async fn test_until_shutdown_cancels_pending_future() {
        let (tx, mut rx) = watch::channel(false);
        let pending = until_shutdown(&mut rx, tokio::time::sleep(Duration::from_secs(3600)));
        tokio::pin!(pending);

        tx.send(true).unwrap();
        assert!(pending.await.is_none());
    }

    #[tokio::test]
    async fn test_until_shutdown_when_sender_dropped() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let out = until_shutdown(&mut rx, futures::future::pending::<()>()).await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn test_until_shutdown_passes_output() {
        let (_tx, mut rx) = watch::channel(false);
        let out = until_shutdown(&mut rx, async { 7 }).await;
        assert_eq!(out, Some(7));
    }
}
