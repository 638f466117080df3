use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::StreamConfig;
use crate::models::ConnectionState;
use crate::streaming::classify::classify;
use crate::streaming::handlers::EventDispatcher;
use crate::streaming::splitter::BraceAwareSplitter;
use crate::transport::{Transport, TransportError, TransportErrorKind};

/// Lifecycle of one logical stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
    Closed,
}

/// How the poll loop finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// A terminal protocol event was observed, or the no-data ceiling
    /// or retry budget ran out with data already delivered.
    Completed,
    /// The endpoint failed before any data arrived.
    Failed,
    /// `close()` fired mid-stream.
    Closed,
}

/// The reconnect/backoff state machine.
///
/// The backend's chunked response may be cut by intermediaries at any
/// time, so an early EOF without a terminal event is not an error: the
/// loop re-issues the request and resumes feeding the splitter, backing
/// off while no new data arrives. This re-poll behavior is the retry
/// strategy, not a workaround.
pub struct PollLoop {
    url: String,
    transport: Arc<dyn Transport>,
    config: StreamConfig,
    splitter: BraceAwareSplitter,
    dispatcher: EventDispatcher,
    state: ConnectionState,
    poll_state: PollState,
    cancel: CancellationToken,
}

impl PollLoop {
    pub fn new(
        url: String,
        transport: Arc<dyn Transport>,
        config: StreamConfig,
        dispatcher: EventDispatcher,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            url,
            transport,
            config,
            splitter: BraceAwareSplitter::new(),
            dispatcher,
            state: ConnectionState::default(),
            poll_state: PollState::Idle,
            cancel,
        }
    }

    pub fn poll_state(&self) -> PollState {
        self.poll_state
    }

    /// Drive the stream to a terminal state. Chunks are processed
    /// strictly in arrival order; classified events reach the
    /// dispatcher in byte-stream order.
    pub async fn run(&mut self) -> StreamOutcome {
        let mut retry_count: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return self.close_out();
            }

            self.poll_state = PollState::Requesting;

            match self.poll_once().await {
                Ok(segment_bytes) => {
                    if self.cancel.is_cancelled() {
                        return self.close_out();
                    }

                    if segment_bytes == 0 {
                        self.state.no_data_ticks += 1;
                    }

                    if !self.should_continue() {
                        info!(
                            messages = self.state.message_count,
                            "Stream finished, no further polling"
                        );
                        self.poll_state = PollState::Completed;
                        return StreamOutcome::Completed;
                    }

                    let delay = self.config.poll_interval(self.state.no_data_ticks);
                    if !self.sleep_or_cancel(delay).await {
                        return self.close_out();
                    }
                }
                Err(e) => {
                    if self.cancel.is_cancelled() {
                        // Caller-initiated abort, not a failure
                        return self.close_out();
                    }

                    match e.kind() {
                        TransportErrorKind::IncompleteBody
                            if retry_count < self.config.max_retries =>
                        {
                            // Cut chunked body: retried without touching
                            // the data-received state
                            retry_count += 1;
                            warn!(retry = retry_count, error = %e, "Chunked body cut, retrying");
                            let delay =
                                Duration::from_millis(self.config.incomplete_body_retry_delay_ms);
                            if !self.sleep_or_cancel(delay).await {
                                return self.close_out();
                            }
                        }
                        _ => {
                            if !self.state.has_received_data
                                && self.state.no_data_ticks
                                    < self.config.tick_thresholds.five_minutes
                            {
                                // Fast-fail for genuinely broken endpoints
                                error!(error = %e, "Stream failed before any data arrived");
                                self.dispatcher.fail_connection();
                                self.poll_state = PollState::Failed;
                                return StreamOutcome::Failed;
                            }

                            if retry_count < self.config.max_retries {
                                retry_count += 1;
                                warn!(retry = retry_count, error = %e, "Transport failure, retrying");
                                let delay =
                                    Duration::from_millis(self.config.failure_retry_delay_ms);
                                if !self.sleep_or_cancel(delay).await {
                                    return self.close_out();
                                }
                            } else {
                                warn!(error = %e, "Retries exhausted, treating stream as complete");
                                self.poll_state = PollState::Completed;
                                return StreamOutcome::Completed;
                            }
                        }
                    }
                }
            }
        }
    }

    /// One request/response cycle: stream the body to EOF, feeding the
    /// splitter and dispatcher along the way. Returns the number of
    /// body bytes this segment carried.
    async fn poll_once(&mut self) -> std::result::Result<usize, TransportError> {
        let mut stream = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(0),
            result = self.transport.fetch(&self.url) => result?,
        };

        self.poll_state = PollState::Streaming;
        let mut segment_bytes = 0usize;
        let mut segment_text = String::new();

        loop {
            let chunk = tokio::select! {
                _ = self.cancel.cancelled() => break,
                chunk = stream.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    segment_bytes += bytes.len();
                    // New data resets the empty-poll counter immediately
                    self.state.has_received_data = true;
                    self.state.no_data_ticks = 0;
                    segment_text.push_str(&String::from_utf8_lossy(&bytes));

                    self.splitter.add_chunk(&bytes);
                    for value in self.splitter.drain_complete_objects() {
                        self.state.message_count += 1;
                        self.dispatcher.dispatch(classify(value));
                    }

                    // The server may hold the connection open after the
                    // final event; no reason to keep reading past it
                    if self.dispatcher.is_terminal() {
                        break;
                    }
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        if contains_completion_marker(&segment_text) {
            self.state.saw_completion_marker = true;
        }

        debug!(
            segment_bytes,
            pending = self.splitter.pending_len(),
            "Stream segment closed"
        );
        Ok(segment_bytes)
    }

    /// Whether another poll cycle is warranted: stop on a terminal
    /// classifier event, a completion marker latched from segment
    /// text, or the no-data ceiling.
    fn should_continue(&self) -> bool {
        if self.dispatcher.is_terminal() {
            return false;
        }

        if self.state.no_data_ticks >= self.config.max_no_data_ticks {
            warn!(
                minutes_waited = self.state.no_data_ticks / 60,
                "No-data ceiling reached, giving up on the stream"
            );
            return false;
        }

        !self.state.saw_completion_marker
    }

    /// Returns false if `close()` fired during the delay.
    async fn sleep_or_cancel(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn close_out(&mut self) -> StreamOutcome {
        debug!("Poll loop closed, discarding buffered remainder");
        self.splitter.clear();
        self.poll_state = PollState::Closed;
        StreamOutcome::Closed
    }
}

/// Completion phrases that can appear inside events the classifier does
/// not treat as terminal, e.g. wrapped or re-nested payloads.
fn contains_completion_marker(text: &str) -> bool {
    text.contains("\"stop_reason\"")
        || text.contains("\"event\":\"eot\"")
        || text.contains("\"type\":\"message_delta\"")
        || text.contains("\"subtype\":\"success\"")
}
