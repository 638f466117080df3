use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::StreamConfig;
use crate::error::Result;
use crate::poller::{PollLoop, StreamOutcome};
use crate::streaming::handlers::{
    ActionSink, ActivitySink, CostSink, EventDispatcher, TranscriptSink,
};
use crate::transport::{HttpTransport, Transport};

/// Composition root for one logical conversation turn.
///
/// Wires the splitter, classifier, and event dispatch into a single
/// poll loop over the given URL, targeting one transcript entry. A
/// session is single-use: construct a new one per turn.
///
/// `connect()` consumes the session and drives the stream to its
/// terminal state; grab a [`SessionHandle`] first to close it from
/// elsewhere.
pub struct StreamSession {
    url: String,
    transport: Arc<dyn Transport>,
    config: StreamConfig,
    dispatcher: EventDispatcher,
    cancel: CancellationToken,
}

/// Cheap clonable handle that can tear the session down from any task.
#[derive(Clone)]
pub struct SessionHandle {
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Abort the in-flight request and any pending retry delay.
    /// Idempotent, callable from any state; classifier output after
    /// the close is discarded rather than delivered.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl StreamSession {
    pub fn new(
        url: impl Into<String>,
        message_index: usize,
        transcript: Box<dyn TranscriptSink>,
        transport: Arc<dyn Transport>,
        config: StreamConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            url: url.into(),
            transport,
            config,
            dispatcher: EventDispatcher::new(transcript, message_index),
            cancel: CancellationToken::new(),
        })
    }

    /// Convenience constructor over the production HTTP transport.
    pub fn over_http(
        url: impl Into<String>,
        message_index: usize,
        transcript: Box<dyn TranscriptSink>,
        config: StreamConfig,
    ) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Self::new(url, message_index, transcript, transport, config)
    }

    pub fn with_action_sink(mut self, sink: ActionSink) -> Self {
        self.dispatcher = self.dispatcher.with_action_sink(sink);
        self
    }

    pub fn with_activity_sink(mut self, sink: ActivitySink) -> Self {
        self.dispatcher = self.dispatcher.with_activity_sink(sink);
        self
    }

    pub fn with_cost_sink(mut self, sink: CostSink) -> Self {
        self.dispatcher = self.dispatcher.with_cost_sink(sink);
        self
    }

    /// Handle for closing the session while `connect()` is running.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            cancel: self.cancel.clone(),
        }
    }

    /// Close before `connect()`; afterwards, use the handle.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Run the stream to its terminal state.
    pub async fn connect(self) -> StreamOutcome {
        info!(url = %self.url, transport = self.transport.name(), "Opening stream session");

        let mut poller = PollLoop::new(
            self.url,
            self.transport,
            self.config,
            self.dispatcher,
            self.cancel,
        );
        let outcome = poller.run().await;

        info!(?outcome, "Stream session finished");
        outcome
    }
}
