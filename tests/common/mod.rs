#![allow(dead_code)]

use agent_stream_client::models::{AgentAction, TranscriptMessage};
use agent_stream_client::streaming::TranscriptSink;
use agent_stream_client::transport::{
    ByteStream, FetchFuture, Transport, TransportError, TransportErrorKind,
};
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Opt-in log output for debugging test runs (RUST_LOG=debug).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One scripted response segment: body chunks delivered in order, then
/// either a clean EOF or a failure. An exhausted script keeps serving
/// empty bodies, which the poll loop sees as empty polls.
pub enum Segment {
    Chunks(Vec<&'static str>),
    ChunksThenError(Vec<&'static str>, TransportErrorKind),
    /// Delivers the chunks, then holds the connection open forever.
    ChunksThenStall(Vec<&'static str>),
    FailBeforeBody(TransportErrorKind),
}

pub struct ScriptedTransport {
    segments: Mutex<VecDeque<Segment>>,
    fetch_count: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(segments: Vec<Segment>) -> Arc<Self> {
        Arc::new(Self {
            segments: Mutex::new(segments.into()),
            fetch_count: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn fetch(&self, _url: &str) -> FetchFuture {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let segment = self.segments.lock().unwrap().pop_front();

        Box::pin(async move {
            match segment {
                Some(Segment::FailBeforeBody(kind)) => {
                    Err(TransportError::new(kind, "scripted connect failure"))
                }
                Some(Segment::Chunks(chunks)) => Ok(chunk_stream(chunks, None)),
                Some(Segment::ChunksThenError(chunks, kind)) => {
                    Ok(chunk_stream(chunks, Some(kind)))
                }
                Some(Segment::ChunksThenStall(chunks)) => Ok(stalling_stream(chunks)),
                None => Ok(chunk_stream(Vec::new(), None)),
            }
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn chunk_stream(chunks: Vec<&'static str>, trailing_error: Option<TransportErrorKind>) -> ByteStream {
    let mut items: Vec<Result<Bytes, TransportError>> = chunks
        .into_iter()
        .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
        .collect();
    if let Some(kind) = trailing_error {
        items.push(Err(TransportError::new(kind, "scripted mid-stream failure")));
    }
    Box::pin(stream::iter(items))
}

fn stalling_stream(chunks: Vec<&'static str>) -> ByteStream {
    let items: Vec<Result<Bytes, TransportError>> = chunks
        .into_iter()
        .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
        .collect();
    Box::pin(stream::iter(items).chain(stream::pending()))
}

/// Vec-backed transcript store shared between the test and the session.
#[derive(Clone, Default)]
pub struct SharedTranscript {
    messages: Arc<Mutex<Vec<TranscriptMessage>>>,
}

impl SharedTranscript {
    /// Pre-populates the assistant entry the session will target, the
    /// way a caller assigns the index before streaming starts.
    pub fn with_empty_assistant() -> Self {
        let transcript = Self::default();
        transcript
            .messages
            .lock()
            .unwrap()
            .push(TranscriptMessage::assistant(""));
        transcript
    }

    pub fn content_at(&self, index: usize) -> String {
        self.messages.lock().unwrap()[index].content.clone()
    }
}

impl TranscriptSink for SharedTranscript {
    fn append_to_message(&mut self, index: usize, text: &str) {
        self.messages.lock().unwrap()[index].content.push_str(text);
    }

    fn replace_message(&mut self, index: usize, message: TranscriptMessage) {
        self.messages.lock().unwrap()[index] = message;
    }
}

/// Action sink that records everything it sees, in order.
pub fn recording_action_sink() -> (
    Box<dyn FnMut(AgentAction) + Send>,
    Arc<Mutex<Vec<AgentAction>>>,
) {
    let actions = Arc::new(Mutex::new(Vec::new()));
    let sink_actions = actions.clone();
    let sink = Box::new(move |action| {
        sink_actions.lock().unwrap().push(action);
    });
    (sink, actions)
}
