//! # Agent Stream Client
//!
//! An incremental client for long-lived, chunked HTTP responses whose
//! body is a continuous sequence of back-to-back JSON objects (no outer
//! array, no delimiters beyond balanced braces).
//!
//! ## Overview
//!
//! The client reconstructs discrete JSON messages from arbitrarily
//! fragmented byte chunks, classifies each message into a small
//! taxonomy of event kinds, and drives two observable outputs:
//!
//! - an incrementally-updated chat transcript (append deltas, replace
//!   for terminal messages), and
//! - a typed log of agent actions (file writes, file edits, shell
//!   commands) extracted from nested tool-call payloads.
//!
//! It survives indefinite server stalls and transient transport
//! failures by re-polling the endpoint with a tiered backoff schedule,
//! and never corrupts the transcript when messages terminate mid-chunk.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agent_stream_client::{StreamConfig, StreamSession, TranscriptSink, TranscriptMessage};
//!
//! struct Transcript(Vec<TranscriptMessage>);
//!
//! impl TranscriptSink for Transcript {
//!     fn append_to_message(&mut self, index: usize, text: &str) {
//!         self.0[index].content.push_str(text);
//!     }
//!     fn replace_message(&mut self, index: usize, message: TranscriptMessage) {
//!         self.0[index] = message;
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let transcript = Transcript(vec![TranscriptMessage::assistant("")]);
//! let session = StreamSession::over_http(
//!     "http://localhost:3000/api/stream/turn-1",
//!     0,
//!     Box::new(transcript),
//!     StreamConfig::default(),
//! )?
//! .with_action_sink(Box::new(|action| println!("agent action: {:?}", action)));
//!
//! let handle = session.handle(); // call handle.close() to tear down early
//! let outcome = session.connect().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`] - Polling/backoff policy knobs and loading
//! - [`error`] - Error types and handling
//! - [`models`] - Transcript, action, and activity data structures
//! - [`poller`] - The reconnect/backoff state machine
//! - [`session`] - Per-turn composition root
//! - [`streaming`] - Brace-aware splitter, classifier, event dispatch
//! - [`transport`] - HTTP transport seam

pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod session;
pub mod streaming;
pub mod transport;

pub use config::StreamConfig;
pub use error::{Result, StreamError};
pub use models::{Activity, ActivityKind, AgentAction, Role, TranscriptMessage};
pub use poller::{PollState, StreamOutcome};
pub use session::{SessionHandle, StreamSession};
pub use streaming::{BraceAwareSplitter, EventDispatcher, StreamEvent, TranscriptSink, classify};
pub use transport::{ByteStream, FetchFuture, HttpTransport, Transport, TransportError};
