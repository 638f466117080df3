pub mod classify;
pub mod handlers;
pub mod splitter;

pub use classify::{StreamEvent, classify, extract_fallback_text};
pub use handlers::{
    ActionSink, ActivitySink, CostSink, EventDispatcher, TranscriptSink, TurnOutcome,
    extract_action,
};
pub use splitter::BraceAwareSplitter;
