use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Speaker of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat transcript entry.
///
/// The core addresses entries by an index assigned by the caller before
/// streaming starts, and only ever appends to or wholesale-replaces the
/// entry at that index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl TranscriptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: now_ms(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// File and shell instructions extracted from `tool_use` payloads.
///
/// Actions are append-only and ordered by emission time; the core does
/// not deduplicate re-delivered events, that is the sink's call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentAction {
    Write {
        path: String,
        content: String,
    },
    Edit {
        path: String,
        old_string: String,
        new_string: String,
    },
    Bash {
        command: String,
    },
}

/// Narrative progress descriptor for UI consumption ("initializing",
/// "executing: Bash", ...). Purely observational.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub kind: ActivityKind,
    pub description: String,
    pub details: Option<Value>,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    System,
    ToolUse,
    ToolResult,
    Error,
}

impl Activity {
    pub fn new(kind: ActivityKind, description: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            kind,
            description: description.into(),
            details,
            timestamp: now_ms(),
        }
    }
}

/// Per-connect bookkeeping owned by the poll loop. Created fresh on
/// every `connect()` and discarded on close.
#[derive(Debug, Default)]
pub struct ConnectionState {
    pub has_received_data: bool,
    pub message_count: u64,
    /// Latched once a completion marker is spotted in segment text;
    /// segment bodies themselves are not retained.
    pub saw_completion_marker: bool,
    pub no_data_ticks: u32,
}
