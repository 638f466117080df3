use serde_json::Value;

/// A wire event, classified by its `type` discriminant and nested shape.
///
/// The wire format is versionless and agent-defined, so classification
/// is deliberately permissive: anything that doesn't match a known
/// shape lands in `Unrecognized` and is given a best-effort text
/// extraction pass instead of failing the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// `type:"system"` — session/tooling narrative, never chat content.
    System(Value),
    /// `type:"user"` — user turns are rendered from local state by the
    /// caller, not reconstructed from the stream.
    User,
    /// `type:"tool_use"` at the top level.
    ToolUse(Value),
    /// `type:"tool_result"`.
    ToolResult(Value),
    /// `type:"assistant"` carrying a `message` field.
    Assistant(Value),
    /// `type:"result"` — terminal on success, error path otherwise.
    Result(Value),
    /// `type:"content_block_delta"` with `delta.text` — token-by-token
    /// assistant streaming.
    ContentDelta(String),
    /// `type:"message_delta"` with a `delta.stop_reason` — the message
    /// is done (terminal for the turn).
    MessageCompleted,
    /// `type:"meta"` with `event:"eot"` — explicit end of turn.
    EndOfTurn,
    /// `type:"error"` — the remote side's explicit failure signal.
    Error(Value),
    /// Anything else; routed through the fallback text chain.
    Unrecognized(Value),
}

/// Route a decoded wire object to its event kind. First match wins,
/// in the fixed taxonomy order.
pub fn classify(event: Value) -> StreamEvent {
    let event_type = event.get("type").and_then(Value::as_str).unwrap_or("");

    match event_type {
        "system" => StreamEvent::System(event),
        "user" => StreamEvent::User,
        "tool_use" => StreamEvent::ToolUse(event),
        "tool_result" => StreamEvent::ToolResult(event),
        "assistant" if event.get("message").is_some() => StreamEvent::Assistant(event),
        "result" => StreamEvent::Result(event),
        "content_block_delta" => match event.pointer("/delta/text").and_then(Value::as_str) {
            Some(text) => StreamEvent::ContentDelta(text.to_string()),
            None => StreamEvent::Unrecognized(event),
        },
        "message_delta"
            if event
                .pointer("/delta/stop_reason")
                .and_then(Value::as_str)
                .is_some_and(|reason| !reason.is_empty()) =>
        {
            StreamEvent::MessageCompleted
        }
        "meta" if event.get("event").and_then(Value::as_str) == Some("eot") => {
            StreamEvent::EndOfTurn
        }
        "error" => StreamEvent::Error(event),
        _ => StreamEvent::Unrecognized(event),
    }
}

/// Best-effort text extraction for unrecognized events. Tries, in
/// order: the raw string, `.text`, `.content` (string or `{text}`),
/// `.message` (string or `{content}`), `.response`. Returns `None`
/// when nothing yields a non-blank string, in which case the event is
/// a silent no-op.
pub fn extract_fallback_text(event: &Value) -> Option<String> {
    event
        .as_str()
        .and_then(non_blank)
        .or_else(|| event.get("text").and_then(Value::as_str).and_then(non_blank))
        .or_else(|| {
            let content = event.get("content")?;
            content
                .as_str()
                .and_then(non_blank)
                .or_else(|| content.get("text").and_then(Value::as_str).and_then(non_blank))
        })
        .or_else(|| {
            let message = event.get("message")?;
            message
                .as_str()
                .and_then(non_blank)
                .or_else(|| message.get("content").and_then(Value::as_str).and_then(non_blank))
        })
        .or_else(|| event.get("response").and_then(Value::as_str).and_then(non_blank))
}

fn non_blank(s: &str) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
