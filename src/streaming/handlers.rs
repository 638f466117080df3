use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::models::{Activity, ActivityKind, AgentAction, TranscriptMessage};
use crate::streaming::classify::{StreamEvent, extract_fallback_text};

/// Receives transcript mutations for the entry the core was pointed at.
/// Implemented by the caller's store; the core never reads it back.
pub trait TranscriptSink: Send {
    /// Append streamed text to the content of the entry at `index`.
    fn append_to_message(&mut self, index: usize, text: &str);

    /// Replace the entry at `index` wholesale.
    fn replace_message(&mut self, index: usize, message: TranscriptMessage);
}

/// Receives extracted agent actions, in emission order.
pub type ActionSink = Box<dyn FnMut(AgentAction) + Send>;

/// Receives the current activity descriptor; `None` clears it.
pub type ActivitySink = Box<dyn FnMut(Option<Activity>) + Send>;

/// Receives `(cost_usd, session_id)` from successful results.
pub type CostSink = Box<dyn FnMut(f64, Option<String>) + Send>;

/// How the turn ended, once a terminal event has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// `message_delta` stop reason, end-of-turn meta, or a successful
    /// result.
    Completed,
    /// Protocol-declared error, or transport failure surfaced after
    /// retries.
    Errored,
}

/// Routes classified events into transcript updates, agent actions,
/// and activity narration.
///
/// Once a terminal event has been dispatched the dispatcher latches:
/// later events are discarded so the transcript entry for this turn is
/// never mutated after its final content (or its single error
/// replacement) lands.
pub struct EventDispatcher {
    transcript: Box<dyn TranscriptSink>,
    message_index: usize,
    on_action: Option<ActionSink>,
    on_activity: Option<ActivitySink>,
    on_cost: Option<CostSink>,
    outcome: Option<TurnOutcome>,
}

impl EventDispatcher {
    pub fn new(transcript: Box<dyn TranscriptSink>, message_index: usize) -> Self {
        Self {
            transcript,
            message_index,
            on_action: None,
            on_activity: None,
            on_cost: None,
            outcome: None,
        }
    }

    pub fn with_action_sink(mut self, sink: ActionSink) -> Self {
        self.on_action = Some(sink);
        self
    }

    pub fn with_activity_sink(mut self, sink: ActivitySink) -> Self {
        self.on_activity = Some(sink);
        self
    }

    pub fn with_cost_sink(mut self, sink: CostSink) -> Self {
        self.on_cost = Some(sink);
        self
    }

    /// Whether a terminal event has been observed.
    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<TurnOutcome> {
        self.outcome
    }

    pub fn dispatch(&mut self, event: StreamEvent) {
        if self.outcome.is_some() {
            debug!("Discarding event received after terminal state");
            return;
        }

        match event {
            StreamEvent::System(value) => self.on_system(&value),
            // User turns are rendered from local state, not the stream.
            // Flagged for product confirmation; preserved as a no-op.
            StreamEvent::User => {}
            StreamEvent::ToolUse(value) => self.on_tool_use(&value),
            StreamEvent::ToolResult(value) => self.on_tool_result(&value),
            StreamEvent::Assistant(value) => self.on_assistant(&value),
            StreamEvent::Result(value) => self.on_result(&value),
            StreamEvent::ContentDelta(text) => {
                self.transcript.append_to_message(self.message_index, &text);
            }
            StreamEvent::MessageCompleted | StreamEvent::EndOfTurn => {
                self.finish(TurnOutcome::Completed);
            }
            StreamEvent::Error(value) => self.on_error(&value),
            StreamEvent::Unrecognized(value) => self.on_unrecognized(&value),
        }
    }

    /// Terminal replacement for transport failures that exhausted the
    /// retry policy. A no-op if the turn already ended, so the UI sees
    /// either final content or exactly one error replacement.
    pub fn fail_connection(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        self.transcript.replace_message(
            self.message_index,
            TranscriptMessage::assistant(
                "Sorry, there was a connection issue with the stream. Your backend might \
                 still be processing the request. The system will wait up to 30+ minutes \
                 for responses.",
            ),
        );
        self.finish(TurnOutcome::Errored);
    }

    fn on_system(&mut self, event: &Value) {
        let subtype = event.get("subtype").and_then(Value::as_str);
        let activity = if subtype == Some("init") {
            Activity::new(
                ActivityKind::System,
                "Initializing development environment",
                Some(json!({
                    "tools": event.get("tools").cloned().unwrap_or_else(|| json!([])),
                    "model": event.get("model").cloned().unwrap_or(Value::Null),
                    "session": event.get("session_id").cloned().unwrap_or(Value::Null),
                })),
            )
        } else {
            Activity::new(
                ActivityKind::System,
                format!("System: {}", subtype.unwrap_or("processing")),
                Some(event.clone()),
            )
        };
        self.emit_activity(Some(activity));
    }

    fn on_tool_use(&mut self, event: &Value) {
        let name = event
            .get("name")
            .or_else(|| event.get("tool_name"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown Tool");

        self.emit_activity(Some(Activity::new(
            ActivityKind::ToolUse,
            format!("Executing: {}", name),
            event
                .get("input")
                .filter(|input| !input.is_null())
                .cloned()
                .or_else(|| Some(event.clone())),
        )));

        let input = event.get("input").cloned().unwrap_or(Value::Null);
        if let Some(action) = extract_action(name, &input) {
            self.emit_action(action);
        }
    }

    fn on_tool_result(&mut self, event: &Value) {
        let is_error = event
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let description = if is_error {
            "Tool execution failed"
        } else {
            "Tool completed successfully"
        };
        self.emit_activity(Some(Activity::new(
            ActivityKind::ToolResult,
            description,
            Some(event.clone()),
        )));
    }

    fn on_assistant(&mut self, event: &Value) {
        let Some(content) = event.pointer("/message/content") else {
            return;
        };

        // Content arrays can carry tool_use items alongside text parts
        if let Value::Array(items) = content {
            for item in items {
                if item.get("type").and_then(Value::as_str) == Some("tool_use") {
                    let name = item.get("name").and_then(Value::as_str).unwrap_or("");
                    let input = item.get("input").cloned().unwrap_or(Value::Null);
                    if let Some(action) = extract_action(name, &input) {
                        self.emit_action(action);
                    }
                }
            }
        }

        let text = match content {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<String>(),
            other => match other.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => {
                    warn!("Assistant content did not reduce to text, skipping");
                    return;
                }
            },
        };

        let text = strip_object_artifact(&text);
        if text.trim().is_empty() {
            return;
        }
        self.transcript
            .replace_message(self.message_index, TranscriptMessage::assistant(text));
    }

    fn on_result(&mut self, event: &Value) {
        if event.get("subtype").and_then(Value::as_str) == Some("success") {
            if let Some(result_text) = event.get("result").and_then(Value::as_str) {
                self.transcript.replace_message(
                    self.message_index,
                    TranscriptMessage::assistant(result_text),
                );
            }

            if let Some(cost) = event.get("cost_usd").and_then(Value::as_f64)
                && let Some(on_cost) = self.on_cost.as_mut()
            {
                let session_id = event
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                on_cost(cost, session_id);
            }

            self.finish(TurnOutcome::Completed);
        } else {
            self.on_error(event);
        }
    }

    fn on_error(&mut self, event: &Value) {
        self.emit_activity(Some(Activity::new(
            ActivityKind::Error,
            "Error occurred",
            Some(event.clone()),
        )));

        let message = event
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("An error occurred while processing your request.");
        self.transcript
            .replace_message(self.message_index, TranscriptMessage::assistant(message));
        self.finish(TurnOutcome::Errored);
    }

    fn on_unrecognized(&mut self, event: &Value) {
        match extract_fallback_text(event) {
            Some(text) => self.transcript.append_to_message(self.message_index, &text),
            None => debug!("Ignoring event with no extractable text"),
        }
    }

    fn finish(&mut self, outcome: TurnOutcome) {
        self.outcome = Some(outcome);
        self.emit_activity(None);
    }

    fn emit_activity(&mut self, activity: Option<Activity>) {
        if let Some(sink) = self.on_activity.as_mut() {
            sink(activity);
        }
    }

    fn emit_action(&mut self, action: AgentAction) {
        if let Some(sink) = self.on_action.as_mut() {
            sink(action);
        }
    }
}

/// Pull a Write/Edit/Bash instruction out of a tool_use payload.
/// Missing required fields mean no action, not an error.
pub fn extract_action(name: &str, input: &Value) -> Option<AgentAction> {
    match name {
        "Write" => Some(AgentAction::Write {
            path: input.get("file_path")?.as_str()?.to_string(),
            content: input.get("content")?.as_str()?.to_string(),
        }),
        "Edit" => Some(AgentAction::Edit {
            path: input.get("file_path")?.as_str()?.to_string(),
            old_string: input.get("old_string")?.as_str()?.to_string(),
            new_string: input.get("new_string")?.as_str()?.to_string(),
        }),
        "Bash" => Some(AgentAction::Bash {
            command: input.get("command")?.as_str()?.to_string(),
        }),
        _ => None,
    }
}

/// Streams occasionally deliver a stringified object into what should
/// be text content; drop the artifact prefix rather than render it.
fn strip_object_artifact(text: &str) -> &str {
    text.strip_prefix("[object Object]").unwrap_or(text)
}
