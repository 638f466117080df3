mod common;

use agent_stream_client::config::StreamConfig;
use agent_stream_client::models::AgentAction;
use agent_stream_client::poller::StreamOutcome;
use agent_stream_client::session::StreamSession;
use common::{ScriptedTransport, Segment, SharedTranscript, recording_action_sink};

/// Full conversation turn: system init, assistant text, streamed delta,
/// a Write tool call, and a stop reason — delivered in chunks that cut
/// JSON objects mid-string.
#[tokio::test(start_paused = true)]
async fn full_turn_reconstructs_transcript_and_actions() {
    common::init_tracing();
    let transport = ScriptedTransport::new(vec![Segment::Chunks(vec![
        r#"{"type":"system","subtype":"init","tools":["Bash"]}{"type":"assi"#,
        r#"stant","message":{"content":[{"type":"text","text":"Sure, "}]}}{"type":"conte"#,
        r#"nt_block_delta","delta":{"text":"addi"#,
        r#"ng a file."}}{"type":"tool_use","name":"Write","input":{"file_path":"/app.ts","cont"#,
        r#"ent":"console.log(1)"}}{"type":"message_delta","delta":{"stop_reason":"end_turn"}}"#,
    ])]);
    let transcript = SharedTranscript::with_empty_assistant();
    let (action_sink, actions) = recording_action_sink();

    let session = StreamSession::new(
        "http://test/stream",
        0,
        Box::new(transcript.clone()),
        transport.clone(),
        StreamConfig::default(),
    )
    .unwrap()
    .with_action_sink(action_sink);

    let outcome = session.connect().await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(transport.fetches(), 1);

    // The assistant message replaced the entry with "Sure, ", then the
    // delta appended onto it.
    assert_eq!(transcript.content_at(0), "Sure, adding a file.");

    let actions = actions.lock().unwrap();
    assert_eq!(
        *actions,
        vec![AgentAction::Write {
            path: "/app.ts".to_string(),
            content: "console.log(1)".to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn result_success_wins_over_later_events_in_the_same_segment() {
    let transport = ScriptedTransport::new(vec![Segment::Chunks(vec![
        r#"{"type":"result","subtype":"success","result":"Final answer."}"#,
        r#"{"type":"content_block_delta","delta":{"text":"stale tail"}}"#,
        r#"{"type":"error","message":"late failure"}"#,
    ])]);
    let transcript = SharedTranscript::with_empty_assistant();

    let session = StreamSession::new(
        "http://test/stream",
        0,
        Box::new(transcript.clone()),
        transport.clone(),
        StreamConfig::default(),
    )
    .unwrap();

    let outcome = session.connect().await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(transcript.content_at(0), "Final answer.");
}

#[tokio::test(start_paused = true)]
async fn protocol_error_replaces_transcript_and_ends_session() {
    let transport = ScriptedTransport::new(vec![Segment::Chunks(vec![
        r#"{"type":"content_block_delta","delta":{"text":"working on"#,
        r#" it"}}{"type":"error","message":"model overloaded"}"#,
    ])]);
    let transcript = SharedTranscript::with_empty_assistant();

    let session = StreamSession::new(
        "http://test/stream",
        0,
        Box::new(transcript.clone()),
        transport.clone(),
        StreamConfig::default(),
    )
    .unwrap();

    let outcome = session.connect().await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(transport.fetches(), 1);
    assert_eq!(transcript.content_at(0), "model overloaded");
}

#[tokio::test(start_paused = true)]
async fn redelivered_tool_use_across_segments_emits_twice() {
    // At-least-once delivery: a reconnect may replay an event, and the
    // core does not deduplicate. That is the sink's responsibility.
    let tool_use =
        r#"{"type":"tool_use","name":"Bash","input":{"command":"npm run build"}}"#;
    let transport = ScriptedTransport::new(vec![
        Segment::Chunks(vec![tool_use]),
        Segment::Chunks(vec![tool_use, r#"{"type":"meta","event":"eot"}"#]),
    ]);
    let transcript = SharedTranscript::with_empty_assistant();
    let (action_sink, actions) = recording_action_sink();

    let session = StreamSession::new(
        "http://test/stream",
        0,
        Box::new(transcript.clone()),
        transport.clone(),
        StreamConfig::default(),
    )
    .unwrap()
    .with_action_sink(action_sink);

    let outcome = session.connect().await;

    assert_eq!(outcome, StreamOutcome::Completed);
    let actions = actions.lock().unwrap();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0], actions[1]);
}

#[tokio::test(start_paused = true)]
async fn cost_is_forwarded_from_successful_results() {
    let transport = ScriptedTransport::new(vec![Segment::Chunks(vec![
        r#"{"type":"result","subtype":"success","result":"done","cost_usd":0.0137,"session_id":"sess-42"}"#,
    ])]);
    let transcript = SharedTranscript::with_empty_assistant();

    let costs = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink_costs = costs.clone();

    let session = StreamSession::new(
        "http://test/stream",
        0,
        Box::new(transcript.clone()),
        transport.clone(),
        StreamConfig::default(),
    )
    .unwrap()
    .with_cost_sink(Box::new(move |usd, session_id| {
        sink_costs.lock().unwrap().push((usd, session_id));
    }));

    let outcome = session.connect().await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(transcript.content_at(0), "done");
    let costs = costs.lock().unwrap();
    assert_eq!(*costs, vec![(0.0137, Some("sess-42".to_string()))]);
}

#[tokio::test(start_paused = true)]
async fn malformed_span_does_not_derail_the_turn() {
    let transport = ScriptedTransport::new(vec![Segment::Chunks(vec![
        r#"{"type":"content_block_delta","delta": }"#,
        r#"{"type":"content_block_delta","delta":{"text":"recovered"}}"#,
        r#"{"type":"meta","event":"eot"}"#,
    ])]);
    let transcript = SharedTranscript::with_empty_assistant();

    let session = StreamSession::new(
        "http://test/stream",
        0,
        Box::new(transcript.clone()),
        transport.clone(),
        StreamConfig::default(),
    )
    .unwrap();

    let outcome = session.connect().await;

    assert_eq!(outcome, StreamOutcome::Completed);
    assert_eq!(transcript.content_at(0), "recovered");
}
