//! End-to-end sessions through the public API
//!
//! Sessions run over the in-memory transport with paused tokio time. The wire
//! text the client receives is checked against the documented JSON shapes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reelwire::{
    Frame, FrameFormat, FrameRenderer, InitRequest, Reelwire, RenderRequest, ServerMessage,
    SessionState, StreamConfig,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn small_config() -> StreamConfig {
    StreamConfig {
        frame_width: 24,
        frame_height: 16,
        block_latency_ms: 0,
        init_timeout_ms: 500,
        ..StreamConfig::default()
    }
}

/// Encodes `frame_index:segment_index:prompt` as the payload
#[derive(Default)]
struct LabelRenderer {
    seen: Mutex<Vec<(u64, usize)>>,
}

impl LabelRenderer {
    fn seen(&self) -> Vec<(u64, usize)> {
        self.seen.lock().unwrap().clone()
    }
}

impl FrameRenderer for LabelRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> reelwire::Result<Frame> {
        self.seen.lock().unwrap().push((request.frame_index, request.segment_index));
        let label = format!("{}:{}:{}", request.frame_index, request.segment_index, request.prompt);
        Ok(Frame::new(request.frame_index, label.into_bytes(), FrameFormat::Png))
    }
}

fn decode_label(message: &ServerMessage) -> String {
    match message {
        ServerMessage::Frame { data, .. } => {
            String::from_utf8(STANDARD.decode(data).expect("base64 payload")).expect("utf8 label")
        }
        other => panic!("Expected frame, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn default_request_streams_120_frames_in_order() {
    let renderer = Arc::new(LabelRenderer::default());
    let (mut client, session) = Reelwire::spawn_local_with(small_config(), renderer.clone());

    assert!(client.send_init(&InitRequest::with_prompts(["p0", "p1", "p2", "p3", "p4"])).await);
    let messages = client.collect().await;
    let outcome = session.await.unwrap();

    assert_eq!(messages.len(), 121);
    for (i, message) in messages[..120].iter().enumerate() {
        assert!(decode_label(message).starts_with(&format!("{i}:")));
    }
    assert_eq!(messages[120], ServerMessage::done(120));

    // Default switches split 120 frames into five segments of 24
    let seen = renderer.seen();
    assert_eq!(seen[23], (23, 0));
    assert_eq!(seen[24], (24, 1));
    assert_eq!(seen[119], (119, 4));

    assert_eq!(outcome.state, SessionState::Done);
    assert_eq!(outcome.chunks_sent, 4);
}

#[tokio::test(start_paused = true)]
async fn wire_messages_match_documented_shapes() {
    let (mut client, session) = Reelwire::spawn_local_with(small_config(), Arc::new(LabelRenderer::default()));

    assert!(client.send_text(json!({"prompts": ["only"], "blocks_per_chunk": 20}).to_string()).await);

    let first: Value = serde_json::from_str(&client.recv_text().await.unwrap()).unwrap();
    assert_eq!(first["type"], "frame");
    assert_eq!(first["frame_index"], 0);
    assert_eq!(first["format"], "png");
    assert_eq!(STANDARD.decode(first["data"].as_str().unwrap()).unwrap(), b"0:0:only");

    let mut last = String::new();
    while let Some(text) = client.recv_text().await {
        last = text;
    }
    assert_eq!(serde_json::from_str::<Value>(&last).unwrap(), json!({"type": "done", "total_frames": 120}));
    assert_eq!(session.await.unwrap().chunks_sent, 1);
}

#[tokio::test(start_paused = true)]
async fn reprompt_changes_only_the_tail_segment() {
    let (mut client, session) = Reelwire::spawn_local_with(small_config(), Arc::new(LabelRenderer::default()));

    let init = InitRequest {
        switch_frame_indices: Some(vec![40, 80]),
        reprompts: Some(vec!["storm".into()]),
        ..InitRequest::with_prompts(["dawn", "noon", "dusk"])
    };
    assert!(client.send_init(&init).await);
    let messages = client.collect().await;
    assert_eq!(session.await.unwrap().state, SessionState::Done);

    assert_eq!(decode_label(&messages[39]), "39:0:dawn");
    assert_eq!(decode_label(&messages[40]), "40:1:noon");
    assert_eq!(decode_label(&messages[80]), "80:2:storm");
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_get_one_error_message() {
    let cases = [
        json!({}),
        json!({"prompts": []}),
        json!({"prompts": ["a"], "blocks_per_chunk": 0}),
        json!({"prompts": ["a"], "blocks_per_chunk": 9223372036854775808u64}),
        json!({"prompts": ["a", "b"], "switch_frame_indices": [10, 20]}),
        json!({"prompts": ["a", "b", "c"], "switch_frame_indices": [50, 20]}),
    ];

    for case in cases {
        let (mut client, session) = Reelwire::spawn_local_with(small_config(), Arc::new(LabelRenderer::default()));
        assert!(client.send_text(case.to_string()).await);

        let messages = client.collect().await;
        assert!(matches!(messages.as_slice(), [ServerMessage::Error { .. }]), "{case}: {messages:?}");

        let outcome = session.await.unwrap();
        assert_eq!(outcome.state, SessionState::Error, "{case}");
        assert_eq!(outcome.frames_sent, 0);
    }
}

#[tokio::test(start_paused = true)]
async fn disconnect_mid_stream_stops_rendering() {
    let config = StreamConfig { block_latency_ms: 150, ..small_config() };
    let renderer = Arc::new(LabelRenderer::default());
    let (mut client, session) = Reelwire::spawn_local_with(config, renderer.clone());

    assert!(client.send_init(&InitRequest::with_prompts(["a"])).await);
    for _ in 0..30 {
        client.recv().await.expect("first chunk");
    }
    client.disconnect();

    let outcome = session.await.unwrap();
    assert_eq!(outcome.state, SessionState::Closed);
    assert_eq!(outcome.frames_sent, 30);
    assert_eq!(renderer.seen().len(), 30);
}

#[tokio::test(start_paused = true)]
async fn placeholder_renderer_serves_real_jpeg_frames() {
    let config = StreamConfig { total_frames: 12, ..small_config() };
    let (mut client, session) = Reelwire::spawn_local(config);

    assert!(client.send_init(&InitRequest::with_prompts(["a"])).await);
    let messages = client.collect().await;

    assert_eq!(messages.len(), 13);
    for message in &messages[..12] {
        match message {
            ServerMessage::Frame { data, format, .. } => {
                assert_eq!(*format, FrameFormat::Jpeg);
                assert!(STANDARD.decode(data).unwrap().starts_with(&[0xFF, 0xD8]));
            }
            other => panic!("Expected frame, got {other:?}"),
        }
    }
    assert_eq!(session.await.unwrap().frames_sent, 12);
}
