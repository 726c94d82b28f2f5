//! Test utilities shared by unit tests and benchmarks
//!
//! Provides fast configurations, parameter builders and renderers with controlled
//! behaviour (stub, recording, failing) so the scheduler and session can be tested
//! without image encoding cost.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::Mutex;

use crate::config::StreamConfig;
use crate::handshake::SessionParams;
use crate::planner::SegmentPlan;
use crate::renderer::{FrameRenderer, RenderRequest};
use crate::types::{Frame, FrameFormat};
use crate::{Result, SessionError};

/// Default configuration with tiny frames and no block latency
pub fn fast_config() -> StreamConfig {
    StreamConfig {
        frame_width: 32,
        frame_height: 18,
        block_latency_ms: 0,
        init_timeout_ms: 1_000,
        write_timeout_ms: 1_000,
        ..StreamConfig::default()
    }
}

/// Build session parameters directly, bypassing the handshake
pub fn session_params(
    prompts: &[&str],
    switch_frame_indices: &[u64],
    reprompts: &[&str],
    blocks_per_chunk: u64,
    total_frames: u64,
    frames_per_block: u64,
) -> SessionParams {
    let prompts = prompts.iter().map(|p| p.to_string()).collect();
    let reprompts: Vec<String> = reprompts.iter().map(|p| p.to_string()).collect();
    let plan = SegmentPlan::new(prompts, switch_frame_indices.to_vec(), &reprompts)
        .expect("test plan must be valid");
    SessionParams { total_frames, frames_per_block, blocks_per_chunk, plan }
}

/// Renderer emitting the frame index as an 8-byte payload
#[derive(Debug, Default, Clone, Copy)]
pub struct StubRenderer;

impl FrameRenderer for StubRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Frame> {
        Ok(Frame::new(request.frame_index, request.frame_index.to_le_bytes().to_vec(), FrameFormat::Jpeg))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// One observed render call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCall {
    pub frame_index: u64,
    pub prompt: String,
    pub segment_index: usize,
    pub segment_count: usize,
}

/// Stub renderer that remembers every request it saw
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    calls: Mutex<Vec<RenderCall>>,
}

impl RecordingRenderer {
    /// Calls seen so far, in order
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl FrameRenderer for RecordingRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Frame> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RenderCall {
                frame_index: request.frame_index,
                prompt: request.prompt.to_string(),
                segment_index: request.segment_index,
                segment_count: request.segment_count,
            });
        }
        StubRenderer.render(request)
    }
}

/// Stub renderer that fails on one frame
#[derive(Debug, Clone, Copy)]
pub struct FailingRenderer {
    fail_at: u64,
}

impl FailingRenderer {
    pub fn at(fail_at: u64) -> Self {
        Self { fail_at }
    }
}

impl FrameRenderer for FailingRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Frame> {
        if request.frame_index == self.fail_at {
            return Err(SessionError::render_failed(request.frame_index, "simulated device fault"));
        }
        StubRenderer.render(request)
    }
}
