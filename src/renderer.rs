//! Renderer trait for frame producers

use crate::Result;
use crate::types::Frame;

/// Everything a renderer is told about the frame it should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest<'a> {
    /// Index of the frame within the session
    pub frame_index: u64,

    /// Frames in the whole session
    pub total_frames: u64,

    /// Prompt in effect for this frame
    pub prompt: &'a str,

    /// Active segment (may exceed `segment_count - 1` when boundaries outnumber prompts)
    pub segment_index: usize,

    /// Number of prompt segments
    pub segment_count: usize,
}

impl RenderRequest<'_> {
    /// Normalized position in the session, `0.0` for the first frame and `1.0` for the last
    pub fn progress(&self) -> f32 {
        self.frame_index as f32 / self.total_frames.saturating_sub(1).max(1) as f32
    }
}

/// Trait for frame producers
///
/// Renderers stand in for the inference backend. The session treats them as pure:
/// the returned frame may depend only on the request, never on hidden per-session
/// state, so one renderer instance is shared by every connection.
///
/// Rendering is synchronous. The scheduler calls it between block suspension
/// points, so a slow renderer delays the session but cannot be interrupted mid-block.
pub trait FrameRenderer: Send + Sync + 'static {
    /// Produce the frame described by `request`
    ///
    /// Returns:
    /// - `Ok(frame)` - frame with `frame.index == request.frame_index`
    /// - `Err(e)` - render failure; ends the session with an error message
    fn render(&self, request: &RenderRequest<'_>) -> Result<Frame>;

    /// Short name used in logs
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
