//! Block-by-block generation loop that groups frames into chunks

use futures::Stream;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::handshake::SessionParams;
use crate::renderer::{FrameRenderer, RenderRequest};
use crate::types::{Chunk, Frame};
use crate::{Result, SessionError};

/// Lazy producer of the chunks for one session.
///
/// Each call to [`next_chunk`](Self::next_chunk) runs as many blocks as needed to
/// fill one chunk. A block waits out the simulated compute latency (the only
/// suspension point, and the only place cancellation is observed), resolves its
/// segment from its first frame, then renders its frames into the buffer.
///
/// The scheduler is consumed once: after the final chunk, an error, or a
/// cancellation it yields nothing further.
pub struct ChunkScheduler {
    params: SessionParams,
    renderer: Arc<dyn FrameRenderer>,
    block_latency: Duration,
    cancel: CancellationToken,

    /// Next block to run
    block_index: u64,
    /// Next chunk index to assign
    chunk_index: u64,
    /// Frames rendered but not yet flushed
    buffer: Vec<Frame>,
    exhausted: bool,
}

impl ChunkScheduler {
    /// Create a scheduler that is never cancelled
    pub fn new(
        params: SessionParams,
        renderer: Arc<dyn FrameRenderer>,
        block_latency: Duration,
    ) -> Self {
        let capacity = params.chunk_frames().min(params.total_frames) as usize;
        Self {
            params,
            renderer,
            block_latency,
            cancel: CancellationToken::new(),
            block_index: 0,
            chunk_index: 0,
            buffer: Vec::with_capacity(capacity),
            exhausted: false,
        }
    }

    /// Abort at the next block boundary once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether the final chunk has been produced or the run was aborted
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Produce the next chunk
    ///
    /// Returns:
    /// - `Ok(Some(chunk))` - next chunk, `chunk.is_final` set on the last one
    /// - `Ok(None)` - every chunk has been produced
    /// - `Err(SessionError::Disconnected)` - cancelled at a block boundary
    /// - `Err(SessionError::Render { .. })` - the renderer failed
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        if self.exhausted {
            return Ok(None);
        }

        let num_blocks = self.params.num_blocks();
        let chunk_frames = self.params.chunk_frames() as usize;

        while self.block_index < num_blocks {
            if let Err(e) = self.run_block().await {
                self.abort();
                return Err(e);
            }

            let is_final = self.block_index == num_blocks - 1;
            self.block_index += 1;

            if self.buffer.len() >= chunk_frames || is_final {
                return Ok(Some(self.flush(is_final)));
            }
        }

        self.exhausted = true;
        Ok(None)
    }

    /// Turn the scheduler into a stream of chunks.
    ///
    /// The stream ends after the final chunk, or right after yielding the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Chunk>> + Send + 'static {
        futures::stream::unfold(Some(self), |state| async move {
            let mut scheduler = state?;
            match scheduler.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(scheduler))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    async fn run_block(&mut self) -> Result<()> {
        // Suspension point: stands in for inference compute
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Cancelled before block {}", self.block_index);
                return Err(SessionError::Disconnected);
            }
            _ = tokio::time::sleep(self.block_latency) => {}
        }

        let start = self.block_index * self.params.frames_per_block;
        let end = (start + self.params.frames_per_block).min(self.params.total_frames);
        let plan = &self.params.plan;
        let segment_index = plan.segment_for_frame(start);
        let prompt = plan.prompt_for_segment(segment_index);

        trace!(
            "Block {}: frames {}..{} segment {} prompt {:?}",
            self.block_index, start, end, segment_index, prompt
        );

        for frame_index in start..end {
            let request = RenderRequest {
                frame_index,
                total_frames: self.params.total_frames,
                prompt,
                segment_index,
                segment_count: plan.segment_count(),
            };
            let frame = self.renderer.render(&request)?;
            if frame.index != frame_index {
                return Err(SessionError::render_failed(
                    frame_index,
                    format!("renderer returned frame {} instead", frame.index),
                ));
            }
            self.buffer.push(frame);
        }

        Ok(())
    }

    fn flush(&mut self, is_final: bool) -> Chunk {
        let frames = std::mem::take(&mut self.buffer);
        let chunk = Chunk { index: self.chunk_index, frames, is_final };
        self.chunk_index += 1;
        if is_final {
            self.exhausted = true;
        }
        debug!(
            "Flushed chunk {} ({} frames, final={})",
            chunk.index,
            chunk.len(),
            chunk.is_final
        );
        chunk
    }

    fn abort(&mut self) {
        self.buffer.clear();
        self.exhausted = true;
        self.block_index = self.params.num_blocks();
    }
}
