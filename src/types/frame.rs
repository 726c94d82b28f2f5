//! Frame and chunk types produced by the generation loop

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Encoding of a frame payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    #[default]
    Jpeg,
    Png,
}

impl FrameFormat {
    /// Wire tag carried in the `format` field of frame messages
    pub fn as_str(self) -> &'static str {
        match self {
            FrameFormat::Jpeg => "jpeg",
            FrameFormat::Png => "png",
        }
    }
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rendered video frame
///
/// The payload is shared (`Arc<[u8]>`) so frames can be cloned into test
/// recorders and benchmarks without copying image data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Position in the session, starting at 0
    pub index: u64,

    /// Encoded image bytes
    pub payload: Arc<[u8]>,

    /// Encoding of `payload`
    pub format: FrameFormat,
}

impl Frame {
    /// Create a new frame
    pub fn new(index: u64, payload: Vec<u8>, format: FrameFormat) -> Self {
        Self { index, payload: payload.into(), format }
    }
}

/// A group of frames transmitted together
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Monotonic chunk counter, starting at 0
    pub index: u64,

    /// Frames in ascending index order
    pub frames: Vec<Frame>,

    /// Set on the last chunk of the session
    pub is_final: bool,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
