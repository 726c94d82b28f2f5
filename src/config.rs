//! Process-wide stream configuration.
//!
//! A [`StreamConfig`] is built once at startup (from defaults or a YAML file) and
//! shared read-only with every session through an `Arc`. Nothing in the crate reads
//! configuration from global state.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::types::FrameFormat;
use crate::{Result, SessionError};

/// Monospace font used for the overlay when none is configured
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf";

/// Immutable settings shared by all sessions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Frame width in pixels
    pub frame_width: u32,

    /// Frame height in pixels
    pub frame_height: u32,

    /// Frames in a full video
    pub total_frames: u64,

    /// Frames produced per block of simulated compute
    pub frames_per_block: u64,

    /// Nominal playback rate. Informational only; pacing comes from block latency.
    pub fps: u32,

    /// Simulated per-block compute latency
    pub block_latency_ms: u64,

    /// Blocks per chunk when the client does not say
    pub default_blocks_per_chunk: u64,

    /// Segment count used to derive evenly spaced default switch indices
    pub default_segment_count: u64,

    /// Explicit default switch indices, overriding the derived ones
    pub default_switch_frame_indices: Option<Vec<u64>>,

    /// Encoding used by the placeholder renderer
    pub output_format: FrameFormat,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Background hue per segment, cycled when there are more segments
    pub segment_hues: Vec<f32>,

    /// TrueType font for the placeholder text overlay. `None` draws no text.
    pub font_path: Option<PathBuf>,

    /// Overlay text size in pixels
    pub font_size: f32,

    /// How long a new connection may wait before sending its init message
    pub init_timeout_ms: u64,

    /// Upper bound on a single outbound write
    pub write_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_width: 832,
            frame_height: 480,
            total_frames: 120,
            frames_per_block: 6,
            fps: 16,
            block_latency_ms: 150,
            default_blocks_per_chunk: 5,
            default_segment_count: 5,
            default_switch_frame_indices: None,
            output_format: FrameFormat::Jpeg,
            jpeg_quality: 90,
            segment_hues: vec![0.0, 0.08, 0.33, 0.58, 0.75],
            font_path: Some(PathBuf::from(DEFAULT_FONT_PATH)),
            font_size: 14.0,
            init_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
        }
    }
}

impl StreamConfig {
    /// Parse and validate a YAML document. Missing keys take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: StreamConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| SessionError::config(format!("YAML parse failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SessionError::file_error(path.to_path_buf(), e))?;
        debug!("Loaded configuration from {} ({} bytes)", path.display(), yaml.len());
        Self::from_yaml_str(&yaml)
    }

    /// Check every value is usable before any session sees it.
    pub fn validate(&self) -> Result<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(SessionError::config("frame dimensions must be non-zero"));
        }
        if self.frame_width > u32::from(u16::MAX) || self.frame_height > u32::from(u16::MAX) {
            return Err(SessionError::config(format!(
                "frame dimensions must not exceed {} pixels",
                u16::MAX
            )));
        }
        if self.total_frames == 0 {
            return Err(SessionError::config("total_frames must be at least 1"));
        }
        if self.frames_per_block == 0 {
            return Err(SessionError::config("frames_per_block must be at least 1"));
        }
        if self.default_blocks_per_chunk == 0 {
            return Err(SessionError::config("default_blocks_per_chunk must be at least 1"));
        }
        if self.default_segment_count == 0 {
            return Err(SessionError::config("default_segment_count must be at least 1"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(SessionError::config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(SessionError::config(format!(
                "font_size must be positive, got {}",
                self.font_size
            )));
        }
        if self.segment_hues.is_empty() {
            return Err(SessionError::config("segment_hues must not be empty"));
        }
        if let Some(indices) = &self.default_switch_frame_indices {
            if !indices.is_sorted() {
                return Err(SessionError::config(
                    "default_switch_frame_indices must be ascending",
                ));
            }
        }
        Ok(())
    }

    /// Number of blocks needed to cover every frame. The last block may be short.
    pub fn num_blocks(&self) -> u64 {
        self.total_frames.div_ceil(self.frames_per_block)
    }

    /// Switch indices applied when the client supplies none.
    ///
    /// Either the configured list or `default_segment_count` evenly spaced
    /// boundaries, e.g. `[24, 48, 72, 96]` for 120 frames and 5 segments.
    pub fn default_switch_frame_indices(&self) -> Vec<u64> {
        if let Some(indices) = &self.default_switch_frame_indices {
            return indices.clone();
        }
        let segments = self.default_segment_count.max(1);
        (1..segments).map(|k| k * self.total_frames / segments).collect()
    }

    pub fn block_latency(&self) -> Duration {
        Duration::from_millis(self.block_latency_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
