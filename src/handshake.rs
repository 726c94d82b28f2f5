//! Init message validation and session parameter derivation

use tracing::debug;

use crate::config::StreamConfig;
use crate::planner::SegmentPlan;
use crate::types::InitRequest;
use crate::{Result, SessionError};

/// Validated parameters a session streams with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Frames the session will send
    pub total_frames: u64,

    /// Frames rendered per block
    pub frames_per_block: u64,

    /// Blocks buffered before a chunk is flushed
    pub blocks_per_chunk: u64,

    /// Prompt schedule with reprompts applied
    pub plan: SegmentPlan,
}

impl SessionParams {
    /// Frames in every chunk except possibly the last
    pub fn chunk_frames(&self) -> u64 {
        self.blocks_per_chunk.saturating_mul(self.frames_per_block)
    }

    /// Blocks needed to cover `total_frames`; the last may be short
    pub fn num_blocks(&self) -> u64 {
        self.total_frames.div_ceil(self.frames_per_block)
    }
}

/// Validates the first message of a connection.
pub struct SessionHandshake;

impl SessionHandshake {
    /// Parse raw JSON text and validate it.
    pub fn parse(text: &str, config: &StreamConfig) -> Result<SessionParams> {
        let init = InitRequest::from_json(text)?;
        Self::validate(init, config)
    }

    /// Validate a decoded init request, filling defaults from `config`.
    pub fn validate(init: InitRequest, config: &StreamConfig) -> Result<SessionParams> {
        let prompts = init
            .prompts
            .ok_or_else(|| SessionError::protocol("missing required field `prompts`"))?;
        if prompts.is_empty() {
            return Err(SessionError::protocol("`prompts` must not be empty"));
        }

        let blocks_per_chunk = init.blocks_per_chunk.unwrap_or(config.default_blocks_per_chunk);
        if blocks_per_chunk == 0 {
            return Err(SessionError::protocol("`blocks_per_chunk` must be at least 1"));
        }
        if blocks_per_chunk.checked_mul(config.frames_per_block).is_none() {
            return Err(SessionError::protocol(format!(
                "`blocks_per_chunk` of {blocks_per_chunk} overflows the chunk size"
            )));
        }

        let switch_frame_indices = match init.switch_frame_indices {
            Some(indices) => {
                if indices.len() > prompts.len() - 1 {
                    return Err(SessionError::protocol(format!(
                        "{} switch indices given for {} prompts (at most {} allowed)",
                        indices.len(),
                        prompts.len(),
                        prompts.len() - 1
                    )));
                }
                indices
            }
            None => config.default_switch_frame_indices(),
        };

        let reprompts = init.reprompts.unwrap_or_default();
        let plan = SegmentPlan::new(prompts, switch_frame_indices, &reprompts)?;

        debug!(
            "Handshake accepted: {} prompts, switches {:?}, {} reprompts, {} blocks/chunk",
            plan.segment_count(),
            plan.switch_frame_indices(),
            reprompts.len(),
            blocks_per_chunk
        );

        Ok(SessionParams {
            total_frames: config.total_frames,
            frames_per_block: config.frames_per_block,
            blocks_per_chunk,
            plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<SessionParams> {
        SessionHandshake::parse(text, &StreamConfig::default())
    }

    #[test]
    fn defaults_are_filled_in() {
        let params = parse(r#"{"prompts": ["a"]}"#).unwrap();

        assert_eq!(params.total_frames, 120);
        assert_eq!(params.frames_per_block, 6);
        assert_eq!(params.blocks_per_chunk, 5);
        assert_eq!(params.chunk_frames(), 30);
        assert_eq!(params.num_blocks(), 20);
        assert_eq!(params.plan.switch_frame_indices(), &[24, 48, 72, 96]);
    }

    #[test]
    fn explicit_fields_are_used() {
        let params = parse(
            r#"{"prompts": ["a", "b"], "blocks_per_chunk": 2, "switch_frame_indices": [60], "reprompts": ["c"]}"#,
        )
        .unwrap();

        assert_eq!(params.blocks_per_chunk, 2);
        assert_eq!(params.plan.switch_frame_indices(), &[60]);
        assert_eq!(params.plan.effective_prompts(), &["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn fewer_switches_than_prompts_is_allowed() {
        let params = parse(r#"{"prompts": ["a", "b", "c"], "switch_frame_indices": [40]}"#).unwrap();
        assert_eq!(params.plan.active_prompt(100), "b");
    }

    #[test]
    fn empty_reprompts_behave_like_absent() {
        let params = parse(r#"{"prompts": ["a", "b"], "reprompts": []}"#).unwrap();
        assert_eq!(params.plan.effective_prompts(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn violations_are_protocol_errors() {
        let cases = [
            r#"{"blocks_per_chunk": 5}"#,
            r#"{"prompts": []}"#,
            r#"{"prompts": ["a"], "blocks_per_chunk": 0}"#,
            r#"{"prompts": ["a", "b", "c"], "switch_frame_indices": [80, 40]}"#,
            r#"{"prompts": ["a", "b"], "switch_frame_indices": [20, 40]}"#,
            r#"{"prompts": ["a"], "reprompts": ["b", "c"]}"#,
            r#"{"prompts": ["a"], "blocks_per_chunk": -1}"#,
            r#"{"prompts": ["a"], "blocks_per_chunk": 9223372036854775808}"#,
            r#"{"prompts": ["a"], "blocks_per_chunk": 18446744073709551615}"#,
            r#"["a", "b"]"#,
            "",
        ];

        for text in cases {
            let err = parse(text).expect_err(text);
            assert!(matches!(err, SessionError::Protocol { .. }), "{text}: {err:?}");
        }
    }

    #[test]
    fn chunk_larger_than_session_is_one_chunk() {
        let params = parse(r#"{"prompts": ["a"], "blocks_per_chunk": 1000000}"#).unwrap();
        assert_eq!(params.chunk_frames(), 6_000_000);

        let huge = SessionParams { blocks_per_chunk: u64::MAX, ..params };
        assert_eq!(huge.chunk_frames(), u64::MAX);
    }

    #[test]
    fn missing_prompts_names_the_field() {
        let err = parse(r#"{"blocks_per_chunk": 5}"#).unwrap_err();
        assert!(err.to_string().contains("prompts"));
    }
}
