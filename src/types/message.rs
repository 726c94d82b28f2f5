//! JSON messages exchanged over a session connection

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::{Frame, FrameFormat};
use crate::Result;

/// First message a client sends on a new connection.
///
/// Every field is optional at the serde level so a missing `prompts` is reported
/// by the handshake with a precise message instead of a generic decode error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks_per_chunk: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_frame_indices: Option<Vec<u64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompts: Option<Vec<String>>,
}

impl InitRequest {
    /// Request with the given prompts and every other field defaulted
    pub fn with_prompts<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { prompts: Some(prompts.into_iter().map(Into::into).collect()), ..Self::default() }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// One encoded frame
    Frame {
        frame_index: u64,
        /// Base64 of the encoded image
        data: String,
        format: FrameFormat,
    },

    /// Terminal success message carrying the number of frames sent
    Done { total_frames: u64 },

    /// Terminal failure message
    Error { message: String },
}

impl ServerMessage {
    pub fn frame(frame: &Frame) -> Self {
        ServerMessage::Frame {
            frame_index: frame.index,
            data: BASE64.encode(&frame.payload),
            format: frame.format,
        }
    }

    pub fn done(total_frames: u64) -> Self {
        ServerMessage::Done { total_frames }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error { message: message.into() }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::SessionError::transport_with_source("message serialization failed", Box::new(e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_message_matches_wire_shape() {
        let frame = Frame::new(7, vec![0xff, 0xd8, 0xff], FrameFormat::Jpeg);
        let value = serde_json::to_value(ServerMessage::frame(&frame)).unwrap();

        assert_eq!(
            value,
            json!({"type": "frame", "frame_index": 7, "data": "/9j/", "format": "jpeg"})
        );
    }

    #[test]
    fn terminal_messages_match_wire_shape() {
        let done = serde_json::to_value(ServerMessage::done(120)).unwrap();
        assert_eq!(done, json!({"type": "done", "total_frames": 120}));

        let error = serde_json::to_value(ServerMessage::error("boom")).unwrap();
        assert_eq!(error, json!({"type": "error", "message": "boom"}));
    }

    #[test]
    fn init_request_tolerates_missing_and_unknown_fields() {
        let init = InitRequest::from_json(r#"{"blocks_per_chunk": 5, "fps": 24}"#).unwrap();
        assert_eq!(init.prompts, None);
        assert_eq!(init.blocks_per_chunk, Some(5));

        let init = InitRequest::from_json(
            r#"{"prompts": ["a", "b"], "switch_frame_indices": [60], "reprompts": ["c"]}"#,
        )
        .unwrap();
        assert_eq!(init.prompts.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(init.switch_frame_indices, Some(vec![60]));
        assert_eq!(init.reprompts, Some(vec!["c".to_string()]));
    }

    #[test]
    fn init_request_rejects_wrong_types() {
        assert!(InitRequest::from_json(r#"{"prompts": "a"}"#).is_err());
        assert!(InitRequest::from_json(r#"{"prompts": ["a"], "switch_frame_indices": [-1]}"#).is_err());
        assert!(InitRequest::from_json("not json").is_err());
    }
}
