//! Core value types for streaming sessions.
//!
//! - [`Frame`] is one rendered image, tagged with its [`FrameFormat`]
//! - [`Chunk`] is the unit of transmission: consecutive frames flushed together
//! - [`InitRequest`] and [`ServerMessage`] are the JSON wire messages
//!
//! ```rust
//! use reelwire::types::{Frame, FrameFormat, ServerMessage};
//!
//! let frame = Frame::new(0, vec![1, 2, 3], FrameFormat::Jpeg);
//! let json = ServerMessage::frame(&frame).to_json().unwrap();
//! assert!(json.contains(r#""type":"frame""#));
//! ```

mod frame;
mod message;

pub use frame::{Chunk, Frame, FrameFormat};
pub use message::{InitRequest, ServerMessage};
