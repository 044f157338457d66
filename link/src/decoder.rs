//! Frame decoding.
//!
//! A frame becomes zero or more [`StreamMessage`]s according to the stream's
//! [`FrameMode`]. Raw frames pass through untouched. JSON frames are parsed,
//! and a top-level array is split so each element is dispatched on its own.

use crate::{
    error::{NotifyError, Result},
    models::{FrameMode, StreamMessage},
};
use serde_json::Value as JsonValue;

/// Decode one text frame.
///
/// Raw mode never fails. JSON mode fails with
/// [`NotifyError::DecodeError`] on malformed input; callers report the error
/// and keep the connection open.
///
/// # Example
///
/// ```rust
/// use kalam_notify::{decode_frame, FrameMode, StreamMessage};
/// use serde_json::json;
///
/// let messages = decode_frame(r#"[{"x":1},{"x":2}]"#, FrameMode::Json).unwrap();
/// assert_eq!(
///     messages,
///     vec![
///         StreamMessage::Decoded(json!({"x": 1})),
///         StreamMessage::Decoded(json!({"x": 2})),
///     ]
/// );
/// ```
pub fn decode_frame(text: &str, mode: FrameMode) -> Result<Vec<StreamMessage>> {
    match mode {
        FrameMode::Raw => Ok(vec![StreamMessage::Raw(text.to_string())]),
        FrameMode::Json => {
            let value: JsonValue = serde_json::from_str(text).map_err(|e| {
                NotifyError::DecodeError(format!("Failed to parse frame as JSON: {}", e))
            })?;
            Ok(split_value(value))
        },
    }
}

/// Decode one binary frame carrying UTF-8 text.
pub fn decode_binary_frame(data: &[u8], mode: FrameMode) -> Result<Vec<StreamMessage>> {
    let text = std::str::from_utf8(data).map_err(|e| {
        NotifyError::DecodeError(format!("Invalid UTF-8 in binary frame: {}", e))
    })?;
    decode_frame(text, mode)
}

/// Reject frames above `max_bytes` before any parsing happens.
pub(crate) fn check_frame_size(len: usize, max_bytes: usize) -> Result<()> {
    if len > max_bytes {
        return Err(NotifyError::DecodeError(format!(
            "Frame too large ({} bytes > {} bytes)",
            len, max_bytes
        )));
    }
    Ok(())
}

fn split_value(value: JsonValue) -> Vec<StreamMessage> {
    match value {
        JsonValue::Array(items) => items.into_iter().map(StreamMessage::Decoded).collect(),
        other => vec![StreamMessage::Decoded(other)],
    }
}
