use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// How inbound frames of a stream are interpreted. Fixed per stream type,
/// never negotiated per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameMode {
    /// Frames are opaque text, delivered verbatim.
    Raw,
    /// Frames are JSON values; a top-level array is split into elements.
    Json,
}

/// Kind tag of a [`StreamMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Raw,
    Decoded,
}

/// One message dispatched to the subscription callback.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    /// Verbatim frame text (raw mode).
    Raw(String),
    /// One parsed JSON value (JSON mode).
    Decoded(JsonValue),
}

impl StreamMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            StreamMessage::Raw(_) => MessageKind::Raw,
            StreamMessage::Decoded(_) => MessageKind::Decoded,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            StreamMessage::Raw(text) => Some(text),
            StreamMessage::Decoded(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            StreamMessage::Decoded(value) => Some(value),
            StreamMessage::Raw(_) => None,
        }
    }

    /// Deserialize a decoded message into a typed payload.
    ///
    /// Raw messages are parsed as JSON text first, so a typed consumer can
    /// be pointed at either mode.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> crate::error::Result<T> {
        match self {
            StreamMessage::Decoded(value) => Ok(T::deserialize(value)?),
            StreamMessage::Raw(text) => Ok(serde_json::from_str(text)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TopologyChanged {
        leader: String,
        term: u64,
    }

    #[test]
    fn test_accessors() {
        let raw = StreamMessage::Raw("line".into());
        assert_eq!(raw.kind(), MessageKind::Raw);
        assert_eq!(raw.as_raw(), Some("line"));
        assert!(raw.as_json().is_none());

        let decoded = StreamMessage::Decoded(json!({"x": 1}));
        assert_eq!(decoded.kind(), MessageKind::Decoded);
        assert_eq!(decoded.as_json(), Some(&json!({"x": 1})));
    }

    #[test]
    fn test_parse_typed_payload() {
        let msg = StreamMessage::Decoded(json!({"leader": "A", "term": 7}));
        let parsed: TopologyChanged = msg.parse().unwrap();
        assert_eq!(parsed, TopologyChanged { leader: "A".into(), term: 7 });

        let raw = StreamMessage::Raw(r#"{"leader":"B","term":8}"#.into());
        assert_eq!(raw.parse::<TopologyChanged>().unwrap().term, 8);

        assert!(StreamMessage::Raw("not json".into()).parse::<TopologyChanged>().is_err());
    }
}
