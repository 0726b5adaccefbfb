//! Error types for the protocol layer.

/// Errors that can occur while shaping or serializing events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, wrong
    /// data types, or truncated frames.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The event passed deserialization but violates protocol rules —
    /// an unknown event name, or a payload missing declared fields.
    #[error("invalid event: {0}")]
    InvalidEvent(String),
}
