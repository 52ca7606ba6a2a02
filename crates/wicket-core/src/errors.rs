//! Wire protocol errors.

use thiserror::Error;

/// Errors raised while decoding a client frame or encoding a server message.
///
/// None of these close the connection; the offending frame is ignored.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, or a server message failed to serialize.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The frame is a JSON object without a string `type` field.
    #[error("envelope has no `type` discriminator")]
    MissingType,
    /// The frame carries a control type with missing or invalid fields.
    #[error("invalid `{kind}` message: {reason}")]
    InvalidControl {
        /// The `type` discriminator of the rejected frame.
        kind: String,
        /// What was wrong with it.
        reason: String,
    },
    /// The frame uses a type only the server may emit.
    #[error("`{0}` is a server-only message type")]
    ServerOnly(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = ProtocolError::Malformed(json_err);
        assert!(err.to_string().starts_with("malformed envelope"));
    }

    #[test]
    fn missing_type_display() {
        assert_eq!(
            ProtocolError::MissingType.to_string(),
            "envelope has no `type` discriminator"
        );
    }

    #[test]
    fn invalid_control_display() {
        let err = ProtocolError::InvalidControl {
            kind: "reconnect".into(),
            reason: "missing clientId".into(),
        };
        assert_eq!(err.to_string(), "invalid `reconnect` message: missing clientId");
    }

    #[test]
    fn server_only_display() {
        let err = ProtocolError::ServerOnly("client-id".into());
        assert_eq!(err.to_string(), "`client-id` is a server-only message type");
    }
}
